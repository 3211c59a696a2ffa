use crate::sql::base::{
    error::DbError,
    metadata::index::{IndexInfo, PlannerEstimate},
    query::statement::Statement,
    transaction::SqlTransaction,
};
use async_trait::async_trait;
use model::records::row::Row;

/// The relational database collaborator used by the archiver: plain
/// queries, transactions and the catalog lookups needed to pick a key.
#[async_trait]
pub trait SqlAdapter: Send + Sync {
    /// Round trip to the server; used to fail fast on unreachable endpoints.
    async fn ping(&self) -> Result<(), DbError>;

    async fn query_rows(&self, stmt: &Statement) -> Result<Vec<Row>, DbError>;

    async fn begin(&self) -> Result<Box<dyn SqlTransaction>, DbError>;

    // Introspection
    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;
    /// Insertable columns of `table` in ordinal order; generated columns are skipped.
    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError>;
    async fn explain(&self, table: &str, filter: Option<&str>) -> Result<PlannerEstimate, DbError>;
    async fn index_catalog(&self, table: &str) -> Result<Vec<IndexInfo>, DbError>;
}
