use crate::sql::base::{error::DbError, query::statement::Statement};
use async_trait::async_trait;

/// An open transaction on a single pooled connection.
///
/// Dropping a transaction without committing rolls it back, but callers end
/// transactions explicitly so failures surface in the logs.
#[async_trait]
pub trait SqlTransaction: Send {
    /// Executes a DML statement and returns the server-reported affected row count.
    async fn exec(&mut self, stmt: &Statement) -> Result<i64, DbError>;

    async fn commit(self: Box<Self>) -> Result<(), DbError>;

    async fn rollback(self: Box<Self>) -> Result<(), DbError>;
}
