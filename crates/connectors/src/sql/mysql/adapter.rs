use crate::sql::{
    base::{
        adapter::SqlAdapter,
        error::{ConnectorError, DbError},
        metadata::index::{IndexInfo, IndexRow, PlannerEstimate, group_index_rows},
        query::{generator::quote_ident, statement::Statement},
        transaction::SqlTransaction,
    },
    mysql::{
        options::MySqlConnectOptions,
        params::{MySqlParamStore, value_from_mysql},
        transaction::MySqlTransaction,
    },
};
use async_trait::async_trait;
use model::{core::value::Value, records::row::Row};
use mysql_async::{Pool, Row as MySqlRow, TxOpts, prelude::*};
use std::collections::HashSet;
use tracing::{debug, info, trace, warn};

const QUERY_TABLE_EXISTS_SQL: &str = include_str!("sql/table_exists.sql");
const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const QUERY_INDEX_CATALOG_SQL: &str = include_str!("sql/index_catalog.sql");

#[derive(Clone)]
pub struct MySqlAdapter {
    pool: Pool,
    database: String,
}

impl MySqlAdapter {
    /// Opens the pool and pings the server so unreachable endpoints fail
    /// before any work starts.
    pub async fn connect(options: &MySqlConnectOptions) -> Result<Self, ConnectorError> {
        let pool = Pool::new(options.to_opts()?);
        let mut conn = pool.get_conn().await.map_err(|source| ConnectorError::MySql {
            address: options.address.clone(),
            source,
        })?;
        conn.ping().await.map_err(|source| ConnectorError::MySql {
            address: options.address.clone(),
            source,
        })?;
        drop(conn);

        info!(
            address = %options.address,
            database = %options.database,
            pool_size = options.pool_size,
            "Connected to MySQL"
        );

        Ok(MySqlAdapter {
            pool,
            database: options.database.clone(),
        })
    }

    pub async fn disconnect(self) -> Result<(), DbError> {
        self.pool.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl SqlAdapter for MySqlAdapter {
    async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn query_rows(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        trace!(sql = %stmt.sql, params = stmt.params.len(), "Executing query");

        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<MySqlRow> = conn
            .exec(
                stmt.sql.as_str(),
                MySqlParamStore::from_values(&stmt.params).params(),
            )
            .await?;

        Ok(rows.into_iter().map(row_from_mysql).collect())
    }

    async fn begin(&self) -> Result<Box<dyn SqlTransaction>, DbError> {
        let tx = self.pool.start_transaction(TxOpts::default()).await?;
        Ok(Box::new(MySqlTransaction::new(tx)))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let count: Option<i64> = conn
            .exec_first(QUERY_TABLE_EXISTS_SQL, (self.database.as_str(), table))
            .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let names: Vec<String> = conn
            .exec(QUERY_TABLE_COLUMNS_SQL, (self.database.as_str(), table))
            .await?;
        Ok(names)
    }

    async fn explain(&self, table: &str, filter: Option<&str>) -> Result<PlannerEstimate, DbError> {
        let mut sql = format!("EXPLAIN SELECT /* tablemover */ 1 FROM {}", quote_ident(table));
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        debug!(sql = %sql, "Explaining source query");

        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<MySqlRow> = conn.query(sql).await?;

        for row in &rows {
            let plan_table: Option<String> = column(row, "table")?;
            if plan_table.as_deref() != Some(table) {
                continue;
            }
            return Ok(PlannerEstimate {
                key: column::<String>(row, "key")?.filter(|k| !k.is_empty()),
                rows: column::<i64>(row, "rows")?.unwrap_or(0),
            });
        }

        warn!(table, "EXPLAIN returned no plan row for the source table");
        Ok(PlannerEstimate::default())
    }

    async fn index_catalog(&self, table: &str) -> Result<Vec<IndexInfo>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<MySqlRow> = conn
            .exec(QUERY_INDEX_CATALOG_SQL, (self.database.as_str(), table))
            .await?;

        let mut index_rows = Vec::with_capacity(rows.len());
        let mut functional = HashSet::new();
        for row in &rows {
            let index_name: String = column(row, "index_name")?
                .ok_or_else(|| DbError::Decode("index_name is NULL".to_string()))?;
            // Functional key parts have no column; such indexes cannot address rows.
            let Some(column_name) = column::<String>(row, "column_name")? else {
                functional.insert(index_name);
                continue;
            };
            index_rows.push(IndexRow {
                index_name,
                non_unique: column::<i64>(row, "non_unique")?.unwrap_or(1) != 0,
                seq_in_index: column::<u32>(row, "seq_in_index")?.unwrap_or(0),
                column_name,
                nullable: column::<String>(row, "nullable")?
                    .is_some_and(|n| n.eq_ignore_ascii_case("YES")),
                cardinality: column::<u64>(row, "cardinality")?,
            });
        }

        Ok(group_index_rows(index_rows)
            .into_iter()
            .filter(|idx| !functional.contains(&idx.name))
            .collect())
    }
}

fn row_from_mysql(row: MySqlRow) -> Row {
    Row::new(
        row.unwrap_raw()
            .into_iter()
            .map(|v| v.map(value_from_mysql).unwrap_or(Value::Null))
            .collect(),
    )
}

/// Reads a nullable column by name; absent columns read as `None`.
fn column<T: FromValue>(row: &MySqlRow, name: &str) -> Result<Option<T>, DbError> {
    match row.get_opt::<Option<T>, _>(name) {
        Some(value) => Ok(value?),
        None => Ok(None),
    }
}
