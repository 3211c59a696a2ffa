use crate::sql::{
    base::{error::DbError, query::statement::Statement, transaction::SqlTransaction},
    mysql::params::MySqlParamStore,
};
use async_trait::async_trait;
use mysql_async::{Transaction, prelude::*};
use tracing::trace;

pub struct MySqlTransaction {
    tx: Transaction<'static>,
}

impl MySqlTransaction {
    pub fn new(tx: Transaction<'static>) -> Self {
        MySqlTransaction { tx }
    }
}

#[async_trait]
impl SqlTransaction for MySqlTransaction {
    async fn exec(&mut self, stmt: &Statement) -> Result<i64, DbError> {
        trace!(sql = %stmt.sql, params = stmt.params.len(), "Executing statement in transaction");
        self.tx
            .exec_drop(
                stmt.sql.as_str(),
                MySqlParamStore::from_values(&stmt.params).params(),
            )
            .await?;
        i64::try_from(self.tx.affected_rows())
            .map_err(|_| DbError::Decode("affected row count overflows i64".to_string()))
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
