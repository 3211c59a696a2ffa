use async_trait::async_trait;
use connectors::sql::base::{
    adapter::SqlAdapter,
    error::DbError,
    metadata::index::{IndexInfo, PlannerEstimate},
    query::statement::Statement,
    transaction::SqlTransaction,
};
use model::records::row::Row;
use std::sync::{Arc, Mutex};

/// Shared, ordered record of transaction events across adapters.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Adapter answering with canned values.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdapter {
    pub label: &'static str,
    pub table_exists: bool,
    pub columns: Vec<String>,
    pub estimate: PlannerEstimate,
    pub catalog: Vec<IndexInfo>,
    pub rows: Vec<Row>,
    pub fail_query: bool,
    pub fail_begin: bool,
    pub fail_exec: bool,
    pub fail_commit: bool,
    pub affected: i64,
    pub log: EventLog,
}

impl ScriptedAdapter {
    pub fn with_columns(columns: &[&str]) -> Self {
        ScriptedAdapter {
            table_exists: true,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn side(label: &'static str, affected: i64, log: &EventLog) -> Self {
        ScriptedAdapter {
            label,
            affected,
            log: log.clone(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SqlAdapter for ScriptedAdapter {
    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn query_rows(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        if self.fail_query {
            return Err(DbError::Unknown(format!("query failed: {}", stmt.sql)));
        }
        Ok(self.rows.clone())
    }

    async fn begin(&self) -> Result<Box<dyn SqlTransaction>, DbError> {
        if self.fail_begin {
            return Err(DbError::Unknown(format!("{}: begin failed", self.label)));
        }
        self.log.push(format!("{}:begin", self.label));
        Ok(Box::new(ScriptedTransaction {
            adapter: self.clone(),
        }))
    }

    async fn table_exists(&self, _table: &str) -> Result<bool, DbError> {
        Ok(self.table_exists)
    }

    async fn column_names(&self, _table: &str) -> Result<Vec<String>, DbError> {
        Ok(self.columns.clone())
    }

    async fn explain(&self, _table: &str, _filter: Option<&str>) -> Result<PlannerEstimate, DbError> {
        Ok(self.estimate.clone())
    }

    async fn index_catalog(&self, _table: &str) -> Result<Vec<IndexInfo>, DbError> {
        Ok(self.catalog.clone())
    }
}

struct ScriptedTransaction {
    adapter: ScriptedAdapter,
}

#[async_trait]
impl SqlTransaction for ScriptedTransaction {
    async fn exec(&mut self, _stmt: &Statement) -> Result<i64, DbError> {
        // Let the other worker run so both sides interleave.
        tokio::task::yield_now().await;
        if self.adapter.fail_exec {
            return Err(DbError::Unknown(format!("{}: exec failed", self.adapter.label)));
        }
        self.adapter.log.push(format!("{}:exec", self.adapter.label));
        Ok(self.adapter.affected)
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        if self.adapter.fail_commit {
            return Err(DbError::Unknown(format!("{}: commit failed", self.adapter.label)));
        }
        self.adapter.log.push(format!("{}:commit", self.adapter.label));
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.adapter.log.push(format!("{}:rollback", self.adapter.label));
        Ok(())
    }
}
