use crate::error::EngineError;
use connectors::sql::base::adapter::SqlAdapter;
use model::core::key::ColumnSet;
use tracing::debug;

/// Fails with [`EngineError::TableNotFound`] unless `table` exists.
pub async fn ensure_table(adapter: &dyn SqlAdapter, table: &str) -> Result<(), EngineError> {
    if !adapter.table_exists(table).await? {
        return Err(EngineError::TableNotFound(table.to_string()));
    }
    Ok(())
}

/// Loads the insertable columns of `table`, which stay fixed for the job.
pub async fn load_columns(adapter: &dyn SqlAdapter, table: &str) -> Result<ColumnSet, EngineError> {
    ensure_table(adapter, table).await?;

    let names = adapter.column_names(table).await?;
    if names.is_empty() {
        return Err(EngineError::NoColumns(table.to_string()));
    }
    debug!(table, columns = names.len(), "Loaded source columns");

    Ok(ColumnSet::new(names))
}
