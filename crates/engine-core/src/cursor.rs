use crate::error::EngineError;
use connectors::sql::base::{adapter::SqlAdapter, query::statement::Statement};
use model::records::batch::Batch;
use std::{sync::Arc, time::Instant};
use tracing::debug;

/// Reads the next batch of live source rows.
///
/// There is no offset: moved rows are deleted from the source, so running
/// the same bounded SELECT again always starts at unprocessed rows.
pub struct BatchCursor {
    adapter: Arc<dyn SqlAdapter>,
    select: Statement,
    key_positions: Vec<usize>,
    limit: usize,
    next_seq: u64,
}

impl BatchCursor {
    pub fn new(
        adapter: Arc<dyn SqlAdapter>,
        select: Statement,
        key_positions: Vec<usize>,
        limit: usize,
    ) -> Self {
        BatchCursor {
            adapter,
            select,
            key_positions,
            limit,
            next_seq: 0,
        }
    }

    pub async fn fetch(&mut self) -> Result<Batch, EngineError> {
        let started = Instant::now();
        let rows = self.adapter.query_rows(&self.select).await?;

        let batch = Batch::new(self.next_seq, rows, &self.key_positions);
        self.next_seq += 1;

        debug!(
            batch = batch.seq,
            rows = batch.row_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched batch"
        );
        Ok(batch)
    }

    /// A short batch is the last one; nothing matched the filter past it.
    pub fn is_final(&self, batch: &Batch) -> bool {
        batch.row_count() < self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAdapter;
    use model::{core::value::Value, records::row::Row};

    fn rows(n: i64) -> Vec<Row> {
        (1..=n)
            .map(|i| Row::new(vec![Value::Int(i), Value::from(format!("note {i}"))]))
            .collect()
    }

    #[tokio::test]
    async fn captures_key_values_and_numbers_batches() {
        let adapter = Arc::new(ScriptedAdapter {
            rows: rows(3),
            ..Default::default()
        });
        let mut cursor = BatchCursor::new(adapter, Statement::raw("SELECT"), vec![0], 4);

        let first = cursor.fetch().await.unwrap();
        let second = cursor.fetch().await.unwrap();

        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(
            first.key_values,
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]]
        );
        assert!(cursor.is_final(&first));
    }

    #[tokio::test]
    async fn full_batch_is_not_final() {
        let adapter = Arc::new(ScriptedAdapter {
            rows: rows(4),
            ..Default::default()
        });
        let mut cursor = BatchCursor::new(adapter, Statement::raw("SELECT"), vec![], 4);

        let batch = cursor.fetch().await.unwrap();
        assert!(!cursor.is_final(&batch));
        assert!(batch.key_values.is_empty());
    }

    #[tokio::test]
    async fn query_failures_surface_as_query_errors() {
        let adapter = Arc::new(ScriptedAdapter {
            fail_query: true,
            ..Default::default()
        });
        let mut cursor = BatchCursor::new(adapter, Statement::raw("SELECT"), vec![0], 4);

        assert!(matches!(cursor.fetch().await, Err(EngineError::Query(_))));
    }
}
