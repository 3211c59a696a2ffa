use crate::{
    error::EngineError,
    metrics::JobCounters,
    mover::handshake::{DeleteSide, InsertSide, handshake},
};
use connectors::sql::base::{
    adapter::SqlAdapter, query::generator::MoveStatements, query::statement::Statement,
    transaction::SqlTransaction,
};
use model::records::batch::Batch;
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, warn};

/// Affected-row counts of a batch whose two transactions both committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: i64,
    pub deleted: i64,
}

/// Moves one batch with an insert transaction on the target and a delete
/// transaction on the source.
///
/// The two workers run concurrently and agree over a three-signal handshake:
///
/// ```text
/// insert worker                       delete worker
/// begin, INSERT                       begin, DELETE
/// send inserted_count ──────────────▶ recv inserted_count
///                                     counts_match = inserted >= deleted
/// recv counts_match ◀──────────────── send counts_match
/// commit target (if matched)
/// send target_committed ────────────▶ recv target_committed
///                                     commit source (if committed)
/// ```
///
/// The target always commits first, so a failure can leave a row in both
/// tables but never in neither.
pub struct MoveCoordinator {
    source: Arc<dyn SqlAdapter>,
    target: Arc<dyn SqlAdapter>,
    counters: JobCounters,
}

impl MoveCoordinator {
    pub fn new(
        source: Arc<dyn SqlAdapter>,
        target: Arc<dyn SqlAdapter>,
        counters: JobCounters,
    ) -> Self {
        MoveCoordinator {
            source,
            target,
            counters,
        }
    }

    pub async fn move_batch(
        &self,
        batch: &Batch,
        statements: MoveStatements,
    ) -> Result<BatchOutcome, EngineError> {
        let started = Instant::now();
        let (insert_side, delete_side) = handshake();

        let (inserted, deleted) = tokio::join!(
            insert_worker(
                self.target.as_ref(),
                &statements.insert,
                insert_side,
                &self.counters,
            ),
            delete_worker(
                self.source.as_ref(),
                &statements.delete,
                delete_side,
                &self.counters,
            ),
        );

        let outcome = settle(batch.seq, inserted, deleted)?;
        self.counters.add_batch();
        info!(
            batch = batch.seq,
            rows = batch.row_count(),
            inserted = outcome.inserted,
            deleted = outcome.deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch moved"
        );
        Ok(outcome)
    }
}

async fn insert_worker(
    target: &dyn SqlAdapter,
    insert: &Statement,
    side: InsertSide,
    counters: &JobCounters,
) -> Result<i64, EngineError> {
    let InsertSide {
        inserted_count,
        counts_match,
        target_committed,
    } = side;

    let mut tx = target.begin().await?;
    let inserted = match tx.exec(insert).await {
        Ok(n) => n,
        Err(err) => {
            rollback(tx, "target").await;
            return Err(err.into());
        }
    };
    debug!(inserted, "Insert executed");

    if inserted_count.send(inserted).is_err() {
        rollback(tx, "target").await;
        return Err(EngineError::PeerAborted(
            "delete worker stopped before reading the inserted count".to_string(),
        ));
    }

    let matched = match counts_match.await {
        Ok(matched) => matched,
        Err(_) => {
            rollback(tx, "target").await;
            return Err(EngineError::PeerAborted(
                "delete worker stopped before comparing counts".to_string(),
            ));
        }
    };
    if !matched {
        rollback(tx, "target").await;
        let _ = target_committed.send(false);
        return Err(EngineError::PeerAborted(
            "source delete affected more rows than the insert".to_string(),
        ));
    }

    // Dropping `target_committed` on failure tells the delete worker to roll back.
    tx.commit().await?;
    counters.add_inserted(inserted);

    if target_committed.send(true).is_err() {
        warn!(inserted, "Target committed but the delete worker is gone; rows stay in both tables");
    }
    Ok(inserted)
}

async fn delete_worker(
    source: &dyn SqlAdapter,
    delete: &Statement,
    side: DeleteSide,
    counters: &JobCounters,
) -> Result<i64, EngineError> {
    let DeleteSide {
        inserted_count,
        counts_match,
        target_committed,
    } = side;

    let mut tx = source.begin().await?;
    let deleted = match tx.exec(delete).await {
        Ok(n) => n,
        Err(err) => {
            rollback(tx, "source").await;
            return Err(err.into());
        }
    };
    debug!(deleted, "Delete executed");

    let inserted = match inserted_count.await {
        Ok(n) => n,
        Err(_) => {
            rollback(tx, "source").await;
            return Err(EngineError::PeerAborted(
                "insert worker stopped before reporting its count".to_string(),
            ));
        }
    };

    let matched = inserted >= deleted;
    if counts_match.send(matched).is_err() {
        rollback(tx, "source").await;
        return Err(EngineError::PeerAborted(
            "insert worker stopped before reading the count check".to_string(),
        ));
    }

    if target_committed.await.unwrap_or(false) {
        tx.commit().await?;
        counters.add_deleted(deleted);
        return Ok(deleted);
    }

    rollback(tx, "source").await;
    if !matched {
        return Err(EngineError::Consistency { inserted, deleted });
    }
    Err(EngineError::PeerAborted(
        "target transaction was not committed".to_string(),
    ))
}

/// Ends a transaction that must not commit. A failed rollback is only
/// logged; the server discards the transaction when the connection drops.
async fn rollback(tx: Box<dyn SqlTransaction>, side: &str) {
    if let Err(err) = tx.rollback().await {
        error!(side, error = %err, "Rollback failed");
    }
}

/// Picks the batch result, preferring the error that started the abort over
/// the peer's reaction to it.
fn settle(
    seq: u64,
    inserted: Result<i64, EngineError>,
    deleted: Result<i64, EngineError>,
) -> Result<BatchOutcome, EngineError> {
    match (inserted, deleted) {
        (Ok(inserted), Ok(deleted)) => Ok(BatchOutcome { inserted, deleted }),
        (Ok(inserted), Err(err)) => {
            error!(batch = seq, inserted, error = %err, "Source side failed after the target committed");
            Err(err)
        }
        (Err(err), Ok(_)) => Err(err),
        (Err(insert_err), Err(delete_err)) => {
            if insert_err.is_peer_abort() {
                Err(delete_err)
            } else {
                Err(insert_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EventLog, ScriptedAdapter};
    use model::{core::value::Value, records::row::Row};
    use tracing_test::traced_test;

    fn batch() -> Batch {
        Batch::new(
            7,
            vec![Row::new(vec![Value::Int(1)]), Row::new(vec![Value::Int(2)])],
            &[0],
        )
    }

    fn statements() -> MoveStatements {
        MoveStatements {
            insert: Statement::raw("INSERT"),
            delete: Statement::raw("DELETE"),
        }
    }

    fn coordinator(
        source: ScriptedAdapter,
        target: ScriptedAdapter,
    ) -> (MoveCoordinator, JobCounters) {
        let counters = JobCounters::new();
        (
            MoveCoordinator::new(Arc::new(source), Arc::new(target), counters.clone()),
            counters,
        )
    }

    fn position(events: &[String], event: &str) -> usize {
        events
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("missing event {event} in {events:?}"))
    }

    #[tokio::test]
    #[traced_test]
    async fn commits_target_before_source() {
        let log = EventLog::default();
        let (mover, counters) = coordinator(
            ScriptedAdapter::side("source", 2, &log),
            ScriptedAdapter::side("target", 2, &log),
        );

        let outcome = mover.move_batch(&batch(), statements()).await.unwrap();

        assert_eq!(outcome, BatchOutcome { inserted: 2, deleted: 2 });
        let events = log.events();
        assert!(position(&events, "target:commit") < position(&events, "source:commit"));

        let snapshot = counters.snapshot();
        assert_eq!((snapshot.inserted, snapshot.deleted, snapshot.batches), (2, 2, 1));
        assert!(logs_contain("Batch moved"));
    }

    #[tokio::test]
    async fn fewer_deletes_than_inserts_still_commit() {
        let log = EventLog::default();
        let (mover, counters) = coordinator(
            ScriptedAdapter::side("source", 1, &log),
            ScriptedAdapter::side("target", 2, &log),
        );

        let outcome = mover.move_batch(&batch(), statements()).await.unwrap();
        assert_eq!(outcome.deleted, 1);
        assert_eq!(counters.snapshot().deleted, 1);
    }

    #[tokio::test]
    async fn more_deletes_than_inserts_roll_back_both_sides() {
        let log = EventLog::default();
        let (mover, counters) = coordinator(
            ScriptedAdapter::side("source", 3, &log),
            ScriptedAdapter::side("target", 2, &log),
        );

        let err = mover.move_batch(&batch(), statements()).await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::Consistency {
                inserted: 2,
                deleted: 3
            }
        ));
        assert_eq!(
            err.to_string(),
            "rows deleted(3) larger than inserted(2), rollback and exit"
        );
        let events = log.events();
        assert!(events.contains(&"target:rollback".to_string()));
        assert!(events.contains(&"source:rollback".to_string()));
        assert!(!events.iter().any(|e| e.ends_with(":commit")));
        assert_eq!(counters.snapshot(), crate::metrics::CountersSnapshot::default());
    }

    #[tokio::test]
    async fn insert_failure_rolls_back_source() {
        let log = EventLog::default();
        let mut target = ScriptedAdapter::side("target", 2, &log);
        target.fail_exec = true;
        let (mover, counters) = coordinator(ScriptedAdapter::side("source", 2, &log), target);

        let err = mover.move_batch(&batch(), statements()).await.unwrap_err();

        assert!(matches!(err, EngineError::Query(_)), "got {err:?}");
        let events = log.events();
        assert!(events.contains(&"source:rollback".to_string()));
        assert!(!events.iter().any(|e| e.ends_with(":commit")));
        assert_eq!(counters.snapshot().inserted, 0);
    }

    #[tokio::test]
    async fn source_begin_failure_rolls_back_target() {
        let log = EventLog::default();
        let mut source = ScriptedAdapter::side("source", 2, &log);
        source.fail_begin = true;
        let (mover, _) = coordinator(source, ScriptedAdapter::side("target", 2, &log));

        let err = mover.move_batch(&batch(), statements()).await.unwrap_err();

        assert!(matches!(err, EngineError::Query(_)), "got {err:?}");
        assert!(log.events().contains(&"target:rollback".to_string()));
        assert!(!log.events().contains(&"target:commit".to_string()));
    }

    #[tokio::test]
    async fn target_commit_failure_keeps_source_rows() {
        let log = EventLog::default();
        let mut target = ScriptedAdapter::side("target", 2, &log);
        target.fail_commit = true;
        let (mover, counters) = coordinator(ScriptedAdapter::side("source", 2, &log), target);

        let err = mover.move_batch(&batch(), statements()).await.unwrap_err();

        assert!(matches!(err, EngineError::Query(_)), "got {err:?}");
        assert!(log.events().contains(&"source:rollback".to_string()));
        assert_eq!(counters.snapshot().deleted, 0);
    }

    #[tokio::test]
    async fn source_commit_failure_leaves_duplicates_not_losses() {
        let log = EventLog::default();
        let mut source = ScriptedAdapter::side("source", 2, &log);
        source.fail_commit = true;
        let (mover, counters) = coordinator(source, ScriptedAdapter::side("target", 2, &log));

        let err = mover.move_batch(&batch(), statements()).await.unwrap_err();

        assert!(matches!(err, EngineError::Query(_)));
        assert!(log.events().contains(&"target:commit".to_string()));
        let snapshot = counters.snapshot();
        assert_eq!((snapshot.inserted, snapshot.deleted), (2, 0));
    }
}
