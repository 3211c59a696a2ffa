use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerCounters {
    selected: AtomicU64,
    inserted: AtomicU64,
    deleted: AtomicU64,
    batches: AtomicU64,
}

/// Row counters of one archive job.
///
/// Each counter has exactly one writer: `selected` is advanced by the control
/// loop after a fetch, `inserted` by the insert worker after the target commit
/// and `deleted` by the delete worker after the source commit. Everything else
/// (watchdogs, the summary) only takes snapshots.
#[derive(Debug, Clone)]
pub struct JobCounters {
    inner: Arc<InnerCounters>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub selected: u64,
    pub inserted: u64,
    pub deleted: u64,
    pub batches: u64,
}

impl JobCounters {
    pub fn new() -> Self {
        JobCounters {
            inner: Arc::new(InnerCounters::default()),
        }
    }

    pub fn add_selected(&self, rows: usize) {
        self.inner
            .selected
            .fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Affected-row counts are signed; negative values never advance a counter.
    pub fn add_inserted(&self, rows: i64) {
        self.inner
            .inserted
            .fetch_add(u64::try_from(rows).unwrap_or(0), Ordering::Relaxed);
    }

    pub fn add_deleted(&self, rows: i64) {
        self.inner
            .deleted
            .fetch_add(u64::try_from(rows).unwrap_or(0), Ordering::Relaxed);
    }

    pub fn add_batch(&self) {
        self.inner.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn selected(&self) -> u64 {
        self.inner.selected.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            selected: self.inner.selected.load(Ordering::Relaxed),
            inserted: self.inner.inserted.load(Ordering::Relaxed),
            deleted: self.inner.deleted.load(Ordering::Relaxed),
            batches: self.inner.batches.load(Ordering::Relaxed),
        }
    }
}

impl Default for JobCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counts() {
        let counters = JobCounters::new();
        let reader = counters.clone();

        counters.add_selected(4);
        counters.add_inserted(4);
        counters.add_deleted(3);
        counters.add_inserted(-1);
        counters.add_batch();

        assert_eq!(
            reader.snapshot(),
            CountersSnapshot {
                selected: 4,
                inserted: 4,
                deleted: 3,
                batches: 1,
            }
        );
    }
}
