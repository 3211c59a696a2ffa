#![allow(dead_code)]

use crate::memory_db::{EventLog, MemoryDb, MemoryTable};
use engine_config::{
    report::summary::JobSummary,
    settings::{JobConfig, JobSettings},
};
use engine_runtime::{error::JobFailure, execution::executor::ArchiveJob};
use model::{core::value::Value, records::row::Row};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

pub const SOURCE_TABLE: &str = "orders";
pub const TARGET_TABLE: &str = "orders_archive";
pub const ORDER_COLUMNS: &[&str] = &["id", "customer", "note"];

/// Settings for `shop.orders -> shop.orders_archive` with every background
/// task switched off.
pub fn settings(limit: usize) -> JobSettings {
    let mut settings = JobSettings::default();
    settings.source.database = "shop".into();
    settings.source_table = SOURCE_TABLE.into();
    settings.target.table = Some(TARGET_TABLE.into());
    settings.limit = limit;
    settings.progress = Duration::ZERO;
    settings.control = false;
    settings
}

pub fn config(limit: usize) -> JobConfig {
    settings(limit).validate().expect("valid settings")
}

/// `n` orders with ids `1..=n`; every third note is NULL.
pub fn orders(n: i64) -> Vec<Row> {
    (1..=n)
        .map(|id| {
            Row::new(vec![
                Value::Int(id),
                Value::from(format!("customer-{}", id % 3)),
                if id % 3 == 0 {
                    Value::Null
                } else {
                    Value::from(format!("note {id}"))
                },
            ])
        })
        .collect()
}

pub fn orders_table(rows: Vec<Row>) -> MemoryTable {
    MemoryTable::new(ORDER_COLUMNS)
        .with_index("PRIMARY", true, &[("id", false)])
        .with_rows(rows)
}

/// First column of each row as an integer, sorted.
pub fn ids(rows: &[Row]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows
        .iter()
        .filter_map(|r| r.get(0).and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids
}

/// A source and a target schema sharing one event log.
pub struct Fixture {
    pub log: EventLog,
    pub source: MemoryDb,
    pub target: MemoryDb,
}

impl Fixture {
    /// `source_table` as `orders`, and an empty `orders_archive` with the
    /// same columns and indexes.
    pub fn new(source_table: MemoryTable) -> Self {
        let log = EventLog::default();
        let archive = MemoryTable {
            rows: Vec::new(),
            planner_key: None,
            ..source_table.clone()
        };
        Fixture {
            source: MemoryDb::new("source", &log).with_table(SOURCE_TABLE, source_table),
            target: MemoryDb::new("target", &log).with_table(TARGET_TABLE, archive),
            log,
        }
    }

    pub fn job(&self, config: JobConfig) -> ArchiveJob {
        ArchiveJob::new(
            config,
            Arc::new(self.source.clone()),
            Arc::new(self.target.clone()),
        )
    }

    pub async fn run(&self, config: JobConfig) -> Result<JobSummary, JobFailure> {
        self.job(config).run(CancellationToken::new()).await
    }

    pub fn source_rows(&self) -> Vec<Row> {
        self.source.rows(SOURCE_TABLE)
    }

    pub fn target_rows(&self) -> Vec<Row> {
        self.target.rows(TARGET_TABLE)
    }

    /// Source statements starting with `verb`.
    pub fn source_statements(&self, verb: &str) -> Vec<String> {
        self.source
            .statements()
            .into_iter()
            .filter(|s| s.starts_with(verb))
            .collect()
    }
}
