use crate::{
    error::{ArchiveError, JobFailure},
    watchdog::{
        Watchdogs,
        memory::{BreachAction, MemoryBreach, MemorySampler, MemoryWatchdog, ProcessMemory},
        pause::PauseGate,
        progress::spawn_progress,
    },
};
use chrono::{DateTime, Local};
use connectors::sql::{
    base::{adapter::SqlAdapter, query::generator::StatementFactory},
    mysql::adapter::MySqlAdapter,
};
use engine_config::{report::summary::JobSummary, settings::JobConfig};
use engine_core::{
    cursor::BatchCursor,
    key::resolver::KeyResolver,
    metrics::{CountersSnapshot, JobCounters},
    mover::coordinator::MoveCoordinator,
    schema,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

/// Connects both endpoints and runs the job to completion.
pub async fn run(config: JobConfig, cancel: CancellationToken) -> Result<JobSummary, JobFailure> {
    let start = Local::now();

    let source = match MySqlAdapter::connect(&config.source.endpoint.connect_options(config.pool_size)).await {
        Ok(adapter) => adapter,
        Err(err) => return Err(failure(&config, start, CountersSnapshot::default(), err.into())),
    };
    let target = match MySqlAdapter::connect(&config.target.endpoint.connect_options(config.pool_size)).await {
        Ok(adapter) => adapter,
        Err(err) => {
            disconnect(source, "source").await;
            return Err(failure(&config, start, CountersSnapshot::default(), err.into()));
        }
    };

    let result = ArchiveJob::new(config, Arc::new(source.clone()), Arc::new(target.clone()))
        .run(cancel)
        .await;

    disconnect(source, "source").await;
    disconnect(target, "target").await;
    result
}

async fn disconnect(adapter: MySqlAdapter, side: &str) {
    if let Err(err) = adapter.disconnect().await {
        warn!(side, error = %err, "Failed to close connection pool");
    }
}

/// One archive job over already connected endpoints.
pub struct ArchiveJob {
    config: JobConfig,
    source: Arc<dyn SqlAdapter>,
    target: Arc<dyn SqlAdapter>,
    counters: JobCounters,
    gate: PauseGate,
    breach_action: BreachAction,
    sampler: Option<Box<dyn MemorySampler>>,
}

impl ArchiveJob {
    pub fn new(config: JobConfig, source: Arc<dyn SqlAdapter>, target: Arc<dyn SqlAdapter>) -> Self {
        ArchiveJob {
            config,
            source,
            target,
            counters: JobCounters::new(),
            gate: PauseGate::new(),
            breach_action: BreachAction::default(),
            sampler: None,
        }
    }

    pub fn with_breach_action(mut self, action: BreachAction) -> Self {
        self.breach_action = action;
        self
    }

    /// Replaces the process RSS sampler used by the memory ceiling.
    pub fn with_memory_sampler(mut self, sampler: Box<dyn MemorySampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn counters(&self) -> JobCounters {
        self.counters.clone()
    }

    pub fn pause_gate(&self) -> PauseGate {
        self.gate.clone()
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<JobSummary, JobFailure> {
        let span = info_span!(
            "archive",
            source = %self.config.source,
            target = %self.config.target,
        );
        let start = Local::now();
        let job = cancel.child_token();
        let stop = CancellationToken::new();
        let mut watchdogs = Watchdogs::default();

        let result = self
            .execute(&job, &stop, &mut watchdogs)
            .instrument(span.clone())
            .await;
        let breach = watchdogs.shutdown(&stop).instrument(span.clone()).await;

        let result = match (result, breach) {
            (Err(ArchiveError::Cancelled), Some(MemoryBreach { used, limit })) => {
                Err(ArchiveError::MemoryLimit { used, limit })
            }
            (result, _) => result,
        };

        let counters = self.counters.snapshot();
        match result {
            Ok(()) => {
                info!(
                    parent: &span,
                    selected = counters.selected,
                    inserted = counters.inserted,
                    deleted = counters.deleted,
                    "Archive job finished"
                );
                Ok(JobSummary::new(
                    &self.config.source,
                    &self.config.target,
                    start,
                    Local::now(),
                    counters,
                ))
            }
            Err(err) => {
                error!(
                    parent: &span,
                    kind = %err.kind(),
                    selected = counters.selected,
                    inserted = counters.inserted,
                    deleted = counters.deleted,
                    error = %err,
                    "Archive job stopped"
                );
                Err(failure(&self.config, start, counters, err))
            }
        }
    }

    async fn execute(
        &mut self,
        job: &CancellationToken,
        stop: &CancellationToken,
        watchdogs: &mut Watchdogs,
    ) -> Result<(), ArchiveError> {
        let config = &self.config;
        let filter = config.filter.as_deref();

        schema::ensure_table(self.target.as_ref(), &config.target.table).await?;
        let columns = schema::load_columns(self.source.as_ref(), &config.source.table).await?;
        config.check_placeholders(columns.len())?;

        let resolution = KeyResolver::new(self.source.as_ref(), &config.source.table)
            .resolve(&columns, filter)
            .await?;
        info!(
            filter = filter.unwrap_or(""),
            estimated_rows = resolution.estimated_rows,
            "Source table analysed"
        );

        let key_positions = resolution.key.column_positions().to_vec();
        let mut factory = StatementFactory::new(
            &config.source.table,
            &config.target.table,
            columns,
            resolution.key,
            config.filter.clone(),
            config.limit,
        );
        let mut cursor = BatchCursor::new(
            self.source.clone(),
            factory.select().clone(),
            key_positions,
            config.limit,
        );
        let coordinator =
            MoveCoordinator::new(self.source.clone(), self.target.clone(), self.counters.clone());

        if let Some(every) = config.progress {
            watchdogs.push(spawn_progress(
                self.counters.clone(),
                resolution.estimated_rows,
                every,
                stop.clone(),
            ));
        }
        if let Some(limit) = config.memory_limit {
            let sampler = match self.sampler.take() {
                Some(sampler) => Some(sampler),
                None => ProcessMemory::current().map(|s| Box::new(s) as Box<dyn MemorySampler>),
            };
            match sampler {
                Some(sampler) => {
                    let dog = MemoryWatchdog::new(limit, sampler).with_action(self.breach_action);
                    watchdogs.watch_breach(dog.breach());
                    watchdogs.push(dog.spawn(job.clone(), stop.clone()));
                }
                None => warn!("Process id unavailable; memory limit is not enforced"),
            }
        }
        self.spawn_control(stop, watchdogs).await?;

        let deadline = config.run_time.map(|d| tokio::time::Instant::now() + d);
        loop {
            if job.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }
            if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                info!("Run time limit reached; stopping between batches");
                return Ok(());
            }

            let batch = cursor.fetch().await?;
            if batch.is_empty() {
                return Ok(());
            }
            self.counters.add_selected(batch.row_count());

            let statements = factory.statements_for(&batch)?;
            let outcome = coordinator.move_batch(&batch, statements).await?;
            if outcome.deleted == 0 {
                return Err(ArchiveError::NoProgress {
                    batch: batch.seq,
                    rows: batch.row_count(),
                });
            }
            if cursor.is_final(&batch) {
                return Ok(());
            }
            drop(batch);

            if self.gate.is_paused() {
                info!("Paused between batches; waiting for resume");
                tokio::select! {
                    _ = self.gate.wait_resumed() => {}
                    _ = job.cancelled() => {}
                }
            }
            if let Some(pause) = config.sleep {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = job.cancelled() => {}
                }
            }
        }
    }

    #[cfg(unix)]
    async fn spawn_control(
        &self,
        stop: &CancellationToken,
        watchdogs: &mut Watchdogs,
    ) -> Result<(), ArchiveError> {
        use crate::control::ControlServer;

        let Some(path) = &self.config.control_socket else {
            return Ok(());
        };
        let server = ControlServer::bind(path, self.gate.clone())
            .await
            .map_err(|source| ArchiveError::ControlSocket {
                path: path.clone(),
                source,
            })?;
        watchdogs.push(server.spawn(stop.clone()));
        Ok(())
    }

    #[cfg(not(unix))]
    async fn spawn_control(
        &self,
        _stop: &CancellationToken,
        _watchdogs: &mut Watchdogs,
    ) -> Result<(), ArchiveError> {
        if self.config.control_socket.is_some() {
            warn!("Control socket is only available on Unix; pause/resume disabled");
        }
        Ok(())
    }
}

fn failure(
    config: &JobConfig,
    start: DateTime<Local>,
    counters: CountersSnapshot,
    error: ArchiveError,
) -> JobFailure {
    let summary = JobSummary::new(&config.source, &config.target, start, Local::now(), counters)
        .with_error(&error);
    JobFailure {
        error,
        summary: Box::new(summary),
    }
}
