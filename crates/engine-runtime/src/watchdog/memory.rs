use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use sysinfo::{Pid, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, warn};

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(3);

/// Source of the current process memory usage, in bytes.
pub trait MemorySampler: Send + Sync + 'static {
    fn sample(&mut self) -> Option<u64>;
}

/// Resident set size of this process, read through `sysinfo`.
pub struct ProcessMemory {
    system: System,
    pid: Pid,
}

impl ProcessMemory {
    pub fn current() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        Some(ProcessMemory {
            system: System::new(),
            pid,
        })
    }
}

impl MemorySampler for ProcessMemory {
    fn sample(&mut self) -> Option<u64> {
        self.system.refresh_process(self.pid);
        self.system.process(self.pid).map(|p| p.memory())
    }
}

/// What to do once memory growth passes the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreachAction {
    /// Log and terminate the process with exit code 1. Handshake state in
    /// flight is abandoned; uncommitted transactions die with the connections.
    #[default]
    Exit,
    /// Cancel the job and let the control loop stop after the current batch.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBreach {
    pub used: u64,
    pub limit: u64,
}

/// Compares memory growth since start against a ceiling every few seconds.
pub struct MemoryWatchdog {
    limit: u64,
    action: BreachAction,
    sampler: Box<dyn MemorySampler>,
    breach: Arc<OnceLock<MemoryBreach>>,
}

impl MemoryWatchdog {
    pub fn new(limit: u64, sampler: Box<dyn MemorySampler>) -> Self {
        MemoryWatchdog {
            limit,
            action: BreachAction::default(),
            sampler,
            breach: Arc::new(OnceLock::new()),
        }
    }

    pub fn with_action(mut self, action: BreachAction) -> Self {
        self.action = action;
        self
    }

    /// Set once the ceiling was crossed under [`BreachAction::Cancel`].
    pub fn breach(&self) -> Arc<OnceLock<MemoryBreach>> {
        self.breach.clone()
    }

    /// Starts sampling. `job` is cancelled on a cooperative breach; `stop`
    /// ends the watchdog.
    pub fn spawn(mut self, job: CancellationToken, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(
            async move {
                let Some(baseline) = self.sampler.sample() else {
                    warn!("Process memory cannot be read; memory limit is not enforced");
                    return;
                };
                debug!(baseline, limit = self.limit, "Memory watchdog started");

                let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => return,
                        _ = ticker.tick() => {}
                    }

                    let Some(current) = self.sampler.sample() else {
                        continue;
                    };
                    let used = current.saturating_sub(baseline);
                    if used <= self.limit {
                        continue;
                    }

                    let breach = MemoryBreach {
                        used,
                        limit: self.limit,
                    };
                    error!(
                        used,
                        limit = self.limit,
                        "the memory usage({used}) of the task has exceeded the limit({}), \
                         you can either reduce the batch size or increase the memory limit",
                        self.limit
                    );
                    match self.action {
                        BreachAction::Exit => std::process::exit(1),
                        BreachAction::Cancel => {
                            let _ = self.breach.set(breach);
                            job.cancel();
                            return;
                        }
                    }
                }
            }
            .in_current_span(),
        )
    }
}
