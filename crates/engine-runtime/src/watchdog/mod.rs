pub mod memory;
pub mod pause;
pub mod progress;

use memory::MemoryBreach;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Background tasks of one job, all stopped by the same token.
#[derive(Default)]
pub struct Watchdogs {
    handles: Vec<JoinHandle<()>>,
    breach: Option<Arc<OnceLock<MemoryBreach>>>,
}

impl Watchdogs {
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn watch_breach(&mut self, breach: Arc<OnceLock<MemoryBreach>>) {
        self.breach = Some(breach);
    }

    /// Stops every task and returns the memory breach, if one cancelled the job.
    pub async fn shutdown(self, stop: &CancellationToken) -> Option<MemoryBreach> {
        stop.cancel();
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "Watchdog task failed");
            }
        }
        self.breach.and_then(|b| b.get().copied())
    }
}
