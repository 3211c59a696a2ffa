use engine_core::metrics::JobCounters;
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info};

/// Logs `selected/estimated` every `every` until `stop` fires.
///
/// The estimate comes from the planner once at job start and is never
/// refreshed, so the ratio is approximate.
pub fn spawn_progress(
    counters: JobCounters,
    estimated_rows: i64,
    every: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let selected = counters.selected();
                    info!(selected, estimated = estimated_rows, "progress: {selected}/{estimated_rows}");
                }
            }
        }
    }
    .in_current_span())
}
