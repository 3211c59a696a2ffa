use std::sync::Arc;
use tokio::sync::watch;

/// Pause flag checked by the control loop between batches.
///
/// Pausing never interrupts a batch in flight; the loop only blocks in
/// [`PauseGate::wait_resumed`] once the current batch has resolved.
#[derive(Debug, Clone)]
pub struct PauseGate {
    paused: Arc<watch::Sender<bool>>,
}

impl PauseGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        PauseGate {
            paused: Arc::new(tx),
        }
    }

    /// Returns `true` if the gate was open.
    pub fn pause(&self) -> bool {
        !self.paused.send_replace(true)
    }

    /// Returns `true` if the gate was closed.
    pub fn resume(&self) -> bool {
        self.paused.send_replace(false)
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Completes immediately unless paused.
    pub async fn wait_resumed(&self) {
        let mut rx = self.paused.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn open_gate_does_not_block() {
        let gate = PauseGate::new();
        tokio::time::timeout(Duration::from_millis(50), gate.wait_resumed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn paused_gate_blocks_until_resumed() {
        let gate = PauseGate::new();
        assert!(gate.pause());
        assert!(!gate.pause());

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait_resumed().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert!(gate.resume());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!gate.resume());
    }
}
