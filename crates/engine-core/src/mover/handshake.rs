use tokio::sync::oneshot;

/// The insert worker's ends of a batch handshake.
pub struct InsertSide {
    pub inserted_count: oneshot::Sender<i64>,
    pub counts_match: oneshot::Receiver<bool>,
    pub target_committed: oneshot::Sender<bool>,
}

/// The delete worker's ends of a batch handshake.
pub struct DeleteSide {
    pub inserted_count: oneshot::Receiver<i64>,
    pub counts_match: oneshot::Sender<bool>,
    pub target_committed: oneshot::Receiver<bool>,
}

/// Creates the three one-shot signals of a single batch.
///
/// Each signal is sent at most once and the pair is dropped with the batch.
/// A worker that stops early drops its senders, which its peer observes as
/// a closed channel.
pub fn handshake() -> (InsertSide, DeleteSide) {
    let (inserted_tx, inserted_rx) = oneshot::channel();
    let (matched_tx, matched_rx) = oneshot::channel();
    let (committed_tx, committed_rx) = oneshot::channel();

    (
        InsertSide {
            inserted_count: inserted_tx,
            counts_match: matched_rx,
            target_committed: committed_tx,
        },
        DeleteSide {
            inserted_count: inserted_rx,
            counts_match: matched_tx,
            target_committed: committed_rx,
        },
    )
}
