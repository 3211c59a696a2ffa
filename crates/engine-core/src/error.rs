use connectors::sql::base::error::DbError;
use model::core::key::KeyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("table `{0}` not found")]
    TableNotFound(String),

    #[error("table `{0}` has no insertable columns")]
    NoColumns(String),

    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    #[error("query failed: {0}")]
    Query(#[from] DbError),

    /// The delete removed more rows than the insert wrote; both sides were
    /// rolled back before anything was committed.
    #[error("rows deleted({deleted}) larger than inserted({inserted}), rollback and exit")]
    Consistency { inserted: i64, deleted: i64 },

    /// The other handshake worker stopped before completing its part. The
    /// batch fails with that worker's own error; this one is only surfaced
    /// when nothing better is known.
    #[error("move aborted: {0}")]
    PeerAborted(String),
}

impl EngineError {
    pub fn is_peer_abort(&self) -> bool {
        matches!(self, EngineError::PeerAborted(_))
    }
}
