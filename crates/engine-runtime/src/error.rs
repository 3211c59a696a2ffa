use connectors::sql::base::error::{ConnectorError, DbError};
use engine_config::{error::ConfigError, report::summary::JobSummary};
use engine_core::error::EngineError;
use std::{fmt, path::PathBuf};
use thiserror::Error;

/// Coarse classification of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connect,
    Schema,
    Query,
    Consistency,
    ResourceLimit,
    NoProgress,
    Interrupted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Connect => "ConnectError",
            ErrorKind::Schema => "SchemaError",
            ErrorKind::Query => "QueryError",
            ErrorKind::Consistency => "ConsistencyError",
            ErrorKind::ResourceLimit => "ResourceLimitError",
            ErrorKind::NoProgress => "NoProgress",
            ErrorKind::Interrupted => "Interrupted",
        };
        f.write_str(name)
    }
}

/// Top-level errors of an archive job. Every one of them stops the job.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connect(#[from] ConnectorError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Statement error: {0}")]
    Statement(#[from] DbError),

    /// A committed batch removed none of its rows from the source; the next
    /// fetch would return the same rows forever.
    #[error("batch {batch} moved {rows} rows but deleted none from the source; stopping")]
    NoProgress { batch: u64, rows: usize },

    #[error(
        "the memory usage({used}) of the task has exceeded the limit({limit}), \
         you can either reduce the batch size or increase the memory limit"
    )]
    MemoryLimit { used: u64, limit: u64 },

    #[error("job cancelled")]
    Cancelled,

    #[error("control socket {path}: {source}")]
    ControlSocket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::Config(_) => ErrorKind::Config,
            ArchiveError::Connect(_) => ErrorKind::Connect,
            ArchiveError::Engine(err) => match err {
                EngineError::TableNotFound(_) | EngineError::NoColumns(_) | EngineError::Key(_) => {
                    ErrorKind::Schema
                }
                EngineError::Query(_) | EngineError::PeerAborted(_) => ErrorKind::Query,
                EngineError::Consistency { .. } => ErrorKind::Consistency,
            },
            ArchiveError::Statement(_) => ErrorKind::Query,
            ArchiveError::NoProgress { .. } => ErrorKind::NoProgress,
            ArchiveError::MemoryLimit { .. } => ErrorKind::ResourceLimit,
            ArchiveError::Cancelled | ArchiveError::ControlSocket { .. } => ErrorKind::Interrupted,
        }
    }
}

/// A job that stopped with an error, with the counters it reached.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct JobFailure {
    #[source]
    pub error: ArchiveError,
    pub summary: Box<JobSummary>,
}

impl JobFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_kinds() {
        let schema: ArchiveError = EngineError::TableNotFound("t".into()).into();
        assert_eq!(schema.kind(), ErrorKind::Schema);

        let consistency: ArchiveError = EngineError::Consistency {
            inserted: 1,
            deleted: 2,
        }
        .into();
        assert_eq!(consistency.kind(), ErrorKind::Consistency);
        assert_eq!(consistency.kind().to_string(), "ConsistencyError");

        let config: ArchiveError = ConfigError::IdenticalTables.into();
        assert_eq!(config.kind(), ErrorKind::Config);
    }

    #[test]
    fn memory_message_names_both_numbers() {
        let err = ArchiveError::MemoryLimit {
            used: 2048,
            limit: 1024,
        };
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        assert!(err.to_string().starts_with("the memory usage(2048) of the task has exceeded the limit(1024)"));
    }
}
