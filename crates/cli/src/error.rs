use crate::shutdown::ExitCode;
use connectors::sql::base::error::{ConnectorError, DbError};
use engine_config::error::ConfigError;
use engine_runtime::error::{ErrorKind, JobFailure};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid job settings: {0}")]
    Config(#[from] ConfigError),

    #[error("{}: {}", .0.kind(), .0)]
    Job(#[from] JobFailure),

    #[error("{0}")]
    Connect(#[from] ConnectorError),

    #[error("MySQL ping failed: {0}")]
    Ping(#[from] DbError),

    #[error("Control socket {path}: {source}")]
    Control {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code. A job stopped by a signal exits like an
    /// interrupted shell command.
    pub fn exit_code(&self, shutdown_requested: bool) -> ExitCode {
        match self {
            CliError::Config(_) => ExitCode::InvalidSettings,
            CliError::Job(failure) => match failure.kind() {
                ErrorKind::Config => ExitCode::InvalidSettings,
                ErrorKind::Interrupted if shutdown_requested => ExitCode::ShutdownRequested,
                _ => ExitCode::GeneralError,
            },
            _ => ExitCode::GeneralError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_errors_exit_with_two() {
        let err = CliError::from(ConfigError::IdenticalTables);
        assert_eq!(err.exit_code(false).as_i32(), 2);
    }

    #[test]
    fn other_errors_exit_with_one() {
        let err = CliError::from(DbError::Unknown("gone".into()));
        assert_eq!(err.exit_code(true).as_i32(), 1);
        assert_eq!(err.to_string(), "MySQL ping failed: Unknown error: gone");
    }
}
