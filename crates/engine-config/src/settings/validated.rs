use crate::{
    error::ConfigError,
    settings::{MAX_PLACEHOLDERS, endpoint::TableEndpoint},
};
use std::{path::PathBuf, time::Duration};

/// Immutable, validated configuration of one archive job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub source: TableEndpoint,
    pub target: TableEndpoint,
    /// Raw SQL predicate; `None` selects every row.
    pub filter: Option<String>,
    /// Rows fetched and moved per batch.
    pub limit: usize,
    /// `None` disables progress output.
    pub progress: Option<Duration>,
    /// Pause between batches.
    pub sleep: Option<Duration>,
    /// Print a summary when the job ends.
    pub statistics: bool,
    /// Ceiling, in bytes, on memory growth since the job started.
    pub memory_limit: Option<u64>,
    /// Wall-clock budget; checked between batches.
    pub run_time: Option<Duration>,
    /// Path of the pause/resume socket; `None` disables it.
    pub control_socket: Option<PathBuf>,
    /// Connections per endpoint.
    pub pool_size: usize,
}

impl JobConfig {
    /// Placeholders grow with `limit * columns`, which MySQL caps per statement.
    pub fn check_placeholders(&self, columns: usize) -> Result<(), ConfigError> {
        let placeholders = self.limit.saturating_mul(columns);
        if placeholders > MAX_PLACEHOLDERS {
            return Err(ConfigError::TooManyPlaceholders {
                limit: self.limit,
                columns,
                placeholders,
                max: MAX_PLACEHOLDERS,
            });
        }
        Ok(())
    }

    pub fn default_socket_path(source: &TableEndpoint) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}-{}.sock",
            source.endpoint.address, source.endpoint.database, source.table
        ))
    }
}
