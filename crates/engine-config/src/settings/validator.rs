use crate::{
    error::ConfigError,
    settings::{
        DEFAULT_LIMIT, DEFAULT_POOL_SIZE, DEFAULT_PROGRESS, MIN_PROGRESS, MIN_SLEEP,
        endpoint::{Endpoint, TableEndpoint},
        validated::JobConfig,
    },
};
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};

/// Job settings as given on the command line, before defaults are applied.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub source: Endpoint,
    pub source_table: String,
    pub filter: Option<String>,
    /// `0` means the default batch size.
    pub limit: usize,
    pub target: TargetSettings,
    /// `0` disables progress output.
    pub progress: Duration,
    /// `0` disables pacing.
    pub sleep: Duration,
    pub statistics: bool,
    /// `0` means unlimited.
    pub memory_limit: u64,
    /// `0` means no deadline.
    pub run_time: Duration,
    pub socket: Option<PathBuf>,
    pub control: bool,
}

/// Target fields left empty fall back to the source's.
#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub address: String,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub charset: Option<String>,
    pub table: Option<String>,
}

impl Default for JobSettings {
    fn default() -> Self {
        JobSettings {
            source: Endpoint {
                address: "127.0.0.1:3306".to_string(),
                username: "root".to_string(),
                password: String::new(),
                database: String::new(),
                charset: "utf8mb4".to_string(),
            },
            source_table: String::new(),
            filter: None,
            limit: DEFAULT_LIMIT,
            target: TargetSettings {
                address: "127.0.0.1:3306".to_string(),
                username: "root".to_string(),
                password: String::new(),
                database: None,
                charset: None,
                table: None,
            },
            progress: DEFAULT_PROGRESS,
            sleep: Duration::ZERO,
            statistics: false,
            memory_limit: 0,
            run_time: Duration::ZERO,
            socket: None,
            control: true,
        }
    }
}

impl JobSettings {
    /// Applies defaults and rejects unusable combinations. Nothing here
    /// touches a database.
    pub fn validate(self) -> Result<JobConfig, ConfigError> {
        require("source", "address", &self.source.address)?;
        require("source", "database", &self.source.database)?;
        require("source", "table", &self.source_table)?;
        require("source", "charset", &self.source.charset)?;
        require("target", "address", &self.target.address)?;

        let source = TableEndpoint {
            endpoint: self.source,
            table: self.source_table,
        };
        let target = TableEndpoint {
            endpoint: Endpoint {
                address: self.target.address,
                username: self.target.username,
                password: self.target.password,
                database: non_empty(self.target.database)
                    .unwrap_or_else(|| source.endpoint.database.clone()),
                charset: non_empty(self.target.charset)
                    .unwrap_or_else(|| source.endpoint.charset.clone()),
            },
            table: non_empty(self.target.table).unwrap_or_else(|| source.table.clone()),
        };
        if source.is_same_table(&target) {
            return Err(ConfigError::IdenticalTables);
        }

        if !self.progress.is_zero() && self.progress < MIN_PROGRESS {
            return Err(ConfigError::ProgressTooShort(
                humantime::format_duration(self.progress).to_string(),
            ));
        }
        if !self.sleep.is_zero() && self.sleep < MIN_SLEEP {
            return Err(ConfigError::SleepTooShort(
                humantime::format_duration(self.sleep).to_string(),
            ));
        }

        let limit = if self.limit == 0 {
            DEFAULT_LIMIT
        } else {
            self.limit
        };
        if limit > 100_000 {
            warn!(limit, "Batch limit is very large, each batch is held in memory");
        }

        let control_socket = match (self.control, self.socket) {
            (false, _) => None,
            (true, Some(path)) => Some(path),
            (true, None) => Some(JobConfig::default_socket_path(&source)),
        };

        let config = JobConfig {
            source,
            target,
            filter: non_empty(self.filter),
            limit,
            progress: (!self.progress.is_zero()).then_some(self.progress),
            sleep: (!self.sleep.is_zero()).then_some(self.sleep),
            statistics: self.statistics,
            memory_limit: (self.memory_limit > 0).then_some(self.memory_limit),
            run_time: (!self.run_time.is_zero()).then_some(self.run_time),
            control_socket,
            pool_size: DEFAULT_POOL_SIZE,
        };

        info!(
            source = %config.source,
            target = %config.target,
            filter = config.filter.as_deref().unwrap_or(""),
            limit = config.limit,
            "Job settings validated"
        );
        Ok(config)
    }
}

fn require(side: &'static str, field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyField { side, field });
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
