use crate::settings::endpoint::TableEndpoint;
use chrono::{DateTime, Local};
use engine_core::metrics::CountersSnapshot;
use serde::Serialize;
use std::{fmt, time::Duration};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub address: String,
    pub database: String,
    pub table: String,
    pub charset: String,
}

impl From<&TableEndpoint> for TableSummary {
    fn from(t: &TableEndpoint) -> Self {
        TableSummary {
            address: t.endpoint.address.clone(),
            database: t.endpoint.database.clone(),
            table: t.table.clone(),
            charset: t.endpoint.charset.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CountSummary {
    pub selected: u64,
    pub inserted: u64,
    pub deleted: u64,
}

/// Statistics printed when a job ends.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// Whole seconds.
    pub duration_secs: u64,
    pub source: TableSummary,
    pub target: TableSummary,
    pub counts: CountSummary,
    pub batches: u64,
    /// Why the job stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSummary {
    pub fn new(
        source: &TableEndpoint,
        target: &TableEndpoint,
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
        counters: CountersSnapshot,
    ) -> Self {
        let duration_secs = (end_time - start_time).num_seconds().max(0) as u64;
        JobSummary {
            start_time,
            end_time,
            duration_secs,
            source: source.into(),
            target: target.into(),
            counts: CountSummary {
                selected: counters.selected,
                inserted: counters.inserted,
                deleted: counters.deleted,
            },
            batches: counters.batches,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TIME")?;
        writeln!(f, "  start:    {}", self.start_time.format(TIME_FORMAT))?;
        writeln!(f, "  end:      {}", self.end_time.format(TIME_FORMAT))?;
        writeln!(
            f,
            "  duration: {}",
            humantime::format_duration(Duration::from_secs(self.duration_secs))
        )?;
        for (title, side) in [("SOURCE", &self.source), ("TARGET", &self.target)] {
            writeln!(f, "{title}")?;
            writeln!(f, "  address:  {}", side.address)?;
            writeln!(f, "  database: {}", side.database)?;
            writeln!(f, "  table:    {}", side.table)?;
            writeln!(f, "  charset:  {}", side.charset)?;
        }
        writeln!(f, "ACTION")?;
        writeln!(f, "  select:   {}", self.counts.selected)?;
        writeln!(f, "  insert:   {}", self.counts.inserted)?;
        write!(f, "  delete:   {}", self.counts.deleted)?;
        if let Some(error) = &self.error {
            write!(f, "\nERROR\n  {error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::JobSettings;
    use chrono::TimeZone;

    fn summary() -> JobSummary {
        let mut settings = JobSettings::default();
        settings.source.database = "shop".into();
        settings.source_table = "orders".into();
        settings.target.database = Some("archive".into());
        let config = settings.validate().unwrap();

        let start = Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2024, 3, 1, 10, 2, 5).unwrap();
        JobSummary::new(
            &config.source,
            &config.target,
            start,
            end,
            CountersSnapshot {
                selected: 10,
                inserted: 10,
                deleted: 9,
                batches: 3,
            },
        )
    }

    #[test]
    fn renders_text_template() {
        let text = summary().to_string();

        assert!(text.starts_with("TIME\n  start:    2024-03-01 10:00:00\n"));
        assert!(text.contains("  duration: 2m 5s\n"));
        assert!(text.contains("TARGET\n  address:  127.0.0.1:3306\n  database: archive\n"));
        assert!(text.ends_with("  select:   10\n  insert:   10\n  delete:   9"));
    }

    #[test]
    fn json_omits_password_and_absent_error() {
        let json: serde_json::Value = serde_json::from_str(&summary().to_json().unwrap()).unwrap();

        assert_eq!(json["counts"]["deleted"], 9);
        assert_eq!(json["duration_secs"], 125);
        assert_eq!(json["source"]["table"], "orders");
        assert!(json.get("error").is_none());
        assert!(json["source"].get("password").is_none());
    }

    #[test]
    fn failed_jobs_carry_the_error() {
        let text = summary().with_error("boom").to_string();
        assert!(text.ends_with("ERROR\n  boom"));
    }
}
