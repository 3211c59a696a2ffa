use thiserror::Error;

/// Invalid job settings, detected before any rows are touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the {side} {field} was specified with an empty value")]
    EmptyField {
        side: &'static str,
        field: &'static str,
    },

    #[error("the source and target tables are identical")]
    IdenticalTables,

    #[error("the value of progress must be equal to 0 or at least 1s, got {0}")]
    ProgressTooShort(String),

    #[error("the value of sleep must be equal to 0 or at least 1ms, got {0}")]
    SleepTooShort(String),

    #[error(
        "a batch of {limit} rows with {columns} columns needs {placeholders} placeholders, \
         more than the {max} MySQL allows; lower the batch limit"
    )]
    TooManyPlaceholders {
        limit: usize,
        columns: usize,
        placeholders: usize,
        max: usize,
    },
}
