use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Any MySQL driver error (connectivity loss, malformed SQL, lock wait timeout, ...).
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// A value returned by the server could not be converted to the expected type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An error occurred while building a SQL statement.
    #[error("Query build error: {0}")]
    QueryBuildError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<mysql_async::FromValueError> for DbError {
    fn from(err: mysql_async::FromValueError) -> Self {
        DbError::Decode(format!("{:?}", err.0))
    }
}

/// Errors happening during adapter or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The driver could not open or ping the connection.
    #[error("MySQL connection to {address} failed: {source}")]
    MySql {
        address: String,
        #[source]
        source: mysql_async::Error,
    },

    /// The configured address or pool settings are unusable.
    #[error("Invalid connection options: {0}")]
    InvalidOptions(String),
}
