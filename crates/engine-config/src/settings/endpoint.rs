use connectors::sql::mysql::options::MySqlConnectOptions;
use serde::Serialize;
use std::fmt;

/// One MySQL server and schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub address: String,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub database: String,
    pub charset: String,
}

impl Endpoint {
    pub fn connect_options(&self, pool_size: usize) -> MySqlConnectOptions {
        MySqlConnectOptions {
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            charset: self.charset.clone(),
            pool_size,
        }
    }
}

/// A table on an endpoint: the source or the target of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEndpoint {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub table: String,
}

impl TableEndpoint {
    /// Same server, schema and table name.
    pub fn is_same_table(&self, other: &TableEndpoint) -> bool {
        self.endpoint.address == other.endpoint.address
            && self.endpoint.database == other.endpoint.database
            && self.table == other.table
    }
}

impl fmt::Display for TableEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}@{}",
            self.endpoint.database, self.table, self.endpoint.address
        )
    }
}
