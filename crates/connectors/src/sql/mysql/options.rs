use crate::sql::base::error::ConnectorError;
use mysql_async::{Opts, OptsBuilder, PoolConstraints, PoolOpts};

pub const DEFAULT_PORT: u16 = 3306;

/// Everything needed to open a small connection pool to one MySQL endpoint.
#[derive(Debug, Clone)]
pub struct MySqlConnectOptions {
    /// `host`, `host:port` or `[v6]:port`.
    pub address: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub pool_size: usize,
}

impl MySqlConnectOptions {
    pub fn to_opts(&self) -> Result<Opts, ConnectorError> {
        let (host, port) = split_address(&self.address)?;
        let constraints = PoolConstraints::new(1, self.pool_size.max(1)).ok_or_else(|| {
            ConnectorError::InvalidOptions(format!("invalid pool size {}", self.pool_size))
        })?;

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(self.username.clone()))
            .db_name(Some(self.database.clone()))
            .pool_opts(PoolOpts::default().with_constraints(constraints));
        if !self.password.is_empty() {
            builder = builder.pass(Some(self.password.clone()));
        }
        if !self.charset.is_empty() {
            builder = builder.init(vec![format!("SET NAMES {}", self.charset)]);
        }

        Ok(Opts::from(builder))
    }
}

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
pub fn split_address(address: &str) -> Result<(String, u16), ConnectorError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ConnectorError::InvalidOptions("empty address".to_string()));
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            ConnectorError::InvalidOptions(format!("unterminated IPv6 literal in '{address}'"))
        })?;
        (host, tail.strip_prefix(':'))
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => (host, Some(port)),
            Some(_) => (address, None), // bare IPv6
            None => (address, None),
        }
    };

    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| ConnectorError::InvalidOptions(format!("invalid port in '{address}'")))?,
        None => DEFAULT_PORT,
    };

    Ok((host.to_string(), port))
}
