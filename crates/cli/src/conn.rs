use crate::error::CliError;
use connectors::sql::{
    base::adapter::SqlAdapter,
    mysql::{adapter::MySqlAdapter, options::MySqlConnectOptions},
};
use tracing::{error, info};

/// Connects to one MySQL endpoint and runs a round trip.
pub struct MySqlConnectionPinger {
    pub options: MySqlConnectOptions,
}

impl MySqlConnectionPinger {
    pub async fn ping(&self) -> Result<(), CliError> {
        let address = &self.options.address;
        info!("Pinging MySQL at '{address}'");

        let adapter = MySqlAdapter::connect(&self.options).await.map_err(|e| {
            error!("MySQL connection to '{address}' failed: {e}");
            CliError::Connect(e)
        })?;

        let result = adapter.ping().await;
        if let Err(e) = adapter.disconnect().await {
            error!("Closing the MySQL pool for '{address}' failed: {e}");
        }
        result.map_err(|e| {
            error!("MySQL ping to '{address}' failed: {e}");
            CliError::Ping(e)
        })?;

        info!("MySQL ping to '{address}' succeeded");
        Ok(())
    }
}
