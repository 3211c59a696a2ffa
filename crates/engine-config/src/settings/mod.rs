pub mod endpoint;
pub mod validated;
pub mod validator;

pub use endpoint::{Endpoint, TableEndpoint};
pub use validated::JobConfig;
pub use validator::{JobSettings, TargetSettings};

use std::time::Duration;

pub const DEFAULT_LIMIT: usize = 500;
pub const DEFAULT_POOL_SIZE: usize = 2;
pub const DEFAULT_PROGRESS: Duration = Duration::from_secs(5);
pub const MIN_PROGRESS: Duration = Duration::from_secs(1);
pub const MIN_SLEEP: Duration = Duration::from_millis(1);
/// Upper bound on `?` placeholders in one MySQL prepared statement.
pub const MAX_PLACEHOLDERS: usize = 65_535;
