#[cfg(unix)]
pub mod control;
pub mod error;
pub mod execution;
pub mod watchdog;
