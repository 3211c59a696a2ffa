pub mod cursor;
pub mod error;
pub mod key;
pub mod metrics;
pub mod mover;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;
