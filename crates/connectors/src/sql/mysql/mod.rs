pub mod adapter;
pub mod options;
pub mod params;
pub mod transaction;
