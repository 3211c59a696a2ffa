pub mod generator;
pub mod statement;
