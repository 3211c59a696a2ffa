pub mod coordinator;
pub mod handshake;
