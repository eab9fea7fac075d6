pub mod config;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod transport;
