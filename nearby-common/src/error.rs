//! Error type shared by the store and configuration layers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite read or write failed
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file could not be read, parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller passed an empty or malformed identifier
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
