//! # Nearby Common Library
//!
//! Shared code for the nearby discovery services including:
//! - Error and result types
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Clock abstraction for time-gated logic
//! - Geographic math and the shared city lookup table
//! - SQLite schema initialization

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod geo;
pub mod time;

pub use error::{Error, Result};
pub use geo::{CityBounds, CityTable, Coordinates};
