//! Database schema shared by the nearby services

pub mod init;

pub use init::*;
