//! # DQV Common Library
//!
//! Shared code for the delivery quantity validation services:
//! - Error and result types
//! - Bootstrap configuration (TOML) and root folder resolution
//! - SQLite pool initialization and result table schema
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
