//! Database initialization and schema

pub mod init;

pub use init::{create_validation_results_table, init_database};
