//! Database access for dqv-validator

pub mod results;

pub use results::{count_results, find_result, insert_result, StoredResult};
