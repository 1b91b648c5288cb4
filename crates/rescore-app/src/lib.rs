// Library root: re-exports all modules so integration tests and the binary
// can access the crate's public API.

pub mod config;
pub mod db;
pub mod processor;
pub mod report;
pub mod source;
pub mod tables;
