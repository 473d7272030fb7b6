//! Library surface of the migration binary, exposed for integration tests.
pub mod config;
pub mod logging;
pub mod run;
