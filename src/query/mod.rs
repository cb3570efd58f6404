//! Checking and running generated SQL.

pub mod executor;
pub mod guard;

pub use executor::QueryExecutor;
pub use guard::{QueryGuard, ALLOWED_FUNCTIONS};
