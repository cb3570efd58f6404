//! Core types shared across pipeline stages.

pub mod error;

pub use error::{ChatError, Result};
