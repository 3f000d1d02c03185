//! Error handling
//!
//! Defines domain-specific error types for each module of the storage daemon.

pub mod types;

pub use types::*;
