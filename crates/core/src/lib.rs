//! Shared domain types for the genq task dispatch engine.
//!
//! Holds the pieces every other crate agrees on: identifier and timestamp
//! aliases, the common error enums, the model registry loaded at startup,
//! and batch-limit parsing for dispatch cycles.

pub mod error;
pub mod limits;
pub mod registry;
pub mod types;
