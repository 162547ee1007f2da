//! HQMF diagnostics and error handling
//!
//! This crate provides the error handling infrastructure for the HQMF document model,
//! including error codes, structural node paths, and diagnostic reporting.

mod error;
mod error_code;
mod path;

pub use error::*;
pub use error_code::*;
pub use path::*;

/// Result type for HQMF operations
pub type Result<T> = std::result::Result<T, HqmfError>;
