//! HQMF error codes following a structured numbering system
//!
//! Error code ranges:
//! - HQMF0001-HQMF0099: Structural errors (shape of the inbound node tree)
//! - HQMF0100-HQMF0199: Model errors (identity, references, derivation)
//! - HQMF0400-HQMF0499: System errors (serialization, I/O)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a structural error (0001-0099)
    pub const fn is_structural_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is a model error (0100-0199)
    pub const fn is_model_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a system error (0400-0499)
    pub const fn is_system_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HQMF{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Structural errors (0001-0099)
    map.insert(
        1,
        ErrorInfo::new("Unsupported value type")
            .with_help("Value discriminators are TS, IVL_PQ and CD; ranges are IVL_PQ or IVL_TS"),
    );
    map.insert(2, ErrorInfo::new("Malformed structural node"));

    // Model errors (0100-0199)
    map.insert(100, ErrorInfo::new("Duplicate data criteria id"));
    map.insert(101, ErrorInfo::new("Duplicate population criteria id"));
    map.insert(
        102,
        ErrorInfo::new("Unresolved reference")
            .with_help("Check that the referenced data criteria is defined in the same document"),
    );
    map.insert(103, ErrorInfo::new("Invalid derivation"));
    map.insert(104, ErrorInfo::new("Circular reference"));
    map.insert(110, ErrorInfo::new("Ambiguous coding"));
    map.insert(111, ErrorInfo::new("Attribute ignored on derived criteria"));

    // System errors (0400-0499)
    map.insert(400, ErrorInfo::new("Internal error"));
    map.insert(401, ErrorInfo::new("I/O error"));
    map.insert(406, ErrorInfo::new("Invalid format"));

    map
});

// Structural errors
pub const HQMF0001: ErrorCode = ErrorCode::new(1);
pub const HQMF0002: ErrorCode = ErrorCode::new(2);

// Model errors
pub const HQMF0100: ErrorCode = ErrorCode::new(100);
pub const HQMF0101: ErrorCode = ErrorCode::new(101);
pub const HQMF0102: ErrorCode = ErrorCode::new(102);
pub const HQMF0103: ErrorCode = ErrorCode::new(103);
pub const HQMF0104: ErrorCode = ErrorCode::new(104);
pub const HQMF0110: ErrorCode = ErrorCode::new(110);
pub const HQMF0111: ErrorCode = ErrorCode::new(111);

// System errors
pub const HQMF0400: ErrorCode = ErrorCode::new(400);
pub const HQMF0401: ErrorCode = ErrorCode::new(401);
pub const HQMF0406: ErrorCode = ErrorCode::new(406);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(HQMF0001.to_string(), "HQMF0001");
        assert_eq!(HQMF0100.to_string(), "HQMF0100");
    }

    #[test]
    fn test_error_categories() {
        assert!(HQMF0001.is_structural_error());
        assert!(!HQMF0001.is_model_error());

        assert!(HQMF0102.is_model_error());
        assert!(!HQMF0102.is_structural_error());

        assert!(HQMF0406.is_system_error());
    }

    #[test]
    fn test_error_info() {
        assert_eq!(HQMF0001.info().description, "Unsupported value type");
        assert!(HQMF0102.info().help.is_some());
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
    }
}
