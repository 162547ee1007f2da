//! HQMF error types

use crate::{
    ErrorCode, HQMF0001, HQMF0002, HQMF0100, HQMF0101, HQMF0102, HQMF0103, HQMF0104, HQMF0400,
    NodePath,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Error - the document cannot be used as is
    Error,
    /// Warning - legal but suspicious content
    Warning,
    /// Information - informational message
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A diagnostic message with location and context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Structural location
    pub path: Option<NodePath>,
    /// Id of the entity the diagnostic is about
    pub subject: Option<String>,
    /// Additional context or help
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            path: None,
            subject: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            path: None,
            subject: None,
            help: None,
        }
    }

    /// Set the node path
    pub fn with_path(mut self, path: NodePath) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the subject id
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Check if this diagnostic is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render the diagnostic for a terminal, colouring the severity
    #[cfg(feature = "colored")]
    pub fn render(&self) -> String {
        use colored::Colorize;

        let severity = match self.severity {
            Severity::Error => self.severity.to_string().red().bold(),
            Severity::Warning => self.severity.to_string().yellow().bold(),
            Severity::Info => self.severity.to_string().blue(),
        };
        let mut out = format!("{}[{}]: {}", severity, self.code, self.message);
        if let Some(path) = &self.path {
            out.push_str(&format!("\n  --> {}", path.to_string().dimmed()));
        }
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  = help: {}", help));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(subject) = &self.subject {
            write!(f, " [{}]", subject)?;
        }
        if let Some(path) = &self.path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

/// Main HQMF error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HqmfError {
    /// A value node carried a discriminator outside the closed set
    #[error("{}: unsupported value type '{value_type}' at {path}", HQMF0001)]
    UnsupportedValueType { value_type: String, path: NodePath },

    /// A required field was missing or had the wrong shape
    #[error("{}: {message} at {path}", HQMF0002)]
    MalformedStructural { message: String, path: NodePath },

    /// Two data criteria share an id
    #[error("{}: data criteria id '{id}' is defined more than once", HQMF0100)]
    DuplicateCriteriaId { id: String },

    /// Two population criteria share an id
    #[error("{}: population criteria id '{id}' is defined more than once", HQMF0101)]
    DuplicatePopulationId { id: String },

    /// A reference names an id absent from the document
    #[error("{}: '{referrer}' references unknown data criteria '{id}'", HQMF0102)]
    UnresolvedReference { id: String, referrer: String },

    /// A derivation operator without children, or children without an operator
    #[error("{}: data criteria '{id}': {message}", HQMF0103)]
    InvalidDerivation { id: String, message: String },

    /// The derivation graph loops back on itself
    #[error("{}: data criteria '{id}' is part of a derivation cycle", HQMF0104)]
    CircularReference { id: String },

    /// Multiple errors collected
    #[error("Multiple errors: {}", .0.len())]
    Multiple(Vec<HqmfError>),
}

impl HqmfError {
    /// Create an unsupported value type error
    pub fn unsupported_value_type(value_type: impl Into<String>, path: NodePath) -> Self {
        Self::UnsupportedValueType {
            value_type: value_type.into(),
            path,
        }
    }

    /// Create a malformed structural error
    pub fn malformed(message: impl Into<String>, path: NodePath) -> Self {
        Self::MalformedStructural {
            message: message.into(),
            path,
        }
    }

    /// Create a missing field error for a required member of the node at `path`
    pub fn missing_field(field: &str, path: &NodePath) -> Self {
        Self::malformed(format!("missing required field '{}'", field), path.key(field))
    }

    /// Create an unresolved reference error
    pub fn unresolved(id: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            id: id.into(),
            referrer: referrer.into(),
        }
    }

    /// Create an invalid derivation error
    pub fn invalid_derivation(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDerivation {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Collapse a batch of errors, returning `None` when empty
    pub fn collect(mut errors: Vec<HqmfError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedValueType { .. } => HQMF0001,
            Self::MalformedStructural { .. } => HQMF0002,
            Self::DuplicateCriteriaId { .. } => HQMF0100,
            Self::DuplicatePopulationId { .. } => HQMF0101,
            Self::UnresolvedReference { .. } => HQMF0102,
            Self::InvalidDerivation { .. } => HQMF0103,
            Self::CircularReference { .. } => HQMF0104,
            Self::Multiple(errors) => errors.first().map(|e| e.code()).unwrap_or(HQMF0400),
        }
    }

    /// Get the node path if available
    pub fn path(&self) -> Option<&NodePath> {
        match self {
            Self::UnsupportedValueType { path, .. } => Some(path),
            Self::MalformedStructural { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::UnsupportedValueType { value_type, path } => {
                Diagnostic::error(self.code(), format!("unsupported value type '{}'", value_type))
                    .with_path(path.clone())
                    .with_help(self.code().info().help.unwrap_or_default())
            }
            Self::MalformedStructural { message, path } => {
                Diagnostic::error(self.code(), message.clone()).with_path(path.clone())
            }
            Self::DuplicateCriteriaId { id } | Self::DuplicatePopulationId { id } => {
                Diagnostic::error(self.code(), self.code().info().description).with_subject(id.clone())
            }
            Self::UnresolvedReference { id, referrer } => {
                let mut diag =
                    Diagnostic::error(self.code(), format!("unknown data criteria '{}'", id))
                        .with_subject(referrer.clone());
                if let Some(help) = self.code().info().help {
                    diag = diag.with_help(help);
                }
                diag
            }
            Self::InvalidDerivation { id, message } => {
                Diagnostic::error(self.code(), message.clone()).with_subject(id.clone())
            }
            Self::CircularReference { id } => {
                Diagnostic::error(self.code(), self.code().info().description).with_subject(id.clone())
            }
            Self::Multiple(errors) => {
                if let Some(first) = errors.first() {
                    first.to_diagnostic()
                } else {
                    Diagnostic::error(HQMF0400, "Unknown error")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_value_type_display() {
        let err = HqmfError::unsupported_value_type(
            "XYZ",
            NodePath::root().key("data_criteria").index(0).key("value"),
        );
        let text = err.to_string();
        assert!(text.contains("HQMF0001"));
        assert!(text.contains("'XYZ'"));
        assert!(text.contains("$.data_criteria[0].value"));
    }

    #[test]
    fn test_missing_field_points_at_field() {
        let err = HqmfError::missing_field("id", &NodePath::root().key("data_criteria").index(2));
        assert_eq!(err.code(), HQMF0002);
        assert_eq!(
            err.path().map(ToString::to_string),
            Some("$.data_criteria[2].id".to_string())
        );
    }

    #[test]
    fn test_collect() {
        assert_eq!(HqmfError::collect(Vec::new()), None);

        let single = HqmfError::collect(vec![HqmfError::unresolved("a", "b")]);
        assert!(matches!(single, Some(HqmfError::UnresolvedReference { .. })));

        let many = HqmfError::collect(vec![
            HqmfError::unresolved("a", "b"),
            HqmfError::CircularReference { id: "c".into() },
        ]);
        match many {
            Some(HqmfError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected Multiple, got {:?}", other),
        }
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = HqmfError::unresolved("HasDiabetes", "anyDiabetes").to_diagnostic();
        let text = diag.to_string();

        assert!(diag.is_error());
        assert!(text.contains("HQMF0102"));
        assert!(text.contains("[anyDiabetes]"));
        assert!(diag.help.is_some());
    }
}
