//! Diagnostics collected while building a schema
//!
//! Problems that should not abort a run (a malformed introspection row, a
//! DDL statement that was skipped) are collected as diagnostics instead of
//! being dropped silently.
//!
//! Codes are stable identifiers. Add new codes, never rename existing ones.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Introspection
    /// An introspection row had fewer fields than required and was skipped
    IntrospectionRowSkipped,

    /// A constraint tag was not recognized and was kept as Unknown
    ConstraintTagUnrecognized,

    // DDL parsing
    /// A statement was not a CREATE TABLE / ALTER TABLE and was ignored
    DdlStatementIgnored,

    /// A table-level constraint named a column the table does not have
    DdlUnresolvedColumn,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntrospectionRowSkipped => "INTROSPECTION_ROW_SKIPPED",
            Self::ConstraintTagUnrecognized => "CONSTRAINT_TAG_UNRECOGNIZED",
            Self::DdlStatementIgnored => "DDL_STATEMENT_IGNORED",
            Self::DdlUnresolvedColumn => "DDL_UNRESOLVED_COLUMN",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - the produced schema may be incomplete
    Warn,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Zero-based index of the offending row or statement, if any
    pub index: Option<usize>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            index: None,
        }
    }

    /// Create a warning
    pub fn warn(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, message)
    }

    /// Create an informational diagnostic
    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, message)
    }

    /// Set the row/statement index
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warn
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "[{}] {} (#{}): {}", self.severity, self.code, index, self.message),
            None => write!(f, "[{}] {}: {}", self.severity, self.code, self.message),
        }
    }
}
