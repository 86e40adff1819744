// diag.rs — Unified diagnostics model
//
// Provides the diagnostic type shared by graph loading and resolution.
// Loading reports every validation problem as an error diagnostic; the
// resolution run records warnings (e.g. range truncation) in its result.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0101`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    pub const UNKNOWN_COLLECTION: DiagCode = DiagCode("E0001");
    pub const ARITY_MISMATCH: DiagCode = DiagCode("E0002");
    pub const DUPLICATE_NAME: DiagCode = DiagCode("E0003");
    pub const MISPLACED_REFERENCE: DiagCode = DiagCode("E0004");
    pub const SYNTAX: DiagCode = DiagCode("E0005");
    pub const UNKNOWN_LOCAL: DiagCode = DiagCode("E0006");
    pub const UNKNOWN_CONTEXT: DiagCode = DiagCode("E0007");

    pub const RANGE_TRUNCATED: DiagCode = DiagCode("W0101");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    /// Where in the graph the problem is, e.g. ``step `gen`, output 1``.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, location, or hint.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            location: None,
            message: message.into(),
            hint: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: ", level, code)?;
        } else {
            write!(f, "{}: ", level)?;
        }
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
