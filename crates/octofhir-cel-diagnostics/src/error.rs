//! CEL compile-time error types

use crate::{ErrorCode, SourceLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A reportable compile problem with location and help text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Expression id the diagnostic is attributed to
    pub expr_id: Option<i64>,
    pub help: Option<String>,
}

impl Diagnostic {
    /// Diagnostic carrying the help text registered for `code`
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            expr_id: None,
            help: code.info().help.map(str::to_string),
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} - {}", self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Compile-time CEL error
///
/// Runtime failures never use this type; they flow through evaluation as values.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// Syntax error in expression text
    #[error("{code}: {message}")]
    Parse {
        code: ErrorCode,
        message: String,
        expression: String,
        location: Option<SourceLocation>,
    },

    /// Type checking failure
    #[error("{code}: {message}")]
    Check {
        code: ErrorCode,
        message: String,
        expr_id: Option<i64>,
        location: Option<SourceLocation>,
    },

    /// Malformed program detected while planning
    #[error("{code}: {message}")]
    Plan {
        code: ErrorCode,
        message: String,
        expr_id: Option<i64>,
    },

    /// Type or function registry failure
    #[error("{code}: {message}")]
    Model { code: ErrorCode, message: String },

    /// Multiple errors collected
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<CompileError>),
}

fn format_multiple(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl CompileError {
    pub fn parse(
        code: ErrorCode,
        message: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            expression: expression.into(),
            location: None,
        }
    }

    pub fn parse_at(
        code: ErrorCode,
        message: impl Into<String>,
        expression: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            expression: expression.into(),
            location: Some(location),
        }
    }

    pub fn check(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Check {
            code,
            message: message.into(),
            expr_id: None,
            location: None,
        }
    }

    pub fn plan(code: ErrorCode, message: impl Into<String>, expr_id: i64) -> Self {
        Self::Plan {
            code,
            message: message.into(),
            expr_id: Some(expr_id),
        }
    }

    pub fn model(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Model {
            code,
            message: message.into(),
        }
    }

    /// Collapse a list of errors, unwrapping the single-error case
    pub fn from_many(mut errors: Vec<CompileError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Multiple(errors)
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { code, .. }
            | Self::Check { code, .. }
            | Self::Plan { code, .. }
            | Self::Model { code, .. } => *code,
            Self::Multiple(errors) => errors
                .first()
                .map(|e| e.code())
                .unwrap_or(ErrorCode::new(0)),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Parse { message, .. }
            | Self::Check { message, .. }
            | Self::Plan { message, .. }
            | Self::Model { message, .. } => message.clone(),
            Self::Multiple(errors) => format_multiple(errors),
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Parse { location, .. } | Self::Check { location, .. } => location.as_ref(),
            Self::Multiple(errors) => errors.first().and_then(|e| e.location()),
            _ => None,
        }
    }

    /// Flatten into individual errors
    pub fn errors(&self) -> Vec<&CompileError> {
        match self {
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }

    /// One diagnostic per individual error, in reporting order
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors()
            .into_iter()
            .filter_map(CompileError::to_diagnostic)
            .collect()
    }

    fn to_diagnostic(&self) -> Option<Diagnostic> {
        let (location, expr_id) = match self {
            Self::Parse { location, .. } => (location.clone(), None),
            Self::Check {
                location, expr_id, ..
            } => (location.clone(), *expr_id),
            Self::Plan { expr_id, .. } => (None, *expr_id),
            Self::Model { .. } => (None, None),
            Self::Multiple(_) => return None,
        };
        let mut diag = Diagnostic::new(self.code(), self.message());
        diag.location = location;
        diag.expr_id = expr_id;
        Some(diag)
    }
}

/// Builder for creating CEL errors with fluent API
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    expr_id: Option<i64>,
    location: Option<SourceLocation>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            expr_id: None,
            location: None,
        }
    }

    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn expr(mut self, id: i64) -> Self {
        self.expr_id = Some(id);
        self
    }

    pub fn parse(self, expression: impl Into<String>) -> CompileError {
        CompileError::Parse {
            code: self.code,
            message: self.message,
            expression: expression.into(),
            location: self.location,
        }
    }

    pub fn check(self) -> CompileError {
        CompileError::Check {
            code: self.code,
            message: self.message,
            expr_id: self.expr_id,
            location: self.location,
        }
    }

    pub fn plan(self) -> CompileError {
        CompileError::Plan {
            code: self.code,
            message: self.message,
            expr_id: self.expr_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CEL0001, CEL0100, CEL0101, CEL0301};

    #[test]
    fn test_error_builder() {
        let err = ErrorBuilder::new(CEL0100, "undeclared reference to 'x' (in container '')")
            .at(Some(SourceLocation::new(1, 3, 2, 1)))
            .expr(4)
            .check();

        assert!(matches!(err, CompileError::Check { expr_id: Some(4), .. }));
        assert_eq!(err.code(), CEL0100);
        assert_eq!(err.location().map(|l| l.column), Some(3));
    }

    #[test]
    fn test_multiple_flattens() {
        let err = CompileError::from_many(vec![
            CompileError::check(CEL0100, "a"),
            CompileError::Multiple(vec![CompileError::check(CEL0101, "b")]),
        ]);
        assert_eq!(err.errors().len(), 2);
        assert_eq!(err.code(), CEL0100);
        assert_eq!(err.to_string(), "CEL0100: a\nCEL0101: b");
    }

    #[test]
    fn test_single_error_is_unwrapped() {
        let err = CompileError::from_many(vec![CompileError::parse(CEL0001, "bad", "1 +")]);
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new(CEL0001, "Unexpected token")
            .with_location(SourceLocation::new(1, 5, 4, 1));

        assert!(diag.to_string().contains("CEL0001"));
        assert!(diag.to_string().contains("1:5"));
    }

    #[test]
    fn test_diagnostics_follow_flattened_errors() {
        let err = CompileError::from_many(vec![
            ErrorBuilder::new(CEL0100, "undeclared reference to 'x' (in container '')")
                .at(Some(SourceLocation::new(2, 3, 7, 0)))
                .expr(4)
                .check(),
            CompileError::plan(CEL0301, "unknown type: a.B", 9),
        ]);
        let diags = err.diagnostics();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].code, CEL0100);
        assert_eq!(diags[0].expr_id, Some(4));
        assert_eq!(diags[0].location.as_ref().map(|l| l.line), Some(2));
        assert!(diags[0].help.is_some());
        assert_eq!(diags[1].expr_id, Some(9));
        assert_eq!(diags[1].location, None);
    }
}
