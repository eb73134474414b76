//! CEL error codes following a structured numbering system
//!
//! Error code ranges:
//! - CEL0001-CEL0099: Parse errors (syntax, macros)
//! - CEL0100-CEL0199: Check errors (declarations, overloads, types)
//! - CEL0200-CEL0299: Evaluation errors (runtime, reported as values)
//! - CEL0300-CEL0399: Plan errors (malformed programs)
//! - CEL0400-CEL0499: Model errors (type registry, function registry)

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

    pub const fn is_parse_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    pub const fn is_check_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    pub const fn is_evaluation_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    pub const fn is_plan_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    pub const fn is_model_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CEL{:04}", self.0)
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

    // Parse errors (0001-0099)
    map.insert(1, ErrorInfo::new("Unexpected token"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Invalid literal"));
    map.insert(4, ErrorInfo::new("Invalid escape sequence"));
    map.insert(5, ErrorInfo::new("Unterminated string literal"));
    map.insert(6, ErrorInfo::new("Integer literal out of range"));
    map.insert(
        7,
        ErrorInfo::new("Invalid macro call")
            .with_help("Comprehension macros take an identifier followed by one or two expressions"),
    );
    map.insert(8, ErrorInfo::new("Expression nesting exceeds the recursion limit"));
    map.insert(9, ErrorInfo::new("Reserved identifier"));

    // Check errors (0100-0199)
    map.insert(
        100,
        ErrorInfo::new("Undeclared reference")
            .with_help("Declare the identifier in the environment or check the container"),
    );
    map.insert(101, ErrorInfo::new("No matching overload"));
    map.insert(102, ErrorInfo::new("Type mismatch"));
    map.insert(103, ErrorInfo::new("Undefined field"));
    map.insert(104, ErrorInfo::new("Unknown type"));
    map.insert(105, ErrorInfo::new("Overlapping identifier declaration"));
    map.insert(106, ErrorInfo::new("Overlapping function declaration"));
    map.insert(107, ErrorInfo::new("Incompatible type already recorded for expression"));
    map.insert(108, ErrorInfo::new("Type does not support field selection"));

    // Evaluation errors (0200-0299)
    map.insert(200, ErrorInfo::new("Evaluation error"));

    // Plan errors (0300-0399)
    map.insert(300, ErrorInfo::new("Malformed expression"));
    map.insert(
        301,
        ErrorInfo::new("Unknown message type")
            .with_help("Register the message descriptor with the type registry"),
    );
    map.insert(302, ErrorInfo::new("Unknown field in message literal"));

    // Model errors (0400-0499)
    map.insert(400, ErrorInfo::new("Type registration conflict"));
    map.insert(401, ErrorInfo::new("Invalid descriptor"));
    map.insert(402, ErrorInfo::new("Function already registered"));

    map
});

// Parse errors
pub const CEL0001: ErrorCode = ErrorCode::new(1);
pub const CEL0002: ErrorCode = ErrorCode::new(2);
pub const CEL0003: ErrorCode = ErrorCode::new(3);
pub const CEL0004: ErrorCode = ErrorCode::new(4);
pub const CEL0005: ErrorCode = ErrorCode::new(5);
pub const CEL0006: ErrorCode = ErrorCode::new(6);
pub const CEL0007: ErrorCode = ErrorCode::new(7);
pub const CEL0008: ErrorCode = ErrorCode::new(8);
pub const CEL0009: ErrorCode = ErrorCode::new(9);

// Check errors
pub const CEL0100: ErrorCode = ErrorCode::new(100);
pub const CEL0101: ErrorCode = ErrorCode::new(101);
pub const CEL0102: ErrorCode = ErrorCode::new(102);
pub const CEL0103: ErrorCode = ErrorCode::new(103);
pub const CEL0104: ErrorCode = ErrorCode::new(104);
pub const CEL0105: ErrorCode = ErrorCode::new(105);
pub const CEL0106: ErrorCode = ErrorCode::new(106);
pub const CEL0107: ErrorCode = ErrorCode::new(107);
pub const CEL0108: ErrorCode = ErrorCode::new(108);

// Evaluation errors
pub const CEL0200: ErrorCode = ErrorCode::new(200);

// Plan errors
pub const CEL0300: ErrorCode = ErrorCode::new(300);
pub const CEL0301: ErrorCode = ErrorCode::new(301);
pub const CEL0302: ErrorCode = ErrorCode::new(302);

// Model errors
pub const CEL0400: ErrorCode = ErrorCode::new(400);
pub const CEL0401: ErrorCode = ErrorCode::new(401);
pub const CEL0402: ErrorCode = ErrorCode::new(402);
