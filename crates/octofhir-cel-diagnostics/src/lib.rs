//! CEL diagnostics and error handling
//!
//! Compile-time failures (parse, check, plan, provider registration) are reported
//! through [`CompileError`]. Runtime failures are not errors in this sense: the
//! evaluator returns them as values, see `octofhir_cel_eval::CelError`.

mod error;
mod error_code;
mod location;

pub use error::*;
pub use error_code::*;
pub use location::*;

/// Result type for CEL compile-time operations
pub type Result<T> = std::result::Result<T, CompileError>;
