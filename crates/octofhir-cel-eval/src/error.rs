//! Evaluation errors
//!
//! A [`CelError`] is an ordinary value of the evaluator: every node returns a
//! [`CelResult`], and non-strict operators may discard an error produced by an
//! operand they do not need.

use crate::value::{MapKey, Value};
use octofhir_cel_ast::ExprId;
use thiserror::Error;

/// Result of evaluating an expression or calling an overload
pub type CelResult<T = Value> = Result<T, CelError>;

/// A runtime error, optionally attributed to the expression that raised it
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct CelError {
    expr_id: Option<ExprId>,
    message: String,
    causes: Vec<CelError>,
}

impl CelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            expr_id: None,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Error raised by expression `id`
    pub fn at(message: impl Into<String>, id: ExprId) -> Self {
        Self::new(message).with_expr_id(id)
    }

    /// Attribute the error to `id` unless it already names an expression
    pub fn with_expr_id(mut self, id: ExprId) -> Self {
        self.expr_id.get_or_insert(id);
        self
    }

    pub fn with_cause(mut self, cause: CelError) -> Self {
        self.causes.push(cause);
        self
    }

    pub fn expr_id(&self) -> Option<ExprId> {
        self.expr_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn causes(&self) -> &[CelError] {
        &self.causes
    }

    /// Combine simultaneous errors, keeping `first` as the primary one
    ///
    /// The remaining errors are attached as causes in evaluation order.
    pub fn merge(first: CelError, rest: impl IntoIterator<Item = CelError>) -> CelError {
        rest.into_iter().fold(first, CelError::with_cause)
    }

    // === Common errors ===

    pub fn no_such_key(key: &MapKey) -> Self {
        Self::new(format!("no such key: {key}"))
    }

    pub fn field_not_found(name: &str) -> Self {
        Self::new(format!("field not found: {name}"))
    }

    pub fn index_out_of_bounds(index: impl std::fmt::Display, len: usize) -> Self {
        Self::new(format!("index {index} out of bounds [0, {len})"))
    }

    pub fn unsupported_key_type() -> Self {
        Self::new("unsupported key type")
    }

    pub fn unresolved_attribute() -> Self {
        Self::new("unresolved attribute")
    }

    pub fn map_key_conflict(key: impl std::fmt::Display) -> Self {
        Self::new(format!("map key conflict: {key}"))
    }

    pub fn divide_by_zero(type_name: &str) -> Self {
        Self::new(format!("{type_name} divide by zero"))
    }

    pub fn modulus_by_zero(type_name: &str) -> Self {
        Self::new(format!("{type_name} modulus by zero"))
    }

    /// Overflow in an arithmetic operator such as `_+_`
    pub fn overflow(type_name: &str, function: &str) -> Self {
        Self::new(format!("{type_name} overflow during {function}"))
    }

    /// Overflow in a type conversion such as `int(18446744073709551615u)`
    pub fn conversion_overflow(type_name: &str, function: &str) -> Self {
        Self::new(format!(
            "{type_name} return error for overflow during {function}"
        ))
    }

    pub fn cannot_compare(lhs: &Value, rhs: &Value) -> Self {
        Self::new(format!("cannot compare {lhs} and {rhs}"))
    }

    /// No overload of `function` accepts values of the given runtime types
    pub fn no_matching_overload<'a>(
        function: &str,
        args: impl IntoIterator<Item = &'a Value>,
    ) -> Self {
        let mut types = String::new();
        for (i, arg) in args.into_iter().enumerate() {
            if i > 0 {
                types.push_str(", ");
            }
            types.push_str(arg.type_of().name());
        }
        Self::new(format!(
            "found no matching overload for '{function}' applied to '({types})'"
        ))
    }
}

/// Unwrap argument results, merging every error found
///
/// The first error in argument order becomes the primary error.
pub fn unwrap_all(args: &[CelResult]) -> CelResult<Vec<Value>> {
    let mut values = Vec::with_capacity(args.len());
    let mut errors = Vec::new();
    for arg in args {
        match arg {
            Ok(value) => values.push(value.clone()),
            Err(err) => errors.push(err.clone()),
        }
    }
    let mut errors = errors.into_iter();
    match errors.next() {
        None => Ok(values),
        Some(first) => Err(CelError::merge(first, errors)),
    }
}
