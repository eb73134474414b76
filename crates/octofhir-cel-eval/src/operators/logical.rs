//! Logical operators
//!
//! `_&&_` and `_||_` are commutative over errors: `false && error` is `false`
//! whichever side the error is on. Only when no operand decides the result
//! are the errors reported.

use crate::error::{CelError, CelResult};
use crate::registry::{Func, Overload};
use crate::value::Value;
use octofhir_cel_ast::{LOGICAL_AND, LOGICAL_NOT, LOGICAL_OR, NOT_STRICTLY_FALSE};
use octofhir_cel_types::CelType;

pub(crate) fn functions() -> Vec<Func> {
    vec![
        Func::new(LOGICAL_NOT).with_overload(Overload::unary(
            "logical_not",
            CelType::Bool,
            CelType::Bool,
            |value| match value {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(CelError::no_matching_overload(LOGICAL_NOT, [other])),
            },
        )),
        Func::new(LOGICAL_AND).with_overload(Overload::non_strict(
            "logical_and",
            vec![CelType::Bool, CelType::Bool],
            CelType::Bool,
            |args| short_circuit(LOGICAL_AND, args, false),
        )),
        Func::new(LOGICAL_OR).with_overload(Overload::non_strict(
            "logical_or",
            vec![CelType::Bool, CelType::Bool],
            CelType::Bool,
            |args| short_circuit(LOGICAL_OR, args, true),
        )),
        Func::new(NOT_STRICTLY_FALSE).with_overload(Overload::non_strict(
            "not_strictly_false",
            vec![CelType::Bool],
            CelType::Bool,
            |args| Ok(Value::Bool(!matches!(args, [Ok(Value::Bool(false))]))),
        )),
    ]
}

/// Evaluate `&&` (`decisive` = false) or `||` (`decisive` = true)
///
/// Any operand equal to `decisive` decides the result. Otherwise errors and
/// non-bool operands are merged in operand order.
fn short_circuit(function: &str, args: &[CelResult], decisive: bool) -> CelResult {
    let mut errors = Vec::new();
    for arg in args {
        match arg {
            Ok(Value::Bool(b)) if *b == decisive => return Ok(Value::Bool(decisive)),
            Ok(Value::Bool(_)) => {}
            Ok(other) => errors.push(CelError::no_matching_overload(function, [other])),
            Err(err) => errors.push(err.clone()),
        }
    }
    let mut errors = errors.into_iter();
    match errors.next() {
        Some(first) => Err(CelError::merge(first, errors)),
        None => Ok(Value::Bool(!decisive)),
    }
}
