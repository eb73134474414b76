//! Arithmetic operators
//!
//! Implements: `_+_`, `_-_`, `_*_`, `_/_`, `_%_` and `-_`. Integer arithmetic
//! is checked and reports overflow as an error; double arithmetic follows IEEE
//! 754. `_+_` also concatenates strings, bytes and lists.

use crate::error::{CelError, CelResult};
use crate::registry::{Func, Overload};
use crate::value::Value;
use octofhir_cel_ast::{ADD, DIVIDE, MODULO, MULTIPLY, NEGATE, SUBTRACT};
use octofhir_cel_types::CelType;

pub(crate) fn functions() -> Vec<Func> {
    vec![
        Func::new(ADD)
            .with_overload(int_op("add_int64", ADD, i64::checked_add))
            .with_overload(uint_op("add_uint64", ADD, u64::checked_add))
            .with_overload(double_op("add_double", ADD, |a, b| a + b))
            .with_overload(Overload::binary(
                "add_string",
                CelType::String,
                CelType::String,
                CelType::String,
                add_string,
            ))
            .with_overload(Overload::binary(
                "add_bytes",
                CelType::Bytes,
                CelType::Bytes,
                CelType::Bytes,
                add_bytes,
            ))
            .with_overload(Overload::binary(
                "add_list",
                CelType::list(CelType::type_param("A")),
                CelType::list(CelType::type_param("A")),
                CelType::list(CelType::type_param("A")),
                add_list,
            )),
        Func::new(SUBTRACT)
            .with_overload(int_op("subtract_int64", SUBTRACT, i64::checked_sub))
            .with_overload(uint_op("subtract_uint64", SUBTRACT, u64::checked_sub))
            .with_overload(double_op("subtract_double", SUBTRACT, |a, b| a - b)),
        Func::new(MULTIPLY)
            .with_overload(int_op("multiply_int64", MULTIPLY, i64::checked_mul))
            .with_overload(uint_op("multiply_uint64", MULTIPLY, u64::checked_mul))
            .with_overload(double_op("multiply_double", MULTIPLY, |a, b| a * b)),
        Func::new(DIVIDE)
            .with_overload(Overload::binary(
                "divide_int64",
                CelType::Int,
                CelType::Int,
                CelType::Int,
                divide_int,
            ))
            .with_overload(Overload::binary(
                "divide_uint64",
                CelType::Uint,
                CelType::Uint,
                CelType::Uint,
                divide_uint,
            ))
            .with_overload(double_op("divide_double", DIVIDE, |a, b| a / b)),
        Func::new(MODULO)
            .with_overload(Overload::binary(
                "modulo_int64",
                CelType::Int,
                CelType::Int,
                CelType::Int,
                modulo_int,
            ))
            .with_overload(Overload::binary(
                "modulo_uint64",
                CelType::Uint,
                CelType::Uint,
                CelType::Uint,
                modulo_uint,
            )),
        Func::new(NEGATE)
            .with_overload(Overload::unary(
                "negate_int64",
                CelType::Int,
                CelType::Int,
                |value| match value {
                    Value::Int(i) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| CelError::overflow("int", NEGATE)),
                    other => Err(CelError::no_matching_overload(NEGATE, [other])),
                },
            ))
            .with_overload(Overload::unary(
                "negate_double",
                CelType::Double,
                CelType::Double,
                |value| match value {
                    Value::Double(d) => Ok(Value::Double(-d)),
                    other => Err(CelError::no_matching_overload(NEGATE, [other])),
                },
            )),
    ]
}

// ============================================================================
// Numeric Helpers
// ============================================================================

fn int_op(id: &str, function: &'static str, op: fn(i64, i64) -> Option<i64>) -> Overload {
    Overload::binary(id, CelType::Int, CelType::Int, CelType::Int, move |lhs, rhs| {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => op(*a, *b)
                .map(Value::Int)
                .ok_or_else(|| CelError::overflow("int", function)),
            _ => Err(CelError::no_matching_overload(function, [lhs, rhs])),
        }
    })
}

fn uint_op(id: &str, function: &'static str, op: fn(u64, u64) -> Option<u64>) -> Overload {
    Overload::binary(id, CelType::Uint, CelType::Uint, CelType::Uint, move |lhs, rhs| {
        match (lhs, rhs) {
            (Value::Uint(a), Value::Uint(b)) => op(*a, *b)
                .map(Value::Uint)
                .ok_or_else(|| CelError::overflow("uint", function)),
            _ => Err(CelError::no_matching_overload(function, [lhs, rhs])),
        }
    })
}

fn double_op(id: &str, function: &'static str, op: fn(f64, f64) -> f64) -> Overload {
    Overload::binary(
        id,
        CelType::Double,
        CelType::Double,
        CelType::Double,
        move |lhs, rhs| match (lhs, rhs) {
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(op(*a, *b))),
            _ => Err(CelError::no_matching_overload(function, [lhs, rhs])),
        },
    )
}

// ============================================================================
// Division and Modulus
// ============================================================================

fn divide_int(lhs: &Value, rhs: &Value) -> CelResult {
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(CelError::divide_by_zero("int")),
        // i64::MIN / -1 is the only overflowing quotient
        (Value::Int(a), Value::Int(b)) => a
            .checked_div(*b)
            .map(Value::Int)
            .ok_or_else(|| CelError::overflow("int", DIVIDE)),
        _ => Err(CelError::no_matching_overload(DIVIDE, [lhs, rhs])),
    }
}

fn divide_uint(lhs: &Value, rhs: &Value) -> CelResult {
    match (lhs, rhs) {
        (Value::Uint(_), Value::Uint(0)) => Err(CelError::divide_by_zero("uint")),
        (Value::Uint(a), Value::Uint(b)) => Ok(Value::Uint(a / b)),
        _ => Err(CelError::no_matching_overload(DIVIDE, [lhs, rhs])),
    }
}

fn modulo_int(lhs: &Value, rhs: &Value) -> CelResult {
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(CelError::modulus_by_zero("int")),
        (Value::Int(a), Value::Int(b)) => a
            .checked_rem(*b)
            .map(Value::Int)
            .ok_or_else(|| CelError::overflow("int", MODULO)),
        _ => Err(CelError::no_matching_overload(MODULO, [lhs, rhs])),
    }
}

fn modulo_uint(lhs: &Value, rhs: &Value) -> CelResult {
    match (lhs, rhs) {
        (Value::Uint(_), Value::Uint(0)) => Err(CelError::modulus_by_zero("uint")),
        (Value::Uint(a), Value::Uint(b)) => Ok(Value::Uint(a % b)),
        _ => Err(CelError::no_matching_overload(MODULO, [lhs, rhs])),
    }
}

// ============================================================================
// Concatenation
// ============================================================================

fn add_string(lhs: &Value, rhs: &Value) -> CelResult {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{a}{b}"))),
        _ => Err(CelError::no_matching_overload(ADD, [lhs, rhs])),
    }
}

fn add_bytes(lhs: &Value, rhs: &Value) -> CelResult {
    match (lhs, rhs) {
        (Value::Bytes(a), Value::Bytes(b)) => Ok(Value::from([&a[..], &b[..]].concat())),
        _ => Err(CelError::no_matching_overload(ADD, [lhs, rhs])),
    }
}

fn add_list(lhs: &Value, rhs: &Value) -> CelResult {
    match (lhs, rhs) {
        (Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(CelError::no_matching_overload(ADD, [lhs, rhs])),
    }
}
