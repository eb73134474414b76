//! Comparison operators
//!
//! Implements: `_==_`, `_!=_`, `_<_`, `_<=_`, `_>_` and `_>=_`, including the
//! cross-type numeric orderings such as `1 < 1.5` and `2u > -1`.

use crate::equals::{compare, equals};
use crate::error::{CelError, CelResult};
use crate::registry::{Func, Overload};
use crate::value::Value;
use octofhir_cel_ast::{EQUALS, GREATER, GREATER_EQUALS, LESS, LESS_EQUALS, NOT_EQUALS};
use octofhir_cel_types::CelType;
use std::cmp::Ordering;

pub(crate) fn functions() -> Vec<Func> {
    let a = || CelType::type_param("A");
    let mut funcs = vec![
        Func::new(EQUALS).with_overload(Overload::binary(
            "equals",
            a(),
            a(),
            CelType::Bool,
            |lhs, rhs| Ok(Value::Bool(equals(lhs, rhs))),
        )),
        Func::new(NOT_EQUALS).with_overload(Overload::binary(
            "not_equals",
            a(),
            a(),
            CelType::Bool,
            |lhs, rhs| Ok(Value::Bool(!equals(lhs, rhs))),
        )),
    ];

    let ordered = [
        ("bool", CelType::Bool),
        ("int64", CelType::Int),
        ("uint64", CelType::Uint),
        ("double", CelType::Double),
        ("string", CelType::String),
        ("bytes", CelType::Bytes),
    ];
    let numeric = &ordered[1..4];
    let operators: [(&'static str, &str, fn(Ordering) -> bool); 4] = [
        (LESS, "less", Ordering::is_lt),
        (LESS_EQUALS, "less_equals", Ordering::is_le),
        (GREATER, "greater", Ordering::is_gt),
        (GREATER_EQUALS, "greater_equals", Ordering::is_ge),
    ];

    for (name, prefix, accept) in operators {
        let mut func = Func::new(name);
        for (suffix, ty) in &ordered {
            func = func.with_overload(ordering(
                format!("{prefix}_{suffix}"),
                ty.clone(),
                ty.clone(),
                accept,
            ));
        }
        for (lhs_name, lhs) in numeric {
            for (rhs_name, rhs) in numeric {
                if lhs_name != rhs_name {
                    func = func.with_overload(ordering(
                        format!("{prefix}_{lhs_name}_{rhs_name}"),
                        lhs.clone(),
                        rhs.clone(),
                        accept,
                    ));
                }
            }
        }
        funcs.push(func);
    }
    funcs
}

fn ordering(id: String, lhs: CelType, rhs: CelType, accept: fn(Ordering) -> bool) -> Overload {
    Overload::binary(id, lhs, rhs, CelType::Bool, move |lhs, rhs| {
        ordered(lhs, rhs, accept)
    })
}

/// Apply an ordering predicate; comparisons with NaN are false
fn ordered(lhs: &Value, rhs: &Value, accept: fn(Ordering) -> bool) -> CelResult {
    match compare(lhs, rhs) {
        Some(ordering) => Ok(Value::Bool(accept(ordering))),
        None if lhs.is_nan() || rhs.is_nan() => Ok(Value::Bool(false)),
        None => Err(CelError::cannot_compare(lhs, rhs)),
    }
}
