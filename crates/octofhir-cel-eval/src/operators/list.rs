//! List and map functions
//!
//! Implements: `@in` and `size`. Indexing is planned as an attribute access
//! rather than dispatched here.

use crate::equals::equals;
use crate::error::{CelError, CelResult};
use crate::registry::{Func, Overload};
use crate::value::{MapKey, Value};
use octofhir_cel_ast::IN;
use octofhir_cel_types::CelType;

pub(crate) fn functions() -> Vec<Func> {
    let a = || CelType::type_param("A");
    let b = || CelType::type_param("B");
    let sized = [
        ("string", CelType::String),
        ("bytes", CelType::Bytes),
        ("list", CelType::list(a())),
        ("map", CelType::map(a(), b())),
    ];

    let mut size = Func::new("size");
    for (suffix, ty) in &sized {
        size = size.with_overload(Overload::unary(
            format!("size_{suffix}"),
            ty.clone(),
            CelType::Int,
            size_of,
        ));
    }
    for (prefix, ty) in &sized {
        size = size.with_overload(
            Overload::unary(format!("{prefix}_size"), ty.clone(), CelType::Int, size_of).member(),
        );
    }

    vec![
        Func::new(IN)
            .with_overload(Overload::binary(
                "in_list",
                a(),
                CelType::list(a()),
                CelType::Bool,
                in_list,
            ))
            .with_overload(Overload::binary(
                "in_map",
                a(),
                CelType::map(a(), b()),
                CelType::Bool,
                in_map,
            )),
        size,
    ]
}

fn in_list(elem: &Value, list: &Value) -> CelResult {
    match list {
        Value::List(items) => Ok(Value::Bool(items.iter().any(|item| equals(elem, item)))),
        _ => Err(CelError::no_matching_overload(IN, [elem, list])),
    }
}

/// Key membership; values that cannot be keys are simply absent
fn in_map(key: &Value, map: &Value) -> CelResult {
    match map {
        Value::Map(entries) => Ok(Value::Bool(
            MapKey::from_value(key).is_ok_and(|key| entries.contains_key(&key)),
        )),
        _ => Err(CelError::no_matching_overload(IN, [key, map])),
    }
}

/// Length in code points, bytes, elements or entries
fn size_of(value: &Value) -> CelResult {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => return Err(CelError::no_matching_overload("size", [other])),
    };
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| CelError::overflow("int", "size"))
}
