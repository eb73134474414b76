//! Type conversion functions
//!
//! Implements: `int`, `uint`, `double`, `bool`, `string`, `bytes`, `dyn` and
//! `type`. Narrowing conversions fail on values outside the target range
//! instead of wrapping.

use crate::error::{CelError, CelResult};
use crate::registry::{Func, Overload};
use crate::value::Value;
use octofhir_cel_types::CelType;

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

type Conversion = fn(&Value) -> CelResult;

pub(crate) fn functions() -> Vec<Func> {
    vec![
        conversion(
            "int",
            "int64",
            CelType::Int,
            &[
                ("int64", CelType::Int),
                ("uint64", CelType::Uint),
                ("double", CelType::Double),
                ("string", CelType::String),
            ],
            to_int,
        ),
        conversion(
            "uint",
            "uint64",
            CelType::Uint,
            &[
                ("uint64", CelType::Uint),
                ("int64", CelType::Int),
                ("double", CelType::Double),
                ("string", CelType::String),
            ],
            to_uint,
        ),
        conversion(
            "double",
            "double",
            CelType::Double,
            &[
                ("double", CelType::Double),
                ("int64", CelType::Int),
                ("uint64", CelType::Uint),
                ("string", CelType::String),
            ],
            to_double,
        ),
        conversion(
            "bool",
            "bool",
            CelType::Bool,
            &[("bool", CelType::Bool), ("string", CelType::String)],
            to_bool,
        ),
        conversion(
            "string",
            "string",
            CelType::String,
            &[
                ("string", CelType::String),
                ("bool", CelType::Bool),
                ("int64", CelType::Int),
                ("uint64", CelType::Uint),
                ("double", CelType::Double),
                ("bytes", CelType::Bytes),
            ],
            to_string,
        ),
        conversion(
            "bytes",
            "bytes",
            CelType::Bytes,
            &[("bytes", CelType::Bytes), ("string", CelType::String)],
            to_bytes,
        ),
        Func::new("dyn").with_overload(Overload::unary(
            "to_dyn",
            CelType::type_param("A"),
            CelType::Dyn,
            |value| Ok(value.clone()),
        )),
        Func::new("type").with_overload(Overload::unary(
            "type",
            CelType::type_param("A"),
            CelType::type_of(CelType::type_param("A")),
            |value| Ok(Value::Type(value.type_of())),
        )),
    ]
}

/// One overload `{source}_to_{target}` per source type, all sharing `convert`
fn conversion(
    name: &str,
    target_id: &str,
    target: CelType,
    sources: &[(&str, CelType)],
    convert: Conversion,
) -> Func {
    sources
        .iter()
        .fold(Func::new(name), |func, (source_id, source)| {
            func.with_overload(Overload::unary(
                format!("{source_id}_to_{target_id}"),
                source.clone(),
                target.clone(),
                convert,
            ))
        })
}

fn to_int(value: &Value) -> CelResult {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Uint(u) => i64::try_from(*u)
            .map(Value::Int)
            .map_err(|_| CelError::conversion_overflow("int", "int")),
        Value::Double(d) if d.is_finite() && *d > -TWO_POW_63 && *d < TWO_POW_63 => {
            Ok(Value::Int(d.trunc() as i64))
        }
        Value::Double(_) => Err(CelError::conversion_overflow("int", "int")),
        Value::String(s) => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| unparsable(s, "int")),
        other => Err(CelError::no_matching_overload("int", [other])),
    }
}

fn to_uint(value: &Value) -> CelResult {
    match value {
        Value::Uint(u) => Ok(Value::Uint(*u)),
        Value::Int(i) => u64::try_from(*i)
            .map(Value::Uint)
            .map_err(|_| CelError::conversion_overflow("uint", "uint")),
        Value::Double(d) if d.is_finite() && *d > -1.0 && *d < TWO_POW_64 => {
            Ok(Value::Uint(d.trunc() as u64))
        }
        Value::Double(_) => Err(CelError::conversion_overflow("uint", "uint")),
        Value::String(s) => s
            .parse::<u64>()
            .map(Value::Uint)
            .map_err(|_| unparsable(s, "uint")),
        other => Err(CelError::no_matching_overload("uint", [other])),
    }
}

fn to_double(value: &Value) -> CelResult {
    match value {
        Value::Double(d) => Ok(Value::Double(*d)),
        Value::Int(i) => Ok(Value::Double(*i as f64)),
        Value::Uint(u) => Ok(Value::Double(*u as f64)),
        Value::String(s) => s
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| unparsable(s, "double")),
        other => Err(CelError::no_matching_overload("double", [other])),
    }
}

fn to_bool(value: &Value) -> CelResult {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => match &**s {
            "1" | "t" | "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
            "0" | "f" | "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
            _ => Err(unparsable(s, "bool")),
        },
        other => Err(CelError::no_matching_overload("bool", [other])),
    }
}

fn to_string(value: &Value) -> CelResult {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::from(b.to_string())),
        Value::Int(i) => Ok(Value::from(i.to_string())),
        Value::Uint(u) => Ok(Value::from(u.to_string())),
        Value::Double(d) => Ok(Value::from(d.to_string())),
        Value::Bytes(b) => std::str::from_utf8(b)
            .map(Value::from)
            .map_err(|err| CelError::new(format!("Failed to decode bytes as string: {err}"))),
        other => Err(CelError::no_matching_overload("string", [other])),
    }
}

fn to_bytes(value: &Value) -> CelResult {
    match value {
        Value::Bytes(_) => Ok(value.clone()),
        Value::String(s) => Ok(Value::from(s.as_bytes())),
        other => Err(CelError::no_matching_overload("bytes", [other])),
    }
}

fn unparsable(text: &str, target: &str) -> CelError {
    CelError::new(format!("Unable to convert string '{text}' to {target}"))
}
