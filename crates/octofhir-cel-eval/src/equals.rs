//! CEL equality and ordering
//!
//! Numbers compare by mathematical value across `int`, `uint` and `double`,
//! so `1 == 1u` and `1u == 1.0` hold. NaN is unequal to everything, itself
//! included.

use crate::message::{is_any, unpack_any};
use crate::value::Value;
use prost_reflect::ReflectMessage;
use std::cmp::Ordering;

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// CEL `==`
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::NullMessage(a), Value::NullMessage(b)) => a.full_name() == b.full_name(),
        (Value::Null | Value::NullMessage(_), Value::Null | Value::NullMessage(_)) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bytes(a), Value::Bytes(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| equals(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| equals(x, y)))
        }
        (Value::Type(a), Value::Type(b)) => a.name() == b.name(),
        (Value::Optional(a), Value::Optional(b)) => match (a, b) {
            (None, None) => true,
            (Some(x), Some(y)) => equals(x, y),
            _ => false,
        },
        (Value::Message(a), _) if is_any(a) => {
            unpack_any(a).is_ok_and(|unpacked| equals(&unpacked, rhs))
        }
        (_, Value::Message(b)) if is_any(b) => {
            unpack_any(b).is_ok_and(|unpacked| equals(lhs, &unpacked))
        }
        (Value::Message(a), Value::Message(b)) => {
            a.descriptor().full_name() == b.descriptor().full_name() && a == b
        }
        _ => compare_numbers(lhs, rhs) == Some(Ordering::Equal),
    }
}

/// Ordering for `<`, `<=`, `>` and `>=`
///
/// `None` for unordered pairs, which includes any comparison with NaN.
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        _ => compare_numbers(lhs, rhs),
    }
}

fn compare_numbers(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Uint(b)) => Some(int_uint(*a, *b)),
        (Value::Uint(a), Value::Int(b)) => Some(int_uint(*b, *a).reverse()),
        (Value::Int(a), Value::Double(b)) => int_double(*a, *b),
        (Value::Double(a), Value::Int(b)) => int_double(*b, *a).map(Ordering::reverse),
        (Value::Uint(a), Value::Double(b)) => uint_double(*a, *b),
        (Value::Double(a), Value::Uint(b)) => uint_double(*b, *a).map(Ordering::reverse),
        _ => None,
    }
}

fn int_uint(i: i64, u: u64) -> Ordering {
    u64::try_from(i).map_or(Ordering::Less, |i| i.cmp(&u))
}

fn int_double(i: i64, d: f64) -> Option<Ordering> {
    if d.is_nan() {
        return None;
    }
    if d < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    if d >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    let whole = d.trunc();
    Some(i.cmp(&(whole as i64)).then_with(|| fraction_order(d - whole)))
}

fn uint_double(u: u64, d: f64) -> Option<Ordering> {
    if d.is_nan() {
        return None;
    }
    if d < 0.0 {
        return Some(Ordering::Greater);
    }
    if d >= TWO_POW_64 {
        return Some(Ordering::Less);
    }
    let whole = d.trunc();
    Some(u.cmp(&(whole as u64)).then_with(|| fraction_order(d - whole)))
}

/// How an integer equal to the whole part compares with the full double
fn fraction_order(fraction: f64) -> Ordering {
    if fraction > 0.0 {
        Ordering::Less
    } else if fraction < 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}
