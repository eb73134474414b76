//! Type substitution and unification
//!
//! Generic overloads such as `list(T).map` are checked by binding their type
//! parameters in a [`Mapping`]. [`is_assignable`] works on a copy of the
//! mapping and only hands it back when the whole comparison succeeds, so a
//! failed overload attempt never leaks bindings.

use crate::type_system::{CelType, TypeKind, is_assignable_type, is_exact_type};
use indexmap::IndexMap;

/// Substitutions for type parameters, keyed by the parameter's rendering
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    substitutions: IndexMap<String, CelType>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, from: &CelType, to: CelType) {
        self.substitutions.insert(from.to_string(), to);
    }

    pub fn find(&self, from: &CelType) -> Option<&CelType> {
        self.substitutions.get(&from.to_string())
    }

    pub fn len(&self) -> usize {
        self.substitutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }
}

/// Returns the updated mapping if `t1` is assignable to `t2`
pub fn is_assignable(m: &Mapping, t1: &CelType, t2: &CelType) -> Option<Mapping> {
    let mut copy = m.clone();
    internal_is_assignable(&mut copy, t1, t2).then_some(copy)
}

/// Returns the updated mapping if every `l1[i]` is assignable to `l2[i]`
pub fn is_assignable_list(m: &Mapping, l1: &[CelType], l2: &[CelType]) -> Option<Mapping> {
    let mut copy = m.clone();
    internal_is_assignable_list(&mut copy, l1, l2).then_some(copy)
}

/// The more general of two types already known to unify
pub fn most_general(t1: &CelType, t2: &CelType) -> CelType {
    if is_equal_or_less_specific(t1, t2) {
        t1.clone()
    } else {
        t2.clone()
    }
}

/// Replace bound type parameters; unbound ones become `dyn` when `type_param_to_dyn`
pub fn substitute(m: &Mapping, t: &CelType, type_param_to_dyn: bool) -> CelType {
    if let Some(sub) = m.find(t) {
        return substitute(m, sub, type_param_to_dyn);
    }
    match t {
        CelType::TypeParam(_) if type_param_to_dyn => CelType::Dyn,
        CelType::Opaque { name, params } => CelType::Opaque {
            name: name.clone(),
            params: params
                .iter()
                .map(|p| substitute(m, p, type_param_to_dyn))
                .collect(),
        },
        CelType::List(elem) => CelType::list(substitute(m, elem, type_param_to_dyn)),
        CelType::Map(key, value) => CelType::map(
            substitute(m, key, type_param_to_dyn),
            substitute(m, value, type_param_to_dyn),
        ),
        CelType::Type(Some(ty)) => CelType::type_of(substitute(m, ty, type_param_to_dyn)),
        other => other.clone(),
    }
}

/// Signature of an overload as an opaque `function(result, args...)` type
pub fn function_type(result: CelType, args: impl IntoIterator<Item = CelType>) -> CelType {
    let params = std::iter::once(result).chain(args).collect();
    CelType::opaque("function", params)
}

fn is_equal_or_less_specific(t1: &CelType, t2: &CelType) -> bool {
    if t1.is_dyn() || t1.kind() == TypeKind::Type {
        return true;
    }
    if t2.is_dyn() || t2.kind() == TypeKind::Type {
        return false;
    }
    match (t1, t2) {
        (
            CelType::Opaque {
                name: n1,
                params: p1,
            },
            CelType::Opaque {
                name: n2,
                params: p2,
            },
        ) => {
            n1 == n2
                && p1.len() == p2.len()
                && p1
                    .iter()
                    .zip(p2)
                    .all(|(a, b)| is_equal_or_less_specific(a, b))
        }
        (CelType::List(a), CelType::List(b)) => is_equal_or_less_specific(a, b),
        (CelType::Map(k1, v1), CelType::Map(k2, v2)) => {
            is_equal_or_less_specific(k1, k2) && is_equal_or_less_specific(v1, v2)
        }
        _ => t1.kind() == t2.kind() && is_exact_type(t1, t2),
    }
}

fn internal_is_assignable(m: &mut Mapping, t1: &CelType, t2: &CelType) -> bool {
    if t2.kind() == TypeKind::TypeParam {
        let (valid, t2_has_sub) = is_valid_type_substitution(m, t1, t2);
        if valid {
            return true;
        }
        // t2 is already bound to something t1 cannot satisfy
        if t2_has_sub {
            return false;
        }
    }
    if t1.kind() == TypeKind::TypeParam {
        return is_valid_type_substitution(m, t2, t1).0;
    }
    if t1.is_dyn_or_error() || t2.is_dyn_or_error() {
        return true;
    }
    if t1.is_null() {
        return is_assignable_null(t2);
    }
    if t2.is_null() {
        return is_assignable_null(t1);
    }
    match t1 {
        CelType::Int
        | CelType::Uint
        | CelType::Double
        | CelType::Bool
        | CelType::String
        | CelType::Bytes
        | CelType::Object(_) => is_assignable_type(t2, t1),
        CelType::Type(_) => t2.kind() == TypeKind::Type,
        CelType::Opaque {
            name: n1,
            params: p1,
        } => match t2 {
            CelType::Opaque {
                name: n2,
                params: p2,
            } => n1 == n2 && internal_is_assignable_list(m, p1, p2),
            _ => false,
        },
        CelType::List(e1) => match t2 {
            CelType::List(e2) => internal_is_assignable(m, e1, e2),
            _ => false,
        },
        CelType::Map(k1, v1) => match t2 {
            CelType::Map(k2, v2) => {
                internal_is_assignable(m, k1, k2) && internal_is_assignable(m, v1, v2)
            }
            _ => false,
        },
        _ => false,
    }
}

fn internal_is_assignable_list(m: &mut Mapping, l1: &[CelType], l2: &[CelType]) -> bool {
    l1.len() == l2.len()
        && l1
            .iter()
            .zip(l2)
            .all(|(a, b)| internal_is_assignable(m, a, b))
}

/// Objects and opaque types keep the legacy nullability; wrappers accept null too
fn is_assignable_null(t: &CelType) -> bool {
    matches!(t.kind(), TypeKind::Object | TypeKind::Opaque)
        || is_assignable_type(&CelType::Null, t)
}

/// Whether `t2` (or its current substitution) can stand for `t1`
///
/// Returns `(valid, t2_has_substitution)`.
fn is_valid_type_substitution(m: &mut Mapping, t1: &CelType, t2: &CelType) -> (bool, bool) {
    if t1.kind() == t2.kind() && is_exact_type(t1, t2) {
        return (true, true);
    }
    if let Some(t2_sub) = m.find(t2).cloned() {
        if t1.kind() == t2_sub.kind() && is_exact_type(t1, &t2_sub) {
            return (true, true);
        }
        if internal_is_assignable(m, t1, &t2_sub) {
            let t2_new = most_general(t1, &t2_sub);
            if not_referenced_in(m, t2, &t2_new) {
                m.add(t2, t2_new);
            }
            return (true, true);
        }
        return (false, true);
    }
    if not_referenced_in(m, t2, t1) {
        m.add(t2, t1.clone());
        return (true, false);
    }
    (false, false)
}

/// Occurs check: `t` does not appear in `within`, following substitutions
fn not_referenced_in(m: &Mapping, t: &CelType, within: &CelType) -> bool {
    if is_exact_type(t, within) {
        return false;
    }
    match within {
        CelType::TypeParam(_) => match m.find(within) {
            Some(sub) => not_referenced_in(m, t, sub),
            None => true,
        },
        CelType::Opaque { params, .. } => params.iter().all(|p| not_referenced_in(m, t, p)),
        CelType::List(elem) => not_referenced_in(m, t, elem),
        CelType::Map(key, value) => not_referenced_in(m, t, key) && not_referenced_in(m, t, value),
        CelType::Type(Some(ty)) => not_referenced_in(m, t, ty),
        _ => true,
    }
}
