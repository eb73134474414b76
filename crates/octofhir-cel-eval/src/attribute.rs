//! Attributes: variable lookups followed by field and index accesses
//!
//! `a.b.c` is planned as one attribute rather than a chain of selects. When
//! the root is an identifier the attribute is ambiguous: it may name variable
//! `a` with accesses `.b.c`, or a variable literally called `a.b` with access
//! `.c`, and so on. [`MaybeAttribute`] keeps every reading and resolves the
//! most qualified one that is bound.

use crate::activation::Activation;
use crate::error::{CelError, CelResult};
use crate::interpretable::Interpretable;
use crate::message::{self, is_any, unpack_any};
use crate::value::{MapKey, Value};
use octofhir_cel_ast::{CONDITIONAL, ExprId};
use octofhir_cel_model::{IdentValue, TypeProvider};
use prost_reflect::DynamicMessage;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Attribute {
    Absolute(AbsoluteAttribute),
    Maybe(MaybeAttribute),
    Conditional(ConditionalAttribute),
    Relative(RelativeAttribute),
}

impl Attribute {
    pub fn id(&self) -> ExprId {
        match self {
            Self::Absolute(attr) => attr.id,
            Self::Maybe(attr) => attr.id,
            Self::Conditional(attr) => attr.id,
            Self::Relative(attr) => attr.id,
        }
    }

    pub fn add_access(&mut self, access: Access) {
        match self {
            Self::Absolute(attr) => attr.accesses.push(access),
            Self::Maybe(attr) => attr.add_access(access),
            Self::Conditional(attr) => {
                attr.truthy.add_access(access.clone());
                attr.falsy.add_access(access);
            }
            Self::Relative(attr) => attr.accesses.push(access),
        }
    }

    /// Resolve against `vars`; `Ok(None)` when no root name is bound
    pub fn resolve(&self, vars: &dyn Activation) -> CelResult<Option<Value>> {
        match self {
            Self::Absolute(attr) => attr.resolve(vars),
            Self::Maybe(attr) => attr.resolve(vars),
            Self::Conditional(attr) => attr.resolve(vars),
            Self::Relative(attr) => attr.resolve(vars).map(Some),
        }
    }
}

/// A qualified variable or type name with its accesses
///
/// `names` lists the container-qualified candidates, most specific first.
#[derive(Debug, Clone)]
pub struct AbsoluteAttribute {
    id: ExprId,
    names: Vec<String>,
    accesses: Vec<Access>,
    provider: Arc<dyn TypeProvider>,
}

impl AbsoluteAttribute {
    pub fn new(id: ExprId, names: Vec<String>, provider: Arc<dyn TypeProvider>) -> Self {
        Self {
            id,
            names,
            accesses: Vec::new(),
            provider,
        }
    }

    fn resolve(&self, vars: &dyn Activation) -> CelResult<Option<Value>> {
        for name in &self.names {
            if let Some(root) = vars.resolve(name) {
                return apply_accesses(vars, root?, &self.accesses).map(Some);
            }
            if self.accesses.is_empty() {
                if let Some(value) = self.find_ident(name) {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Type names and enum constants known to the provider
    fn find_ident(&self, name: &str) -> Option<Value> {
        if let Some(ty) = self.provider.find_struct_type(name) {
            return Some(Value::Type(ty));
        }
        match self.provider.find_ident(name)? {
            IdentValue::Type(ty) => Some(Value::Type(ty)),
            IdentValue::EnumValue(value) => Some(Value::Int(value)),
        }
    }
}

/// Every reading of an identifier-rooted select chain
#[derive(Debug, Clone)]
pub struct MaybeAttribute {
    id: ExprId,
    candidates: Vec<AbsoluteAttribute>,
    provider: Arc<dyn TypeProvider>,
}

impl MaybeAttribute {
    pub fn new(id: ExprId, names: Vec<String>, provider: Arc<dyn TypeProvider>) -> Self {
        Self {
            id,
            candidates: vec![AbsoluteAttribute::new(id, names, Arc::clone(&provider))],
            provider,
        }
    }

    /// Append `access` to every reading; a field access also adds the reading
    /// where the field is part of the variable name
    fn add_access(&mut self, access: Access) {
        let mut qualified = Vec::new();
        if let Some(field) = access.field_name() {
            for attr in self.candidates.iter().filter(|attr| attr.accesses.is_empty()) {
                qualified.extend(attr.names.iter().map(|name| format!("{name}.{field}")));
            }
        }
        for attr in &mut self.candidates {
            attr.accesses.push(access.clone());
        }
        if !qualified.is_empty() {
            let attr = AbsoluteAttribute::new(self.id, qualified, Arc::clone(&self.provider));
            self.candidates.insert(0, attr);
        }
    }

    fn resolve(&self, vars: &dyn Activation) -> CelResult<Option<Value>> {
        for attr in &self.candidates {
            if let Some(value) = attr.resolve(vars)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// `c ? a : b` where the branches are attributes
#[derive(Debug, Clone)]
pub struct ConditionalAttribute {
    id: ExprId,
    condition: Box<Interpretable>,
    truthy: Box<Attribute>,
    falsy: Box<Attribute>,
}

impl ConditionalAttribute {
    pub fn new(id: ExprId, condition: Interpretable, truthy: Attribute, falsy: Attribute) -> Self {
        Self {
            id,
            condition: Box::new(condition),
            truthy: Box::new(truthy),
            falsy: Box::new(falsy),
        }
    }

    fn resolve(&self, vars: &dyn Activation) -> CelResult<Option<Value>> {
        match self.condition.eval(vars)? {
            Value::Bool(true) => self.truthy.resolve(vars),
            Value::Bool(false) => self.falsy.resolve(vars),
            other => Err(CelError::no_matching_overload(CONDITIONAL, [&other]).with_expr_id(self.id)),
        }
    }
}

/// Accesses applied to the value of an arbitrary expression
#[derive(Debug, Clone)]
pub struct RelativeAttribute {
    id: ExprId,
    operand: Box<Interpretable>,
    accesses: Vec<Access>,
}

impl RelativeAttribute {
    pub fn new(operand: Interpretable) -> Self {
        Self {
            id: operand.id(),
            operand: Box::new(operand),
            accesses: Vec::new(),
        }
    }

    fn resolve(&self, vars: &dyn Activation) -> CelResult {
        let value = self.operand.eval(vars)?;
        apply_accesses(vars, value, &self.accesses)
    }
}

fn apply_accesses(vars: &dyn Activation, root: Value, accesses: &[Access]) -> CelResult {
    accesses
        .iter()
        .try_fold(root, |value, access| access.apply(vars, &value))
}

// ============================================================================
// Accesses
// ============================================================================

/// One field selection or index step
#[derive(Debug, Clone)]
pub struct Access {
    id: ExprId,
    key: AccessKey,
    optional: bool,
}

#[derive(Debug, Clone)]
pub enum AccessKey {
    /// Field name, list index or map key known when planning
    Const(Value),
    /// Key computed at evaluation time
    Eval(Arc<Interpretable>),
}

impl Access {
    pub fn field(id: ExprId, name: &str, optional: bool) -> Self {
        Self::constant(id, Value::from(name), optional)
    }

    pub fn constant(id: ExprId, key: Value, optional: bool) -> Self {
        Self {
            id,
            key: AccessKey::Const(key),
            optional,
        }
    }

    pub fn eval(id: ExprId, key: Interpretable, optional: bool) -> Self {
        Self {
            id,
            key: AccessKey::Eval(Arc::new(key)),
            optional,
        }
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Constant string key, which may also continue a qualified name
    pub fn field_name(&self) -> Option<&str> {
        match &self.key {
            AccessKey::Const(Value::String(name)) => Some(name),
            _ => None,
        }
    }

    fn key(&self, vars: &dyn Activation) -> CelResult {
        match &self.key {
            AccessKey::Const(key) => Ok(key.clone()),
            AccessKey::Eval(node) => node.eval(vars),
        }
    }

    /// Select this key from `obj`
    ///
    /// Optional accesses and accesses on optional values yield optionals.
    pub fn apply(&self, vars: &dyn Activation, obj: &Value) -> CelResult {
        let key = self.key(vars)?;
        let result = match obj {
            Value::Optional(None) => Ok(Value::Optional(None)),
            Value::Optional(Some(inner)) => select(inner, &key).map(|lookup| match lookup {
                Lookup::Found(value) => Value::Optional(Some(Box::new(value))),
                Lookup::Missing(_) => Value::Optional(None),
            }),
            _ => select(obj, &key).and_then(|lookup| match lookup {
                Lookup::Found(value) if self.optional => Ok(Value::Optional(Some(Box::new(value)))),
                Lookup::Found(value) => Ok(value),
                Lookup::Missing(_) if self.optional => Ok(Value::Optional(None)),
                Lookup::Missing(err) => Err(err),
            }),
        };
        result.map_err(|err| err.with_expr_id(self.id))
    }

    /// Presence test for `has(obj.field)`
    pub fn is_present(&self, vars: &dyn Activation, obj: &Value) -> CelResult<bool> {
        let key = self.key(vars)?;
        presence(obj, &key).map_err(|err| err.with_expr_id(self.id))
    }
}

enum Lookup {
    Found(Value),
    Missing(CelError),
}

fn select(obj: &Value, key: &Value) -> CelResult<Lookup> {
    match obj {
        Value::Map(map) => {
            let key = MapKey::from_value(key)?;
            Ok(match map.get(&key) {
                Some(value) => Lookup::Found(value.clone()),
                None => Lookup::Missing(CelError::no_such_key(&key)),
            })
        }
        Value::List(items) => {
            let index = list_index(key)?;
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .map_or_else(
                    || Lookup::Missing(CelError::index_out_of_bounds(index, items.len())),
                    |value| Lookup::Found(value.clone()),
                ))
        }
        Value::Message(msg) if is_any(msg) => select(&unpack_any(msg)?, key),
        Value::Message(msg) => select_field(msg, key),
        Value::NullMessage(desc) => select_field(&DynamicMessage::new(desc.clone()), key),
        Value::Type(ty) => {
            let name = field_key(key)?;
            Ok(match name {
                "name" => Lookup::Found(Value::from(ty.name())),
                _ => Lookup::Missing(CelError::field_not_found(name)),
            })
        }
        other => Err(unsupported_selection(other)),
    }
}

fn select_field(msg: &DynamicMessage, key: &Value) -> CelResult<Lookup> {
    let name = field_key(key)?;
    Ok(match message::get_field(msg, name) {
        Some(value) => Lookup::Found(value),
        None => Lookup::Missing(CelError::field_not_found(name)),
    })
}

fn presence(obj: &Value, key: &Value) -> CelResult<bool> {
    match obj {
        Value::Map(map) => Ok(map.contains_key(&MapKey::from_value(key)?)),
        Value::Message(msg) if is_any(msg) => presence(&unpack_any(msg)?, key),
        Value::Message(msg) => {
            let name = field_key(key)?;
            message::has_field(msg, name).ok_or_else(|| CelError::field_not_found(name))
        }
        Value::NullMessage(desc) => {
            let name = field_key(key)?;
            match desc.get_field_by_name(name) {
                Some(_) => Ok(false),
                None => Err(CelError::field_not_found(name)),
            }
        }
        Value::Optional(None) => Ok(false),
        Value::Optional(Some(inner)) => presence(inner, key),
        other => Err(unsupported_selection(other)),
    }
}

fn field_key(key: &Value) -> CelResult<&str> {
    key.as_str().ok_or_else(CelError::unsupported_key_type)
}

fn list_index(key: &Value) -> CelResult<i64> {
    match key {
        Value::Int(i) => Ok(*i),
        Value::Uint(u) => i64::try_from(*u).map_err(|_| CelError::index_out_of_bounds(u, 0)),
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Ok(*d as i64),
        other => Err(CelError::new(format!(
            "unsupported index type '{}' in list",
            other.type_of()
        ))),
    }
}

fn unsupported_selection(obj: &Value) -> CelError {
    CelError::new(format!(
        "type '{}' does not support field selection",
        obj.type_of()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::MapActivation;
    use crate::value::MapValue;
    use octofhir_cel_model::ProtoRegistry;
    use pretty_assertions::assert_eq;

    fn provider() -> Arc<dyn TypeProvider> {
        Arc::new(ProtoRegistry::new())
    }

    fn nested(key: &str, value: Value) -> Value {
        Value::from([(MapKey::from(key), value)].into_iter().collect::<MapValue>())
    }

    #[test]
    fn test_maybe_attribute_prefers_qualified_name() {
        let vars = MapActivation::new()
            .with("a.b", nested("c", Value::Int(1)))
            .with("a", nested("b", nested("c", Value::Int(2))));
        let mut attr = Attribute::Maybe(MaybeAttribute::new(1, vec!["a".into()], provider()));
        attr.add_access(Access::field(2, "b", false));
        attr.add_access(Access::field(3, "c", false));
        assert_eq!(attr.resolve(&vars), Ok(Some(Value::Int(1))));
    }

    #[test]
    fn test_maybe_attribute_falls_back_to_root_variable() {
        let vars = MapActivation::new().with("a", nested("b", Value::Int(2)));
        let mut attr = Attribute::Maybe(MaybeAttribute::new(1, vec!["a".into()], provider()));
        attr.add_access(Access::field(2, "b", false));
        assert_eq!(attr.resolve(&vars), Ok(Some(Value::Int(2))));
    }

    #[test]
    fn test_unbound_root_is_unresolved() {
        let attr = Attribute::Maybe(MaybeAttribute::new(1, vec!["x".into()], provider()));
        assert_eq!(attr.resolve(&MapActivation::new()), Ok(None));
    }

    #[test]
    fn test_missing_key_errors_carry_access_id() {
        let vars = MapActivation::new().with("m", nested("a", Value::Int(1)));
        let mut attr = Attribute::Maybe(MaybeAttribute::new(1, vec!["m".into()], provider()));
        attr.add_access(Access::field(5, "z", false));
        let err = attr.resolve(&vars).unwrap_err();
        assert_eq!(err.message(), "no such key: z");
        assert_eq!(err.expr_id(), Some(5));
    }

    #[test]
    fn test_optional_access_wraps_result() {
        let vars = MapActivation::new().with("m", nested("a", Value::Int(1)));
        let mut present = Attribute::Maybe(MaybeAttribute::new(1, vec!["m".into()], provider()));
        present.add_access(Access::field(2, "a", true));
        assert_eq!(
            present.resolve(&vars),
            Ok(Some(Value::Optional(Some(Box::new(Value::Int(1))))))
        );

        let mut absent = Attribute::Maybe(MaybeAttribute::new(1, vec!["m".into()], provider()));
        absent.add_access(Access::field(2, "z", true));
        absent.add_access(Access::field(3, "y", false));
        assert_eq!(absent.resolve(&vars), Ok(Some(Value::Optional(None))));
    }

    #[test]
    fn test_list_index_out_of_bounds() {
        let list = Value::from(vec![Value::Int(1)]);
        let access = Access::constant(4, Value::Int(3), false);
        let err = access.apply(&MapActivation::new(), &list).unwrap_err();
        assert_eq!(err.message(), "index 3 out of bounds [0, 1)");
    }

    #[test]
    fn test_type_identifier_resolves_without_binding() {
        let attr = Attribute::Maybe(MaybeAttribute::new(
            1,
            vec!["google.protobuf.Duration".into()],
            provider(),
        ));
        let value = attr.resolve(&MapActivation::new()).unwrap();
        assert!(matches!(value, Some(Value::Type(_))));
    }
}
