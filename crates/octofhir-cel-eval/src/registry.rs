//! Function registries and runtime dispatch
//!
//! A [`Func`] groups the overloads of one function name. Overloads are tried
//! in declaration order and the first whose parameter types accept the
//! runtime arguments wins. An [`OrderedDispatcher`] layers several
//! [`FuncRegistry`]s, the earliest registry taking precedence.

use crate::error::{CelError, CelResult, unwrap_all};
use crate::value::Value;
use indexmap::IndexMap;
use octofhir_cel_diagnostics::{CEL0402, CompileError, Result};
use octofhir_cel_types::CelType;
use std::fmt;
use std::sync::Arc;

/// Type alias for unary overload implementations
pub type UnaryOpFn = Arc<dyn Fn(&Value) -> CelResult + Send + Sync>;

/// Type alias for binary overload implementations
pub type BinaryOpFn = Arc<dyn Fn(&Value, &Value) -> CelResult + Send + Sync>;

/// Type alias for n-ary overload implementations
pub type NaryOpFn = Arc<dyn Fn(&[Value]) -> CelResult + Send + Sync>;

/// Type alias for overloads that see their arguments' errors
pub type NonStrictOpFn = Arc<dyn Fn(&[CelResult]) -> CelResult + Send + Sync>;

#[derive(Clone)]
pub enum OverloadImpl {
    Unary(UnaryOpFn),
    Binary(BinaryOpFn),
    Nary(NaryOpFn),
    /// Receives argument results as evaluated, errors included
    NonStrict(NonStrictOpFn),
}

impl fmt::Debug for OverloadImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Unary(_) => "Unary",
            Self::Binary(_) => "Binary",
            Self::Nary(_) => "Nary",
            Self::NonStrict(_) => "NonStrict",
        };
        f.write_str(kind)
    }
}

/// One typed implementation of a function
#[derive(Debug, Clone)]
pub struct Overload {
    pub id: String,
    pub params: Vec<CelType>,
    pub result: CelType,
    /// Called as `target.f(args)` rather than `f(target, args)`
    pub is_member: bool,
    implementation: OverloadImpl,
}

impl Overload {
    pub fn new(
        id: impl Into<String>,
        params: Vec<CelType>,
        result: CelType,
        implementation: OverloadImpl,
    ) -> Self {
        Self {
            id: id.into(),
            params,
            result,
            is_member: false,
            implementation,
        }
    }

    pub fn unary(
        id: impl Into<String>,
        param: CelType,
        result: CelType,
        f: impl Fn(&Value) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self::new(id, vec![param], result, OverloadImpl::Unary(Arc::new(f)))
    }

    pub fn binary(
        id: impl Into<String>,
        lhs: CelType,
        rhs: CelType,
        result: CelType,
        f: impl Fn(&Value, &Value) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self::new(id, vec![lhs, rhs], result, OverloadImpl::Binary(Arc::new(f)))
    }

    pub fn nary(
        id: impl Into<String>,
        params: Vec<CelType>,
        result: CelType,
        f: impl Fn(&[Value]) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self::new(id, params, result, OverloadImpl::Nary(Arc::new(f)))
    }

    pub fn non_strict(
        id: impl Into<String>,
        params: Vec<CelType>,
        result: CelType,
        f: impl Fn(&[CelResult]) -> CelResult + Send + Sync + 'static,
    ) -> Self {
        Self::new(id, params, result, OverloadImpl::NonStrict(Arc::new(f)))
    }

    /// Mark as a receiver-style overload
    pub fn member(mut self) -> Self {
        self.is_member = true;
        self
    }

    pub fn is_strict(&self) -> bool {
        !matches!(self.implementation, OverloadImpl::NonStrict(_))
    }

    /// Check if this overload accepts the given runtime arguments
    pub fn matches(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| arg.matches_type(param))
    }

    fn invoke(&self, args: &[Value]) -> CelResult {
        match (&self.implementation, args) {
            (OverloadImpl::Unary(f), [arg]) => f(arg),
            (OverloadImpl::Binary(f), [lhs, rhs]) => f(lhs, rhs),
            (OverloadImpl::Nary(f), args) => f(args),
            (OverloadImpl::NonStrict(f), args) => {
                let results: Vec<CelResult> = args.iter().cloned().map(Ok).collect();
                f(&results)
            }
            _ => Err(CelError::new(format!(
                "overload '{}' called with {} arguments",
                self.id,
                args.len()
            ))),
        }
    }
}

/// A named function and its overloads
#[derive(Debug, Clone)]
pub struct Func {
    name: String,
    overloads: Vec<Overload>,
}

impl Func {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    pub fn with_overload(mut self, overload: Overload) -> Self {
        self.overloads.push(overload);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn overloads(&self) -> &[Overload] {
        &self.overloads
    }

    pub fn overload(&self, id: &str) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.id == id)
    }

    /// Call the first applicable overload
    ///
    /// Returns `None` when no overload accepts the arguments. Strict overloads
    /// never see errors: if any argument failed, the merged error is the result.
    pub fn dispatch(&self, args: &[CelResult], is_member: bool) -> Option<CelResult> {
        let mut values: Option<Vec<Value>> = None;
        let candidates = self
            .overloads
            .iter()
            .filter(|o| o.is_member == is_member && o.params.len() == args.len());
        for overload in candidates {
            if let OverloadImpl::NonStrict(f) = &overload.implementation {
                return Some(f(args));
            }
            if values.is_none() {
                match unwrap_all(args) {
                    Ok(unwrapped) => values = Some(unwrapped),
                    Err(err) => return Some(Err(err)),
                }
            }
            let Some(values) = values.as_deref() else {
                continue;
            };
            if overload.matches(values) {
                return Some(overload.invoke(values));
            }
        }
        None
    }
}

/// Functions keyed by name, in registration order
#[derive(Debug, Clone, Default)]
pub struct FuncRegistry {
    funcs: IndexMap<String, Arc<Func>>,
}

impl FuncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function; names are unique within one registry
    pub fn add(&mut self, func: Func) -> Result<()> {
        if self.funcs.contains_key(func.name()) {
            return Err(CompileError::model(
                CEL0402,
                format!("function '{}' is already registered", func.name()),
            ));
        }
        self.funcs.insert(func.name.clone(), Arc::new(func));
        Ok(())
    }

    /// Register a function, merging overloads into an existing entry of the same name
    pub fn merge(&mut self, func: Func) {
        match self.funcs.get_mut(func.name()) {
            Some(existing) => Arc::make_mut(existing).overloads.extend(func.overloads),
            None => {
                self.funcs.insert(func.name.clone(), Arc::new(func));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Func>> {
        self.funcs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

/// Registries consulted in order; an earlier registry shadows later ones
#[derive(Debug, Clone, Default)]
pub struct OrderedDispatcher {
    registries: Vec<Arc<FuncRegistry>>,
}

impl OrderedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher over the standard function table
    pub fn standard() -> Self {
        Self::new().with(crate::operators::standard_functions())
    }

    /// Append a registry with lower precedence than those already added
    pub fn add(&mut self, registry: impl Into<Arc<FuncRegistry>>) {
        self.registries.push(registry.into());
    }

    pub fn with(mut self, registry: impl Into<Arc<FuncRegistry>>) -> Self {
        self.add(registry);
        self
    }

    /// Every function named `name`, highest precedence first
    pub fn narrowed(&self, name: &str) -> Vec<Arc<Func>> {
        self.registries
            .iter()
            .filter_map(|registry| registry.get(name).cloned())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registries.iter().any(|registry| registry.get(name).is_some())
    }

    pub fn registries(&self) -> &[Arc<FuncRegistry>] {
        &self.registries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shout() -> Func {
        Func::new("shout").with_overload(Overload::unary(
            "shout_string",
            CelType::String,
            CelType::String,
            |v| Ok(Value::from(format!("{}!", v.as_str().unwrap_or_default()))),
        ))
    }

    #[test]
    fn test_first_matching_overload_wins() {
        let func = Func::new("f")
            .with_overload(Overload::unary("f_int", CelType::Int, CelType::Int, |_| {
                Ok(Value::Int(1))
            }))
            .with_overload(Overload::unary("f_dyn", CelType::Dyn, CelType::Int, |_| {
                Ok(Value::Int(2))
            }));
        assert_eq!(func.dispatch(&[Ok(Value::Int(0))], false), Some(Ok(Value::Int(1))));
        assert_eq!(func.dispatch(&[Ok(Value::from("x"))], false), Some(Ok(Value::Int(2))));
        assert_eq!(func.dispatch(&[Ok(Value::Int(0))], true), None);
    }

    #[test]
    fn test_strict_overload_propagates_argument_error() {
        let err = CelError::new("bad arg");
        let result = shout().dispatch(&[Err(err.clone())], false);
        assert_eq!(result, Some(Err(err)));
    }

    #[test]
    fn test_duplicate_function_is_rejected() {
        let mut registry = FuncRegistry::new();
        registry.add(shout()).unwrap();
        let err = registry.add(shout()).unwrap_err();
        assert_eq!(err.code(), CEL0402);
    }

    #[test]
    fn test_earlier_registry_takes_precedence() {
        let mut first = FuncRegistry::new();
        first
            .add(Func::new("shout").with_overload(Overload::unary(
                "shout_override",
                CelType::String,
                CelType::String,
                |_| Ok(Value::from("quiet")),
            )))
            .unwrap();
        let mut second = FuncRegistry::new();
        second.add(shout()).unwrap();

        let dispatcher = OrderedDispatcher::new().with(first).with(second);
        let funcs = dispatcher.narrowed("shout");
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].overloads()[0].id, "shout_override");
    }
}
