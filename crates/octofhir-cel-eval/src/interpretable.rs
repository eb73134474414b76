//! Executable plan nodes
//!
//! The planner lowers an expression tree into an [`Interpretable`] tree once;
//! evaluation then walks it against any number of activations. Nodes are
//! immutable and can be shared between threads.

use crate::activation::{Activation, FoldActivation, VarActivation};
use crate::attribute::{Access, Attribute};
use crate::error::{CelError, CelResult, unwrap_all};
use crate::message::build_message;
use crate::registry::Func;
use crate::value::{MapKey, MapValue, Value};
use octofhir_cel_ast::ExprId;
use prost_reflect::MessageDescriptor;
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Interpretable {
    Const(EvalConst),
    Attr(Attribute),
    Has(EvalHas),
    Call(EvalCall),
    List(EvalList),
    Map(EvalMap),
    Obj(EvalObj),
    Fold(Box<EvalFold>),
}

impl Interpretable {
    pub fn id(&self) -> ExprId {
        match self {
            Self::Const(node) => node.id,
            Self::Attr(attr) => attr.id(),
            Self::Has(node) => node.id,
            Self::Call(node) => node.id,
            Self::List(node) => node.id,
            Self::Map(node) => node.id,
            Self::Obj(node) => node.id,
            Self::Fold(node) => node.id,
        }
    }

    /// Evaluate against `vars`
    pub fn eval(&self, vars: &dyn Activation) -> CelResult {
        match self {
            Self::Const(node) => Ok(node.value.clone()),
            Self::Attr(attr) => attr
                .resolve(vars)
                .map_err(|err| err.with_expr_id(attr.id()))?
                .ok_or_else(|| CelError::unresolved_attribute().with_expr_id(attr.id())),
            Self::Has(node) => node.eval(vars),
            Self::Call(node) => node.eval(vars),
            Self::List(node) => node.eval(vars),
            Self::Map(node) => node.eval(vars),
            Self::Obj(node) => node.eval(vars),
            Self::Fold(node) => node.eval(vars),
        }
    }
}

/// A literal
#[derive(Debug, Clone)]
pub struct EvalConst {
    pub id: ExprId,
    pub value: Value,
}

/// `has(operand.field)`
#[derive(Debug, Clone)]
pub struct EvalHas {
    id: ExprId,
    operand: Attribute,
    access: Access,
}

impl EvalHas {
    pub fn new(id: ExprId, operand: Attribute, access: Access) -> Self {
        Self {
            id,
            operand,
            access,
        }
    }

    fn eval(&self, vars: &dyn Activation) -> CelResult {
        let operand = self
            .operand
            .resolve(vars)
            .map_err(|err| err.with_expr_id(self.id))?
            .ok_or_else(|| CelError::unresolved_attribute().with_expr_id(self.operand.id()))?;
        self.access.is_present(vars, &operand).map(Value::Bool)
    }
}

/// A function call, dispatched at runtime over the narrowed candidates
#[derive(Debug, Clone)]
pub struct EvalCall {
    id: ExprId,
    function: String,
    funcs: Vec<Arc<Func>>,
    target: Option<Box<Interpretable>>,
    args: Vec<Interpretable>,
}

impl EvalCall {
    pub fn new(
        id: ExprId,
        function: impl Into<String>,
        funcs: Vec<Arc<Func>>,
        target: Option<Interpretable>,
        args: Vec<Interpretable>,
    ) -> Self {
        Self {
            id,
            function: function.into(),
            funcs,
            target: target.map(Box::new),
            args,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    fn eval(&self, vars: &dyn Activation) -> CelResult {
        let mut results: SmallVec<[CelResult; 4]> = SmallVec::new();
        if let Some(target) = &self.target {
            results.push(target.eval(vars));
        }
        results.extend(self.args.iter().map(|arg| arg.eval(vars)));

        let is_member = self.target.is_some();
        for func in &self.funcs {
            if let Some(result) = func.dispatch(&results, is_member) {
                return result.map_err(|err| err.with_expr_id(self.id));
            }
        }

        let values = unwrap_all(&results)?;
        log::trace!(
            "no overload of '{}' accepts {} argument(s)",
            self.function,
            values.len()
        );
        Err(CelError::no_matching_overload(&self.function, &values).with_expr_id(self.id))
    }
}

/// A list literal; optional elements are dropped when empty
#[derive(Debug, Clone)]
pub struct EvalList {
    id: ExprId,
    elements: Vec<Interpretable>,
    optional: Vec<bool>,
}

impl EvalList {
    pub fn new(id: ExprId, elements: Vec<Interpretable>, optional: Vec<bool>) -> Self {
        Self {
            id,
            elements,
            optional,
        }
    }

    fn eval(&self, vars: &dyn Activation) -> CelResult {
        let mut items = Vec::with_capacity(self.elements.len());
        for (element, optional) in self.elements.iter().zip(&self.optional) {
            let value = element.eval(vars)?;
            if *optional {
                match unwrap_optional(value) {
                    Some(value) => items.push(value),
                    None => continue,
                }
            } else {
                items.push(value);
            }
        }
        Ok(Value::from(items))
    }
}

/// A map literal
#[derive(Debug, Clone)]
pub struct EvalMap {
    id: ExprId,
    keys: Vec<Interpretable>,
    values: Vec<Interpretable>,
    optional: Vec<bool>,
}

impl EvalMap {
    pub fn new(
        id: ExprId,
        keys: Vec<Interpretable>,
        values: Vec<Interpretable>,
        optional: Vec<bool>,
    ) -> Self {
        Self {
            id,
            keys,
            values,
            optional,
        }
    }

    fn eval(&self, vars: &dyn Activation) -> CelResult {
        let mut map = MapValue::new();
        let entries = self.keys.iter().zip(&self.values).zip(&self.optional);
        for ((key, value), optional) in entries {
            let key_value = key.eval(vars)?;
            let map_key =
                MapKey::from_value(&key_value).map_err(|err| err.with_expr_id(key.id()))?;
            let mut value_result = value.eval(vars)?;
            if *optional {
                match unwrap_optional(value_result) {
                    Some(inner) => value_result = inner,
                    None => continue,
                }
            }
            if map.contains_key(&map_key) {
                return Err(CelError::map_key_conflict(&map_key).with_expr_id(key.id()));
            }
            map.insert(map_key, value_result);
        }
        Ok(Value::from(map))
    }
}

/// A message literal
#[derive(Debug, Clone)]
pub struct EvalObj {
    id: ExprId,
    desc: MessageDescriptor,
    fields: Vec<String>,
    values: Vec<Interpretable>,
    optional: Vec<bool>,
}

impl EvalObj {
    pub fn new(
        id: ExprId,
        desc: MessageDescriptor,
        fields: Vec<String>,
        values: Vec<Interpretable>,
        optional: Vec<bool>,
    ) -> Self {
        Self {
            id,
            desc,
            fields,
            values,
            optional,
        }
    }

    fn eval(&self, vars: &dyn Activation) -> CelResult {
        let mut initializers: Vec<(String, Value)> = Vec::with_capacity(self.fields.len());
        let entries = self.fields.iter().zip(&self.values).zip(&self.optional);
        for ((field, value), optional) in entries {
            let mut value_result = value.eval(vars)?;
            if *optional {
                match unwrap_optional(value_result) {
                    Some(inner) => value_result = inner,
                    None => continue,
                }
            }
            if initializers.iter().any(|(name, _)| name == field) {
                return Err(CelError::map_key_conflict(field).with_expr_id(value.id()));
            }
            initializers.push((field.clone(), value_result));
        }
        build_message(&self.desc, initializers).map_err(|err| err.with_expr_id(self.id))
    }
}

/// The value inside an optional entry; plain values are taken as present
fn unwrap_optional(value: Value) -> Option<Value> {
    match value {
        Value::Optional(inner) => inner.map(|boxed| *boxed),
        other => Some(other),
    }
}

/// A comprehension
///
/// Iterates the range in order, binding the iteration variable(s) and the
/// accumulator, until the range is exhausted or the loop condition is not
/// `true`.
#[derive(Debug, Clone)]
pub struct EvalFold {
    pub id: ExprId,
    pub iter_var: String,
    pub iter_var2: Option<String>,
    pub accu_var: String,
    pub iter_range: Interpretable,
    pub accu_init: Interpretable,
    pub loop_condition: Interpretable,
    pub loop_step: Interpretable,
    pub result: Interpretable,
}

impl EvalFold {
    fn eval(&self, vars: &dyn Activation) -> CelResult {
        let range = self.iter_range.eval(vars)?;
        let mut accu = self.accu_init.eval(vars);
        if accu.is_err() {
            return accu;
        }

        match &range {
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    let (first, second) = match &self.iter_var2 {
                        Some(_) => (Value::Int(index as i64), Some(item.clone())),
                        None => (item.clone(), None),
                    };
                    if !self.step(vars, &mut accu, first, second)? {
                        break;
                    }
                }
            }
            Value::Map(map) => {
                for (key, value) in map.iter() {
                    let second = self.iter_var2.as_ref().map(|_| value.clone());
                    if !self.step(vars, &mut accu, key.to_value(), second)? {
                        break;
                    }
                }
            }
            other => {
                return Err(CelError::at(
                    format!(
                        "expression of type '{}' cannot be the range of a comprehension",
                        other.type_of()
                    ),
                    self.iter_range.id(),
                ));
            }
        }

        let scope = VarActivation::new(&self.accu_var, accu, vars);
        self.result.eval(&scope)
    }

    /// Run one iteration; `Ok(false)` once the loop should stop
    ///
    /// A loop condition that fails ends the fold with its error.
    fn step(
        &self,
        vars: &dyn Activation,
        accu: &mut CelResult,
        iter_value: Value,
        iter_value2: Option<Value>,
    ) -> CelResult<bool> {
        let scope = FoldActivation {
            parent: vars,
            accu_var: &self.accu_var,
            accu: &*accu,
            iter_var: &self.iter_var,
            iter_value,
            iter_var2: self.iter_var2.as_deref().zip(iter_value2),
        };
        if self.loop_condition.eval(&scope)? != Value::Bool(true) {
            return Ok(false);
        }
        let next = self.loop_step.eval(&scope);
        *accu = next;
        Ok(true)
    }
}
