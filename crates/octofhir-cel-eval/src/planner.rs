//! Lowering of expression trees into [`Interpretable`] plans
//!
//! Planning resolves everything that does not depend on variable values:
//! function candidates, message types and the possible readings of qualified
//! identifiers. The resulting plan can be evaluated repeatedly.

use crate::attribute::{
    AbsoluteAttribute, Access, Attribute, ConditionalAttribute, MaybeAttribute, RelativeAttribute,
};
use crate::interpretable::{
    EvalCall, EvalConst, EvalFold, EvalHas, EvalList, EvalMap, EvalObj, Interpretable,
};
use crate::registry::OrderedDispatcher;
use crate::value::Value;
use octofhir_cel_ast::{
    CONDITIONAL, CallExpr, ComprehensionExpr, Entry, EntryKey, Expr, ExprId, ExprKind, INDEX,
    ListExpr, OPT_INDEX, OPT_SELECT, SelectExpr, StructExpr,
};
use octofhir_cel_diagnostics::{CEL0300, CEL0301, CEL0302, CompileError, Result};
use octofhir_cel_model::TypeProvider;
use octofhir_cel_types::{CelType, Namespace, to_qualified_name};
use prost_reflect::MessageDescriptor;
use std::sync::Arc;

/// Plans expressions against a function dispatcher and a type provider
#[derive(Debug, Clone)]
pub struct Planner {
    dispatcher: OrderedDispatcher,
    provider: Arc<dyn TypeProvider>,
    namespace: Namespace,
}

impl Planner {
    pub fn new(
        dispatcher: OrderedDispatcher,
        provider: Arc<dyn TypeProvider>,
        namespace: Namespace,
    ) -> Self {
        Self {
            dispatcher,
            provider,
            namespace,
        }
    }

    pub fn dispatcher(&self) -> &OrderedDispatcher {
        &self.dispatcher
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Plan an expression tree
    pub fn plan(&self, expr: &Expr) -> Result<Interpretable> {
        let plan = self.plan_expr(expr, &[])?;
        log::debug!(
            "planned expression {} ({} nodes, container '{}')",
            expr.id,
            expr.node_count(),
            self.namespace.name()
        );
        Ok(plan)
    }

    fn plan_expr(&self, expr: &Expr, locals: &[&str]) -> Result<Interpretable> {
        let id = expr.id;
        match &expr.kind {
            ExprKind::Const(constant) => Ok(Interpretable::Const(EvalConst {
                id,
                value: Value::from(constant),
            })),
            ExprKind::Ident(ident) if locals.contains(&ident.name.as_str()) => {
                Ok(Interpretable::Attr(Attribute::Absolute(AbsoluteAttribute::new(
                    id,
                    vec![ident.name.clone()],
                    Arc::clone(&self.provider),
                ))))
            }
            ExprKind::Ident(ident) => Ok(Interpretable::Attr(Attribute::Maybe(
                MaybeAttribute::new(
                    id,
                    self.namespace.resolve_candidate_names(&ident.name),
                    Arc::clone(&self.provider),
                ),
            ))),
            ExprKind::Select(select) => self.plan_select(id, select, locals),
            ExprKind::Call(call) => self.plan_call(id, call, locals),
            ExprKind::List(list) => self.plan_list(id, list, locals),
            ExprKind::Struct(st) if st.message_name.is_empty() => {
                self.plan_map(id, st, locals)
            }
            ExprKind::Struct(st) => self.plan_object(id, st, locals),
            ExprKind::Comprehension(comprehension) => self.plan_fold(id, comprehension, locals),
            ExprKind::Unspecified => Err(CompileError::plan(
                CEL0300,
                "expression kind is not set",
                id,
            )),
        }
    }

    fn plan_select(
        &self,
        id: ExprId,
        select: &SelectExpr,
        locals: &[&str],
    ) -> Result<Interpretable> {
        let mut attr = into_attribute(self.plan_expr(&select.operand, locals)?);
        let access = Access::field(id, &select.field, false);
        if select.test_only {
            return Ok(Interpretable::Has(EvalHas::new(id, attr, access)));
        }
        attr.add_access(access);
        Ok(Interpretable::Attr(attr))
    }

    // === Calls ===

    fn plan_call(&self, id: ExprId, call: &CallExpr, locals: &[&str]) -> Result<Interpretable> {
        match call.function.as_str() {
            INDEX => return self.plan_index(id, call, false, locals),
            OPT_INDEX | OPT_SELECT => return self.plan_index(id, call, true, locals),
            CONDITIONAL => return self.plan_conditional(id, call, locals),
            _ => {}
        }

        // `a.b.f(x)` may name the namespaced function `a.b.f`
        let qualifier = call
            .target
            .as_deref()
            .and_then(to_qualified_name)
            .filter(|name| {
                let root = name.split('.').next().unwrap_or(name);
                !locals.contains(&root)
            });
        if let Some(qualifier) = qualifier {
            let qualified = format!("{qualifier}.{}", call.function);
            for candidate in self.namespace.resolve_candidate_names(&qualified) {
                let funcs = self.dispatcher.narrowed(&candidate);
                if !funcs.is_empty() {
                    let args = self.plan_all(&call.args, locals)?;
                    return Ok(Interpretable::Call(EvalCall::new(
                        id, candidate, funcs, None, args,
                    )));
                }
            }
        }

        let target = call
            .target
            .as_deref()
            .map(|target| self.plan_expr(target, locals))
            .transpose()?;
        let args = self.plan_all(&call.args, locals)?;

        if target.is_none() {
            for candidate in self.namespace.resolve_candidate_names(&call.function) {
                let funcs = self.dispatcher.narrowed(&candidate);
                if !funcs.is_empty() {
                    return Ok(Interpretable::Call(EvalCall::new(
                        id, candidate, funcs, None, args,
                    )));
                }
            }
        }
        let funcs = self.dispatcher.narrowed(&call.function);
        if funcs.is_empty() {
            log::debug!("no implementation registered for function '{}'", call.function);
        }
        Ok(Interpretable::Call(EvalCall::new(
            id,
            call.function.clone(),
            funcs,
            target,
            args,
        )))
    }

    fn plan_all(&self, exprs: &[Expr], locals: &[&str]) -> Result<Vec<Interpretable>> {
        exprs.iter().map(|expr| self.plan_expr(expr, locals)).collect()
    }

    fn plan_index(
        &self,
        id: ExprId, call: &CallExpr, optional: bool,
        locals: &[&str],
    ) -> Result<Interpretable> {
        let [operand, index] = call.args.as_slice() else {
            return Err(arity_error(id, call, 2));
        };
        let mut attr = into_attribute(self.plan_expr(operand, locals)?);
        let access = match self.plan_expr(index, locals)? {
            Interpretable::Const(key) => Access::constant(id, key.value, optional),
            key => Access::eval(id, key, optional),
        };
        attr.add_access(access);
        Ok(Interpretable::Attr(attr))
    }

    fn plan_conditional(
        &self,
        id: ExprId,
        call: &CallExpr,
        locals: &[&str],
    ) -> Result<Interpretable> {
        let [condition, truthy, falsy] = call.args.as_slice() else {
            return Err(arity_error(id, call, 3));
        };
        let attr = ConditionalAttribute::new(
            id,
            self.plan_expr(condition, locals)?,
            into_attribute(self.plan_expr(truthy, locals)?),
            into_attribute(self.plan_expr(falsy, locals)?),
        );
        Ok(Interpretable::Attr(Attribute::Conditional(attr)))
    }

    // === Literals ===

    fn plan_list(&self, id: ExprId, list: &ListExpr, locals: &[&str]) -> Result<Interpretable> {
        if let Some(index) = list
            .optional_indices
            .iter()
            .find(|index| **index >= list.elements.len())
        {
            return Err(CompileError::plan(
                CEL0300,
                format!("optional index {index} is outside the list literal"),
                id,
            ));
        }
        let elements = self.plan_all(&list.elements, locals)?;
        let optional = (0..elements.len())
            .map(|i| list.optional_indices.contains(&i))
            .collect();
        Ok(Interpretable::List(EvalList::new(id, elements, optional)))
    }

    fn plan_map(&self, id: ExprId, st: &StructExpr, locals: &[&str]) -> Result<Interpretable> {
        let mut keys = Vec::with_capacity(st.entries.len());
        let mut values = Vec::with_capacity(st.entries.len());
        let mut optional = Vec::with_capacity(st.entries.len());
        for entry in &st.entries {
            let EntryKey::MapKey(key) = &entry.key else {
                return Err(CompileError::plan(
                    CEL0300,
                    "map literal entry has a field key",
                    entry.id,
                ));
            };
            keys.push(self.plan_expr(key, locals)?);
            values.push(self.plan_expr(&entry.value, locals)?);
            optional.push(entry.optional);
        }
        Ok(Interpretable::Map(EvalMap::new(id, keys, values, optional)))
    }

    fn plan_object(
        &self,
        id: ExprId,
        st: &StructExpr,
        locals: &[&str],
    ) -> Result<Interpretable> {
        let desc = self.resolve_message(id, &st.message_name)?;
        let mut fields = Vec::with_capacity(st.entries.len());
        let mut values = Vec::with_capacity(st.entries.len());
        let mut optional = Vec::with_capacity(st.entries.len());
        for entry in &st.entries {
            let name = field_name(entry)?;
            if desc.get_field_by_name(name).is_none() {
                return Err(CompileError::plan(
                    CEL0302,
                    format!("no such field '{name}' in message '{}'", desc.full_name()),
                    entry.id,
                ));
            }
            fields.push(name.to_string());
            values.push(self.plan_expr(&entry.value, locals)?);
            optional.push(entry.optional);
        }
        Ok(Interpretable::Obj(EvalObj::new(
            id, desc, fields, values, optional,
        )))
    }

    fn resolve_message(&self, id: ExprId, name: &str) -> Result<MessageDescriptor> {
        self.namespace
            .resolve_candidate_names(name)
            .iter()
            .find_map(|candidate| match self.provider.find_struct_type(candidate) {
                Some(CelType::Object(desc)) => Some(desc),
                _ => None,
            })
            .ok_or_else(|| CompileError::plan(CEL0301, format!("unknown type: {name}"), id))
    }

    /// Plan a comprehension; its variables shadow every qualified reading
    /// of the same name inside the loop and the result
    fn plan_fold(
        &self,
        id: ExprId,
        comprehension: &ComprehensionExpr,
        locals: &[&str],
    ) -> Result<Interpretable> {
        let mut loop_locals = locals.to_vec();
        loop_locals.push(comprehension.iter_var.as_str());
        if let Some(iter_var2) = &comprehension.iter_var2 {
            loop_locals.push(iter_var2.as_str());
        }
        loop_locals.push(comprehension.accu_var.as_str());
        let mut result_locals = locals.to_vec();
        result_locals.push(comprehension.accu_var.as_str());

        Ok(Interpretable::Fold(Box::new(EvalFold {
            id,
            iter_var: comprehension.iter_var.clone(),
            iter_var2: comprehension.iter_var2.clone(),
            accu_var: comprehension.accu_var.clone(),
            iter_range: self.plan_expr(&comprehension.iter_range, locals)?,
            accu_init: self.plan_expr(&comprehension.accu_init, locals)?,
            loop_condition: self.plan_expr(&comprehension.loop_condition, &loop_locals)?,
            loop_step: self.plan_expr(&comprehension.loop_step, &loop_locals)?,
            result: self.plan_expr(&comprehension.result, &result_locals)?,
        })))
    }
}

/// Reuse an attribute plan, or wrap any other plan as the root of one
fn into_attribute(plan: Interpretable) -> Attribute {
    match plan {
        Interpretable::Attr(attr) => attr,
        other => Attribute::Relative(RelativeAttribute::new(other)),
    }
}

fn field_name(entry: &Entry) -> Result<&str> {
    match &entry.key {
        EntryKey::Field(name) => Ok(name),
        EntryKey::MapKey(_) => Err(CompileError::plan(
            CEL0300,
            "message literal entry has a map key",
            entry.id,
        )),
    }
}

fn arity_error(id: ExprId, call: &CallExpr, expected: usize) -> CompileError {
    CompileError::plan(
        CEL0300,
        format!(
            "'{}' expects {expected} arguments, found {}",
            call.function,
            call.args.len()
        ),
        id,
    )
}
