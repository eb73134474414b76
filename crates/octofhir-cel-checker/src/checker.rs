//! Type checking
//!
//! [`check`] walks a parsed expression and assigns a [`CelType`] to every node,
//! resolving identifiers and overloads against a [`CheckerEnv`]. Each call owns
//! its own checker state, so one environment can serve concurrent checks.

use crate::env::{AggregateLiteralElementType, CheckerEnv};
use crate::scope::Scopes;
use octofhir_cel_ast::{
    CallExpr, ComprehensionExpr, Constant, EntryKey, Expr, ExprId, ExprKind, ListExpr, LOGICAL_AND,
    LOGICAL_OR, OPT_SELECT, ParsedExpr, SelectExpr, SourceInfo, StructExpr,
};
use octofhir_cel_diagnostics::{
    CEL0100, CEL0101, CEL0102, CEL0103, CEL0104, CEL0107, CEL0108, CompileError, ErrorBuilder,
    ErrorCode, Result, SourceLocation,
};
use octofhir_cel_types::{
    CelType, FunctionDecl, IdentDecl, Mapping, OverloadDecl, is_assignable,
    is_assignable_list, is_exact_type, most_general, substitute, to_qualified_name,
};
use std::collections::BTreeMap;

/// What an identifier, select or call resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Fully qualified identifier name; empty for function references
    pub name: String,
    /// Matching overload ids for calls
    pub overload_ids: Vec<String>,
    /// Constant value for enum identifiers
    pub value: Option<Constant>,
}

impl Reference {
    pub fn ident(name: impl Into<String>, value: Option<Constant>) -> Self {
        Self {
            name: name.into(),
            overload_ids: Vec::new(),
            value,
        }
    }

    pub fn function(overload_ids: Vec<String>) -> Self {
        Self {
            name: String::new(),
            overload_ids,
            value: None,
        }
    }

    pub fn is_function(&self) -> bool {
        !self.overload_ids.is_empty()
    }
}

/// A parsed expression with type and reference information
#[derive(Debug, Clone)]
pub struct CheckedExpr {
    pub expr: Expr,
    pub source_info: SourceInfo,
    pub type_map: BTreeMap<ExprId, CelType>,
    pub reference_map: BTreeMap<ExprId, Reference>,
}

impl CheckedExpr {
    pub fn type_of(&self, id: ExprId) -> Option<&CelType> {
        self.type_map.get(&id)
    }

    pub fn reference(&self, id: ExprId) -> Option<&Reference> {
        self.reference_map.get(&id)
    }

    /// Type of the root expression
    pub fn result_type(&self) -> &CelType {
        self.type_map.get(&self.expr.id).unwrap_or(&CelType::Error)
    }

    pub fn to_parsed(&self) -> ParsedExpr {
        ParsedExpr::new(self.expr.clone(), self.source_info.clone())
    }
}

/// A single problem found while checking
#[derive(Debug, Clone, PartialEq)]
pub struct CheckIssue {
    pub code: ErrorCode,
    pub expr_id: ExprId,
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl CheckIssue {
    fn into_error(self) -> CompileError {
        ErrorBuilder::new(self.code, self.message)
            .at(self.location)
            .expr(self.expr_id)
            .check()
    }
}

/// Type-check `parsed` against `env`
///
/// All problems are collected; a failed check returns them in source order.
pub fn check(parsed: &ParsedExpr, env: &CheckerEnv) -> Result<CheckedExpr> {
    let mut checker = Checker::new(env, &parsed.source_info);
    checker.check_expr(&parsed.expr);
    log::debug!(
        "checked expression {} ({} nodes typed, {} issues)",
        parsed.expr.id,
        checker.type_map.len(),
        checker.issues.len()
    );

    if !checker.issues.is_empty() {
        let mut issues = checker.issues;
        issues.sort_by_key(|issue| {
            issue
                .location
                .as_ref()
                .map_or(usize::MAX, |loc| loc.offset)
        });
        let errors = issues.into_iter().map(CheckIssue::into_error).collect();
        return Err(CompileError::from_many(errors));
    }

    let type_map = checker
        .type_map
        .iter()
        .map(|(id, ty)| (*id, substitute(&checker.mappings, ty, true)))
        .collect();
    Ok(CheckedExpr {
        expr: parsed.expr.clone(),
        source_info: parsed.source_info.clone(),
        type_map,
        reference_map: checker.reference_map,
    })
}

/// Per-check state
struct Checker<'a> {
    env: &'a CheckerEnv,
    source_info: &'a SourceInfo,
    /// Comprehension variables
    locals: Scopes,
    type_map: BTreeMap<ExprId, CelType>,
    reference_map: BTreeMap<ExprId, Reference>,
    mappings: Mapping,
    free_type_vars: usize,
    issues: Vec<CheckIssue>,
}

impl<'a> Checker<'a> {
    fn new(env: &'a CheckerEnv, source_info: &'a SourceInfo) -> Self {
        Self {
            env,
            source_info,
            locals: Scopes::default(),
            type_map: BTreeMap::new(),
            reference_map: BTreeMap::new(),
            mappings: Mapping::new(),
            free_type_vars: 0,
            issues: Vec::new(),
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Unspecified => {
                self.report(CEL0102, expr.id, "unspecified expression kind");
                self.set_type(expr.id, CelType::Error);
            }
            ExprKind::Const(constant) => self.set_type(expr.id, constant_type(constant)),
            ExprKind::Ident(ident) => self.check_ident(expr.id, &ident.name),
            ExprKind::Select(select) => self.check_select(expr, select),
            ExprKind::Call(call) => self.check_call(expr, call),
            ExprKind::List(list) => self.check_list(expr.id, list),
            ExprKind::Struct(create) if create.message_name.is_empty() => {
                self.check_map(expr.id, create)
            }
            ExprKind::Struct(create) => self.check_struct(expr.id, create),
            ExprKind::Comprehension(comp) => self.check_comprehension(expr.id, comp),
        }
    }

    // === Identifiers and Selection ===

    fn check_ident(&mut self, id: ExprId, name: &str) {
        match self.lookup_ident(name) {
            Some(decl) => {
                self.set_type(id, decl.ty);
                self.set_reference(id, Reference::ident(decl.name, decl.value));
            }
            None => self.undeclared(id, name),
        }
    }

    fn check_select(&mut self, expr: &Expr, select: &SelectExpr) {
        // `a.b.c` may name a qualified identifier rather than a field path
        if let Some(qualified) = to_qualified_name(expr) {
            if !self.is_local_root(&qualified) {
                if let Some(decl) = self.env.lookup_ident(&qualified) {
                    self.set_type(expr.id, decl.ty);
                    self.set_reference(expr.id, Reference::ident(decl.name, decl.value));
                    return;
                }
            }
        }

        let mut result = self.check_select_field(expr.id, &select.operand, &select.field, false);
        if select.test_only {
            result = CelType::Bool;
        }
        let result = substitute(&self.mappings, &result, false);
        self.set_type(expr.id, result);
    }

    fn check_opt_select(&mut self, expr: &Expr, call: &CallExpr) {
        if call.args.len() != 2 || call.target.is_some() {
            let style = if call.target.is_some() {
                " member call with"
            } else {
                ""
            };
            self.report(
                CEL0102,
                expr.id,
                format!(
                    "unsupported optional field selection: incorrect signature{style} argument count: {}",
                    call.args.len()
                ),
            );
            self.set_type(expr.id, CelType::Error);
            return;
        }
        let (operand, field) = (&call.args[0], &call.args[1]);
        let ExprKind::Const(Constant::String(field_name)) = &field.kind else {
            self.report(
                CEL0102,
                field.id,
                "unsupported optional field selection: field must be a string literal",
            );
            self.set_type(expr.id, CelType::Error);
            return;
        };
        self.set_type(field.id, CelType::String);
        let result = self.check_select_field(expr.id, operand, field_name, true);
        let result = substitute(&self.mappings, &result, false);
        self.set_type(expr.id, result);
        self.set_reference(
            expr.id,
            Reference::function(vec!["select_optional_field".to_string()]),
        );
    }

    fn check_select_field(
        &mut self,
        id: ExprId,
        operand: &Expr,
        field: &str,
        optional: bool,
    ) -> CelType {
        self.check_expr(operand);
        let operand_type = substitute(&self.mappings, &self.type_of(operand.id), false);
        let (was_optional, target) = unwrap_optional(&operand_type);

        let result = match &target {
            CelType::Map(_, value) => (**value).clone(),
            CelType::Object(desc) => self
                .lookup_field_type(id, desc.full_name(), field)
                .unwrap_or(CelType::Error),
            CelType::Type(_) if field == "name" => CelType::String,
            CelType::TypeParam(_) => {
                // Pin the parameter to dyn so it cannot later bind to something narrower
                self.is_assignable(&CelType::Dyn, &target);
                CelType::Dyn
            }
            other => {
                if !other.is_dyn_or_error() {
                    self.report(
                        CEL0108,
                        id,
                        format!("type '{operand_type}' does not support field selection"),
                    );
                }
                CelType::Dyn
            }
        };

        if was_optional || optional {
            CelType::optional(result)
        } else {
            result
        }
    }

    fn lookup_field_type(&mut self, id: ExprId, type_name: &str, field: &str) -> Option<CelType> {
        let provider = self.env.provider();
        if provider.find_struct_type(type_name).is_none() {
            self.report(
                CEL0104,
                id,
                format!("unexpected failed resolution of '{type_name}'"),
            );
            return None;
        }
        let found = provider.find_struct_field_type(type_name, field);
        if found.is_none() {
            self.report(CEL0103, id, format!("undefined field '{field}'"));
        }
        found
    }

    // === Calls ===

    fn check_call(&mut self, expr: &Expr, call: &CallExpr) {
        if call.function == OPT_SELECT {
            return self.check_opt_select(expr, call);
        }
        for arg in &call.args {
            self.check_expr(arg);
        }

        let env = self.env;
        let Some(target) = call.target.as_deref() else {
            match env.lookup_function(&call.function) {
                Some(decl) => self.resolve_overload_or_error(expr.id, decl, None, &call.args),
                None => self.undeclared(expr.id, &call.function),
            }
            return;
        };

        // `a.b.f()` is either `f` with receiver `a.b` or the namespaced function `a.b.f`
        if let Some(prefix) = to_qualified_name(target) {
            if !self.is_local_root(&prefix) {
                let qualified = format!("{prefix}.{}", call.function);
                if let Some(decl) = env.lookup_function(&qualified) {
                    self.resolve_overload_or_error(expr.id, decl, None, &call.args);
                    return;
                }
            }
        }

        self.check_expr(target);
        match env.lookup_function(&call.function) {
            Some(decl) => self.resolve_overload_or_error(expr.id, decl, Some(target), &call.args),
            None => self.undeclared(expr.id, &call.function),
        }
    }

    fn resolve_overload_or_error(
        &mut self,
        id: ExprId,
        decl: &FunctionDecl,
        target: Option<&Expr>,
        args: &[Expr],
    ) {
        match self.resolve_overload(id, decl, target, args) {
            Some((ty, reference)) => {
                self.set_type(id, ty);
                self.set_reference(id, reference);
            }
            None => self.set_type(id, CelType::Error),
        }
    }

    fn resolve_overload(
        &mut self,
        id: ExprId,
        decl: &FunctionDecl,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> Option<(CelType, Reference)> {
        let mut arg_types: Vec<CelType> = target
            .into_iter()
            .chain(args)
            .map(|e| self.type_of(e.id))
            .collect();

        // Logical operators only need every operand to be a bool
        if decl.name == LOGICAL_AND || decl.name == LOGICAL_OR {
            let mut ok = true;
            for ty in &arg_types {
                if !self.is_assignable(ty, &CelType::Bool) {
                    self.report(CEL0102, id, format!("expected type 'bool' but got '{ty}'"));
                    ok = false;
                }
            }
            let overload_ids = decl.overloads.iter().map(|o| o.id.clone()).collect();
            return ok.then(|| (CelType::Bool, Reference::function(overload_ids)));
        }

        let mut result: Option<CelType> = None;
        let mut overload_ids = Vec::new();
        for overload in &decl.overloads {
            if self.env.is_overload_disabled(&overload.id) {
                continue;
            }
            if target.is_some() != overload.is_member {
                continue;
            }
            let (params, overload_result) = self.instantiate(overload);
            if !self.is_assignable_list(&arg_types, &params) {
                continue;
            }
            overload_ids.push(overload.id.clone());
            let candidate = substitute(&self.mappings, &overload_result, false);
            result = Some(match result {
                None => candidate,
                Some(previous) if previous.is_dyn() || is_exact_type(&candidate, &previous) => {
                    previous
                }
                Some(_) => CelType::Dyn,
            });
        }

        match result {
            Some(ty) => {
                log::trace!("resolved '{}' to {:?} -> {}", decl.name, overload_ids, ty);
                Some((ty, Reference::function(overload_ids)))
            }
            None => {
                for ty in &mut arg_types {
                    *ty = substitute(&self.mappings, ty, true);
                }
                let rendered = arg_types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                log::trace!("no overload of '{}' accepts ({})", decl.name, rendered);
                self.report(
                    CEL0101,
                    id,
                    format!(
                        "no matching overload for '{}' applied to '({rendered})'",
                        decl.name
                    ),
                );
                None
            }
        }
    }

    /// Overload parameter and result types with fresh type variables
    fn instantiate(&mut self, overload: &OverloadDecl) -> (Vec<CelType>, CelType) {
        let type_params = overload.type_params();
        if type_params.is_empty() {
            return (overload.params.clone(), overload.result.clone());
        }
        let mut fresh = Mapping::new();
        for name in type_params {
            let var = self.new_type_var();
            fresh.add(&CelType::type_param(name), var);
        }
        let params = overload
            .params
            .iter()
            .map(|p| substitute(&fresh, p, false))
            .collect();
        (params, substitute(&fresh, &overload.result, false))
    }

    // === Aggregate Literals ===

    fn check_list(&mut self, id: ExprId, list: &ListExpr) {
        let mut elems: Option<CelType> = None;
        for (index, element) in list.elements.iter().enumerate() {
            self.check_expr(element);
            let mut elem_type = self.type_of(element.id);
            if list.optional_indices.contains(&index) {
                elem_type = self.optional_entry_type(element.id, elem_type);
            }
            elems = Some(self.join_types(element.id, elems, elem_type));
        }
        let elems = match elems {
            Some(ty) => ty,
            None => self.new_type_var(),
        };
        self.set_type(id, CelType::list(elems));
    }

    fn check_map(&mut self, id: ExprId, create: &StructExpr) {
        let mut key_type: Option<CelType> = None;
        let mut value_type: Option<CelType> = None;
        for entry in &create.entries {
            let EntryKey::MapKey(key) = &entry.key else {
                self.report(CEL0102, entry.id, "expected map key");
                continue;
            };
            self.check_expr(key);
            let key_ty = self.type_of(key.id);
            key_type = Some(self.join_types(key.id, key_type, key_ty));

            self.check_expr(&entry.value);
            let mut value_ty = self.type_of(entry.value.id);
            if entry.optional {
                value_ty = self.optional_entry_type(entry.value.id, value_ty);
            }
            value_type = Some(self.join_types(entry.value.id, value_type, value_ty));
        }
        let (key_type, value_type) = match (key_type, value_type) {
            (Some(k), Some(v)) => (k, v),
            _ => (self.new_type_var(), self.new_type_var()),
        };
        self.set_type(id, CelType::map(key_type, value_type));
    }

    fn check_struct(&mut self, id: ExprId, create: &StructExpr) {
        let Some(decl) = self.env.lookup_ident(&create.message_name) else {
            self.undeclared(id, &create.message_name);
            return;
        };
        self.set_reference(id, Reference::ident(decl.name.clone(), None));

        let (result, type_name) = match &decl.ty {
            CelType::Type(Some(inner)) => match &**inner {
                CelType::Object(desc) => (
                    CelType::Object(desc.clone()),
                    Some(desc.full_name().to_string()),
                ),
                other => {
                    self.report(CEL0104, id, format!("'{other}' is not a message type"));
                    (CelType::Error, None)
                }
            },
            CelType::Error => (CelType::Error, None),
            _ => {
                self.report(CEL0104, id, format!("'{}' is not a type", decl.name));
                (CelType::Error, None)
            }
        };
        self.set_type(id, result);

        for entry in &create.entries {
            let EntryKey::Field(field) = &entry.key else {
                self.report(CEL0102, entry.id, "expected field key");
                continue;
            };
            self.check_expr(&entry.value);
            let field_type = type_name
                .as_deref()
                .and_then(|name| self.lookup_field_type(entry.id, name, field))
                .unwrap_or(CelType::Error);
            let mut value_type = self.type_of(entry.value.id);
            if entry.optional {
                value_type = self.optional_entry_type(entry.value.id, value_type);
            }
            if !self.is_assignable(&field_type, &value_type) {
                self.report(
                    CEL0102,
                    entry.value.id,
                    format!("expected type '{field_type}' but got '{value_type}'"),
                );
            }
        }
    }

    /// Unwrap the value type of an optional entry, reporting non-optional values
    fn optional_entry_type(&mut self, id: ExprId, ty: CelType) -> CelType {
        let (is_optional, inner) = unwrap_optional(&ty);
        if !is_optional && !inner.is_dyn() {
            let expected = CelType::optional(inner.clone());
            self.report(
                CEL0102,
                id,
                format!("expected type '{expected}' but got '{inner}'"),
            );
        }
        inner
    }

    fn join_types(&mut self, id: ExprId, previous: Option<CelType>, current: CelType) -> CelType {
        let Some(previous) = previous else {
            return current;
        };
        if self.is_assignable(&previous, &current) {
            return most_general(&previous, &current);
        }
        match self.env.aggregate_literal_element_type() {
            AggregateLiteralElementType::Dyn => CelType::Dyn,
            AggregateLiteralElementType::Homogeneous => {
                self.report(
                    CEL0102,
                    id,
                    format!("expected type '{previous}' but got '{current}'"),
                );
                CelType::Error
            }
        }
    }

    // === Comprehensions ===

    fn check_comprehension(&mut self, id: ExprId, comp: &ComprehensionExpr) {
        self.check_expr(&comp.iter_range);
        self.check_expr(&comp.accu_init);
        let accu_type = self.type_of(comp.accu_init.id);
        let range_type = substitute(&self.mappings, &self.type_of(comp.iter_range.id), false);
        let two_vars = comp.iter_var2.is_some();

        let (var_type, var2_type) = match &range_type {
            CelType::List(elem) if two_vars => (CelType::Int, (**elem).clone()),
            CelType::List(elem) => ((**elem).clone(), CelType::Dyn),
            CelType::Map(key, value) => ((**key).clone(), (**value).clone()),
            CelType::TypeParam(_) => {
                self.is_assignable(&CelType::Dyn, &range_type);
                (CelType::Dyn, CelType::Dyn)
            }
            other => {
                if !other.is_dyn_or_error() {
                    self.report(
                        CEL0102,
                        comp.iter_range.id,
                        format!(
                            "expression of type '{other}' cannot be the range of a comprehension (must be list, map, or dynamic)"
                        ),
                    );
                }
                (CelType::Dyn, CelType::Dyn)
            }
        };

        self.locals.push();
        self.locals
            .add_ident(IdentDecl::new(comp.accu_var.clone(), accu_type.clone()));
        self.locals.push();
        self.locals
            .add_ident(IdentDecl::new(comp.iter_var.clone(), var_type));
        if let Some(var2) = &comp.iter_var2 {
            self.locals.add_ident(IdentDecl::new(var2.clone(), var2_type));
        }

        self.check_expr(&comp.loop_condition);
        self.assert_type(comp.loop_condition.id, &CelType::Bool);
        self.check_expr(&comp.loop_step);
        self.assert_type(comp.loop_step.id, &accu_type);

        // Iteration variables are out of scope in the result
        self.locals.pop();
        self.check_expr(&comp.result);
        self.locals.pop();

        let result = self.type_of(comp.result.id);
        self.set_type(id, result);
    }

    fn assert_type(&mut self, id: ExprId, expected: &CelType) {
        let actual = self.type_of(id);
        if !self.is_assignable(expected, &actual) {
            self.report(
                CEL0102,
                id,
                format!("expected type '{expected}' but got '{actual}'"),
            );
        }
    }

    // === Bookkeeping ===

    fn lookup_ident(&self, name: &str) -> Option<IdentDecl> {
        if !name.starts_with('.') {
            if let Some(local) = self.locals.find_ident(name) {
                return Some(local.clone());
            }
        }
        self.env.lookup_ident(name)
    }

    /// Whether the first segment of a dotted name is a comprehension variable
    fn is_local_root(&self, qualified: &str) -> bool {
        let root = qualified.split('.').next().unwrap_or(qualified);
        self.locals.find_ident(root).is_some()
    }

    fn undeclared(&mut self, id: ExprId, name: &str) {
        let container = self.env.namespace().name().to_string();
        self.report(
            CEL0100,
            id,
            format!("undeclared reference to '{name}' (in container '{container}')"),
        );
        self.set_type(id, CelType::Error);
    }

    fn new_type_var(&mut self) -> CelType {
        let var = CelType::type_param(format!("_var{}", self.free_type_vars));
        self.free_type_vars += 1;
        var
    }

    fn is_assignable(&mut self, t1: &CelType, t2: &CelType) -> bool {
        match is_assignable(&self.mappings, t1, t2) {
            Some(mappings) => {
                self.mappings = mappings;
                true
            }
            None => false,
        }
    }

    fn is_assignable_list(&mut self, l1: &[CelType], l2: &[CelType]) -> bool {
        match is_assignable_list(&self.mappings, l1, l2) {
            Some(mappings) => {
                self.mappings = mappings;
                true
            }
            None => false,
        }
    }

    fn type_of(&self, id: ExprId) -> CelType {
        self.type_map.get(&id).cloned().unwrap_or(CelType::Error)
    }

    fn set_type(&mut self, id: ExprId, ty: CelType) {
        if let Some(existing) = self.type_map.get(&id) {
            if existing.kind() != ty.kind() {
                self.report(
                    CEL0107,
                    id,
                    "incompatible type already exists for expression",
                );
                return;
            }
        }
        self.type_map.insert(id, ty);
    }

    fn set_reference(&mut self, id: ExprId, reference: Reference) {
        if let Some(existing) = self.reference_map.get(&id) {
            if *existing != reference {
                self.report(CEL0107, id, "reference already exists for expression");
                return;
            }
        }
        self.reference_map.insert(id, reference);
    }

    fn report(&mut self, code: ErrorCode, id: ExprId, message: impl Into<String>) {
        self.issues.push(CheckIssue {
            code,
            expr_id: id,
            location: self.source_info.location_of(id),
            message: message.into(),
        });
    }
}

fn constant_type(constant: &Constant) -> CelType {
    match constant {
        Constant::Null => CelType::Null,
        Constant::Bool(_) => CelType::Bool,
        Constant::Int(_) => CelType::Int,
        Constant::Uint(_) => CelType::Uint,
        Constant::Double(_) => CelType::Double,
        Constant::String(_) => CelType::String,
        Constant::Bytes(_) => CelType::Bytes,
    }
}

/// Split `optional_type(T)` into `(true, T)`; other types pass through
fn unwrap_optional(ty: &CelType) -> (bool, CelType) {
    match ty {
        CelType::Opaque { name, params } if name == "optional_type" && params.len() == 1 => {
            (true, params[0].clone())
        }
        other => (false, other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cel_ast::{ADD, Entry};
    use pretty_assertions::assert_eq;

    fn int(id: ExprId, value: i64) -> Expr {
        Expr::constant(id, Constant::Int(value))
    }

    fn check_expr(expr: Expr) -> Result<CheckedExpr> {
        check(&ParsedExpr::from(expr), &CheckerEnv::default())
    }

    #[test]
    fn test_constants_and_arithmetic() {
        let checked = check_expr(Expr::call(3, ADD, vec![int(1, 1), int(2, 2)])).unwrap();
        assert_eq!(checked.result_type(), &CelType::Int);
        assert_eq!(
            checked.reference(3).map(|r| r.overload_ids.clone()),
            Some(vec!["add_int64".to_string()])
        );
    }

    #[test]
    fn test_empty_list_becomes_dyn() {
        let checked = check_expr(Expr::list(1, vec![])).unwrap();
        assert_eq!(checked.result_type(), &CelType::list(CelType::Dyn));
    }

    #[test]
    fn test_mixed_map_keys_widen_to_dyn() {
        let entry = |id, key: Expr, value: Expr| Entry {
            id,
            key: EntryKey::MapKey(key),
            value,
            optional: false,
        };
        let map = Expr::map(
            10,
            vec![
                entry(3, int(1, 1), Expr::constant(2, Constant::String("a".into()))),
                entry(
                    6,
                    Expr::constant(4, Constant::Uint(2)),
                    Expr::constant(5, Constant::String("b".into())),
                ),
            ],
        );
        let checked = check_expr(map).unwrap();
        assert_eq!(
            checked.result_type(),
            &CelType::map(CelType::Dyn, CelType::String)
        );
    }

    #[test]
    fn test_undeclared_ident() {
        let err = check_expr(Expr::ident(1, "missing")).unwrap_err();
        assert_eq!(err.code(), CEL0100);
        assert_eq!(
            err.message(),
            "undeclared reference to 'missing' (in container '')"
        );
    }

    #[test]
    fn test_unwrap_optional() {
        let (opt, inner) = unwrap_optional(&CelType::optional(CelType::Int));
        assert!(opt);
        assert_eq!(inner, CelType::Int);
        assert_eq!(unwrap_optional(&CelType::Int), (false, CelType::Int));
    }
}
