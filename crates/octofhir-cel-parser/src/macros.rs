//! Macro expansion
//!
//! `has(a.b)` becomes a presence-test select. The comprehension macros are
//! rewritten into `Comprehension` nodes folding into the accumulator
//! [`ACCUMULATOR`]. The original call is kept in `SourceInfo::macro_calls`
//! under the id of its expansion.

use crate::expression::ExprParser;
use octofhir_cel_ast::{
    ADD, CONDITIONAL, ComprehensionExpr, Constant, EQUALS, Expr, ExprKind, LOGICAL_AND,
    LOGICAL_NOT, LOGICAL_OR, NOT_STRICTLY_FALSE,
};
use octofhir_cel_diagnostics::{CEL0007, Result};

/// Accumulator variable of expanded comprehensions
pub const ACCUMULATOR: &str = "@result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comprehension {
    All { two_var: bool },
    Exists { two_var: bool },
    ExistsOne { two_var: bool },
    Map,
    FilterMap,
    Filter,
}

impl Comprehension {
    fn lookup(function: &str, argc: usize) -> Option<Self> {
        Some(match (function, argc) {
            ("all", 2) => Self::All { two_var: false },
            ("all", 3) => Self::All { two_var: true },
            ("exists", 2) => Self::Exists { two_var: false },
            ("exists", 3) => Self::Exists { two_var: true },
            ("exists_one", 2) => Self::ExistsOne { two_var: false },
            ("exists_one", 3) => Self::ExistsOne { two_var: true },
            ("map", 2) => Self::Map,
            ("map", 3) => Self::FilterMap,
            ("filter", 2) => Self::Filter,
            _ => return None,
        })
    }
}

/// Pieces of a fold, ahead of assembly
struct Fold {
    iter_var: String,
    iter_var2: Option<String>,
    init: Expr,
    condition: Expr,
    step: Expr,
    result: Expr,
}

impl<'s> ExprParser<'s> {
    /// Global call, expanding `has`
    pub(crate) fn global_call(
        &mut self,
        offset: usize,
        function: String,
        args: Vec<Expr>,
    ) -> Result<Expr> {
        if function != "has" || args.len() != 1 {
            let id = self.id_at(offset);
            return Ok(Expr::call(id, function, args));
        }
        let call = Expr::call(0, &function, args.clone());
        let Some(ExprKind::Select(select)) = args.into_iter().next().map(|arg| arg.kind) else {
            return Err(self.error(CEL0007, "invalid argument to has() macro", offset));
        };
        if select.test_only {
            return Err(self.error(CEL0007, "invalid argument to has() macro", offset));
        }
        let id = self.id_at(offset);
        self.record_macro(id, Expr { id, ..call });
        Ok(Expr::presence_test(id, *select.operand, select.field))
    }

    /// Member call, expanding the comprehension macros
    pub(crate) fn member_call(
        &mut self,
        offset: usize,
        target: Expr,
        function: String,
        args: Vec<Expr>,
    ) -> Result<Expr> {
        let Some(kind) = Comprehension::lookup(&function, args.len()) else {
            let id = self.id_at(offset);
            return Ok(Expr::member_call(id, target, function, args));
        };
        let call = Expr::member_call(0, target.clone(), function, args.clone());
        let fold = self.fold(offset, kind, args)?;
        let id = self.id_at(offset);
        self.record_macro(id, Expr { id, ..call });
        Ok(Expr::comprehension(
            id,
            ComprehensionExpr {
                iter_var: fold.iter_var,
                iter_var2: fold.iter_var2,
                iter_range: target,
                accu_var: ACCUMULATOR.to_string(),
                accu_init: fold.init,
                loop_condition: fold.condition,
                loop_step: fold.step,
                result: fold.result,
            },
        ))
    }

    fn fold(&mut self, offset: usize, kind: Comprehension, args: Vec<Expr>) -> Result<Fold> {
        match kind {
            Comprehension::All { two_var }
            | Comprehension::Exists { two_var }
            | Comprehension::ExistsOne { two_var } => {
                let (iter_var, iter_var2, predicate) = if two_var {
                    let [key, value, predicate] = self.macro_args(offset, args)?;
                    let key = self.iter_var(offset, &key)?;
                    (key, Some(self.iter_var(offset, &value)?), predicate)
                } else {
                    let [var, predicate] = self.macro_args(offset, args)?;
                    (self.iter_var(offset, &var)?, None, predicate)
                };
                let (init, condition, step, result) = match kind {
                    Comprehension::All { .. } => self.all(offset, predicate),
                    Comprehension::Exists { .. } => self.exists(offset, predicate),
                    _ => self.exists_one(offset, predicate),
                };
                Ok(Fold {
                    iter_var,
                    iter_var2,
                    init,
                    condition,
                    step,
                    result,
                })
            }
            Comprehension::Map => {
                let [var, transform] = self.macro_args(offset, args)?;
                let iter_var = self.iter_var(offset, &var)?;
                let step = self.append(offset, transform);
                Ok(self.collect(offset, iter_var, step))
            }
            Comprehension::FilterMap => {
                let [var, predicate, transform] = self.macro_args(offset, args)?;
                let iter_var = self.iter_var(offset, &var)?;
                let append = self.append(offset, transform);
                let step = self.keep_if(offset, predicate, append);
                Ok(self.collect(offset, iter_var, step))
            }
            Comprehension::Filter => {
                let [var, predicate] = self.macro_args(offset, args)?;
                let iter_var = self.iter_var(offset, &var)?;
                let id = self.id_at(offset);
                let element = Expr::ident(id, &iter_var);
                let append = self.append(offset, element);
                let step = self.keep_if(offset, predicate, append);
                Ok(self.collect(offset, iter_var, step))
            }
        }
    }

    fn macro_args<const N: usize>(&self, offset: usize, args: Vec<Expr>) -> Result<[Expr; N]> {
        args.try_into().map_err(|args: Vec<Expr>| {
            self.error(
                CEL0007,
                format!("macro expects {N} arguments, found {}", args.len()),
                offset,
            )
        })
    }

    fn iter_var(&self, offset: usize, arg: &Expr) -> Result<String> {
        match arg.as_ident() {
            Some(name) if !name.starts_with('.') => Ok(name.to_string()),
            _ => Err(self.error(CEL0007, "argument must be a simple name", offset)),
        }
    }

    fn all(&mut self, offset: usize, predicate: Expr) -> (Expr, Expr, Expr, Expr) {
        let init = self.constant(offset, Constant::Bool(true));
        let accu = self.accu(offset);
        let condition = self.call(offset, NOT_STRICTLY_FALSE, vec![accu]);
        let accu = self.accu(offset);
        let step = self.call(offset, LOGICAL_AND, vec![accu, predicate]);
        (init, condition, step, self.accu(offset))
    }

    fn exists(&mut self, offset: usize, predicate: Expr) -> (Expr, Expr, Expr, Expr) {
        let init = self.constant(offset, Constant::Bool(false));
        let accu = self.accu(offset);
        let not_found = self.call(offset, LOGICAL_NOT, vec![accu]);
        let condition = self.call(offset, NOT_STRICTLY_FALSE, vec![not_found]);
        let accu = self.accu(offset);
        let step = self.call(offset, LOGICAL_OR, vec![accu, predicate]);
        (init, condition, step, self.accu(offset))
    }

    fn exists_one(&mut self, offset: usize, predicate: Expr) -> (Expr, Expr, Expr, Expr) {
        let init = self.constant(offset, Constant::Int(0));
        let condition = self.constant(offset, Constant::Bool(true));
        let accu = self.accu(offset);
        let one = self.constant(offset, Constant::Int(1));
        let increment = self.call(offset, ADD, vec![accu, one]);
        let step = self.keep_if(offset, predicate, increment);
        let accu = self.accu(offset);
        let one = self.constant(offset, Constant::Int(1));
        let result = self.call(offset, EQUALS, vec![accu, one]);
        (init, condition, step, result)
    }

    /// Fold building a list from `[]`
    fn collect(&mut self, offset: usize, iter_var: String, step: Expr) -> Fold {
        let id = self.id_at(offset);
        let init = Expr::list(id, Vec::new());
        let condition = self.constant(offset, Constant::Bool(true));
        Fold {
            iter_var,
            iter_var2: None,
            init,
            condition,
            step,
            result: self.accu(offset),
        }
    }

    /// `@result + [element]`
    fn append(&mut self, offset: usize, element: Expr) -> Expr {
        let accu = self.accu(offset);
        let id = self.id_at(offset);
        let list = Expr::list(id, vec![element]);
        self.call(offset, ADD, vec![accu, list])
    }

    /// `predicate ? updated : @result`
    fn keep_if(&mut self, offset: usize, predicate: Expr, updated: Expr) -> Expr {
        let accu = self.accu(offset);
        self.call(offset, CONDITIONAL, vec![predicate, updated, accu])
    }

    fn accu(&mut self, offset: usize) -> Expr {
        let id = self.id_at(offset);
        Expr::ident(id, ACCUMULATOR)
    }

    fn constant(&mut self, offset: usize, value: Constant) -> Expr {
        let id = self.id_at(offset);
        Expr::constant(id, value)
    }

    fn call(&mut self, offset: usize, function: &str, args: Vec<Expr>) -> Expr {
        let id = self.id_at(offset);
        Expr::call(id, function, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use pretty_assertions::assert_eq;

    fn comprehension(source: &str) -> ComprehensionExpr {
        let parsed = parse(source).unwrap_or_else(|err| panic!("{source}: {err}"));
        match parsed.expr.kind {
            ExprKind::Comprehension(comp) => *comp,
            other => panic!("{source}: expected comprehension, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Comprehension::lookup("all", 3), Some(Comprehension::All { two_var: true }));
        assert_eq!(Comprehension::lookup("map", 3), Some(Comprehension::FilterMap));
        assert_eq!(Comprehension::lookup("filter", 3), None);
        assert_eq!(Comprehension::lookup("size", 0), None);
    }

    #[test]
    fn test_all_shape() {
        let comp = comprehension("xs.all(x, x > 0)");
        assert_eq!(comp.iter_var, "x");
        assert_eq!(comp.accu_var, ACCUMULATOR);
        assert_eq!(comp.iter_range.as_ident(), Some("xs"));
        assert!(matches!(comp.accu_init.kind, ExprKind::Const(Constant::Bool(true))));
        match &comp.loop_condition.kind {
            ExprKind::Call(call) => assert_eq!(call.function, NOT_STRICTLY_FALSE),
            other => panic!("unexpected condition {other:?}"),
        }
        match &comp.loop_step.kind {
            ExprKind::Call(call) => assert_eq!(call.function, LOGICAL_AND),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_exists_one_result_compares_count() {
        let comp = comprehension("xs.exists_one(x, x)");
        match &comp.result.kind {
            ExprKind::Call(call) => assert_eq!(call.function, EQUALS),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_two_variable_form() {
        let comp = comprehension("m.exists(k, v, v == k)");
        assert_eq!(comp.iter_var, "k");
        assert_eq!(comp.iter_var2.as_deref(), Some("v"));
    }

    #[test]
    fn test_filter_appends_element() {
        let comp = comprehension("xs.filter(x, x > 1)");
        let ExprKind::Call(step) = &comp.loop_step.kind else {
            panic!("step is a call");
        };
        assert_eq!(step.function, CONDITIONAL);
        let ExprKind::Call(append) = &step.args[1].kind else {
            panic!("append is a call");
        };
        assert_eq!(append.function, ADD);
        let ExprKind::List(list) = &append.args[1].kind else {
            panic!("appended value is a list");
        };
        assert_eq!(list.elements[0].as_ident(), Some("x"));
    }

    #[test]
    fn test_macro_call_is_recorded() {
        let parsed = parse("xs.map(x, x * 2)").unwrap();
        let call = parsed.source_info.macro_calls.get(&parsed.expr.id).unwrap();
        let ExprKind::Call(call) = &call.kind else {
            panic!("recorded call");
        };
        assert_eq!(call.function, "map");
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn test_has_becomes_presence_test() {
        let parsed = parse("has(a.b)").unwrap();
        let ExprKind::Select(select) = &parsed.expr.kind else {
            panic!("has expands to a select");
        };
        assert!(select.test_only);
        assert_eq!(select.field, "b");
        assert!(parsed.source_info.macro_calls.contains_key(&parsed.expr.id));
    }

    #[test]
    fn test_invalid_macro_arguments() {
        for source in ["has(a)", "has(a[0])", "xs.all(x.y, true)", "xs.map(1, 2)"] {
            let err = parse(source).unwrap_err();
            assert_eq!(err.code(), CEL0007, "{source}");
        }
    }

    #[test]
    fn test_non_macro_arity_is_a_plain_call() {
        let parsed = parse("xs.all(x)").unwrap();
        assert!(matches!(parsed.expr.kind, ExprKind::Call(_)));
    }
}
