//! Container-relative name resolution
//!
//! An expression checked in container `a.b` may refer to `a.b.x`, `a.x` or `x`
//! by writing `x`. [`Namespace::resolve_candidate_names`] yields those
//! candidates from most to least qualified; a leading dot opts out of the
//! search and names the root namespace.

use octofhir_cel_ast::{Expr, ExprKind};
use std::collections::HashMap;

/// A container name plus optional aliases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    name: String,
    aliases: HashMap<String, String>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: HashMap::new(),
        }
    }

    /// The root (empty) namespace
    pub fn root() -> Self {
        Self::default()
    }

    /// Register `alias` as a short name for the qualified name `target`
    pub fn with_alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    /// Candidate qualified names for `name`, most specific first
    pub fn resolve_candidate_names(&self, name: &str) -> Vec<String> {
        if let Some(qualified) = name.strip_prefix('.') {
            return vec![self.find_alias(qualified).unwrap_or_else(|| qualified.to_string())];
        }
        if let Some(alias) = self.find_alias(name) {
            return vec![alias];
        }
        if self.name.is_empty() {
            return vec![name.to_string()];
        }

        let mut candidates = vec![format!("{}.{}", self.name, name)];
        let mut container = self.name.as_str();
        while let Some(dot) = container.rfind('.') {
            container = &container[..dot];
            candidates.push(format!("{container}.{name}"));
        }
        candidates.push(name.to_string());
        candidates
    }

    /// Expand the leading segment of `name` when it is an alias
    pub fn find_alias(&self, name: &str) -> Option<String> {
        let (simple, qualifier) = match name.find('.') {
            Some(dot) => name.split_at(dot),
            None => (name, ""),
        };
        self.aliases
            .get(simple)
            .map(|alias| format!("{alias}{qualifier}"))
    }
}

/// Dotted name spelled by an identifier or a chain of non-test selects
pub fn to_qualified_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(ident) => Some(ident.name.clone()),
        ExprKind::Select(select) if !select.test_only => {
            to_qualified_name(&select.operand).map(|qual| format!("{}.{}", qual, select.field))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root_namespace_returns_name() {
        assert_eq!(Namespace::root().resolve_candidate_names("x"), vec!["x"]);
    }

    #[test]
    fn test_container_candidates_longest_first() {
        let ns = Namespace::new("a.b.c");
        assert_eq!(
            ns.resolve_candidate_names("R.s"),
            vec!["a.b.c.R.s", "a.b.R.s", "a.R.s", "R.s"]
        );
    }

    #[test]
    fn test_leading_dot_is_absolute() {
        let ns = Namespace::new("a.b");
        assert_eq!(ns.resolve_candidate_names(".x.y"), vec!["x.y"]);
    }

    #[test]
    fn test_alias_expands_first_segment() {
        let ns = Namespace::new("pkg").with_alias("msg", "google.protobuf");
        assert_eq!(
            ns.resolve_candidate_names("msg.Duration"),
            vec!["google.protobuf.Duration"]
        );
        assert_eq!(
            ns.resolve_candidate_names(".msg"),
            vec!["google.protobuf"]
        );
        assert_eq!(ns.find_alias("other"), None);
    }

    #[test]
    fn test_to_qualified_name() {
        let expr = Expr::select(3, Expr::select(2, Expr::ident(1, "a"), "b"), "c");
        assert_eq!(to_qualified_name(&expr).as_deref(), Some("a.b.c"));

        let presence = Expr::presence_test(2, Expr::ident(1, "a"), "b");
        assert_eq!(to_qualified_name(&presence), None);

        let call = Expr::select(2, Expr::call(1, "f", vec![]), "b");
        assert_eq!(to_qualified_name(&call), None);
    }
}
