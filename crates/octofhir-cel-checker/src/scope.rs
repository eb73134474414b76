//! Declaration scopes
//!
//! A [`Group`] holds the identifiers and functions declared at one level;
//! [`Scopes`] stacks groups so comprehension variables shadow outer bindings.

use indexmap::IndexMap;
use octofhir_cel_types::{FunctionDecl, IdentDecl};

/// Declarations made at a single scope level
#[derive(Debug, Clone, Default)]
pub struct Group {
    idents: IndexMap<String, IdentDecl>,
    functions: IndexMap<String, FunctionDecl>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ident(&self, name: &str) -> Option<&IdentDecl> {
        self.idents.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name)
    }

    pub fn idents(&self) -> impl Iterator<Item = &IdentDecl> {
        self.idents.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.functions.values()
    }
}

/// Stack of declaration groups, innermost last
#[derive(Debug, Clone)]
pub struct Scopes {
    groups: Vec<Group>,
}

impl Scopes {
    pub fn new(root: Group) -> Self {
        Self { groups: vec![root] }
    }

    /// Enter a nested scope
    pub fn push(&mut self) {
        self.groups.push(Group::new());
    }

    /// Leave the innermost scope; the root group is never popped
    pub fn pop(&mut self) -> Option<Group> {
        if self.groups.len() > 1 {
            self.groups.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.groups.len()
    }

    fn current_mut(&mut self) -> &mut Group {
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    /// Declare an identifier in the innermost scope, replacing any previous one there
    pub fn add_ident(&mut self, decl: IdentDecl) {
        self.current_mut().idents.insert(decl.name.clone(), decl);
    }

    /// Find an identifier, innermost scope first
    pub fn find_ident(&self, name: &str) -> Option<&IdentDecl> {
        self.groups.iter().rev().find_map(|group| group.ident(name))
    }

    /// Find an identifier in the innermost scope only
    pub fn find_ident_in_scope(&self, name: &str) -> Option<&IdentDecl> {
        self.groups.last().and_then(|group| group.ident(name))
    }

    pub fn set_function(&mut self, decl: FunctionDecl) {
        self.current_mut().functions.insert(decl.name.clone(), decl);
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.groups.iter().rev().find_map(|group| group.function(name))
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new(Group::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cel_types::CelType;

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut scopes = Scopes::default();
        scopes.add_ident(IdentDecl::new("x", CelType::Int));
        scopes.push();
        scopes.add_ident(IdentDecl::new("x", CelType::String));

        assert_eq!(scopes.find_ident("x").map(|d| &d.ty), Some(&CelType::String));
        scopes.pop();
        assert_eq!(scopes.find_ident("x").map(|d| &d.ty), Some(&CelType::Int));
    }

    #[test]
    fn test_find_in_scope_ignores_parents() {
        let mut scopes = Scopes::default();
        scopes.add_ident(IdentDecl::new("x", CelType::Int));
        scopes.push();
        assert!(scopes.find_ident_in_scope("x").is_none());
        assert!(scopes.find_ident("x").is_some());
    }

    #[test]
    fn test_root_is_never_popped() {
        let mut scopes = Scopes::default();
        assert!(scopes.pop().is_none());
        assert_eq!(scopes.depth(), 1);
    }
}
