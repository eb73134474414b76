//! Checker environment
//!
//! [`CheckerEnv`] bundles everything a check needs to resolve names: the
//! container namespace, the type provider, the declared identifiers and
//! functions, and the checker options. It is built once and shared; every
//! `check()` call works on its own state.

use crate::scope::Scopes;
use crate::stdlib::{CROSS_TYPE_NUMERIC_COMPARISONS, standard_declarations};
use octofhir_cel_ast::Constant;
use octofhir_cel_diagnostics::{CEL0105, CEL0106, CompileError, Result};
use octofhir_cel_model::{IdentValue, ProtoRegistry, TypeProvider};
use octofhir_cel_types::{CelType, FunctionDecl, IdentDecl, Namespace};
use std::collections::HashSet;
use std::sync::Arc;

/// How list elements and map keys/values of differing types are joined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregateLiteralElementType {
    /// Mixed element types widen to `dyn`
    #[default]
    Dyn,
    /// Mixed element types are a type error
    Homogeneous,
}

/// Checker configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerOptions {
    /// Allow `<`, `<=`, `>`, `>=` between int, uint and double operands
    pub cross_type_numeric_comparisons: bool,
    /// Reject list and map literals whose elements do not share a type
    pub homogeneous_aggregate_literals: bool,
}

impl CheckerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cross_type_numeric_comparisons(mut self, enabled: bool) -> Self {
        self.cross_type_numeric_comparisons = enabled;
        self
    }

    pub fn with_homogeneous_aggregate_literals(mut self, enabled: bool) -> Self {
        self.homogeneous_aggregate_literals = enabled;
        self
    }

    pub fn aggregate_literal_element_type(&self) -> AggregateLiteralElementType {
        if self.homogeneous_aggregate_literals {
            AggregateLiteralElementType::Homogeneous
        } else {
            AggregateLiteralElementType::Dyn
        }
    }
}

/// Declarations and type information available while checking
#[derive(Debug, Clone)]
pub struct CheckerEnv {
    namespace: Namespace,
    provider: Arc<dyn TypeProvider>,
    declarations: Scopes,
    options: CheckerOptions,
    filtered_overload_ids: HashSet<&'static str>,
}

impl CheckerEnv {
    /// Environment with the standard declarations over `provider`
    pub fn new(
        namespace: Namespace,
        provider: Arc<dyn TypeProvider>,
        options: CheckerOptions,
    ) -> Self {
        let mut declarations = Scopes::default();
        for decl in standard_declarations() {
            declarations.set_function(decl);
        }
        // Host declarations go one level above the standard library
        declarations.push();
        let filtered_overload_ids = if options.cross_type_numeric_comparisons {
            HashSet::new()
        } else {
            CROSS_TYPE_NUMERIC_COMPARISONS.iter().copied().collect()
        };
        Self {
            namespace,
            provider,
            declarations,
            options,
            filtered_overload_ids,
        }
    }

    /// Root-container environment over a default [`ProtoRegistry`]
    pub fn with_defaults() -> Self {
        Self::new(
            Namespace::root(),
            Arc::new(ProtoRegistry::new()),
            CheckerOptions::default(),
        )
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn provider(&self) -> &Arc<dyn TypeProvider> {
        &self.provider
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    pub fn declarations(&self) -> &Scopes {
        &self.declarations
    }

    pub fn aggregate_literal_element_type(&self) -> AggregateLiteralElementType {
        self.options.aggregate_literal_element_type()
    }

    // === Declarations ===

    /// Declare identifiers
    ///
    /// Redeclaring an identical identifier is allowed; a different declaration
    /// under the same name is reported once every identifier has been tried.
    pub fn add_idents(&mut self, idents: impl IntoIterator<Item = IdentDecl>) -> Result<()> {
        let mut errors = Vec::new();
        for ident in idents {
            match self.declarations.find_ident_in_scope(&ident.name) {
                Some(current) if *current == ident => {}
                Some(_) => errors.push(CompileError::check(
                    CEL0105,
                    format!("overlapping identifier for name '{}'", ident.name),
                )),
                None => self.declarations.add_ident(ident),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CompileError::from_many(errors))
        }
    }

    /// Declare functions, merging overloads into existing declarations of the same name
    pub fn add_functions(
        &mut self,
        functions: impl IntoIterator<Item = FunctionDecl>,
    ) -> Result<()> {
        let mut errors = Vec::new();
        for function in functions {
            let merged = match self.declarations.find_function(&function.name) {
                Some(current) => {
                    let mut merged = current.clone();
                    match merged.merge(function) {
                        Ok(()) => merged,
                        Err(message) => {
                            errors.push(CompileError::check(CEL0106, message));
                            continue;
                        }
                    }
                }
                None => function,
            };
            self.declarations.set_function(merged);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CompileError::from_many(errors))
        }
    }

    // === Lookup ===

    /// Resolve an identifier through the container candidates
    ///
    /// For each candidate name, declared identifiers win over message types,
    /// which win over registered type names and enum constants.
    pub fn lookup_ident(&self, name: &str) -> Option<IdentDecl> {
        for candidate in self.namespace.resolve_candidate_names(name) {
            if let Some(ident) = self.declarations.find_ident(&candidate) {
                return Some(ident.clone());
            }
            if let Some(ty) = self.provider.find_struct_type(&candidate) {
                return Some(IdentDecl::new(candidate, CelType::type_of(ty)));
            }
            match self.provider.find_ident(&candidate) {
                Some(IdentValue::Type(ty)) => {
                    return Some(IdentDecl::new(candidate, CelType::type_of(ty)));
                }
                Some(IdentValue::EnumValue(value)) => {
                    return Some(IdentDecl::constant(
                        candidate,
                        CelType::Int,
                        Constant::Int(value),
                    ));
                }
                None => {}
            }
        }
        None
    }

    pub fn lookup_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.namespace
            .resolve_candidate_names(name)
            .iter()
            .find_map(|candidate| self.declarations.find_function(candidate))
    }

    pub fn is_overload_disabled(&self, overload_id: &str) -> bool {
        self.filtered_overload_ids.contains(overload_id)
    }
}

impl Default for CheckerEnv {
    fn default() -> Self {
        Self::with_defaults()
    }
}
