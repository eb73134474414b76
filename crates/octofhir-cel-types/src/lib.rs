//! CEL type system
//!
//! This crate defines the CEL type algebra and the pieces built on it:
//! - [`CelType`] with exact, equivalent and assignable comparisons
//! - [`Mapping`] and the unification helpers used for generic overloads
//! - [`Namespace`] for container-relative name resolution
//! - Identifier and function declarations consumed by the checker

pub mod decls;
pub mod mapping;
pub mod namespace;
pub mod type_system;

pub use decls::{FunctionDecl, IdentDecl, OverloadDecl};
pub use mapping::{
    Mapping, function_type, is_assignable, is_assignable_list, most_general, substitute,
};
pub use namespace::{Namespace, to_qualified_name};
pub use type_system::{CelType, TypeKind, is_assignable_type, is_equivalent_type, is_exact_type};
