//! CEL type checker
//!
//! This crate provides:
//! - [`CheckerEnv`]: container, type provider and declarations for a check
//! - [`standard_declarations`]: signatures of the operators and built-in functions
//! - [`check`]: assigns a type to every node of a parsed expression
//!
//! ## Example
//!
//! ```ignore
//! use octofhir_cel_checker::{check, CheckerEnv};
//! use octofhir_cel_types::{CelType, IdentDecl};
//!
//! let mut env = CheckerEnv::default();
//! env.add_idents([IdentDecl::new("age", CelType::Int)])?;
//! let checked = check(&octofhir_cel_parser::parse("age >= 18")?, &env)?;
//! assert_eq!(checked.result_type(), &CelType::Bool);
//! ```

pub mod checker;
pub mod env;
pub mod scope;
pub mod stdlib;

pub use checker::{CheckIssue, CheckedExpr, Reference, check};
pub use env::{AggregateLiteralElementType, CheckerEnv, CheckerOptions};
pub use scope::{Group, Scopes};
pub use stdlib::{CROSS_TYPE_NUMERIC_COMPARISONS, standard_declarations};
