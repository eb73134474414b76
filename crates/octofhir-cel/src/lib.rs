//! Common Expression Language (CEL) implementation for Rust
//!
//! This crate ties the pipeline together:
//! - Parsing CEL source text into expression trees
//! - Type checking against declared identifiers and functions
//! - Planning expressions into evaluable node trees
//! - Evaluating plans against variable bindings
//!
//! # Example
//!
//! ```
//! use octofhir_cel::{CelEnv, Value};
//!
//! let env = CelEnv::new();
//! env.set("limit", 10_i64);
//! assert_eq!(env.run("[3, 12, 7].filter(x, x < limit)"), Ok(Value::from(vec![
//!     Value::Int(3),
//!     Value::Int(7),
//! ])));
//! ```

mod env;

pub use env::{CelEnv, CelEnvBuilder, run};

// Re-export all public APIs from internal crates
pub use octofhir_cel_ast as ast;
pub use octofhir_cel_checker as checker;
pub use octofhir_cel_diagnostics as diagnostics;
pub use octofhir_cel_eval as eval;
pub use octofhir_cel_model as model;
pub use octofhir_cel_parser as parser;
pub use octofhir_cel_types as types;

// Convenience re-exports
pub use octofhir_cel_ast::{Expr, ParsedExpr};
pub use octofhir_cel_checker::{CheckedExpr, CheckerOptions};
pub use octofhir_cel_diagnostics::{CompileError, Diagnostic, Result};
pub use octofhir_cel_eval::{
    Activation, CelError, CelResult, Func, FuncRegistry, Interpretable, MapActivation, Overload,
    Value,
};
pub use octofhir_cel_model::ProtoRegistry;
pub use octofhir_cel_parser::{ParseOptions, parse};
pub use octofhir_cel_types::{CelType, FunctionDecl, IdentDecl, OverloadDecl};
