//! CEL Evaluation Engine
//!
//! This crate turns parsed (and optionally checked) CEL expressions into
//! executable plans and evaluates them against variable bindings:
//!
//! - **Values**: [`Value`] covers scalars, lists, maps, protobuf messages,
//!   type values and optionals
//! - **Planning**: [`Planner`] resolves functions, message types and qualified
//!   identifiers once per expression
//! - **Evaluation**: [`Interpretable::eval`] walks the plan against any
//!   [`Activation`]
//! - **Functions**: [`FuncRegistry`] and [`OrderedDispatcher`] hold the
//!   standard library and host-provided overloads
//!
//! # Example
//!
//! ```ignore
//! use octofhir_cel_eval::{MapActivation, OrderedDispatcher, Planner, Value};
//! use octofhir_cel_model::ProtoRegistry;
//! use octofhir_cel_types::Namespace;
//! use std::sync::Arc;
//!
//! let planner = Planner::new(
//!     OrderedDispatcher::standard(),
//!     Arc::new(ProtoRegistry::new()),
//!     Namespace::root(),
//! );
//! let parsed = octofhir_cel_parser::parse("x * 2 > 10")?;
//! let plan = planner.plan(&parsed.expr)?;
//! let vars = MapActivation::new().with("x", 6i64);
//! assert_eq!(plan.eval(&vars), Ok(Value::Bool(true)));
//! ```
//!
//! # Errors as Values
//!
//! Runtime failures are [`CelError`] values rather than panics or compile
//! errors. They travel up the plan like any other result, so operators that do
//! not need an operand can ignore its error:
//!
//! - `false && (1 / 0 == 1)` is `false`
//! - `true || error` is `true`
//! - comprehensions stop as soon as the loop condition is not `true`

pub mod activation;
pub mod attribute;
pub mod equals;
pub mod error;
pub mod interpretable;
pub mod message;
pub mod operators;
pub mod planner;
pub mod registry;
pub mod value;

pub use activation::{
    Activation, EmptyActivation, HierarchicalActivation, MapActivation, VarActivation,
};
pub use attribute::{Access, Attribute};
pub use equals::{compare, equals};
pub use error::{CelError, CelResult};
pub use interpretable::Interpretable;
pub use message::build_message;
pub use operators::standard_functions;
pub use planner::Planner;
pub use registry::{
    BinaryOpFn, Func, FuncRegistry, NaryOpFn, NonStrictOpFn, OrderedDispatcher, Overload,
    OverloadImpl, UnaryOpFn,
};
pub use value::{MapKey, MapValue, Value};
