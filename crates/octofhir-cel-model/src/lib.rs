//! CEL type model
//!
//! This crate provides:
//! - The [`TypeProvider`] interface used by the checker and planner to resolve
//!   identifiers, message types, fields and enum values
//! - [`ProtoRegistry`], the provider implementation over a protobuf descriptor pool

pub mod provider;
pub mod registry;

pub use provider::*;
pub use registry::*;
