//! Type provider interface

use octofhir_cel_types::CelType;
use std::fmt;

/// What a qualified identifier resolves to outside of variable bindings
#[derive(Debug, Clone, PartialEq)]
pub enum IdentValue {
    /// A type name such as `int` or `google.protobuf.Duration`
    Type(CelType),
    /// An enum constant, always typed `int`
    EnumValue(i64),
}

/// Trait for resolving names against a type registry
///
/// All names are fully qualified; container-relative resolution happens in the
/// caller through `octofhir_cel_types::Namespace`.
pub trait TypeProvider: fmt::Debug + Send + Sync {
    /// Numeric value of `pkg.Enum.VALUE`
    fn enum_value(&self, name: &str) -> Option<i64>;

    /// Registered type name or enum value
    fn find_ident(&self, name: &str) -> Option<IdentValue>;

    /// Message type by qualified name
    fn find_struct_type(&self, name: &str) -> Option<CelType>;

    /// Field names of a message type, in declaration order
    fn find_struct_field_names(&self, type_name: &str) -> Option<Vec<String>>;

    /// CEL type of one message field
    fn find_struct_field_type(&self, type_name: &str, field_name: &str) -> Option<CelType>;
}
