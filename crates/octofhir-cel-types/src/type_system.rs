//! CEL type algebra
//!
//! This module defines [`CelType`], the closed set of kinds the checker and the
//! runtime agree on, and the three ways types are compared:
//! - exact: structural equality including type parameter names
//! - equivalent: structural equality ignoring type parameter names
//! - assignable: one-directional compatibility where `dyn` and `error` match
//!   anything and protobuf wrapper messages behave as nullable scalars

use prost_reflect::MessageDescriptor;
use std::fmt;

/// Well-known wrapper messages and the scalar each one boxes
const WRAPPERS: [(&str, CelType); 9] = [
    ("google.protobuf.BoolValue", CelType::Bool),
    ("google.protobuf.BytesValue", CelType::Bytes),
    ("google.protobuf.DoubleValue", CelType::Double),
    ("google.protobuf.FloatValue", CelType::Double),
    ("google.protobuf.Int32Value", CelType::Int),
    ("google.protobuf.Int64Value", CelType::Int),
    ("google.protobuf.StringValue", CelType::String),
    ("google.protobuf.UInt32Value", CelType::Uint),
    ("google.protobuf.UInt64Value", CelType::Uint),
];

/// Coarse classification used by unification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar,
    Dyn,
    Type,
    List,
    Map,
    Object,
    Opaque,
    TypeParam,
    Error,
}

/// A CEL type
#[derive(Debug, Clone)]
pub enum CelType {
    // === Scalars ===
    Int,
    Uint,
    Double,
    Bool,
    String,
    Bytes,
    Null,
    Dyn,

    // === Type values ===
    /// `type` or `type(T)` when the described type is known
    Type(Option<Box<CelType>>),

    // === Aggregates ===
    List(Box<CelType>),
    /// Keys are restricted to int, uint, bool, string or dyn
    Map(Box<CelType>, Box<CelType>),

    // === Named types ===
    /// Protobuf message type
    Object(MessageDescriptor),
    /// Parameterized abstract type such as `optional_type(T)` or `function`
    Opaque { name: String, params: Vec<CelType> },
    /// Unification variable
    TypeParam(String),

    /// Result of a failed type computation; assignable to and from anything
    Error,
}

impl CelType {
    // === Constructors ===

    pub fn list(elem: CelType) -> Self {
        Self::List(Box::new(elem))
    }

    pub fn map(key: CelType, value: CelType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// Type of a type value describing `ty`
    pub fn type_of(ty: CelType) -> Self {
        Self::Type(Some(Box::new(ty)))
    }

    pub fn opaque(name: impl Into<String>, params: Vec<CelType>) -> Self {
        Self::Opaque {
            name: name.into(),
            params,
        }
    }

    pub fn optional(elem: CelType) -> Self {
        Self::opaque("optional_type", vec![elem])
    }

    pub fn type_param(name: impl Into<String>) -> Self {
        Self::TypeParam(name.into())
    }

    /// CEL type of a protobuf message
    ///
    /// JSON well-known types map onto their CEL-native shape; wrappers,
    /// `Timestamp`, `Duration` and user messages stay object types.
    pub fn message(desc: MessageDescriptor) -> Self {
        match desc.full_name() {
            "google.protobuf.Any" | "google.protobuf.Value" => Self::Dyn,
            "google.protobuf.Struct" => Self::map(Self::String, Self::Dyn),
            "google.protobuf.ListValue" => Self::list(Self::Dyn),
            _ => Self::Object(desc),
        }
    }

    /// Type denoted by a builtin type identifier (`int`, `list`, `null_type`, ...)
    pub fn from_type_name(name: &str) -> Option<Self> {
        let ty = match name {
            "int" => Self::Int,
            "uint" => Self::Uint,
            "double" => Self::Double,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            "null_type" => Self::Null,
            "dyn" => Self::Dyn,
            "type" => Self::Type(None),
            "list" => Self::list(Self::Dyn),
            "map" => Self::map(Self::Dyn, Self::Dyn),
            _ => return None,
        };
        Some(ty)
    }

    // === Properties ===

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Int
            | Self::Uint
            | Self::Double
            | Self::Bool
            | Self::String
            | Self::Bytes
            | Self::Null => TypeKind::Scalar,
            Self::Dyn => TypeKind::Dyn,
            Self::Type(_) => TypeKind::Type,
            Self::List(_) => TypeKind::List,
            Self::Map(..) => TypeKind::Map,
            Self::Object(_) => TypeKind::Object,
            Self::Opaque { .. } => TypeKind::Opaque,
            Self::TypeParam(_) => TypeKind::TypeParam,
            Self::Error => TypeKind::Error,
        }
    }

    /// Runtime type name, as returned by `type(x)`
    pub fn name(&self) -> &str {
        match self {
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Null => "null_type",
            Self::Dyn => "dyn",
            Self::Type(_) => "type",
            Self::List(_) => "list",
            Self::Map(..) => "map",
            Self::Object(desc) => desc.full_name(),
            Self::Opaque { name, .. } => name,
            Self::TypeParam(name) => name,
            Self::Error => "*error*",
        }
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Self::Dyn)
    }

    pub fn is_dyn_or_error(&self) -> bool {
        matches!(self, Self::Dyn | Self::Error)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Scalar boxed by a protobuf wrapper message
    pub fn wrapper_scalar(&self) -> Option<CelType> {
        let Self::Object(desc) = self else {
            return None;
        };
        WRAPPERS
            .iter()
            .find(|(name, _)| *name == desc.full_name())
            .map(|(_, scalar)| scalar.clone())
    }

    /// Type parameters of opaque types, the element of lists, key and value of maps
    pub fn parameters(&self) -> Vec<&CelType> {
        match self {
            Self::List(elem) => vec![&**elem],
            Self::Map(key, value) => vec![&**key, &**value],
            Self::Type(Some(ty)) => vec![&**ty],
            Self::Opaque { params, .. } => params.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the type mentions any type parameter
    pub fn has_type_params(&self) -> bool {
        matches!(self, Self::TypeParam(_))
            || self.parameters().into_iter().any(CelType::has_type_params)
    }

    /// Collect the names of type parameters in first-occurrence order
    pub fn collect_type_params(&self, out: &mut Vec<String>) {
        if let Self::TypeParam(name) = self {
            if !out.contains(name) {
                out.push(name.clone());
            }
            return;
        }
        for param in self.parameters() {
            param.collect_type_params(out);
        }
    }
}

impl PartialEq for CelType {
    fn eq(&self, other: &Self) -> bool {
        is_exact_type(self, other)
    }
}

impl Eq for CelType {}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(Some(ty)) => write!(f, "type({ty})"),
            Self::List(elem) => write!(f, "list({elem})"),
            Self::Map(key, value) => write!(f, "map({key}, {value})"),
            Self::Opaque { name, params } if !params.is_empty() => {
                let params: Vec<String> = params.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", name, params.join(", "))
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Structural equality including type parameter names
pub fn is_exact_type(t1: &CelType, t2: &CelType) -> bool {
    structurally_equal(t1, t2, true)
}

/// Structural equality ignoring type parameter names
pub fn is_equivalent_type(t1: &CelType, t2: &CelType) -> bool {
    structurally_equal(t1, t2, false)
}

fn structurally_equal(t1: &CelType, t2: &CelType, param_names: bool) -> bool {
    match (t1, t2) {
        (CelType::TypeParam(a), CelType::TypeParam(b)) => !param_names || a == b,
        (CelType::Object(a), CelType::Object(b)) => a.full_name() == b.full_name(),
        (CelType::Type(None), CelType::Type(None)) => true,
        (CelType::Type(Some(a)), CelType::Type(Some(b)))
        | (CelType::List(a), CelType::List(b)) => structurally_equal(a, b, param_names),
        (CelType::Map(k1, v1), CelType::Map(k2, v2)) => {
            structurally_equal(k1, k2, param_names) && structurally_equal(v1, v2, param_names)
        }
        (CelType::Opaque { name: n1, params: p1 }, CelType::Opaque { name: n2, params: p2 }) => {
            n1 == n2
                && p1.len() == p2.len()
                && p1
                    .iter()
                    .zip(p2)
                    .all(|(a, b)| structurally_equal(a, b, param_names))
        }
        (CelType::Int, CelType::Int)
        | (CelType::Uint, CelType::Uint)
        | (CelType::Double, CelType::Double)
        | (CelType::Bool, CelType::Bool)
        | (CelType::String, CelType::String)
        | (CelType::Bytes, CelType::Bytes)
        | (CelType::Null, CelType::Null)
        | (CelType::Dyn, CelType::Dyn)
        | (CelType::Error, CelType::Error) => true,
        _ => false,
    }
}

/// Whether a value of type `from` may be used where `target` is expected
///
/// Type parameters only match by name here; binding them is the job of
/// [`crate::is_assignable`].
pub fn is_assignable_type(target: &CelType, from: &CelType) -> bool {
    if target.is_dyn_or_error() || from.is_dyn_or_error() {
        return true;
    }
    if let Some(scalar) = target.wrapper_scalar() {
        if from.is_null() {
            return true;
        }
        let from_scalar = from.wrapper_scalar();
        return is_assignable_type(&scalar, from_scalar.as_ref().unwrap_or(from));
    }
    if let Some(scalar) = from.wrapper_scalar() {
        return is_assignable_type(target, &scalar);
    }

    match (target, from) {
        (CelType::List(a), CelType::List(b)) => is_assignable_type(a, b),
        (CelType::Map(k1, v1), CelType::Map(k2, v2)) => {
            is_assignable_type(k1, k2) && is_assignable_type(v1, v2)
        }
        (CelType::Type(None), CelType::Type(_)) | (CelType::Type(_), CelType::Type(None)) => true,
        (CelType::Type(Some(a)), CelType::Type(Some(b))) => is_assignable_type(a, b),
        (CelType::Opaque { name: n1, params: p1 }, CelType::Opaque { name: n2, params: p2 }) => {
            n1 == n2
                && p1.len() == p2.len()
                && p1.iter().zip(p2).all(|(a, b)| is_assignable_type(a, b))
        }
        _ => is_exact_type(target, from),
    }
}
