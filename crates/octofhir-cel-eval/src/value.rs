//! CEL runtime values
//!
//! [`Value`] is the single runtime representation shared by the planner, the
//! interpreter and host functions. Protobuf messages are normalized on the way
//! in: wrapper messages become scalars and the JSON well-known types become
//! lists and maps (see [`Value::from_message`]).

use crate::error::{CelError, CelResult};
use indexmap::IndexMap;
use octofhir_cel_ast::Constant;
use octofhir_cel_types::CelType;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// A CEL runtime value
///
/// `PartialEq` compares representations, so `Int(1) != Uint(1)`; CEL equality
/// across numeric types is [`crate::equals`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    List(Arc<[Value]>),
    Map(Arc<MapValue>),
    Message(Arc<DynamicMessage>),
    /// An unset message-typed field: equal to `null`, reads like a default instance
    NullMessage(MessageDescriptor),
    Type(CelType),
    /// Result of `a.?b` and `a[?b]`
    Optional(Option<Box<Value>>),
}

impl Value {
    /// Runtime type of the value, as returned by `type(x)`
    pub fn type_of(&self) -> CelType {
        match self {
            Self::Null | Self::NullMessage(_) => CelType::Null,
            Self::Bool(_) => CelType::Bool,
            Self::Int(_) => CelType::Int,
            Self::Uint(_) => CelType::Uint,
            Self::Double(_) => CelType::Double,
            Self::String(_) => CelType::String,
            Self::Bytes(_) => CelType::Bytes,
            Self::List(_) => CelType::list(CelType::Dyn),
            Self::Map(_) => CelType::map(CelType::Dyn, CelType::Dyn),
            Self::Message(msg) => CelType::Object(msg.descriptor()),
            Self::Type(_) => CelType::Type(None),
            Self::Optional(_) => CelType::optional(CelType::Dyn),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::NullMessage(_))
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Double(d) if d.is_nan())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Whether the value may be passed where `ty` is expected
    ///
    /// Only the outer shape is checked: any list matches `list(int)`.
    pub fn matches_type(&self, ty: &CelType) -> bool {
        match (ty, self) {
            (CelType::Dyn | CelType::TypeParam(_) | CelType::Error, _) => true,
            (CelType::Null, Self::Null | Self::NullMessage(_))
            | (CelType::Bool, Self::Bool(_))
            | (CelType::Int, Self::Int(_))
            | (CelType::Uint, Self::Uint(_))
            | (CelType::Double, Self::Double(_))
            | (CelType::String, Self::String(_))
            | (CelType::Bytes, Self::Bytes(_))
            | (CelType::List(_), Self::List(_))
            | (CelType::Map(..), Self::Map(_))
            | (CelType::Type(_), Self::Type(_)) => true,
            (CelType::Object(desc), Self::Message(msg)) => {
                msg.descriptor().full_name() == desc.full_name()
            }
            (CelType::Object(desc), Self::NullMessage(null)) => {
                null.full_name() == desc.full_name()
            }
            (CelType::Object(_), value) => ty
                .wrapper_scalar()
                .is_some_and(|scalar| value.is_null() || value.matches_type(&scalar)),
            (CelType::Opaque { name, .. }, Self::Optional(_)) => name == "optional_type",
            _ => false,
        }
    }

    /// Convert to JSON
    ///
    /// Messages, bytes and type values have no JSON form here.
    pub fn to_json(&self) -> CelResult<JsonValue> {
        let json = match self {
            Self::Null | Self::NullMessage(_) => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Uint(u) => JsonValue::from(*u),
            Self::Double(d) => serde_json::Number::from_f64(*d)
                .map(JsonValue::Number)
                .ok_or_else(|| CelError::new(format!("{d} cannot be represented in JSON")))?,
            Self::String(s) => JsonValue::String(s.to_string()),
            Self::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<CelResult<Vec<_>>>()?,
            ),
            Self::Map(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map.iter() {
                    object.insert(key.to_string(), value.to_json()?);
                }
                JsonValue::Object(object)
            }
            Self::Optional(None) => JsonValue::Null,
            Self::Optional(Some(value)) => value.to_json()?,
            Self::Bytes(_) | Self::Message(_) | Self::Type(_) => {
                return Err(CelError::new(format!(
                    "{} cannot be converted to JSON",
                    self.type_of()
                )));
            }
        };
        Ok(json)
    }
}

// ============================================================================
// Map keys and maps
// ============================================================================

/// A map key: bool, int, uint or string
///
/// Numerically equal int and uint keys address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(Arc<str>),
}

impl MapKey {
    /// Key for a value, coercing integral doubles to int
    pub fn from_value(value: &Value) -> CelResult<Self> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Int(i) => Ok(Self::Int(*i)),
            Value::Uint(u) => Ok(Self::Uint(*u)),
            Value::String(s) => Ok(Self::String(Arc::clone(s))),
            Value::Double(d) if d.fract() == 0.0 => {
                if *d >= -9.223_372_036_854_776e18 && *d < 9.223_372_036_854_776e18 {
                    Ok(Self::Int(*d as i64))
                } else if *d >= 0.0 && *d < 1.844_674_407_370_955_2e19 {
                    Ok(Self::Uint(*d as u64))
                } else {
                    Err(CelError::unsupported_key_type())
                }
            }
            _ => Err(CelError::unsupported_key_type()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Uint(u) => Value::Uint(*u),
            Self::String(s) => Value::String(Arc::clone(s)),
        }
    }

    /// The same number under the other integer representation
    fn numeric_alias(&self) -> Option<Self> {
        match self {
            Self::Int(i) => u64::try_from(*i).ok().map(Self::Uint),
            Self::Uint(u) => i64::try_from(*u).ok().map(Self::Int),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Uint(u) => write!(f, "{u}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Insertion-ordered CEL map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValue {
    entries: IndexMap<MapKey, Value>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key; an int key also finds the equal uint key and vice versa
    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.get(key).or_else(|| {
            key.numeric_alias()
                .and_then(|alias| self.entries.get(&alias))
        })
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.get(key).is_some()
    }

    /// Insert an entry as given, replacing an identical key
    pub fn insert(&mut self, key: MapKey, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }
}

impl FromIterator<(MapKey, Value)> for MapValue {
    fn from_iter<I: IntoIterator<Item = (MapKey, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Uint(u64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(Arc::from(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Arc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(Arc::from(value))
    }
}

impl From<MapValue> for Value {
    fn from(value: MapValue) -> Self {
        Self::Map(Arc::new(value))
    }
}

impl From<CelType> for Value {
    fn from(value: CelType) -> Self {
        Self::Type(value)
    }
}

impl From<DynamicMessage> for Value {
    fn from(value: DynamicMessage) -> Self {
        Self::from_message(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Null => Self::Null,
            Constant::Bool(b) => Self::Bool(*b),
            Constant::Int(i) => Self::Int(*i),
            Constant::Uint(u) => Self::Uint(*u),
            Constant::Double(d) => Self::Double(*d),
            Constant::String(s) => Self::from(s.as_str()),
            Constant::Bytes(b) => Self::from(b.as_slice()),
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::Uint(u)
                } else {
                    Self::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::from(s.as_str()),
            JsonValue::Array(items) => Self::List(items.iter().map(Value::from).collect()),
            JsonValue::Object(object) => Self::from(
                object
                    .iter()
                    .map(|(k, v)| (MapKey::from(k.as_str()), Value::from(v)))
                    .collect::<MapValue>(),
            ),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Self::from(&json)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null | Self::NullMessage(_) => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Uint(u) => write!(f, "{u}u"),
            Self::Double(d) => write!(f, "{d:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {value}", key.to_value())?;
                }
                f.write_str("}")
            }
            Self::Message(msg) => write!(f, "{}{{..}}", msg.descriptor().full_name()),
            Self::Type(ty) => write!(f, "{ty}"),
            Self::Optional(None) => f.write_str("optional.none()"),
            Self::Optional(Some(value)) => write!(f, "optional.of({value})"),
        }
    }
}
