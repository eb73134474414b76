//! Protobuf message bridging
//!
//! Reading converts protobuf values into [`Value`]s and normalizes the
//! well-known types. Writing goes the other way for message construction.

use crate::error::{CelError, CelResult};
use crate::value::{MapKey, MapValue, Value};
use octofhir_cel_model::field_type;
use prost_reflect::{
    DynamicMessage, FieldDescriptor, Kind, MapKey as ProtoMapKey, MessageDescriptor, ReflectMessage,
    Value as ProtoValue,
};
use std::collections::HashMap;
use std::sync::Arc;

const WRAPPERS: [&str; 9] = [
    "google.protobuf.BoolValue",
    "google.protobuf.BytesValue",
    "google.protobuf.DoubleValue",
    "google.protobuf.FloatValue",
    "google.protobuf.Int32Value",
    "google.protobuf.Int64Value",
    "google.protobuf.StringValue",
    "google.protobuf.UInt32Value",
    "google.protobuf.UInt64Value",
];

const ANY: &str = "google.protobuf.Any";
const JSON_VALUE: &str = "google.protobuf.Value";
const JSON_STRUCT: &str = "google.protobuf.Struct";
const JSON_LIST: &str = "google.protobuf.ListValue";

fn is_wrapper(name: &str) -> bool {
    WRAPPERS.contains(&name)
}

pub(crate) fn is_any(msg: &DynamicMessage) -> bool {
    msg.descriptor().full_name() == ANY
}

impl Value {
    /// Wrap a message, normalizing well-known types
    ///
    /// Wrappers become their scalar, `Struct` a map, `ListValue` a list and
    /// `Value` whichever kind it holds. `Any` stays packed until it is read.
    pub fn from_message(msg: DynamicMessage) -> Self {
        let desc = msg.descriptor();
        let name = desc.full_name();
        if is_wrapper(name) {
            return msg
                .get_field_by_name("value")
                .map_or(Self::Null, |value| from_proto(&value));
        }
        match name {
            JSON_STRUCT => msg
                .get_field_by_name("fields")
                .map_or_else(|| Self::from(MapValue::new()), |fields| from_proto(&fields)),
            JSON_LIST => msg
                .get_field_by_name("values")
                .map_or_else(|| Self::from(Vec::<Value>::new()), |values| from_proto(&values)),
            JSON_VALUE => json_value(&msg),
            _ => Self::Message(Arc::new(msg)),
        }
    }

    /// Unpack a top-level `google.protobuf.Any`; other values are returned as is
    pub fn unpack_any(self) -> CelResult<Self> {
        match &self {
            Self::Message(msg) if is_any(msg) => unpack_any(msg),
            _ => Ok(self),
        }
    }
}

fn json_value(msg: &DynamicMessage) -> Value {
    match msg.fields().next() {
        Some((field, value)) if field.name() != "null_value" => from_proto(value),
        _ => Value::Null,
    }
}

/// Decode the payload of an `Any` using the descriptor pool it came from
pub(crate) fn unpack_any(msg: &DynamicMessage) -> CelResult<Value> {
    let type_url = msg
        .get_field_by_name("type_url")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let name = type_url.rsplit('/').next().unwrap_or_default();
    let desc = msg
        .descriptor()
        .parent_pool()
        .get_message_by_name(name)
        .ok_or_else(|| CelError::new(format!("unknown type in Any: '{type_url}'")))?;
    let payload = msg
        .get_field_by_name("value")
        .and_then(|v| v.as_bytes().cloned())
        .unwrap_or_default();
    let inner = DynamicMessage::decode(desc, payload)
        .map_err(|err| CelError::new(format!("failed to unpack Any: {err}")))?;
    Ok(Value::from_message(inner))
}

pub(crate) fn from_proto(value: &ProtoValue) -> Value {
    match value {
        ProtoValue::Bool(b) => Value::Bool(*b),
        ProtoValue::I32(v) => Value::Int(i64::from(*v)),
        ProtoValue::I64(v) => Value::Int(*v),
        ProtoValue::U32(v) => Value::Uint(u64::from(*v)),
        ProtoValue::U64(v) => Value::Uint(*v),
        ProtoValue::F32(v) => Value::Double(f64::from(*v)),
        ProtoValue::F64(v) => Value::Double(*v),
        ProtoValue::String(s) => Value::from(s.as_str()),
        ProtoValue::Bytes(b) => Value::from(b.as_ref()),
        ProtoValue::EnumNumber(n) => Value::Int(i64::from(*n)),
        ProtoValue::Message(msg) => Value::from_message(msg.clone()),
        ProtoValue::List(items) => Value::List(items.iter().map(from_proto).collect()),
        ProtoValue::Map(entries) => Value::from(
            entries
                .iter()
                .map(|(key, value)| (map_key_from_proto(key), from_proto(value)))
                .collect::<MapValue>(),
        ),
    }
}

fn map_key_from_proto(key: &ProtoMapKey) -> MapKey {
    match key {
        ProtoMapKey::Bool(b) => MapKey::Bool(*b),
        ProtoMapKey::I32(v) => MapKey::Int(i64::from(*v)),
        ProtoMapKey::I64(v) => MapKey::Int(*v),
        ProtoMapKey::U32(v) => MapKey::Uint(u64::from(*v)),
        ProtoMapKey::U64(v) => MapKey::Uint(*v),
        ProtoMapKey::String(s) => MapKey::from(s.as_str()),
    }
}

// ============================================================================
// Field access
// ============================================================================

/// Read a field; `None` when the message type has no such field
///
/// Unset singular message fields read as typed nulls, except the well-known
/// types which read as their CEL zero value.
pub(crate) fn get_field(msg: &DynamicMessage, name: &str) -> Option<Value> {
    let field = msg.descriptor().get_field_by_name(name)?;
    if !field.is_list() && !field.is_map() {
        if let Kind::Message(desc) = field.kind() {
            if !msg.has_field(&field) {
                return Some(unset_message(desc));
            }
        }
    }
    Some(from_proto(&msg.get_field(&field)))
}

fn unset_message(desc: MessageDescriptor) -> Value {
    let name = desc.full_name();
    if is_wrapper(name) || name == ANY || name == JSON_VALUE {
        return Value::Null;
    }
    match name {
        JSON_STRUCT => Value::from(MapValue::new()),
        JSON_LIST => Value::from(Vec::<Value>::new()),
        _ => Value::NullMessage(desc),
    }
}

/// Presence of a field; `None` when the message type has no such field
pub(crate) fn has_field(msg: &DynamicMessage, name: &str) -> Option<bool> {
    let field = msg.descriptor().get_field_by_name(name)?;
    if field.is_list() || field.is_map() {
        let present = match &*msg.get_field(&field) {
            ProtoValue::List(items) => !items.is_empty(),
            ProtoValue::Map(entries) => !entries.is_empty(),
            _ => false,
        };
        return Some(present);
    }
    Some(msg.has_field(&field))
}

// ============================================================================
// Construction
// ============================================================================

/// Build a message of type `desc` from field initializers
///
/// A `null` initializer leaves the field unset.
pub fn build_message(desc: &MessageDescriptor, fields: Vec<(String, Value)>) -> CelResult {
    let mut msg = DynamicMessage::new(desc.clone());
    for (name, value) in fields {
        let field = desc.get_field_by_name(&name).ok_or_else(|| {
            CelError::new(format!(
                "no such field '{name}' in message '{}'",
                desc.full_name()
            ))
        })?;
        if value.is_null() && !matches!(field.kind(), Kind::Message(ref m) if m.full_name() == JSON_VALUE)
        {
            continue;
        }
        let converted = to_proto_field(&field, &value)?;
        msg.try_set_field(&field, converted)
            .map_err(|err| CelError::new(err.to_string()))?;
    }
    Ok(Value::from_message(msg))
}

fn mismatch(field: &FieldDescriptor, value: &Value) -> CelError {
    CelError::new(format!(
        "field '{}' expects {}, found {}",
        field.name(),
        field_type(field),
        value.type_of()
    ))
}

fn out_of_range(field: &FieldDescriptor) -> CelError {
    CelError::new(format!("value out of range for field '{}'", field.name()))
}

fn to_proto_field(field: &FieldDescriptor, value: &Value) -> CelResult<ProtoValue> {
    if field.is_map() {
        let (Value::Map(map), Kind::Message(entry)) = (value, field.kind()) else {
            return Err(mismatch(field, value));
        };
        let key_field = entry.map_entry_key_field();
        let value_field = entry.map_entry_value_field();
        let mut entries = HashMap::with_capacity(map.len());
        for (key, item) in map.iter() {
            entries.insert(
                to_proto_key(&key_field, key).ok_or_else(|| mismatch(field, &key.to_value()))?,
                to_proto_single(&value_field, item)?,
            );
        }
        return Ok(ProtoValue::Map(entries));
    }
    if field.is_list() {
        let Value::List(items) = value else {
            return Err(mismatch(field, value));
        };
        return items
            .iter()
            .map(|item| to_proto_single(field, item))
            .collect::<CelResult<Vec<_>>>()
            .map(ProtoValue::List);
    }
    to_proto_single(field, value)
}

fn to_proto_single(field: &FieldDescriptor, value: &Value) -> CelResult<ProtoValue> {
    let converted = match (field.kind(), value) {
        (Kind::Bool, Value::Bool(b)) => ProtoValue::Bool(*b),
        (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, Value::Int(i)) => {
            ProtoValue::I32(i32::try_from(*i).map_err(|_| out_of_range(field))?)
        }
        (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Value::Int(i)) => ProtoValue::I64(*i),
        (Kind::Uint32 | Kind::Fixed32, Value::Uint(u)) => {
            ProtoValue::U32(u32::try_from(*u).map_err(|_| out_of_range(field))?)
        }
        (Kind::Uint64 | Kind::Fixed64, Value::Uint(u)) => ProtoValue::U64(*u),
        (Kind::Float, Value::Double(d)) => ProtoValue::F32(*d as f32),
        (Kind::Double, Value::Double(d)) => ProtoValue::F64(*d),
        (Kind::String, Value::String(s)) => ProtoValue::String(s.to_string()),
        (Kind::Bytes, Value::Bytes(b)) => ProtoValue::Bytes(b.to_vec().into()),
        (Kind::Enum(_), Value::Int(i)) => {
            ProtoValue::EnumNumber(i32::try_from(*i).map_err(|_| out_of_range(field))?)
        }
        (Kind::Message(desc), value) => ProtoValue::Message(to_proto_message(&desc, field, value)?),
        _ => return Err(mismatch(field, value)),
    };
    Ok(converted)
}

fn to_proto_message(
    desc: &MessageDescriptor,
    field: &FieldDescriptor,
    value: &Value,
) -> CelResult<DynamicMessage> {
    let name = desc.full_name();
    if let Value::Message(msg) = value {
        if msg.descriptor().full_name() == name {
            return Ok((**msg).clone());
        }
    }
    if is_wrapper(name) || name == JSON_STRUCT || name == JSON_LIST {
        // single-field envelopes: `value`, `fields` or `values`
        let inner = desc.fields().next().ok_or_else(|| mismatch(field, value))?;
        let mut msg = DynamicMessage::new(desc.clone());
        msg.try_set_field(&inner, to_proto_field(&inner, value)?)
            .map_err(|_| mismatch(field, value))?;
        return Ok(msg);
    }
    if name == JSON_VALUE {
        return json_message(desc, field, value);
    }
    Err(mismatch(field, value))
}

fn json_message(
    desc: &MessageDescriptor,
    field: &FieldDescriptor,
    value: &Value,
) -> CelResult<DynamicMessage> {
    let kind = match value {
        Value::Null | Value::NullMessage(_) => "null_value",
        Value::Bool(_) => "bool_value",
        Value::Int(_) | Value::Uint(_) | Value::Double(_) => "number_value",
        Value::String(_) => "string_value",
        Value::List(_) => "list_value",
        Value::Map(_) => "struct_value",
        _ => return Err(mismatch(field, value)),
    };
    let inner = desc
        .get_field_by_name(kind)
        .ok_or_else(|| mismatch(field, value))?;
    let converted = match value {
        Value::Null | Value::NullMessage(_) => ProtoValue::EnumNumber(0),
        Value::Int(i) => ProtoValue::F64(*i as f64),
        Value::Uint(u) => ProtoValue::F64(*u as f64),
        other => to_proto_single(&inner, other)?,
    };
    let mut msg = DynamicMessage::new(desc.clone());
    msg.try_set_field(&inner, converted)
        .map_err(|_| mismatch(field, value))?;
    Ok(msg)
}

fn to_proto_key(field: &FieldDescriptor, key: &MapKey) -> Option<ProtoMapKey> {
    let converted = match (field.kind(), key) {
        (Kind::String, MapKey::String(s)) => ProtoMapKey::String(s.to_string()),
        (Kind::Bool, MapKey::Bool(b)) => ProtoMapKey::Bool(*b),
        (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, MapKey::Int(i)) => {
            ProtoMapKey::I32(i32::try_from(*i).ok()?)
        }
        (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, MapKey::Int(i)) => ProtoMapKey::I64(*i),
        (Kind::Uint32 | Kind::Fixed32, MapKey::Uint(u)) => ProtoMapKey::U32(u32::try_from(*u).ok()?),
        (Kind::Uint64 | Kind::Fixed64, MapKey::Uint(u)) => ProtoMapKey::U64(*u),
        _ => return None,
    };
    Some(converted)
}
