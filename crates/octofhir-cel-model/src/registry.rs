//! Protobuf-backed type registry
//!
//! [`ProtoRegistry`] wraps a `prost_reflect::DescriptorPool` and a reverse map
//! from type names to [`CelType`]s. The pool starts from the global pool so the
//! well-known types (`Timestamp`, `Duration`, wrappers, `Struct`, ...) are
//! always available.

use crate::provider::{IdentValue, TypeProvider};
use indexmap::IndexMap;
use octofhir_cel_diagnostics::{CEL0400, CEL0401, CompileError, Result};
use octofhir_cel_types::{CelType, is_equivalent_type};
use prost_reflect::prost_types::FileDescriptorProto;
use prost_reflect::{DescriptorPool, FieldDescriptor, Kind, MessageDescriptor};

/// Type names every registry knows about
const BUILTIN_TYPE_NAMES: [&str; 10] = [
    "bool",
    "bytes",
    "double",
    "int",
    "list",
    "map",
    "null_type",
    "string",
    "type",
    "uint",
];

/// Registry of CEL types and protobuf descriptors
#[derive(Debug, Clone)]
pub struct ProtoRegistry {
    pool: DescriptorPool,
    types: IndexMap<String, CelType>,
}

impl ProtoRegistry {
    /// Registry over the global pool with the builtin types registered
    pub fn new() -> Self {
        Self::from_pool(DescriptorPool::global())
    }

    /// Registry over an existing pool
    ///
    /// Messages already in the pool can be looked up as struct types, but only
    /// registered ones resolve as identifiers.
    pub fn from_pool(pool: DescriptorPool) -> Self {
        let mut types = IndexMap::new();
        for name in BUILTIN_TYPE_NAMES {
            if let Some(ty) = CelType::from_type_name(name) {
                types.insert(name.to_string(), ty);
            }
        }
        for name in ["google.protobuf.Duration", "google.protobuf.Timestamp"] {
            if let Some(desc) = pool.get_message_by_name(name) {
                types.insert(name.to_string(), CelType::Object(desc));
            }
        }
        Self { pool, types }
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Registered type names, in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn find_message(&self, name: &str) -> Option<MessageDescriptor> {
        self.pool.get_message_by_name(name)
    }

    // === Registration ===

    /// Register a type under its name
    ///
    /// Registering an equivalent type twice is a no-op; a different type under
    /// an existing name is a conflict.
    pub fn register_type(&mut self, ty: CelType) -> Result<()> {
        match self.types.get(ty.name()) {
            None => {
                self.types.insert(ty.name().to_string(), ty);
                Ok(())
            }
            Some(existing) if is_equivalent_type(existing, &ty) => Ok(()),
            Some(existing) => Err(CompileError::model(
                CEL0400,
                format!("type registration conflict. found: {existing}, input: {ty}"),
            )),
        }
    }

    /// Register a message and every message declared in its file
    pub fn register_message(&mut self, desc: &MessageDescriptor) -> Result<()> {
        let file = desc.parent_file();
        for message in file.messages() {
            self.register_message_tree(message)?;
        }
        Ok(())
    }

    /// Add a file to the pool and register its messages
    pub fn register_file(&mut self, file: FileDescriptorProto) -> Result<()> {
        let name = file.name().to_string();
        self.pool
            .add_file_descriptor_proto(file)
            .map_err(|e| CompileError::model(CEL0401, e.to_string()))?;
        let file = self.pool.get_file_by_name(&name).ok_or_else(|| {
            CompileError::model(CEL0401, format!("file not found after registration: {name}"))
        })?;
        let before = self.types.len();
        for message in file.messages() {
            self.register_message_tree(message)?;
        }
        log::debug!(
            "registered {} message types from {}",
            self.types.len() - before,
            name
        );
        Ok(())
    }

    /// Decode a serialized `FileDescriptorSet` into the pool and register its messages
    pub fn register_file_descriptor_set(&mut self, bytes: &[u8]) -> Result<()> {
        self.pool
            .decode_file_descriptor_set(bytes)
            .map_err(|e| CompileError::model(CEL0401, e.to_string()))?;
        let messages: Vec<MessageDescriptor> = self.pool.all_messages().collect();
        for message in messages {
            if !message.is_map_entry() {
                self.register_type(CelType::Object(message))?;
            }
        }
        Ok(())
    }

    fn register_message_tree(&mut self, desc: MessageDescriptor) -> Result<()> {
        if desc.is_map_entry() {
            return Ok(());
        }
        for child in desc.child_messages() {
            self.register_message_tree(child)?;
        }
        self.register_type(CelType::Object(desc))
    }
}

impl Default for ProtoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeProvider for ProtoRegistry {
    fn enum_value(&self, name: &str) -> Option<i64> {
        let (enum_name, value_name) = name.rsplit_once('.')?;
        let desc = self.pool.get_enum_by_name(enum_name)?;
        let value = desc.get_value_by_name(value_name)?;
        Some(i64::from(value.number()))
    }

    fn find_ident(&self, name: &str) -> Option<IdentValue> {
        if let Some(ty) = self.types.get(name) {
            return Some(IdentValue::Type(ty.clone()));
        }
        self.enum_value(name).map(IdentValue::EnumValue)
    }

    fn find_struct_type(&self, name: &str) -> Option<CelType> {
        self.pool.get_message_by_name(name).map(CelType::Object)
    }

    fn find_struct_field_names(&self, type_name: &str) -> Option<Vec<String>> {
        let desc = self.pool.get_message_by_name(type_name)?;
        Some(desc.fields().map(|f| f.name().to_string()).collect())
    }

    fn find_struct_field_type(&self, type_name: &str, field_name: &str) -> Option<CelType> {
        let desc = self.pool.get_message_by_name(type_name)?;
        let field = desc.get_field_by_name(field_name)?;
        Some(field_type(&field))
    }
}

/// CEL type of a message field
///
/// Repeated fields become lists, map fields maps, enums `int`.
pub fn field_type(field: &FieldDescriptor) -> CelType {
    if field.is_map() {
        if let Kind::Message(entry) = field.kind() {
            return CelType::map(
                kind_type(&entry.map_entry_key_field().kind()),
                kind_type(&entry.map_entry_value_field().kind()),
            );
        }
    }
    let elem = kind_type(&field.kind());
    if field.is_list() {
        CelType::list(elem)
    } else {
        elem
    }
}

fn kind_type(kind: &Kind) -> CelType {
    match kind {
        Kind::Double | Kind::Float => CelType::Double,
        Kind::Int32
        | Kind::Int64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Sfixed32
        | Kind::Sfixed64
        | Kind::Enum(_) => CelType::Int,
        Kind::Uint32 | Kind::Uint64 | Kind::Fixed32 | Kind::Fixed64 => CelType::Uint,
        Kind::Bool => CelType::Bool,
        Kind::String => CelType::String,
        Kind::Bytes => CelType::Bytes,
        Kind::Message(desc) => CelType::message(desc.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_identifiers_resolve_to_types() {
        let registry = ProtoRegistry::new();
        assert_eq!(
            registry.find_ident("int"),
            Some(IdentValue::Type(CelType::Int))
        );
        assert_eq!(
            registry.find_ident("map"),
            Some(IdentValue::Type(CelType::map(CelType::Dyn, CelType::Dyn)))
        );
        assert!(matches!(
            registry.find_ident("google.protobuf.Timestamp"),
            Some(IdentValue::Type(CelType::Object(_)))
        ));
        assert_eq!(registry.find_ident("nope"), None);
    }

    #[test]
    fn test_register_type_conflict() {
        let mut registry = ProtoRegistry::new();
        assert!(registry.register_type(CelType::Int).is_ok());

        let err = registry
            .register_type(CelType::opaque("int", vec![]))
            .unwrap_err();
        assert_eq!(err.code(), CEL0400);
        assert_eq!(
            err.message(),
            "type registration conflict. found: int, input: int"
        );
    }

    #[test]
    fn test_wkt_struct_type_and_fields() {
        let registry = ProtoRegistry::new();
        let ty = registry.find_struct_type("google.protobuf.Duration");
        assert_eq!(
            ty.map(|t| t.name().to_string()),
            Some("google.protobuf.Duration".to_string())
        );
        assert_eq!(
            registry.find_struct_field_names("google.protobuf.Duration"),
            Some(vec!["seconds".to_string(), "nanos".to_string()])
        );
        assert_eq!(
            registry.find_struct_field_type("google.protobuf.Duration", "nanos"),
            Some(CelType::Int)
        );
        assert_eq!(
            registry.find_struct_field_type("google.protobuf.Duration", "missing"),
            None
        );
    }

    #[test]
    fn test_struct_fields_use_json_shapes() {
        let registry = ProtoRegistry::new();
        assert_eq!(
            registry.find_struct_field_type("google.protobuf.Struct", "fields"),
            Some(CelType::map(CelType::String, CelType::Dyn))
        );
        assert_eq!(
            registry.find_struct_field_type("google.protobuf.ListValue", "values"),
            Some(CelType::list(CelType::Dyn))
        );
    }
}
