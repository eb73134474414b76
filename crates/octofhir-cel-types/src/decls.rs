//! Identifier and function declarations
//!
//! Declarations describe what the checker may reference: variables (with an
//! optional constant value, used for enum constants) and functions made of one
//! or more typed overloads.

use crate::mapping::function_type;
use crate::type_system::{CelType, is_equivalent_type};
use octofhir_cel_ast::Constant;

/// Variable or constant declaration
#[derive(Debug, Clone, PartialEq)]
pub struct IdentDecl {
    pub name: String,
    pub ty: CelType,
    pub value: Option<Constant>,
}

impl IdentDecl {
    pub fn new(name: impl Into<String>, ty: CelType) -> Self {
        Self {
            name: name.into(),
            ty,
            value: None,
        }
    }

    pub fn constant(name: impl Into<String>, ty: CelType, value: Constant) -> Self {
        Self {
            name: name.into(),
            ty,
            value: Some(value),
        }
    }
}

/// One signature of a function
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadDecl {
    /// Unique identifier such as `add_int64`
    pub id: String,
    /// Parameter types, receiver first for member overloads
    pub params: Vec<CelType>,
    pub result: CelType,
    pub is_member: bool,
}

impl OverloadDecl {
    /// Global function overload (`f(a, b)`)
    pub fn function(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Self {
        Self {
            id: id.into(),
            params,
            result,
            is_member: false,
        }
    }

    /// Receiver-style overload (`a.f(b)`); `params[0]` is the receiver
    pub fn method(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Self {
        Self {
            id: id.into(),
            params,
            result,
            is_member: true,
        }
    }

    /// Names of the type parameters mentioned anywhere in the signature
    pub fn type_params(&self) -> Vec<String> {
        let mut names = Vec::new();
        for param in &self.params {
            param.collect_type_params(&mut names);
        }
        self.result.collect_type_params(&mut names);
        names
    }

    /// The signature as a `function(result, params...)` type
    pub fn signature(&self) -> CelType {
        function_type(self.result.clone(), self.params.iter().cloned())
    }

    /// Whether a call with the other overload's argument types could not tell the two apart
    fn collides_with(&self, other: &OverloadDecl) -> bool {
        self.is_member == other.is_member
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| is_equivalent_type(a, b))
    }
}

/// A named function and its overloads
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub overloads: Vec<OverloadDecl>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// Builder form of [`FunctionDecl::add_overload`] for declarations known to be valid
    pub fn with_overload(mut self, overload: OverloadDecl) -> Self {
        self.overloads.push(overload);
        self
    }

    /// Add an overload, rejecting ones that redefine or shadow an existing signature
    ///
    /// Re-adding an identical overload is a no-op.
    pub fn add_overload(&mut self, overload: OverloadDecl) -> Result<(), String> {
        for existing in &self.overloads {
            if existing.id == overload.id {
                if existing == &overload {
                    return Ok(());
                }
                return Err(format!(
                    "overload redefinition in function. {}: {} has multiple definitions",
                    self.name, overload.id
                ));
            }
            if existing.collides_with(&overload) {
                return Err(format!(
                    "overload signature collision in function {}: {} collides with {}",
                    self.name, overload.id, existing.id
                ));
            }
        }
        self.overloads.push(overload);
        Ok(())
    }

    /// Fold another declaration of the same function into this one
    pub fn merge(&mut self, other: FunctionDecl) -> Result<(), String> {
        for overload in other.overloads {
            self.add_overload(overload)?;
        }
        Ok(())
    }

    pub fn overload(&self, id: &str) -> Option<&OverloadDecl> {
        self.overloads.iter().find(|o| o.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_decl() -> FunctionDecl {
        FunctionDecl::new("size")
            .with_overload(OverloadDecl::function(
                "size_string",
                vec![CelType::String],
                CelType::Int,
            ))
            .with_overload(OverloadDecl::method(
                "string_size",
                vec![CelType::String],
                CelType::Int,
            ))
    }

    #[test]
    fn test_identical_overload_is_tolerated() {
        let mut decl = size_decl();
        let dup = OverloadDecl::function("size_string", vec![CelType::String], CelType::Int);
        assert!(decl.add_overload(dup).is_ok());
        assert_eq!(decl.overloads.len(), 2);
    }

    #[test]
    fn test_redefinition_is_rejected() {
        let mut decl = size_decl();
        let err = decl
            .add_overload(OverloadDecl::function(
                "size_string",
                vec![CelType::Bytes],
                CelType::Int,
            ))
            .unwrap_err();
        assert!(err.contains("multiple definitions"));
    }

    #[test]
    fn test_signature_collision_is_rejected() {
        let mut decl = size_decl();
        let err = decl
            .add_overload(OverloadDecl::function(
                "size_str",
                vec![CelType::String],
                CelType::Int,
            ))
            .unwrap_err();
        assert!(err.contains("size_str collides with size_string"));
    }

    #[test]
    fn test_merge_adds_new_overloads() {
        let mut decl = size_decl();
        let other = FunctionDecl::new("size").with_overload(OverloadDecl::function(
            "size_bytes",
            vec![CelType::Bytes],
            CelType::Int,
        ));
        decl.merge(other).unwrap();
        assert!(decl.overload("size_bytes").is_some());
    }

    #[test]
    fn test_type_params_in_signature() {
        let overload = OverloadDecl::function(
            "index_map",
            vec![
                CelType::map(CelType::type_param("K"), CelType::type_param("V")),
                CelType::type_param("K"),
            ],
            CelType::type_param("V"),
        );
        assert_eq!(overload.type_params(), vec!["K", "V"]);
        assert_eq!(
            overload.signature().to_string(),
            "function(V, map(K, V), K)"
        );
    }
}
