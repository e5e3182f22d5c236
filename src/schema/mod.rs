//! Message schemas inferred from samples.
//!
//! - [`registry`] owns every definition plus the service definition
//! - [`infer`] derives definitions from sample values
//! - [`validate`] checks that a schema round-trips the sample it came from

pub mod infer;
pub mod registry;
pub mod validate;

pub use infer::{derive, SchemaInferencer, TypeNode};
pub use registry::{RpcEndpoint, ServiceDefinition, TypeRegistry};
pub use validate::RoundTripValidator;

use prost_types::field_descriptor_proto::Type;
use std::fmt;

/// Scalar wire kinds a sample field can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    String,
    Int64,
    /// 32-bit IEEE float, matching the protobuf `float` type.
    Float,
    Bytes,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
            ScalarKind::Int64 => "int64",
            ScalarKind::Float => "float",
            ScalarKind::Bytes => "bytes",
        }
    }

    pub(crate) fn proto_type(&self) -> Type {
        match self {
            ScalarKind::Bool => Type::Bool,
            ScalarKind::String => Type::String,
            ScalarKind::Int64 => Type::Int64,
            ScalarKind::Float => Type::Float,
            ScalarKind::Bytes => Type::Bytes,
        }
    }
}

/// The declared type of a field: a scalar or a reference to another definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Reference(String),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(scalar) => f.write_str(scalar.as_str()),
            FieldKind::Reference(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    /// Field number, 1-based in key encounter order.
    pub index: u32,
    pub kind: FieldKind,
    pub repeated: bool,
}

/// A named message definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A named enum definition; variants are numbered from 0 in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDefinition {
    pub name: String,
    pub variants: Vec<String>,
}

/// Anything that occupies a name in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Message(TypeDefinition),
    Enum(EnumDefinition),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Message(message) => &message.name,
            Definition::Enum(enumeration) => &enumeration.name,
        }
    }

    pub fn as_message(&self) -> Option<&TypeDefinition> {
        match self {
            Definition::Message(message) => Some(message),
            Definition::Enum(_) => None,
        }
    }
}
