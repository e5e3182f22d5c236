//! The type registry.
//!
//! A [`TypeRegistry`] is a flat namespace of message and enum definitions
//! plus exactly one [`ServiceDefinition`]. It belongs to a single
//! `DynamicService` and is written only while calls are being registered.
//!
//! Names are unique and the first writer wins: inserting a definition whose
//! name is already taken leaves the registry unchanged.
//!
//! The registry resolves into a protobuf file descriptor (proto2, every
//! singular field `optional` so explicit defaults keep their presence) and
//! from there into a `prost_reflect::DescriptorPool`, the form the codec and
//! transport consume.

use super::{Definition, EnumDefinition, FieldKind, TypeDefinition};
use crate::error::{Error, Result};
use crate::rpc::CallingConvention;
use prost_reflect::{DescriptorPool, MessageDescriptor, ServiceDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto,
};
use std::collections::HashMap;
use std::fmt::Write;

/// One RPC of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub name: String,
    pub request_type: String,
    pub response_type: String,
    pub convention: CallingConvention,
}

/// The service every registered endpoint belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    name: String,
    endpoints: Vec<RpcEndpoint>,
}

impl ServiceDefinition {
    /// Fully-qualified service name, e.g. `shop.Inventory`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service name without its package.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn endpoints(&self) -> &[RpcEndpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, name: &str) -> Option<&RpcEndpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    package: Option<String>,
    definitions: Vec<Definition>,
    index: HashMap<String, usize>,
    service: ServiceDefinition,
}

impl TypeRegistry {
    /// Creates an empty registry for `service_name`.
    ///
    /// A dotted name such as `shop.Inventory` places the service and every
    /// definition in the `shop` package.
    pub fn new(service_name: &str) -> Self {
        let package = service_name
            .rsplit_once('.')
            .map(|(package, _)| package.to_string());
        Self {
            package,
            definitions: Vec::new(),
            index: HashMap::new(),
            service: ServiceDefinition {
                name: service_name.to_string(),
                endpoints: Vec::new(),
            },
        }
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    /// Fully-qualified name of a registered definition.
    pub fn qualified(&self, name: &str) -> String {
        match &self.package {
            Some(package) => format!("{}.{}", package, name),
            None => name.to_string(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Definition> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    /// Looks up a message definition, failing if it is absent or an enum.
    pub fn lookup_type(&self, name: &str) -> Result<&TypeDefinition> {
        match self.lookup(name) {
            Some(Definition::Message(message)) => Ok(message),
            Some(Definition::Enum(_)) => Err(Error::Lookup(format!(
                "`{}` is an enum, not a message type",
                name
            ))),
            None => Err(Error::Lookup(format!("no type named `{}`", name))),
        }
    }

    /// Definitions in insertion order.
    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter()
    }

    /// Inserts a definition unless its name is taken. Returns whether it was inserted.
    pub fn insert(&mut self, definition: Definition) -> bool {
        if self.index.contains_key(definition.name()) {
            return false;
        }
        self.index
            .insert(definition.name().to_string(), self.definitions.len());
        self.definitions.push(definition);
        true
    }

    /// Removes definitions inserted by a registration that failed validation.
    pub(crate) fn withdraw(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        self.definitions
            .retain(|d| !names.iter().any(|n| n == d.name()));
        self.index = self
            .definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name().to_string(), i))
            .collect();
    }

    /// Adds an endpoint unless one with the same name exists. Returns whether it was added.
    pub fn add_endpoint(&mut self, endpoint: RpcEndpoint) -> bool {
        if self.service.endpoint(&endpoint.name).is_some() {
            return false;
        }
        self.service.endpoints.push(endpoint);
        true
    }

    /// Removes an endpoint added by a registration that failed.
    pub(crate) fn remove_endpoint(&mut self, name: &str) {
        self.service.endpoints.retain(|e| e.name != name);
    }

    /// Builds the protobuf file descriptor for every definition and the service.
    pub fn file_descriptor(&self) -> Result<FileDescriptorProto> {
        let mut file = FileDescriptorProto {
            name: Some(format!("{}.proto", self.service.name.replace('.', "/"))),
            package: self.package.clone(),
            syntax: Some("proto2".to_string()),
            ..Default::default()
        };

        for definition in &self.definitions {
            match definition {
                Definition::Message(message) => file.message_type.push(self.message_proto(message)?),
                Definition::Enum(enumeration) => file.enum_type.push(enum_proto(enumeration)),
            }
        }
        file.service.push(self.service_proto()?);

        Ok(file)
    }

    /// Resolves the registry into a descriptor pool.
    pub fn resolve(&self) -> Result<DescriptorPool> {
        let set = FileDescriptorSet {
            file: vec![self.file_descriptor()?],
        };
        Ok(DescriptorPool::from_file_descriptor_set(set)?)
    }

    /// Resolves a registered message type from a pool built by [`resolve`](Self::resolve).
    pub fn message_descriptor(&self, pool: &DescriptorPool, name: &str) -> Result<MessageDescriptor> {
        let full_name = self.qualified(name);
        pool.get_message_by_name(&full_name)
            .ok_or_else(|| Error::Lookup(format!("no message type named `{}`", full_name)))
    }

    /// Resolves the service from a pool built by [`resolve`](Self::resolve).
    pub fn service_descriptor(&self, pool: &DescriptorPool) -> Result<ServiceDescriptor> {
        pool.get_service_by_name(&self.service.name)
            .ok_or_else(|| Error::Lookup(format!("no service named `{}`", self.service.name)))
    }

    fn type_reference(&self, owner: &str, field: &str, name: &str) -> Result<(Type, String)> {
        let ty = match self.lookup(name) {
            Some(Definition::Message(_)) => Type::Message,
            Some(Definition::Enum(_)) => Type::Enum,
            None => {
                return Err(Error::Lookup(format!(
                    "type `{}` referenced by `{}.{}` is not registered",
                    name, owner, field
                )))
            }
        };
        Ok((ty, format!(".{}", self.qualified(name))))
    }

    fn message_proto(&self, message: &TypeDefinition) -> Result<DescriptorProto> {
        let mut field = Vec::with_capacity(message.fields.len());
        for def in &message.fields {
            let (ty, type_name) = match &def.kind {
                FieldKind::Scalar(scalar) => (scalar.proto_type(), None),
                FieldKind::Reference(name) => {
                    let (ty, type_name) = self.type_reference(&message.name, &def.name, name)?;
                    (ty, Some(type_name))
                }
            };
            let label = if def.repeated {
                Label::Repeated
            } else {
                Label::Optional
            };
            field.push(FieldDescriptorProto {
                name: Some(def.name.clone()),
                number: Some(def.index as i32),
                label: Some(label as i32),
                r#type: Some(ty as i32),
                type_name,
                ..Default::default()
            });
        }

        Ok(DescriptorProto {
            name: Some(message.name.clone()),
            field,
            ..Default::default()
        })
    }

    fn service_proto(&self) -> Result<ServiceDescriptorProto> {
        let mut method = Vec::with_capacity(self.service.endpoints.len());
        for endpoint in &self.service.endpoints {
            self.lookup_type(&endpoint.request_type)?;
            self.lookup_type(&endpoint.response_type)?;
            method.push(MethodDescriptorProto {
                name: Some(endpoint.name.clone()),
                input_type: Some(format!(".{}", self.qualified(&endpoint.request_type))),
                output_type: Some(format!(".{}", self.qualified(&endpoint.response_type))),
                client_streaming: Some(endpoint.convention.request_streaming()),
                server_streaming: Some(endpoint.convention.response_streaming()),
                ..Default::default()
            });
        }

        Ok(ServiceDescriptorProto {
            name: Some(self.service.short_name().to_string()),
            method,
            ..Default::default()
        })
    }

    /// Renders the registry as `.proto` source.
    pub fn to_proto_source(&self) -> String {
        let mut out = String::from("syntax = \"proto2\";\n");
        if let Some(package) = &self.package {
            let _ = write!(out, "\npackage {};\n", package);
        }

        for definition in &self.definitions {
            out.push('\n');
            match definition {
                Definition::Message(message) => {
                    let _ = writeln!(out, "message {} {{", message.name);
                    for field in &message.fields {
                        let label = if field.repeated { "repeated" } else { "optional" };
                        let _ = writeln!(
                            out,
                            "  {} {} {} = {};",
                            label, field.kind, field.name, field.index
                        );
                    }
                    out.push_str("}\n");
                }
                Definition::Enum(enumeration) => {
                    let _ = writeln!(out, "enum {} {{", enumeration.name);
                    for (number, variant) in enumeration.variants.iter().enumerate() {
                        let _ = writeln!(out, "  {} = {};", variant, number);
                    }
                    out.push_str("}\n");
                }
            }
        }

        let _ = write!(out, "\nservice {} {{\n", self.service.short_name());
        for endpoint in &self.service.endpoints {
            let stream = |streamed: bool| if streamed { "stream " } else { "" };
            let _ = writeln!(
                out,
                "  rpc {} ({}{}) returns ({}{});",
                endpoint.name,
                stream(endpoint.convention.request_streaming()),
                endpoint.request_type,
                stream(endpoint.convention.response_streaming()),
                endpoint.response_type
            );
        }
        out.push_str("}\n");
        out
    }
}

fn enum_proto(enumeration: &EnumDefinition) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(enumeration.name.clone()),
        value: enumeration
            .variants
            .iter()
            .enumerate()
            .map(|(number, variant)| EnumValueDescriptorProto {
                name: Some(variant.clone()),
                number: Some(number as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}
