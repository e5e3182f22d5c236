//! Binding call specs to the registry and the transport.

use super::adapter::ServerMethod;
use super::{CallSpec, CallingConvention};
use crate::codec::{self, SampleCodec};
use crate::error::{Error, Result};
use crate::sample::Sample;
use crate::schema::{RpcEndpoint, SchemaInferencer, ServiceDefinition, TypeRegistry};
use prost_reflect::{DescriptorPool, MessageDescriptor};
use tonic::codegen::http::uri::PathAndQuery;
use tracing::{info, warn};

/// Transport-facing description of one RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    /// gRPC path, `/{service}/{method}`.
    pub path: String,
    pub request_type: String,
    pub response_type: String,
    pub convention: CallingConvention,
    pub request_streaming: bool,
    pub response_streaming: bool,
}

impl MethodDescriptor {
    pub fn from_endpoint(service: &ServiceDefinition, endpoint: &RpcEndpoint) -> Self {
        Self {
            name: endpoint.name.clone(),
            path: format!("/{}/{}", service.name(), endpoint.name),
            request_type: endpoint.request_type.clone(),
            response_type: endpoint.response_type.clone(),
            convention: endpoint.convention,
            request_streaming: endpoint.convention.request_streaming(),
            response_streaming: endpoint.convention.response_streaming(),
        }
    }

    /// Resolves the request and response types against a descriptor pool.
    pub fn bind(&self, registry: &TypeRegistry, pool: &DescriptorPool) -> Result<BoundMethod> {
        let path = PathAndQuery::try_from(self.path.as_str())
            .map_err(|e| Error::Lookup(format!("invalid method path `{}`: {}", self.path, e)))?;
        Ok(BoundMethod {
            descriptor: self.clone(),
            path,
            request: registry.message_descriptor(pool, &self.request_type)?,
            response: registry.message_descriptor(pool, &self.response_type)?,
        })
    }
}

/// A method descriptor with its message types resolved.
///
/// Carries the serializers and deserializers for both directions.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    descriptor: MethodDescriptor,
    path: PathAndQuery,
    request: MessageDescriptor,
    response: MessageDescriptor,
}

impl BoundMethod {
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    pub fn path(&self) -> &PathAndQuery {
        &self.path
    }

    pub fn serialize_request(&self, request: &Sample) -> Result<Vec<u8>> {
        codec::encode(&self.request, request)
    }

    pub fn deserialize_request(&self, bytes: &[u8]) -> Result<Sample> {
        codec::decode(&self.request, bytes).map(|m| codec::to_sample(&m))
    }

    pub fn serialize_response(&self, response: &Sample) -> Result<Vec<u8>> {
        codec::encode(&self.response, response)
    }

    pub fn deserialize_response(&self, bytes: &[u8]) -> Result<Sample> {
        codec::decode(&self.response, bytes).map(|m| codec::to_sample(&m))
    }

    /// Codec for the calling side: writes requests, reads responses.
    pub fn client_codec(&self) -> SampleCodec {
        SampleCodec::new(self.request.clone(), self.response.clone())
    }

    /// Codec for the serving side: writes responses, reads requests.
    pub fn server_codec(&self) -> SampleCodec {
        SampleCodec::new(self.response.clone(), self.request.clone())
    }
}

/// The products of binding one call spec.
#[derive(Debug, Clone)]
pub struct Binding {
    pub descriptor: MethodDescriptor,
    pub implementation: ServerMethod,
}

/// Registers call specs into a registry.
pub struct RpcBinder<'a> {
    registry: &'a mut TypeRegistry,
}

impl<'a> RpcBinder<'a> {
    pub fn new(registry: &'a mut TypeRegistry) -> Self {
        Self { registry }
    }

    /// Infers both message types, adds the endpoint and derives the method
    /// descriptor and handler adapter.
    ///
    /// An endpoint that already exists keeps its original types and calling
    /// convention; only the handler is replaced.
    pub fn bind(&mut self, spec: CallSpec) -> Result<Binding> {
        let mut inferencer = SchemaInferencer::new(self.registry);
        let mut inserted = inferencer.infer(&spec.request.name, &spec.request.sample)?;
        match inferencer.infer(&spec.response.name, &spec.response.sample) {
            Ok(names) => inserted.extend(names),
            Err(err) => {
                self.registry.withdraw(&inserted);
                return Err(err);
            }
        }

        let requested = RpcEndpoint {
            name: spec.name.clone(),
            request_type: spec.request.name.clone(),
            response_type: spec.response.name.clone(),
            convention: spec.convention,
        };
        if self.registry.add_endpoint(requested.clone()) {
            // The service must still resolve with the new method in it.
            if let Err(err) = self.registry.resolve() {
                self.registry.remove_endpoint(&spec.name);
                self.registry.withdraw(&inserted);
                return Err(err);
            }
            info!(method = %spec.name, convention = %spec.convention, "endpoint registered");
        }

        let service = self.registry.service();
        let endpoint = service
            .endpoint(&spec.name)
            .ok_or_else(|| Error::Lookup(format!("no endpoint named `{}`", spec.name)))?;
        if *endpoint != requested {
            warn!(
                method = %spec.name,
                convention = %endpoint.convention,
                "endpoint already registered with a different shape; keeping the first"
            );
        }

        Ok(Binding {
            descriptor: MethodDescriptor::from_endpoint(service, endpoint),
            implementation: ServerMethod::new(&endpoint.name, endpoint.convention, spec.handler),
        })
    }
}
