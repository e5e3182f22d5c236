//! Generic client for services assembled from samples.
//!
//! A [`DynamicClient`] is built from the same method descriptors the server
//! uses, so a client and a server created from one `DynamicService` always
//! agree on paths, message types and calling conventions.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut client = service.build_client("127.0.0.1:50051", ClientCredentials::Insecure).await?;
//! let reply = client.unary("Ping", Sample::from(json!({"id": 1, "name": "x"}))).await?;
//! ```

use crate::rpc::{BoundMethod, CallingConvention, MethodDescriptor};
use crate::sample::Sample;
use crate::transport::{endpoint_uri, ClientCredentials};
use futures::Stream;
use std::collections::HashMap;
use tonic::client::Grpc;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status, Streaming};
use tracing::{debug, info};

pub struct DynamicClient {
    grpc: Grpc<Channel>,
    methods: HashMap<String, BoundMethod>,
    addr: String,
}

impl DynamicClient {
    /// Connects to `address` and serves calls for `methods`.
    pub async fn connect(
        address: &str,
        credentials: ClientCredentials,
        methods: HashMap<String, BoundMethod>,
    ) -> crate::error::Result<Self> {
        let uri = endpoint_uri(address, &credentials);
        debug!(uri = %uri, "Connecting to dynamic service");

        let mut endpoint = Endpoint::from_shared(uri)?;
        if let ClientCredentials::Tls(tls) = credentials {
            endpoint = endpoint.tls_config(tls)?;
        }
        let channel = endpoint.connect().await?;

        info!(addr = %address, methods = methods.len(), "Connected to dynamic service");
        Ok(Self::from_channel(channel, methods, address))
    }

    /// Wraps an existing channel.
    pub fn from_channel(
        channel: Channel,
        methods: HashMap<String, BoundMethod>,
        address: &str,
    ) -> Self {
        Self {
            grpc: Grpc::new(channel),
            methods,
            addr: address.to_string(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Descriptors of every callable method.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values().map(BoundMethod::descriptor)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name).map(BoundMethod::descriptor)
    }

    fn prepare(&self, name: &str, expected: CallingConvention) -> Result<BoundMethod, Status> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| Status::unimplemented(format!("Unknown method: {}", name)))?;
        let convention = method.descriptor().convention;
        if convention != expected {
            return Err(Status::failed_precondition(format!(
                "{} is a {} method, not {}",
                name, convention, expected
            )));
        }
        Ok(method.clone())
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.grpc
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e)))
    }

    /// Sends one request and waits for one response.
    pub async fn unary(&mut self, name: &str, request: Sample) -> Result<Sample, Status> {
        let method = self.prepare(name, CallingConvention::Unary)?;
        self.ready().await?;
        let response = self
            .grpc
            .unary(Request::new(request), method.path().clone(), method.client_codec())
            .await?;
        Ok(response.into_inner())
    }

    /// Streams requests and waits for one response.
    pub async fn client_streaming<S>(&mut self, name: &str, requests: S) -> Result<Sample, Status>
    where
        S: Stream<Item = Sample> + Send + 'static,
    {
        let method = self.prepare(name, CallingConvention::ClientStream)?;
        self.ready().await?;
        let response = self
            .grpc
            .client_streaming(Request::new(requests), method.path().clone(), method.client_codec())
            .await?;
        Ok(response.into_inner())
    }

    /// Sends one request and returns the response stream.
    pub async fn server_streaming(
        &mut self,
        name: &str,
        request: Sample,
    ) -> Result<Streaming<Sample>, Status> {
        let method = self.prepare(name, CallingConvention::ServerStream)?;
        self.ready().await?;
        let response = self
            .grpc
            .server_streaming(Request::new(request), method.path().clone(), method.client_codec())
            .await?;
        Ok(response.into_inner())
    }

    /// Streams requests and returns the response stream.
    pub async fn streaming<S>(&mut self, name: &str, requests: S) -> Result<Streaming<Sample>, Status>
    where
        S: Stream<Item = Sample> + Send + 'static,
    {
        let method = self.prepare(name, CallingConvention::BidiStream)?;
        self.ready().await?;
        let response = self
            .grpc
            .streaming(Request::new(requests), method.path().clone(), method.client_codec())
            .await?;
        Ok(response.into_inner())
    }
}
