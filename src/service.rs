//! Services assembled from samples.
//!
//! [`DynamicService`] is the entry point. Registration runs once, before
//! anything is served:
//!
//! 1. `register_calls` infers message types from the sample payloads, checks
//!    that they round-trip, and records an endpoint plus a handler adapter
//!    for every call spec
//! 2. `build_server` resolves the registry into a descriptor pool and mounts
//!    every adapter on its gRPC path
//! 3. `build_client` hands the same method descriptors to a generic client
//!
//! Any registration error is returned before a server exists, so a service
//! whose schemas failed validation is never exposed.

use crate::client::DynamicClient;
use crate::error::{Error, Result};
use crate::rpc::{CallSpec, MethodDescriptor, MethodRoute, RpcBinder, ServerMethod};
use crate::schema::TypeRegistry;
use crate::transport::{ClientCredentials, ServerCredentials};
use prost_reflect::DescriptorPool;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::Routes;
use tonic::transport::Server;
use tracing::{debug, info, warn};

pub struct DynamicService {
    registry: TypeRegistry,
    methods: BTreeMap<String, MethodDescriptor>,
    implementations: HashMap<String, ServerMethod>,
}

impl DynamicService {
    /// Creates an empty service. A dotted name places it in a package.
    pub fn new(service_name: &str) -> Self {
        Self {
            registry: TypeRegistry::new(service_name),
            methods: BTreeMap::new(),
            implementations: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.registry.service().name()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Method descriptors ordered by name.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }

    /// Registers every call spec.
    ///
    /// The batch is all or nothing: when one call fails, every call of the
    /// batch is rolled back and the service is left as it was.
    pub fn register_calls<I>(&mut self, calls: I) -> Result<()>
    where
        I: IntoIterator<Item = CallSpec>,
    {
        let registry = self.registry.clone();
        let methods = self.methods.clone();
        let implementations = self.implementations.clone();

        if let Err(err) = self.bind_all(calls) {
            warn!(error = %err, "registration failed; rolling back batch");
            self.registry = registry;
            self.methods = methods;
            self.implementations = implementations;
            return Err(err);
        }
        Ok(())
    }

    fn bind_all<I>(&mut self, calls: I) -> Result<()>
    where
        I: IntoIterator<Item = CallSpec>,
    {
        let mut binder = RpcBinder::new(&mut self.registry);
        for call in calls {
            debug!(call = ?call, "registering call");
            let binding = binder.bind(call)?;
            let name = binding.descriptor.name.clone();
            self.methods.insert(name.clone(), binding.descriptor);
            self.implementations.insert(name, binding.implementation);
        }
        Ok(())
    }

    /// Registers `calls`, serves them on `address` and connects a client to
    /// the bound address.
    pub async fn create<I>(
        service_name: &str,
        calls: I,
        address: &str,
        server_credentials: ServerCredentials,
        client_credentials: ClientCredentials,
    ) -> Result<(Self, ServingHandle, DynamicClient)>
    where
        I: IntoIterator<Item = CallSpec>,
    {
        let mut service = Self::new(service_name);
        service.register_calls(calls)?;
        let handle = service.serve(address, server_credentials).await?;
        let client = service
            .build_client(&handle.local_addr().to_string(), client_credentials)
            .await?;
        Ok((service, handle, client))
    }

    /// Resolves the registry into its wire schema.
    pub fn resolve(&self) -> Result<DescriptorPool> {
        self.registry.resolve()
    }

    /// Builds a server with every registered handler mounted.
    pub fn build_server(&self) -> Result<DynamicServer> {
        let pool = self.resolve()?;
        let service = self.registry.service_descriptor(&pool)?;

        let mut routes = Vec::with_capacity(self.methods.len());
        for method in service.methods() {
            let descriptor = self.methods.get(method.name()).ok_or_else(|| {
                Error::Lookup(format!("no method descriptor for `{}`", method.name()))
            })?;
            let implementation = self.implementations.get(method.name()).ok_or_else(|| {
                Error::Lookup(format!("no implementation for `{}`", method.name()))
            })?;
            let bound = descriptor.bind(&self.registry, &pool)?;
            routes.push(implementation.route(&bound));
        }

        info!(service = %service.full_name(), methods = routes.len(), "server built");
        Ok(DynamicServer {
            service_name: service.full_name().to_string(),
            routes,
        })
    }

    /// Connects a client exposing every registered method.
    pub async fn build_client(
        &self,
        address: &str,
        credentials: ClientCredentials,
    ) -> Result<DynamicClient> {
        let pool = self.resolve()?;
        let mut methods = HashMap::with_capacity(self.methods.len());
        for (name, descriptor) in &self.methods {
            methods.insert(name.clone(), descriptor.bind(&self.registry, &pool)?);
        }
        DynamicClient::connect(address, credentials, methods).await
    }

    /// Builds the server, binds `address` and starts serving in the background.
    pub async fn serve(&self, address: &str, credentials: ServerCredentials) -> Result<ServingHandle> {
        self.build_server()?.bind(address, credentials).await
    }
}

/// Every registered RPC mounted on its path, ready to be bound.
pub struct DynamicServer {
    service_name: String,
    routes: Vec<MethodRoute>,
}

impl DynamicServer {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Paths of every mounted method.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(MethodRoute::path)
    }

    /// The mounted methods as tonic routes.
    pub fn into_routes(self) -> Routes {
        let mut router = axum::Router::new();
        for route in self.routes {
            let path = route.path().to_string();
            router = router.route_service(&path, route);
        }
        Routes::from(router)
    }

    /// Binds `address` and serves until the returned handle is shut down.
    ///
    /// Bind failures are reported here, before any task is spawned.
    pub async fn bind(self, address: &str, credentials: ServerCredentials) -> Result<ServingHandle> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| Error::TransportBind {
                address: address.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let mut builder = Server::builder();
        if let ServerCredentials::Tls(tls) = credentials {
            builder = builder.tls_config(tls)?;
        }

        let service_name = self.service_name.clone();
        let router = builder.add_routes(self.into_routes());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            router
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(service = %service_name, addr = %local_addr, "Running on {}", local_addr);
        Ok(ServingHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// A server accepting connections in the background.
pub struct ServingHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::result::Result<(), tonic::transport::Error>>,
}

impl ServingHandle {
    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the server to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.wait().await
    }

    /// Waits until the server stops.
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => Ok(result?),
            Err(join) => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                join,
            ))),
        }
    }
}
