//! gRPC services assembled at runtime from sample payloads.
//!
//! Message schemas are inferred from example values, checked by a
//! serialization round trip, and bound to handlers under one of four
//! calling conventions. The resulting service can be served over HTTP/2 or
//! called through a generic client sharing the same method descriptors.
//!
//! ```rust,ignore
//! use dynrpc_core::{handler_fn, Call, CallSpec, CallingConvention, DynamicService, MessageSample, Sample};
//!
//! let mut service = DynamicService::new("Example");
//! service.register_calls([CallSpec::new(
//!     "Ping",
//!     MessageSample::new("PingRequest", Sample::from(json!({"id": 1, "name": "x"}))),
//!     MessageSample::new("PingResponse", Sample::from(json!({"ok": true}))),
//!     CallingConvention::Unary,
//!     handler_fn(|call| async move {
//!         if let Call::Unary { respond, .. } = call {
//!             respond.ok(Sample::from(json!({"ok": true})));
//!         }
//!     }),
//! )])?;
//! let server = service.serve("127.0.0.1:50051", ServerCredentials::Insecure).await?;
//! ```

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod manifest;
pub mod rpc;
pub mod sample;
pub mod schema;
pub mod service;
pub mod transport;

// Re-export commonly used types
pub use client::DynamicClient;
pub use error::{Error, Result};
pub use manifest::Manifest;
pub use rpc::{
    handler_fn, Call, CallSpec, CallingConvention, CannedReply, Handler, MessageSample,
    MethodDescriptor,
};
pub use sample::{Sample, Symbol};
pub use schema::{SchemaInferencer, TypeRegistry};
pub use service::{DynamicServer, DynamicService, ServingHandle};
pub use transport::{ClientCredentials, ServerCredentials};
