//! Error types for dynrpc.

use std::result;
use thiserror::Error;
use tonic::Status;

/// A specialized Result type for dynrpc operations.
pub type Result<T> = result::Result<T, Error>;

/// The error type for dynrpc operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The inferred schema did not reproduce the sample it was inferred from.
    #[error("schema mismatch for `{type_name}`: round-trip representation did not match the sample")]
    SchemaMismatch { type_name: String },

    /// A type, service or method name is absent from the registry.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// The transport could not bind the requested address.
    #[error("failed to bind {address}: {source}")]
    TransportBind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The sample has a shape no message definition can describe.
    #[error("unsupported sample for `{type_name}`: {reason}")]
    UnsupportedSample { type_name: String, reason: String },

    /// The descriptor pool rejected the generated schema.
    #[error("invalid schema: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    /// A value could not be encoded or decoded against its message type.
    #[error("codec error: {0}")]
    Codec(String),

    /// Transport failure after bind (TLS setup, connect, serve).
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unsupported(type_name: &str, reason: impl Into<String>) -> Self {
        Error::UnsupportedSample {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::SchemaMismatch { .. } => Status::failed_precondition(err.to_string()),
            Error::Lookup(msg) => Status::not_found(msg),
            Error::TransportBind { .. } => Status::unavailable(err.to_string()),
            Error::UnsupportedSample { .. } => Status::invalid_argument(err.to_string()),
            Error::Descriptor(err) => Status::internal(format!("Invalid schema: {}", err)),
            Error::Codec(msg) => Status::invalid_argument(msg),
            Error::Transport(err) => Status::unavailable(format!("Transport error: {}", err)),
            Error::Config(err) => Status::failed_precondition(format!("Config error: {}", err)),
            Error::Io(err) => Status::internal(format!("I/O error: {}", err)),
            Error::Serialization(err) => Status::internal(format!("Serialization error: {}", err)),
        }
    }
}
