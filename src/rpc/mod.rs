//! RPC binding.
//!
//! A [`CallSpec`] names an RPC, gives sample payloads for its request and
//! response, picks a [`CallingConvention`] and supplies a [`Handler`]. The
//! [`binder::RpcBinder`] turns it into registry entries, a transport-facing
//! [`binder::MethodDescriptor`] and a server-side [`adapter::ServerMethod`].

pub mod adapter;
pub mod binder;
pub mod handler;

pub use adapter::{MethodRoute, ServerMethod};
pub use binder::{BoundMethod, MethodDescriptor, RpcBinder};
pub use handler::{handler_fn, Call, CannedReply, Handler, Responder, ResponseSink};

use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Whether requests and responses are single messages or streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallingConvention {
    /// One request, one response.
    #[default]
    Unary,
    /// A request stream, one response.
    ClientStream,
    /// One request, a response stream.
    ServerStream,
    /// Both sides stream.
    #[serde(alias = "stream")]
    BidiStream,
}

impl CallingConvention {
    pub fn request_streaming(self) -> bool {
        match self {
            CallingConvention::Unary | CallingConvention::ServerStream => false,
            CallingConvention::ClientStream | CallingConvention::BidiStream => true,
        }
    }

    pub fn response_streaming(self) -> bool {
        match self {
            CallingConvention::Unary | CallingConvention::ClientStream => false,
            CallingConvention::ServerStream | CallingConvention::BidiStream => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallingConvention::Unary => "unary",
            CallingConvention::ClientStream => "clientStream",
            CallingConvention::ServerStream => "serverStream",
            CallingConvention::BidiStream => "bidiStream",
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unary" => Ok(CallingConvention::Unary),
            "clientStream" | "client-stream" => Ok(CallingConvention::ClientStream),
            "serverStream" | "server-stream" => Ok(CallingConvention::ServerStream),
            "bidiStream" | "bidi-stream" | "stream" => Ok(CallingConvention::BidiStream),
            other => Err(format!("unknown calling convention `{}`", other)),
        }
    }
}

/// A message type name together with the sample it is inferred from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSample {
    pub name: String,
    pub sample: Sample,
}

impl MessageSample {
    pub fn new(name: impl Into<String>, sample: impl Into<Sample>) -> Self {
        Self {
            name: name.into(),
            sample: sample.into(),
        }
    }
}

/// Everything needed to register one RPC.
#[derive(Clone)]
pub struct CallSpec {
    pub name: String,
    pub request: MessageSample,
    pub response: MessageSample,
    pub convention: CallingConvention,
    pub handler: Arc<dyn Handler>,
}

impl CallSpec {
    pub fn new(
        name: impl Into<String>,
        request: MessageSample,
        response: MessageSample,
        convention: CallingConvention,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            name: name.into(),
            request,
            response,
            convention,
            handler,
        }
    }
}

impl fmt::Debug for CallSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSpec")
            .field("name", &self.name)
            .field("request", &self.request.name)
            .field("response", &self.response.name)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_flags() {
        let flags = |c: CallingConvention| (c.request_streaming(), c.response_streaming());
        assert_eq!(flags(CallingConvention::Unary), (false, false));
        assert_eq!(flags(CallingConvention::ClientStream), (true, false));
        assert_eq!(flags(CallingConvention::ServerStream), (false, true));
        assert_eq!(flags(CallingConvention::BidiStream), (true, true));
    }

    #[test]
    fn test_convention_names() {
        for convention in [
            CallingConvention::Unary,
            CallingConvention::ClientStream,
            CallingConvention::ServerStream,
            CallingConvention::BidiStream,
        ] {
            assert_eq!(convention.as_str().parse::<CallingConvention>(), Ok(convention));
        }
        assert_eq!("stream".parse(), Ok(CallingConvention::BidiStream));
        assert!("duplex".parse::<CallingConvention>().is_err());

        let parsed: CallingConvention = serde_json::from_str("\"stream\"").unwrap();
        assert_eq!(parsed, CallingConvention::BidiStream);
        assert_eq!(
            serde_json::to_string(&CallingConvention::ServerStream).unwrap(),
            "\"serverStream\""
        );
    }
}
