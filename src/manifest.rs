//! JSON service manifests.
//!
//! A manifest describes a whole service by example:
//!
//! ```json
//! {
//!   "service": "demo.Example",
//!   "calls": [
//!     {
//!       "name": "Ping",
//!       "convention": "unary",
//!       "request":  { "name": "PingRequest",  "sample": { "id": 1, "name": "x" } },
//!       "response": { "name": "PingResponse", "sample": { "ok": true } }
//!     }
//!   ]
//! }
//! ```
//!
//! Every call is answered with its response sample, which makes a manifest
//! a mock server for clients under test.

use crate::error::Result;
use crate::rpc::{CallSpec, CallingConvention, CannedReply, MessageSample};
use crate::service::DynamicService;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub service: String,
    #[serde(default)]
    pub calls: Vec<CallManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallManifest {
    pub name: String,
    #[serde(default)]
    pub convention: CallingConvention,
    pub request: MessageSample,
    pub response: MessageSample,
    /// Responses written per server stream.
    #[serde(default = "default_replies")]
    pub replies: usize,
}

fn default_replies() -> usize {
    1
}

impl Manifest {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    pub fn call(&self, name: &str) -> Option<&CallManifest> {
        self.calls.iter().find(|call| call.name == name)
    }

    /// Call specs answering with the canned response samples.
    pub fn call_specs(&self) -> Vec<CallSpec> {
        self.calls.iter().map(CallManifest::to_call_spec).collect()
    }

    /// Registers every call into a new service.
    pub fn into_service(self) -> Result<DynamicService> {
        let mut service = DynamicService::new(&self.service);
        service.register_calls(self.call_specs())?;
        Ok(service)
    }
}

impl FromStr for Manifest {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl CallManifest {
    pub fn to_call_spec(&self) -> CallSpec {
        let handler = CannedReply::new(self.response.sample.clone()).with_replies(self.replies);
        CallSpec::new(
            self.name.clone(),
            self.request.clone(),
            self.response.clone(),
            self.convention,
            Arc::new(handler),
        )
    }
}
