//! User-facing handler surface.
//!
//! A [`Handler`] receives one [`Call`] per inbound RPC. Unary and
//! client-streaming calls carry a [`Responder`], the completion callback the
//! handler resolves exactly once. Server-streaming and bidirectional calls
//! carry a [`ResponseSink`] instead; the handler writes responses to it and
//! ends the stream by dropping it.

use super::CallingConvention;
use crate::sample::Sample;
use async_trait::async_trait;
use futures::StreamExt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Status, Streaming};
use tracing::debug;

/// Capacity of the channel between a streaming handler and the transport.
pub const RESPONSE_BUFFER: usize = 16;

/// An inbound RPC as seen by a handler.
#[derive(Debug)]
pub enum Call {
    Unary {
        request: Request<Sample>,
        respond: Responder,
    },
    ClientStream {
        requests: Request<Streaming<Sample>>,
        respond: Responder,
    },
    ServerStream {
        request: Request<Sample>,
        sink: ResponseSink,
    },
    BidiStream {
        requests: Request<Streaming<Sample>>,
        sink: ResponseSink,
    },
}

impl Call {
    pub fn convention(&self) -> CallingConvention {
        match self {
            Call::Unary { .. } => CallingConvention::Unary,
            Call::ClientStream { .. } => CallingConvention::ClientStream,
            Call::ServerStream { .. } => CallingConvention::ServerStream,
            Call::BidiStream { .. } => CallingConvention::BidiStream,
        }
    }
}

/// Completion callback for calls with a single response.
#[derive(Debug)]
pub struct Responder(oneshot::Sender<Result<Sample, Status>>);

impl Responder {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Result<Sample, Status>>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Completes the call. Returns `false` if the caller has gone away.
    pub fn send(self, result: Result<Sample, Status>) -> bool {
        self.0.send(result).is_ok()
    }

    pub fn ok(self, response: Sample) -> bool {
        self.send(Ok(response))
    }

    pub fn error(self, status: Status) -> bool {
        self.send(Err(status))
    }
}

/// Writer half of a response stream.
#[derive(Debug, Clone)]
pub struct ResponseSink(mpsc::Sender<Result<Sample, Status>>);

impl ResponseSink {
    pub(crate) fn channel(
        capacity: usize,
    ) -> (Self, ReceiverStream<Result<Sample, Status>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self(tx), ReceiverStream::new(rx))
    }

    /// Writes one response. Returns `false` once the client has gone away.
    pub async fn write(&self, response: Sample) -> bool {
        self.0.send(Ok(response)).await.is_ok()
    }

    /// Terminates the stream with an error status.
    pub async fn fail(self, status: Status) {
        let _ = self.0.send(Err(status)).await;
    }

    /// Ends the stream.
    pub fn end(self) {}

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Business logic bound to an RPC.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, call: Call);
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, call: Call) {
        (self.f)(call).await
    }
}

/// Wraps an async closure as a shareable handler.
///
/// ```rust,ignore
/// let echo = handler_fn(|call| async move {
///     if let Call::Unary { request, respond } = call {
///         respond.ok(request.into_inner());
///     }
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler {
        f,
        _marker: PhantomData,
    })
}

/// Answers every call with a fixed response sample.
///
/// Unary calls get the reply once; client streams are drained first.
/// Server streams receive `replies` copies and bidirectional streams one
/// reply per inbound message.
#[derive(Debug, Clone)]
pub struct CannedReply {
    reply: Sample,
    replies: usize,
}

impl CannedReply {
    pub fn new(reply: Sample) -> Self {
        Self { reply, replies: 1 }
    }

    pub fn with_replies(mut self, replies: usize) -> Self {
        self.replies = replies;
        self
    }
}

#[async_trait]
impl Handler for CannedReply {
    async fn handle(&self, call: Call) {
        match call {
            Call::Unary { respond, .. } => {
                respond.ok(self.reply.clone());
            }
            Call::ClientStream { requests, respond } => {
                let mut requests = requests.into_inner();
                let mut received = 0usize;
                while let Some(next) = requests.next().await {
                    if let Err(status) = next {
                        respond.error(status);
                        return;
                    }
                    received += 1;
                }
                debug!(received, "client stream drained");
                respond.ok(self.reply.clone());
            }
            Call::ServerStream { sink, .. } => {
                for _ in 0..self.replies {
                    if !sink.write(self.reply.clone()).await {
                        break;
                    }
                }
            }
            Call::BidiStream { requests, sink } => {
                let mut requests = requests.into_inner();
                while let Some(next) = requests.next().await {
                    match next {
                        Ok(_) => {
                            if !sink.write(self.reply.clone()).await {
                                break;
                            }
                        }
                        Err(status) => {
                            sink.fail(status).await;
                            return;
                        }
                    }
                }
            }
        }
    }
}
