//! Server-side handler adapters.
//!
//! Each registered RPC becomes a [`MethodRoute`]: a tower service mounted at
//! the method's gRPC path. It decodes the HTTP/2 request through tonic's
//! `Grpc` dispatcher and translates the call into the [`Call`] shape its
//! handler expects. The adapters hold no business logic; handlers run on
//! their own tasks so a slow handler never stalls the dispatcher.

use super::binder::BoundMethod;
use super::handler::{Call, Handler, Responder, ResponseSink, RESPONSE_BUFFER};
use super::CallingConvention;
use crate::codec::SampleCodec;
use crate::sample::Sample;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_stream::wrappers::ReceiverStream;
use tonic::body::BoxBody;
use tonic::codegen::{http, BoxFuture, Service};
use tonic::server::{
    ClientStreamingService, Grpc, ServerStreamingService, StreamingService, UnaryService,
};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, warn};

/// The handler half of a bound RPC.
#[derive(Clone)]
pub struct ServerMethod {
    name: String,
    convention: CallingConvention,
    handler: Arc<dyn Handler>,
}

impl ServerMethod {
    pub fn new(
        name: impl Into<String>,
        convention: CallingConvention,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            name: name.into(),
            convention,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    /// Mounts the handler on a resolved method.
    pub fn route(&self, method: &BoundMethod) -> MethodRoute {
        MethodRoute {
            path: method.descriptor().path.clone(),
            convention: self.convention,
            handler: self.handler.clone(),
            codec: method.server_codec(),
        }
    }
}

impl fmt::Debug for ServerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerMethod")
            .field("name", &self.name)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}

/// A tower service serving one RPC path.
#[derive(Clone)]
pub struct MethodRoute {
    path: String,
    convention: CallingConvention,
    handler: Arc<dyn Handler>,
    codec: SampleCodec,
}

impl MethodRoute {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Service<http::Request<axum::body::Body>> for MethodRoute {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<axum::body::Body>) -> Self::Future {
        let route = self.clone();
        Box::pin(async move {
            debug!(path = %route.path, convention = %route.convention, "dispatching call");
            let handler = route.handler;
            let mut grpc = Grpc::new(route.codec);
            let response = match route.convention {
                CallingConvention::Unary => grpc.unary(UnaryAdapter(handler), req).await,
                CallingConvention::ClientStream => {
                    grpc.client_streaming(ClientStreamAdapter(handler), req).await
                }
                CallingConvention::ServerStream => {
                    grpc.server_streaming(ServerStreamAdapter(handler), req).await
                }
                CallingConvention::BidiStream => {
                    grpc.streaming(BidiStreamAdapter(handler), req).await
                }
            };
            Ok(response)
        })
    }
}

async fn await_reply(
    reply: oneshot::Receiver<Result<Sample, Status>>,
) -> Result<Response<Sample>, Status> {
    match reply.await {
        Ok(result) => result.map(Response::new),
        Err(_) => Err(Status::internal("handler finished without responding")),
    }
}

/// Runs a streaming handler on its own task.
///
/// A panicking handler terminates the stream with `INTERNAL` instead of a
/// clean end of stream.
fn spawn_streaming<F>(guard: ResponseSink, handling: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(handling);
    tokio::spawn(async move {
        if let Err(err) = task.await {
            if err.is_panic() {
                warn!("streaming handler panicked");
                guard.fail(Status::internal("handler panicked")).await;
            }
        }
    });
}

struct UnaryAdapter(Arc<dyn Handler>);

impl UnaryService<Sample> for UnaryAdapter {
    type Response = Sample;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<Sample>) -> Self::Future {
        let handler = self.0.clone();
        Box::pin(async move {
            let (respond, reply) = Responder::channel();
            tokio::spawn(async move { handler.handle(Call::Unary { request, respond }).await });
            await_reply(reply).await
        })
    }
}

struct ClientStreamAdapter(Arc<dyn Handler>);

impl ClientStreamingService<Sample> for ClientStreamAdapter {
    type Response = Sample;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, requests: Request<Streaming<Sample>>) -> Self::Future {
        let handler = self.0.clone();
        Box::pin(async move {
            let (respond, reply) = Responder::channel();
            tokio::spawn(async move {
                handler
                    .handle(Call::ClientStream { requests, respond })
                    .await
            });
            await_reply(reply).await
        })
    }
}

struct ServerStreamAdapter(Arc<dyn Handler>);

impl ServerStreamingService<Sample> for ServerStreamAdapter {
    type Response = Sample;
    type ResponseStream = ReceiverStream<Result<Sample, Status>>;
    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: Request<Sample>) -> Self::Future {
        let handler = self.0.clone();
        Box::pin(async move {
            let (sink, stream) = ResponseSink::channel(RESPONSE_BUFFER);
            spawn_streaming(sink.clone(), async move {
                handler.handle(Call::ServerStream { request, sink }).await
            });
            Ok(Response::new(stream))
        })
    }
}

struct BidiStreamAdapter(Arc<dyn Handler>);

impl StreamingService<Sample> for BidiStreamAdapter {
    type Response = Sample;
    type ResponseStream = ReceiverStream<Result<Sample, Status>>;
    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;

    fn call(&mut self, requests: Request<Streaming<Sample>>) -> Self::Future {
        let handler = self.0.clone();
        Box::pin(async move {
            let (sink, stream) = ResponseSink::channel(RESPONSE_BUFFER);
            spawn_streaming(sink.clone(), async move {
                handler.handle(Call::BidiStream { requests, sink }).await
            });
            Ok(Response::new(stream))
        })
    }
}
