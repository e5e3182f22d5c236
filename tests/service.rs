use dynrpc_core::{
    handler_fn, Call, CallSpec, CallingConvention, ClientCredentials, DynamicClient,
    DynamicService, Error, MessageSample, Sample, ServerCredentials, ServingHandle,
};
use serde_json::json;
use tonic::Code;

fn sample(value: serde_json::Value) -> Sample {
    Sample::from(value)
}

fn int_field(sample: &Sample, key: &str) -> i64 {
    match sample.get(key) {
        Some(Sample::Int(n)) => *n,
        other => panic!("expected int field `{}`, got {:?}", key, other),
    }
}

fn calls() -> Vec<CallSpec> {
    let ping = CallSpec::new(
        "Ping",
        MessageSample::new("PingRequest", sample(json!({"id": 1, "name": "x"}))),
        MessageSample::new("PingResponse", sample(json!({"ok": true}))),
        CallingConvention::Unary,
        handler_fn(|call| async move {
            if let Call::Unary { respond, .. } = call {
                respond.ok(sample(json!({"ok": true})));
            }
        }),
    );

    let sum = CallSpec::new(
        "Sum",
        MessageSample::new("Addend", sample(json!({"n": 1}))),
        MessageSample::new("Total", sample(json!({"total": 1}))),
        CallingConvention::ClientStream,
        handler_fn(|call| async move {
            if let Call::ClientStream { requests, respond } = call {
                let mut requests = requests.into_inner();
                let mut total = 0;
                loop {
                    match requests.message().await {
                        Ok(Some(addend)) => total += int_field(&addend, "n"),
                        Ok(None) => break,
                        Err(status) => {
                            respond.error(status);
                            return;
                        }
                    }
                }
                respond.ok(sample(json!({"total": total})));
            }
        }),
    );

    let count = CallSpec::new(
        "Count",
        MessageSample::new("CountRequest", sample(json!({"n": 3}))),
        MessageSample::new("Tick", sample(json!({"seq": 1}))),
        CallingConvention::ServerStream,
        handler_fn(|call| async move {
            if let Call::ServerStream { request, sink } = call {
                let n = int_field(request.get_ref(), "n");
                for seq in 1..=n {
                    if !sink.write(sample(json!({"seq": seq}))).await {
                        break;
                    }
                }
            }
        }),
    );

    let chat = CallSpec::new(
        "Chat",
        MessageSample::new("ChatMessage", sample(json!({"text": "hi"}))),
        MessageSample::new("ChatMessage", sample(json!({"text": "hi"}))),
        CallingConvention::BidiStream,
        handler_fn(|call| async move {
            if let Call::BidiStream { requests, sink } = call {
                let mut requests = requests.into_inner();
                while let Ok(Some(message)) = requests.message().await {
                    if !sink.write(message).await {
                        break;
                    }
                }
            }
        }),
    );

    let silent = CallSpec::new(
        "Silent",
        MessageSample::new("PingRequest", sample(json!({"id": 1, "name": "x"}))),
        MessageSample::new("PingResponse", sample(json!({"ok": true}))),
        CallingConvention::Unary,
        handler_fn(|call| async move {
            drop(call);
        }),
    );

    vec![ping, sum, count, chat, silent]
}

fn create_service() -> DynamicService {
    let mut service = DynamicService::new("demo.Example");
    service.register_calls(calls()).unwrap();
    service
}

async fn create_test_service() -> (ServingHandle, DynamicClient) {
    let service = create_service();
    let handle = service
        .serve("127.0.0.1:0", ServerCredentials::Insecure)
        .await
        .unwrap();
    let client = service
        .build_client(&handle.local_addr().to_string(), ClientCredentials::Insecure)
        .await
        .unwrap();
    (handle, client)
}

#[tokio::test]
async fn test_unary_call() {
    let (handle, mut client) = create_test_service().await;

    let reply = client
        .unary("Ping", sample(json!({"id": 7, "name": "probe"})))
        .await
        .unwrap();
    assert_eq!(reply, sample(json!({"ok": true})));

    drop(client);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_streaming_call() {
    let (handle, mut client) = create_test_service().await;

    let requests = futures::stream::iter(vec![
        sample(json!({"n": 1})),
        sample(json!({"n": 2})),
        sample(json!({"n": 3})),
    ]);
    let reply = client.client_streaming("Sum", requests).await.unwrap();
    assert_eq!(int_field(&reply, "total"), 6);

    drop(client);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_server_streaming_call() {
    let (handle, mut client) = create_test_service().await;

    let mut replies = client
        .server_streaming("Count", sample(json!({"n": 4})))
        .await
        .unwrap();
    let mut seqs = Vec::new();
    while let Some(tick) = replies.message().await.unwrap() {
        seqs.push(int_field(&tick, "seq"));
    }
    assert_eq!(seqs, vec![1, 2, 3, 4]);

    drop(client);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bidi_streaming_call() {
    let (handle, mut client) = create_test_service().await;

    let requests = futures::stream::iter(vec![
        sample(json!({"text": "one"})),
        sample(json!({"text": "two"})),
    ]);
    let mut replies = client.streaming("Chat", requests).await.unwrap();
    let mut texts = Vec::new();
    while let Some(message) = replies.message().await.unwrap() {
        texts.push(message.get("text").cloned().unwrap());
    }
    assert_eq!(texts, vec![Sample::from("one"), Sample::from("two")]);

    drop(client);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropped_responder() {
    let (handle, mut client) = create_test_service().await;

    let status = client
        .unary("Silent", sample(json!({"id": 1, "name": "x"})))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);

    drop(client);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_rejects_unknown_and_mismatched_methods() {
    let (handle, mut client) = create_test_service().await;

    let status = client
        .unary("Missing", sample(json!({"id": 1})))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    let status = client
        .unary("Chat", sample(json!({"text": "hi"})))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);

    drop(client);
    handle.shutdown().await.unwrap();
}

#[test]
fn test_client_and_server_share_descriptors() {
    let service = create_service();
    let server = service.build_server().unwrap();

    let mut paths: Vec<_> = server.paths().map(str::to_string).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "/demo.Example/Chat",
            "/demo.Example/Count",
            "/demo.Example/Ping",
            "/demo.Example/Silent",
            "/demo.Example/Sum",
        ]
    );

    let descriptor_paths: Vec<_> = service.methods().map(|m| m.path.clone()).collect();
    assert_eq!(descriptor_paths, paths);
}

#[tokio::test]
async fn test_bind_failure() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap().to_string();

    let result = create_service()
        .serve(&addr, ServerCredentials::Insecure)
        .await;
    assert!(matches!(result, Err(Error::TransportBind { .. })));
}

#[tokio::test]
async fn test_failed_registration_is_never_served() {
    let mut service = DynamicService::new("demo.Example");
    let result = service.register_calls([CallSpec::new(
        "Measure",
        MessageSample::new("Reading", sample(json!({"value": 0.1}))),
        MessageSample::new("Ack", sample(json!({"ok": true}))),
        CallingConvention::Unary,
        handler_fn(|_call| async {}),
    )]);

    assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    assert!(service.registry().lookup("Reading").is_none());
    assert_eq!(service.methods().count(), 0);
}

#[test]
fn test_partial_batch_is_rolled_back() {
    let mut service = DynamicService::new("demo.Example");
    let mut batch = calls();
    batch.truncate(1);
    batch.push(CallSpec::new(
        "Measure",
        MessageSample::new("Reading", sample(json!({"value": 0.1}))),
        MessageSample::new("Ack", sample(json!({"ok": true}))),
        CallingConvention::Unary,
        handler_fn(|_call| async {}),
    ));

    let result = service.register_calls(batch);
    assert!(matches!(result, Err(Error::SchemaMismatch { .. })));

    // Ping was bound before Measure failed and is gone with it.
    assert_eq!(service.methods().count(), 0);
    assert!(service.registry().lookup("PingRequest").is_none());
    assert!(service.registry().service().endpoints().is_empty());
    assert_eq!(service.build_server().unwrap().paths().count(), 0);

    // The rolled-back service still accepts a good batch.
    service.register_calls(calls()).unwrap();
    assert_eq!(service.methods().count(), 5);
}

#[tokio::test]
async fn test_create_serves_and_connects() {
    let (service, handle, mut client) = DynamicService::create(
        "demo.Example",
        calls(),
        "127.0.0.1:0",
        ServerCredentials::Insecure,
        ClientCredentials::Insecure,
    )
    .await
    .unwrap();
    assert_eq!(service.methods().count(), 5);

    let reply = client
        .unary("Ping", sample(json!({"id": 2, "name": "y"})))
        .await
        .unwrap();
    assert_eq!(reply, sample(json!({"ok": true})));

    drop(client);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_create_reports_registration_errors() {
    let result = DynamicService::create(
        "demo.Example",
        [CallSpec::new(
            "Measure",
            MessageSample::new("Reading", sample(json!({"value": 0.1}))),
            MessageSample::new("Ack", sample(json!({"ok": true}))),
            CallingConvention::Unary,
            handler_fn(|_call| async {}),
        )],
        "127.0.0.1:0",
        ServerCredentials::Insecure,
        ClientCredentials::Insecure,
    )
    .await;
    assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
}

#[tokio::test]
async fn test_panicking_stream_handler_fails_the_stream() {
    let watch = CallSpec::new(
        "Watch",
        MessageSample::new("WatchRequest", sample(json!({"n": 1}))),
        MessageSample::new("Event", sample(json!({"seq": 1}))),
        CallingConvention::ServerStream,
        handler_fn(|call| async move {
            if let Call::ServerStream { sink, .. } = call {
                sink.write(sample(json!({"seq": 1}))).await;
                panic!("watch handler failed");
            }
        }),
    );
    let (_service, handle, mut client) = DynamicService::create(
        "demo.Watcher",
        [watch],
        "127.0.0.1:0",
        ServerCredentials::Insecure,
        ClientCredentials::Insecure,
    )
    .await
    .unwrap();

    let mut events = client
        .server_streaming("Watch", sample(json!({"n": 1})))
        .await
        .unwrap();
    let first = events.message().await.unwrap();
    assert_eq!(first, Some(sample(json!({"seq": 1}))));
    let status = events.message().await.unwrap_err();
    assert_eq!(status.code(), Code::Internal);

    drop(events);
    drop(client);
    handle.shutdown().await.unwrap();
}
