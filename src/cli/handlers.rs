use crate::{
    cli::commands::{CallCommand, SchemaCommand, ServeCommand},
    config::Settings,
    manifest::Manifest,
    rpc::CallingConvention,
    sample::Sample,
    transport::ClientCredentials,
};
use anyhow::{Context, Result};
use serde_json::Value;
use tonic::Streaming;

pub async fn run_server(cmd: ServeCommand) -> Result<()> {
    let mut settings =
        Settings::load(cmd.config.as_deref()).context("Failed to load configuration")?;

    if let Some(listen) = &cmd.listen {
        let (host, port) = listen
            .rsplit_once(':')
            .context("Listen address must be HOST:PORT")?;
        settings.server.host = host.to_string();
        settings.server.port = port.parse().context("Invalid listen port")?;
    }
    if cmd.tls_cert.is_some() {
        settings.tls.cert_path = cmd.tls_cert.clone();
        settings.tls.key_path = cmd.tls_key.clone();
    }
    if cmd.tls_client_ca.is_some() {
        settings.tls.ca_path = cmd.tls_client_ca.clone();
    }

    let manifest = Manifest::from_path(&cmd.manifest)
        .with_context(|| format!("Failed to read manifest {}", cmd.manifest.display()))?;
    let service = manifest
        .into_service()
        .context("Failed to register manifest calls")?;
    let credentials = settings
        .server_credentials()
        .context("Failed to load TLS credentials")?;

    let addr = settings.listen_address();
    tracing::info!(service = %service.name(), tls = settings.tls.enabled(), "Starting server on {}", addr);
    let handle = service
        .serve(&addr, credentials)
        .await
        .context("Failed to start server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    handle.shutdown().await.context("Server error")?;

    Ok(())
}

pub async fn run_call(cmd: CallCommand) -> Result<()> {
    let manifest = Manifest::from_path(&cmd.manifest)
        .with_context(|| format!("Failed to read manifest {}", cmd.manifest.display()))?;
    let service = manifest
        .into_service()
        .context("Failed to register manifest calls")?;

    let mut credentials = match &cmd.tls_ca {
        Some(path) => ClientCredentials::with_ca(
            &std::fs::read(path).context("Failed to read CA certificate")?,
        ),
        None => ClientCredentials::Insecure,
    };
    if let (Some(cert), Some(key)) = (&cmd.tls_cert, &cmd.tls_key) {
        credentials = credentials.with_identity(
            &std::fs::read(cert).context("Failed to read client certificate")?,
            &std::fs::read(key).context("Failed to read client key")?,
        );
    }

    let data: Value = serde_json::from_str(&cmd.data).context("Request data is not valid JSON")?;
    let mut client = service
        .build_client(&cmd.address, credentials)
        .await
        .with_context(|| format!("Failed to connect to {}", cmd.address))?;
    let convention = client
        .method(&cmd.method)
        .map(|m| m.convention)
        .with_context(|| format!("Unknown method: {}", cmd.method))?;

    tracing::debug!(method = %cmd.method, %convention, "calling");
    match convention {
        CallingConvention::Unary => {
            let reply = client.unary(&cmd.method, Sample::from(data)).await?;
            print_sample(&reply)?;
        }
        CallingConvention::ClientStream => {
            let requests = futures::stream::iter(request_stream(data));
            let reply = client.client_streaming(&cmd.method, requests).await?;
            print_sample(&reply)?;
        }
        CallingConvention::ServerStream => {
            let replies = client.server_streaming(&cmd.method, Sample::from(data)).await?;
            print_stream(replies).await?;
        }
        CallingConvention::BidiStream => {
            let requests = futures::stream::iter(request_stream(data));
            let replies = client.streaming(&cmd.method, requests).await?;
            print_stream(replies).await?;
        }
    }

    Ok(())
}

pub fn print_schema(cmd: SchemaCommand) -> Result<()> {
    let manifest = Manifest::from_path(&cmd.manifest)
        .with_context(|| format!("Failed to read manifest {}", cmd.manifest.display()))?;
    let service = manifest
        .into_service()
        .context("Failed to register manifest calls")?;
    print!("{}", service.registry().to_proto_source());
    Ok(())
}

/// A JSON array is sent element by element; anything else as one message.
fn request_stream(data: Value) -> Vec<Sample> {
    match data {
        Value::Array(items) => items.into_iter().map(Sample::from).collect(),
        other => vec![Sample::from(other)],
    }
}

fn print_sample(sample: &Sample) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&sample.to_json())?);
    Ok(())
}

async fn print_stream(mut replies: Streaming<Sample>) -> Result<()> {
    while let Some(reply) = replies.message().await? {
        print_sample(&reply)?;
    }
    Ok(())
}
