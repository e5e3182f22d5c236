use super::LoggingConfig;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct CallCommand {
    /// Manifest describing the service
    #[arg(short = 'm', long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Method to call
    #[arg(long)]
    pub method: String,

    /// Request as JSON; a JSON array for client and bidirectional streams
    #[arg(short = 'd', long)]
    pub data: String,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:50051", env = "DYNRPC_ADDRESS")]
    pub address: String,

    /// Path to CA certificate; enables TLS
    #[arg(long, value_name = "FILE")]
    pub tls_ca: Option<PathBuf>,

    /// Path to client certificate for mutual TLS
    #[arg(long, value_name = "FILE", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// Path to client private key for mutual TLS
    #[arg(long, value_name = "FILE", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingConfig,
}
