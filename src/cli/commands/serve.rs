use super::LoggingConfig;
use crate::config::Settings;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ServeCommand {
    /// Manifest describing the service
    #[arg(short = 'm', long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Listen address in host:port format
    #[arg(long, value_name = "HOST:PORT")]
    pub listen: Option<String>,

    /// Path to TLS certificate
    #[arg(long, value_name = "FILE", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key
    #[arg(long, value_name = "FILE", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Path to CA certificate for client authentication
    #[arg(long, value_name = "FILE")]
    pub tls_client_ca: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl ServeCommand {
    /// Logging options, falling back to `server.log_level` from the settings.
    pub fn effective_logging(&self) -> LoggingConfig {
        match Settings::load(self.config.as_deref()) {
            Ok(settings) => self.logging.clone().or_level(&settings.server.log_level),
            // run_server reports the error once logging is up
            Err(_) => self.logging.clone(),
        }
    }
}
