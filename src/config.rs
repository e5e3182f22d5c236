//! Configuration management for the dynrpc server.
//!
//! Settings are loaded from, in order of precedence (later sources win):
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/dynrpc/config.toml`)
//! 3. User-specified configuration file
//! 4. Environment variables (prefixed with `DYNRPC_`, `__` separating sections)
//! 5. Command-line arguments, applied by the caller
//!
//! # Environment Variables
//!
//! - `DYNRPC_SERVER__HOST` - Listen host
//! - `DYNRPC_SERVER__PORT` - Listen port
//! - `DYNRPC_SERVER__LOG_LEVEL` - Log level for `serve` when `--log-level` is absent
//! - `DYNRPC_TLS__CERT_PATH` / `DYNRPC_TLS__KEY_PATH` - Server certificate and key
//! - `DYNRPC_TLS__CA_PATH` - CA used to verify client certificates

use crate::error::Result;
use crate::transport::ServerCredentials;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SYSTEM_CONFIG: &str = "/etc/dynrpc/config.toml";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub tls: TlsSettings,
}

/// Listen address and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// PEM files for TLS. TLS is enabled when both cert and key are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Client CA; when set, clients must present a certificate.
    pub ca_path: Option<PathBuf>,
}

impl Settings {
    /// Load configuration from all sources
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(SYSTEM_CONFIG).required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DYNRPC")
                .prefix_separator("_")
                .separator("__"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Reads the configured PEM files into server credentials.
    pub fn server_credentials(&self) -> Result<ServerCredentials> {
        self.tls.server_credentials()
    }
}

impl TlsSettings {
    pub fn enabled(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }

    pub fn server_credentials(&self) -> Result<ServerCredentials> {
        let (Some(cert_path), Some(key_path)) = (&self.cert_path, &self.key_path) else {
            return Ok(ServerCredentials::Insecure);
        };
        let cert = std::fs::read(cert_path)?;
        let key = std::fs::read(key_path)?;
        let ca = self.ca_path.as_ref().map(std::fs::read).transpose()?;
        Ok(ServerCredentials::from_pem(&cert, &key, ca.as_deref()))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    50051
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.server.port, 50051);
        assert_eq!(settings.server.log_level, "info");
        assert!(!settings.tls.enabled());
        assert!(matches!(
            settings.server_credentials().unwrap(),
            ServerCredentials::Insecure
        ));
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nhost = \"0.0.0.0\"\nport = 6000").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.listen_address(), "0.0.0.0:6000");
        assert_eq!(settings.server.log_level, "info");
    }

    #[test]
    fn test_missing_tls_files() {
        let tls = TlsSettings {
            cert_path: Some(PathBuf::from("/nonexistent/cert.pem")),
            key_path: Some(PathBuf::from("/nonexistent/key.pem")),
            ca_path: None,
        };
        assert!(tls.enabled());
        assert!(tls.server_credentials().is_err());
    }
}
