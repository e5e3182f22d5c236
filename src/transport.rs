//! Transport credentials.

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

/// Credentials a server listens with.
#[derive(Debug, Clone, Default)]
pub enum ServerCredentials {
    #[default]
    Insecure,
    Tls(ServerTlsConfig),
}

impl ServerCredentials {
    pub fn insecure() -> Self {
        ServerCredentials::Insecure
    }

    /// TLS from a PEM certificate chain and key, optionally requiring client
    /// certificates signed by `client_ca`.
    pub fn from_pem(cert: &[u8], key: &[u8], client_ca: Option<&[u8]>) -> Self {
        let mut config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));
        if let Some(ca) = client_ca {
            config = config.client_ca_root(Certificate::from_pem(ca));
        }
        ServerCredentials::Tls(config)
    }
}

/// Credentials a client dials with.
#[derive(Debug, Clone, Default)]
pub enum ClientCredentials {
    #[default]
    Insecure,
    Tls(ClientTlsConfig),
}

impl ClientCredentials {
    pub fn insecure() -> Self {
        ClientCredentials::Insecure
    }

    /// TLS verifying the server against a PEM CA certificate.
    pub fn with_ca(ca: &[u8]) -> Self {
        ClientCredentials::Tls(ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca)))
    }

    /// Adds a client identity for mutual TLS.
    pub fn with_identity(self, cert: &[u8], key: &[u8]) -> Self {
        let config = match self {
            ClientCredentials::Insecure => ClientTlsConfig::new(),
            ClientCredentials::Tls(config) => config,
        };
        ClientCredentials::Tls(config.identity(Identity::from_pem(cert, key)))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, ClientCredentials::Tls(_))
    }
}

/// Normalizes `host:port` into a URI, picking the scheme from the credentials.
pub fn endpoint_uri(address: &str, credentials: &ClientCredentials) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else if credentials.is_tls() {
        format!("https://{}", address)
    } else {
        format!("http://{}", address)
    }
}
