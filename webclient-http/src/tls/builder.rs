//! TLS context construction from [`SslConfig`].

use super::key_manager::{AliasSelectingKeyManager, KeyManager, KeyManagerResolver, StoreKeyManager};
use super::keystore::KeyStore;
use crate::config::SslConfig;
use crate::{HttpClientError, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme, SupportedProtocolVersion};
use std::sync::Arc;

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// How the server certificate is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Verified against the truststore or the bundled web PKI roots.
    Verified,
    /// Every server certificate is accepted.
    Insecure,
}

/// A ready rustls client configuration.
#[derive(Debug, Clone)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
    mode: TlsMode,
    client_auth: bool,
}

impl TlsContext {
    /// The rustls configuration.
    pub fn client_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared handle to the rustls configuration.
    pub fn shared_config(&self) -> Arc<ClientConfig> {
        self.config.clone()
    }

    /// Verification mode.
    pub fn mode(&self) -> TlsMode {
        self.mode
    }

    /// Whether a client key is presented on request.
    pub fn has_client_auth(&self) -> bool {
        self.client_auth
    }
}

/// Builds a [`TlsContext`] from the TLS settings.
#[derive(Debug, Clone)]
pub struct TlsContextBuilder {
    ssl: SslConfig,
}

impl TlsContextBuilder {
    /// Builder for `ssl`.
    pub fn new(ssl: SslConfig) -> Self {
        Self { ssl }
    }

    /// Build the context. Returns `None` when TLS customization is disabled,
    /// in which case the transport keeps its defaults.
    pub fn build(&self) -> Result<Option<TlsContext>> {
        if !self.ssl.enabled {
            return Ok(None);
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let versions = protocol_versions(&self.ssl.tls_protocol)?;
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(versions)
            .map_err(|e| HttpClientError::tls(format!("Unsupported TLS protocol setup: {}", e)))?;

        if self.ssl.bypass_verification {
            tracing::warn!(
                "TLS certificate verification is disabled; every server certificate is accepted"
            );
            let config = builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new(&provider)))
                .with_no_client_auth();
            return Ok(Some(TlsContext {
                config: Arc::new(config),
                mode: TlsMode::Insecure,
                client_auth: false,
            }));
        }

        let roots = match self.ssl.truststore() {
            Some(path) => KeyStore::load(
                path,
                &self.ssl.truststore_type,
                self.ssl.truststore_password.as_deref(),
            )?
            .root_store()?,
            None => RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            },
        };
        let builder = builder.with_root_certificates(roots);

        let (config, client_auth) = match self.key_manager()? {
            Some(manager) => (
                builder.with_client_cert_resolver(Arc::new(KeyManagerResolver::new(manager))),
                true,
            ),
            None => (builder.with_no_client_auth(), false),
        };

        tracing::info!(
            protocol = %self.ssl.tls_protocol,
            truststore = self.ssl.truststore().is_some(),
            client_auth,
            "Initialized TLS context"
        );

        Ok(Some(TlsContext {
            config: Arc::new(config),
            mode: TlsMode::Verified,
            client_auth,
        }))
    }

    fn key_manager(&self) -> Result<Option<Arc<dyn KeyManager>>> {
        let Some(path) = self.ssl.keystore() else {
            if let Some(alias) = self.ssl.key_alias() {
                tracing::warn!(alias, "Key alias configured without a keystore; ignoring it");
            }
            return Ok(None);
        };

        let store = KeyStore::load(
            path,
            &self.ssl.keystore_type,
            self.ssl.keystore_password.as_deref(),
        )?;
        if store.entries().is_empty() {
            return Err(HttpClientError::tls(format!(
                "Keystore {} contains no private key",
                path
            )));
        }

        let manager = StoreKeyManager::new(Arc::new(store));
        let manager: Arc<dyn KeyManager> = match self.ssl.key_alias() {
            Some(alias) => {
                if manager.store().entry(alias).is_none() {
                    tracing::warn!(alias, "Configured key alias not found in keystore");
                }
                Arc::new(AliasSelectingKeyManager::new(manager, alias))
            }
            None => Arc::new(manager),
        };
        Ok(Some(manager))
    }
}

fn protocol_versions(protocol: &str) -> Result<&'static [&'static SupportedProtocolVersion]> {
    match protocol {
        "TLSv1.2" => Ok(TLS12_ONLY),
        "TLSv1.3" => Ok(TLS13_ONLY),
        "TLS" => Ok(rustls::ALL_VERSIONS),
        other => Err(HttpClientError::tls(format!("Unsupported TLS protocol: {}", other))),
    }
}

/// Accepts every server certificate and handshake signature.
#[derive(Debug)]
struct AcceptAnyServerCert {
    schemes: Vec<SignatureScheme>,
}

impl AcceptAnyServerCert {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            schemes: provider.signature_verification_algorithms.supported_schemes(),
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}
