//! Key and trust material loaded from PKCS12 or PEM files.

use crate::config::{STORE_TYPE_PEM, STORE_TYPE_PKCS12};
use crate::{HttpClientError, Result};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::SigningKey;
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// A private key, its certificate chain and the alias it is stored under.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    alias: String,
    chain: Vec<CertificateDer<'static>>,
    key: Arc<dyn SigningKey>,
}

impl KeyEntry {
    /// Create an entry. The leaf certificate comes first in `chain`.
    pub fn new(
        alias: impl Into<String>,
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self> {
        let alias = alias.into();
        if chain.is_empty() {
            return Err(HttpClientError::tls(format!(
                "Key entry '{}' has no certificate",
                alias
            )));
        }
        let key = rustls::crypto::ring::sign::any_supported_type(&key).map_err(|e| {
            HttpClientError::tls(format!("Unsupported private key for '{}': {}", alias, e))
        })?;
        Ok(Self { alias, chain, key })
    }

    /// Alias of the entry.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Certificate chain, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Signing key.
    pub fn signing_key(&self) -> &Arc<dyn SigningKey> {
        &self.key
    }
}

/// Key entries and trusted certificates.
///
/// Entries keep the order of the source file; PKCS12 stores list them
/// sorted by alias.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    entries: Vec<KeyEntry>,
    trusted: Vec<CertificateDer<'static>>,
}

impl KeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key entry.
    pub fn with_entry(mut self, entry: KeyEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Add a trusted certificate.
    pub fn with_trusted(mut self, certificate: CertificateDer<'static>) -> Self {
        self.trusted.push(certificate);
        self
    }

    /// Load a store of the given type (`PKCS12` or `PEM`) from a file.
    pub fn load(path: impl AsRef<Path>, store_type: &str, password: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            HttpClientError::tls(format!("Failed to read store {}: {}", path.display(), e))
        })?;

        let store = if store_type.eq_ignore_ascii_case(STORE_TYPE_PKCS12) {
            Self::from_pkcs12(&data, password)?
        } else if store_type.eq_ignore_ascii_case(STORE_TYPE_PEM) {
            let alias = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("default");
            Self::from_pem(&data, alias)?
        } else {
            return Err(HttpClientError::tls(format!(
                "Unsupported store type: {}",
                store_type
            )));
        };

        tracing::debug!(
            path = %path.display(),
            store_type,
            keys = store.entries.len(),
            trusted = store.trusted.len(),
            "Loaded key store"
        );
        Ok(store)
    }

    /// Parse a PKCS12 archive. Friendly names become aliases.
    pub fn from_pkcs12(data: &[u8], password: Option<&str>) -> Result<Self> {
        let archive = p12_keystore::KeyStore::from_pkcs12(data, password.unwrap_or_default())
            .map_err(|e| HttpClientError::tls(format!("Failed to open PKCS12 store: {}", e)))?;

        let mut store = Self::new();
        for (alias, entry) in archive.entries() {
            match entry {
                p12_keystore::KeyStoreEntry::PrivateKeyChain(chain) => {
                    let certs = chain
                        .chain()
                        .iter()
                        .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
                        .collect();
                    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(chain.key().to_vec()));
                    store.entries.push(KeyEntry::new(alias.as_str(), certs, key)?);
                }
                p12_keystore::KeyStoreEntry::Certificate(cert) => {
                    store
                        .trusted
                        .push(CertificateDer::from(cert.as_der().to_vec()));
                }
            }
        }
        Ok(store)
    }

    /// Parse PEM text. Certificates followed by a private key form one
    /// entry under `alias`; without a key every certificate is trusted.
    pub fn from_pem(data: &[u8], alias: &str) -> Result<Self> {
        let mut reader = BufReader::new(data);
        let mut certs = Vec::new();
        let mut key = None;

        for item in rustls_pemfile::read_all(&mut reader) {
            let item =
                item.map_err(|e| HttpClientError::tls(format!("Invalid PEM data: {}", e)))?;
            match item {
                rustls_pemfile::Item::X509Certificate(cert) => certs.push(cert),
                rustls_pemfile::Item::Pkcs8Key(k) if key.is_none() => key = Some(k.into()),
                rustls_pemfile::Item::Pkcs1Key(k) if key.is_none() => key = Some(k.into()),
                rustls_pemfile::Item::Sec1Key(k) if key.is_none() => key = Some(k.into()),
                _ => {}
            }
        }

        if certs.is_empty() {
            return Err(HttpClientError::tls("PEM data contains no certificate"));
        }

        let store = match key {
            Some(key) => Self::new().with_entry(KeyEntry::new(alias, certs, key)?),
            None => Self {
                entries: Vec::new(),
                trusted: certs,
            },
        };
        Ok(store)
    }

    /// Key entries in store order.
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Look up an entry by alias.
    pub fn entry(&self, alias: &str) -> Option<&KeyEntry> {
        self.entries.iter().find(|entry| entry.alias == alias)
    }

    /// Aliases of every key entry.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(KeyEntry::alias)
    }

    /// Trusted certificates.
    pub fn trusted_certificates(&self) -> &[CertificateDer<'static>] {
        &self.trusted
    }

    /// Root store built from the trusted certificates.
    pub fn root_store(&self) -> Result<RootCertStore> {
        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(self.trusted.iter().cloned());
        if ignored > 0 {
            tracing::warn!(ignored, "Skipped unparsable trusted certificates");
        }
        if added == 0 {
            return Err(HttpClientError::tls("Trust store contains no usable certificate"));
        }
        Ok(roots)
    }
}
