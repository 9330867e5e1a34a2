//! Client key selection for mutual TLS.

use super::keystore::KeyStore;
use rustls::SignatureScheme;
use rustls::client::ResolvesClientCert;
use rustls::pki_types::CertificateDer;
use rustls::sign::{CertifiedKey, SigningKey};
use std::fmt;
use std::sync::Arc;

/// Chooses which key to present and answers queries about stored keys.
///
/// `issuers` are DER-encoded distinguished names of acceptable issuers and
/// may be empty. `schemes` are the signature schemes the peer accepts; an
/// empty slice places no restriction.
pub trait KeyManager: Send + Sync + fmt::Debug {
    /// Alias of the key to present as a client.
    fn choose_client_alias(&self, issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Option<String>;

    /// Alias of the key to present as a server.
    fn choose_server_alias(&self, issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Option<String>;

    /// Certificate chain stored under `alias`, leaf first.
    fn certificate_chain(&self, alias: &str) -> Option<Vec<CertificateDer<'static>>>;

    /// Private key stored under `alias`.
    fn private_key(&self, alias: &str) -> Option<Arc<dyn SigningKey>>;

    /// Every alias usable as a client key.
    fn client_aliases(&self, issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Vec<String>;

    /// Every alias usable as a server key.
    fn server_aliases(&self, issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Vec<String>;
}

/// Picks the first key in the store whose algorithm the peer accepts.
///
/// Issuer hints are not matched.
#[derive(Debug, Clone)]
pub struct StoreKeyManager {
    store: Arc<KeyStore>,
}

impl StoreKeyManager {
    /// Manager over `store`.
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    fn usable_aliases(&self, schemes: &[SignatureScheme]) -> Vec<String> {
        self.store
            .entries()
            .iter()
            .filter(|entry| schemes.is_empty() || entry.signing_key().choose_scheme(schemes).is_some())
            .map(|entry| entry.alias().to_string())
            .collect()
    }
}

impl KeyManager for StoreKeyManager {
    fn choose_client_alias(&self, _issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Option<String> {
        self.usable_aliases(schemes).into_iter().next()
    }

    fn choose_server_alias(&self, _issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Option<String> {
        self.usable_aliases(schemes).into_iter().next()
    }

    fn certificate_chain(&self, alias: &str) -> Option<Vec<CertificateDer<'static>>> {
        self.store.entry(alias).map(|entry| entry.chain().to_vec())
    }

    fn private_key(&self, alias: &str) -> Option<Arc<dyn SigningKey>> {
        self.store.entry(alias).map(|entry| entry.signing_key().clone())
    }

    fn client_aliases(&self, _issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Vec<String> {
        self.usable_aliases(schemes)
    }

    fn server_aliases(&self, _issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Vec<String> {
        self.usable_aliases(schemes)
    }
}

/// Always selects one configured alias; every query is delegated.
///
/// The alias is returned even when the wrapped manager would have picked a
/// different key or none at all.
#[derive(Debug, Clone)]
pub struct AliasSelectingKeyManager<K> {
    delegate: K,
    alias: String,
}

impl<K: KeyManager> AliasSelectingKeyManager<K> {
    /// Wrap `delegate`, forcing `alias`.
    pub fn new(delegate: K, alias: impl Into<String>) -> Self {
        Self {
            delegate,
            alias: alias.into(),
        }
    }

    /// The forced alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The wrapped manager.
    pub fn delegate(&self) -> &K {
        &self.delegate
    }
}

impl<K: KeyManager> KeyManager for AliasSelectingKeyManager<K> {
    fn choose_client_alias(&self, _issuers: &[&[u8]], _schemes: &[SignatureScheme]) -> Option<String> {
        Some(self.alias.clone())
    }

    fn choose_server_alias(&self, _issuers: &[&[u8]], _schemes: &[SignatureScheme]) -> Option<String> {
        Some(self.alias.clone())
    }

    fn certificate_chain(&self, alias: &str) -> Option<Vec<CertificateDer<'static>>> {
        self.delegate.certificate_chain(alias)
    }

    fn private_key(&self, alias: &str) -> Option<Arc<dyn SigningKey>> {
        self.delegate.private_key(alias)
    }

    fn client_aliases(&self, issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Vec<String> {
        self.delegate.client_aliases(issuers, schemes)
    }

    fn server_aliases(&self, issuers: &[&[u8]], schemes: &[SignatureScheme]) -> Vec<String> {
        self.delegate.server_aliases(issuers, schemes)
    }
}

/// Presents the client key chosen by a [`KeyManager`] during handshakes.
#[derive(Debug, Clone)]
pub struct KeyManagerResolver {
    manager: Arc<dyn KeyManager>,
}

impl KeyManagerResolver {
    /// Resolver backed by `manager`.
    pub fn new(manager: Arc<dyn KeyManager>) -> Self {
        Self { manager }
    }
}

impl ResolvesClientCert for KeyManagerResolver {
    fn resolve(
        &self,
        root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        let alias = self.manager.choose_client_alias(root_hint_subjects, sigschemes)?;
        let (Some(chain), Some(key)) = (
            self.manager.certificate_chain(&alias),
            self.manager.private_key(&alias),
        ) else {
            tracing::warn!(alias, "No key material stored under the selected alias");
            return None;
        };
        tracing::debug!(alias, "Presenting client certificate");
        Some(Arc::new(CertifiedKey::new(chain, key)))
    }

    fn has_certs(&self) -> bool {
        !self.manager.client_aliases(&[], &[]).is_empty()
    }
}
