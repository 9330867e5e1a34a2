//! TLS support: key stores, client key selection and the rustls context.

mod builder;
mod key_manager;
mod keystore;

pub use builder::{TlsContext, TlsContextBuilder, TlsMode};
pub use key_manager::{AliasSelectingKeyManager, KeyManager, KeyManagerResolver, StoreKeyManager};
pub use keystore::{KeyEntry, KeyStore};
