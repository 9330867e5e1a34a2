//! Bearer token sources.

use crate::Result;
use parking_lot::RwLock;
use std::fmt;
use std::time::{Duration, Instant};

/// Supplies the bearer token for outgoing requests.
///
/// Called before every attempt, retries included, so implementations can
/// hand out a refreshed token. Returning `None`, an empty or a blank string
/// leaves the request without an `Authorization` header. The call sits on
/// the request path and must be cheap in the common case.
pub trait TokenProvider: Send + Sync {
    /// Current token, if any.
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// A token and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Token value, without the `Bearer ` prefix.
    pub value: String,
    /// Expiry instant.
    pub expires_at: Instant,
}

impl IssuedToken {
    /// A token valid for `ttl` from now.
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn usable_at(&self, now: Instant, skew: Duration) -> bool {
        now.checked_add(skew)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

type IssueFn = dyn Fn() -> Result<IssuedToken> + Send + Sync;

/// Caches an issued token and refreshes it lazily near expiry.
///
/// Readers share a read lock. A refresh takes the write lock and checks
/// again before issuing, so concurrent callers that all saw a stale token
/// trigger one refresh, not one each.
pub struct CachedTokenProvider {
    cache: RwLock<Option<IssuedToken>>,
    issue: Box<IssueFn>,
    refresh_skew: Duration,
}

impl CachedTokenProvider {
    /// Default margin before expiry at which a token is refreshed.
    pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(30);

    /// Create a provider that issues tokens with `issue`.
    pub fn new<F>(issue: F) -> Self
    where
        F: Fn() -> Result<IssuedToken> + Send + Sync + 'static,
    {
        Self {
            cache: RwLock::new(None),
            issue: Box::new(issue),
            refresh_skew: Self::DEFAULT_REFRESH_SKEW,
        }
    }

    /// Refresh tokens this long before they expire.
    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Drop the cached token; the next call issues a new one.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    fn cached(&self, now: Instant) -> Option<String> {
        self.cache
            .read()
            .as_ref()
            .filter(|token| token.usable_at(now, self.refresh_skew))
            .map(|token| token.value.clone())
    }
}

impl TokenProvider for CachedTokenProvider {
    fn token(&self) -> Option<String> {
        if let Some(token) = self.cached(Instant::now()) {
            return Some(token);
        }

        let mut cache = self.cache.write();
        let now = Instant::now();
        if let Some(token) = cache
            .as_ref()
            .filter(|token| token.usable_at(now, self.refresh_skew))
        {
            return Some(token.value.clone());
        }

        match (self.issue)() {
            Ok(token) => {
                tracing::debug!("Issued new bearer token");
                let value = token.value.clone();
                *cache = Some(token);
                Some(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to issue bearer token");
                // Still inside the refresh window but not yet expired.
                cache
                    .as_ref()
                    .filter(|token| token.usable_at(now, Duration::ZERO))
                    .map(|token| token.value.clone())
            }
        }
    }
}

impl fmt::Debug for CachedTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedTokenProvider")
            .field("cached", &self.cache.read().is_some())
            .field("refresh_skew", &self.refresh_skew)
            .finish()
    }
}
