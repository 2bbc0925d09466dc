use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Tokens are treated as expired this long before the issuer's expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Upper bound on how long an issued token is cached, whatever the issuer claims.
pub const MAX_CREDENTIAL_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// A bearer credential as returned by the issuer.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub access_token: String,
    pub expires_in: Duration,
}

#[derive(Clone)]
struct CachedCredential {
    access_token: String,
    expires_at: Instant,
}

/// Single bearer credential shared by every caller of one upstream client.
///
/// Readers take the snapshot lock only. A refresh holds `refresh` across the
/// token exchange so concurrent callers wait for that one exchange instead of
/// issuing their own.
pub struct CredentialCache {
    current: RwLock<Option<CachedCredential>>,
    refresh: Mutex<()>,
    margin: Duration,
}

impl CredentialCache {
    pub fn new(margin: Duration) -> Self {
        Self { current: RwLock::new(None), refresh: Mutex::new(()), margin }
    }

    /// Cached token if it stays valid for longer than the refresh margin.
    pub fn fresh_token(&self) -> Option<String> {
        let now = Instant::now();
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        guard
            .as_ref()
            .filter(|c| c.expires_at > now + self.margin)
            .map(|c| c.access_token.clone())
    }

    /// Return the cached token or obtain a new one through `fetch`.
    ///
    /// `fetch` runs at most once per expiry window no matter how many callers race here.
    pub async fn token_with<F, Fut, E>(&self, fetch: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedCredential, E>>,
    {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }
        let _refresh = self.refresh.lock().await;
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }
        let issued = fetch().await?;
        let lifetime = issued.expires_in.min(MAX_CREDENTIAL_LIFETIME);
        let expires_at = Instant::now() + lifetime;
        {
            let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
            *guard = Some(CachedCredential { access_token: issued.access_token.clone(), expires_at });
        }
        tracing::debug!(expires_in_secs = lifetime.as_secs(), "bearer credential refreshed");
        Ok(issued.access_token)
    }

    /// Drop the cached token, e.g. after the upstream answered 401.
    pub fn invalidate(&self) {
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

impl Default for CredentialCache {
    fn default() -> Self { Self::new(DEFAULT_REFRESH_MARGIN) }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("margin", &self.margin)
            .field("token", &"***redacted***")
            .finish()
    }
}
