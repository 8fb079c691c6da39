use super::token::AccessToken;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Single-slot token cache shared between clones of an authenticator.
///
/// Holds at most one token; readers only ever see a token that was fully
/// constructed by a successful acquisition. An expired token stays in the
/// slot until a replacement is stored, so a failed refresh leaves the cache
/// unchanged.
#[derive(Clone)]
pub struct TokenCache {
    slot: Arc<RwLock<Option<AccessToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the cached token if it is still usable.
    pub async fn get(&self) -> Option<AccessToken> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|token| !token.has_expired())
            .cloned()
    }

    /// Replaces the slot wholesale with a freshly acquired token.
    pub async fn store(&self, token: AccessToken) {
        let mut slot = self.slot.write().await;
        *slot = Some(token);
    }

    pub async fn clear(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn empty_cache_returns_none() {
        let cache = TokenCache::new();
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn stored_token_is_returned_while_valid() {
        let cache = TokenCache::new();
        cache
            .store(AccessToken::new(
                "tok".to_string(),
                Utc::now() + Duration::hours(1),
            ))
            .await;

        let cached = cache.get().await.unwrap();
        assert_eq!(cached.bearer_token, "tok");
    }

    #[tokio::test]
    async fn expired_token_is_not_served() {
        let cache = TokenCache::new();
        cache
            .store(AccessToken::new(
                "stale".to_string(),
                Utc::now() - Duration::seconds(5),
            ))
            .await;

        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn store_supersedes_previous_token() {
        let cache = TokenCache::new();
        let expiry = Utc::now() + Duration::hours(1);
        cache.store(AccessToken::new("first".to_string(), expiry)).await;
        cache.store(AccessToken::new("second".to_string(), expiry)).await;

        assert_eq!(cache.get().await.unwrap().bearer_token, "second");
    }
}
