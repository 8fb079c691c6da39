use chrono::{DateTime, Utc};

/// A bearer token together with its absolute expiry instant.
///
/// Tokens are immutable once constructed; a refreshed token fully replaces
/// the previous one in the [`TokenCache`](super::token_cache::TokenCache)
/// slot rather than being mutated in place.
#[derive(Clone, Debug)]
pub struct AccessToken {
    /// The opaque bearer string presented on subsequent requests.
    pub bearer_token: String,
    /// When the token stops being usable.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(bearer_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            bearer_token,
            expires_at,
        }
    }

    /// An empty bearer string counts as expired so a half-initialized token
    /// can never be served from the cache.
    pub fn has_expired(&self) -> bool {
        self.bearer_token.is_empty() || self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_with_future_expiry_is_valid() {
        let token = AccessToken::new("abc".to_string(), Utc::now() + Duration::hours(1));
        assert!(!token.has_expired());
    }

    #[test]
    fn token_with_past_expiry_is_expired() {
        let token = AccessToken::new("abc".to_string(), Utc::now() - Duration::seconds(1));
        assert!(token.has_expired());
    }

    #[test]
    fn empty_bearer_string_is_always_expired() {
        let token = AccessToken::new(String::new(), Utc::now() + Duration::hours(1));
        assert!(token.has_expired());
    }
}
