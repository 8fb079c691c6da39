use super::assertion::build_client_assertion;
use super::credentials::Credential;
use super::token::AccessToken;
use super::token_cache::TokenCache;
use crate::errors::AuthError;
use crate::management::ManagementClient;
use chrono::{TimeZone, Utc};

/// Default audience for issued tokens and base of the management API.
pub const AZURE_MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";
const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
/// Fixed endpoint used by the password grant, regardless of any authority
/// override.
const WINDOWS_LOGIN_AUTHORITY: &str = "https://login.windows.net";
const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";

/// Acquires and caches Azure AD bearer tokens for a single credential.
///
/// The credential variant is fixed at construction; every [`get_token`]
/// call serves the cached token while it is valid and otherwise performs
/// exactly one acquisition routed to that variant. A failed acquisition
/// leaves the cache untouched and propagates the error; there is no
/// fallback between credential mechanisms and no retry at this layer.
///
/// Clones share the same cache slot.
///
/// [`get_token`]: Authenticator::get_token
#[derive(Clone)]
pub struct Authenticator {
    credential: Credential,
    cache: TokenCache,
    http_client: reqwest::Client,
    /// Audience override. Honored by the managed identity and service
    /// principal flows; the certificate flow always targets the management
    /// resource.
    authority: Option<String>,
    authority_host: String,
    password_grant_host: String,
    identity_endpoint: String,
    management_url: String,
}

impl Authenticator {
    /// Creates an authenticator for the given credential, targeting the
    /// standard management audience.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if any mandatory credential
    /// field is missing; no network call is attempted in that case.
    pub fn new(credential: Credential) -> Result<Self, AuthError> {
        credential.validate()?;
        Ok(Self {
            credential,
            cache: TokenCache::new(),
            http_client: reqwest::Client::new(),
            authority: None,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            password_grant_host: WINDOWS_LOGIN_AUTHORITY.to_string(),
            identity_endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            management_url: crate::management::AZURE_MANAGEMENT_URL.to_string(),
        })
    }

    /// Creates an authenticator requesting tokens for a non-default
    /// audience, e.g. an app registration URL.
    pub fn with_authority(
        credential: Credential,
        authority: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let mut authenticator = Self::new(credential)?;
        authenticator.authority = Some(authority.into());
        Ok(authenticator)
    }

    /// Overrides the Azure AD authority host used for token issuance.
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.authority_host = host.clone();
        self.password_grant_host = host;
        self
    }

    /// Overrides the local identity (IMDS) endpoint.
    pub fn with_identity_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.identity_endpoint = endpoint.into();
        self
    }

    /// Overrides the management API base URL used by handles from
    /// [`management_client`](Authenticator::management_client).
    pub fn with_management_url(mut self, url: impl Into<String>) -> Self {
        self.management_url = url.into();
        self
    }

    fn audience(&self) -> &str {
        self.authority.as_deref().unwrap_or(AZURE_MANAGEMENT_RESOURCE)
    }

    /// Returns a usable bearer token, acquiring a fresh one if the cache is
    /// empty or the cached token has expired.
    ///
    /// Concurrent callers may race into duplicate acquisitions; each caller
    /// still either receives a fully constructed token or an error.
    pub async fn get_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cache.get().await {
            log::debug!(
                "serving cached bearer token ({} flow)",
                self.credential.flow_name()
            );
            return Ok(token);
        }

        log::debug!(
            "token cache empty or expired, acquiring via {} flow",
            self.credential.flow_name()
        );
        let token = self.acquire().await?;
        self.cache.store(token.clone()).await;
        log::info!(
            "acquired bearer token via {} flow, valid until {}",
            self.credential.flow_name(),
            token.expires_at
        );
        Ok(token)
    }

    /// Returns a management API handle scoped to the subscription,
    /// authenticated with the current token.
    pub async fn management_client(
        &self,
        subscription_id: &str,
    ) -> Result<ManagementClient, AuthError> {
        let token = self.get_token().await?;
        Ok(ManagementClient::new(
            self.http_client.clone(),
            self.management_url.clone(),
            token.bearer_token,
            subscription_id.to_string(),
        ))
    }

    async fn acquire(&self) -> Result<AccessToken, AuthError> {
        match &self.credential {
            Credential::ManagedIdentity(_) => self.acquire_managed_identity().await,
            Credential::ServicePrincipal(auth) => {
                let token_url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    self.authority_host, auth.tenant_id
                );
                let scope = scope_for(self.audience());
                let params = [
                    ("grant_type", "client_credentials"),
                    ("client_id", auth.app_id.as_str()),
                    ("client_secret", auth.app_secret.as_str()),
                    ("scope", scope.as_str()),
                ];
                self.post_token_request(&token_url, &params, "service principal authentication failed")
                    .await
            }
            Credential::ResourceOwner(auth) => {
                // v1 password grant against the fixed login authority; the
                // target resource is named explicitly instead of a scope.
                let token_url = format!(
                    "{}/{}/oauth2/token",
                    self.password_grant_host, auth.tenant_id
                );
                let params = [
                    ("grant_type", "password"),
                    ("client_id", auth.native_app_id.as_str()),
                    ("resource", auth.resource_app_id.as_str()),
                    ("username", auth.username.as_str()),
                    ("password", auth.password.as_str()),
                ];
                self.post_token_request(&token_url, &params, "invalid user credentials")
                    .await
            }
            Credential::Certificate(auth) => {
                let token_url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    auth.target_uri.trim_end_matches('/'),
                    auth.tenant_name
                );
                let assertion =
                    build_client_assertion(&auth.app_id, &auth.certificate_pem, &token_url)?;
                // Always the management audience; the authority override is
                // deliberately not applied to this flow.
                let scope = scope_for(AZURE_MANAGEMENT_RESOURCE);
                let params = [
                    ("grant_type", "client_credentials"),
                    ("client_id", auth.app_id.as_str()),
                    (
                        "client_assertion_type",
                        "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
                    ),
                    ("client_assertion", assertion.as_str()),
                    ("scope", scope.as_str()),
                ];
                self.post_token_request(&token_url, &params, "certificate authentication failed")
                    .await
            }
        }
    }

    async fn acquire_managed_identity(&self) -> Result<AccessToken, AuthError> {
        const FAILURE: &str = "managed identity unavailable";

        let url = format!(
            "{}?api-version={}&resource={}",
            self.identity_endpoint,
            IMDS_API_VERSION,
            self.audience()
        );

        let response = self
            .http_client
            .get(&url)
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| AuthError::AuthenticationFailed(format!("{FAILURE}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::AuthenticationFailed(format!(
                "{FAILURE}: identity endpoint answered HTTP {status}"
            )));
        }

        // The identity endpoint returns plain text in some misconfigured
        // environments; decode defensively instead of trusting the body.
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::AuthenticationFailed(format!("{FAILURE}: {e}")))?;
        let payload: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            AuthError::AuthenticationFailed(format!(
                "{FAILURE}: identity endpoint returned an unparseable response"
            ))
        })?;

        token_from_payload(&payload).ok_or_else(|| {
            AuthError::AuthenticationFailed(format!(
                "{FAILURE}: identity endpoint returned no usable token"
            ))
        })
    }

    async fn post_token_request(
        &self,
        token_url: &str,
        params: &[(&str, &str)],
        failure: &str,
    ) -> Result<AccessToken, AuthError> {
        let response = self
            .http_client
            .post(token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::AuthenticationFailed(format!("{failure}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            let detail = oauth_error_description(&error_body)
                .unwrap_or_else(|| format!("token endpoint answered HTTP {status}"));
            return Err(AuthError::AuthenticationFailed(format!(
                "{failure}: {detail}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::AuthenticationFailed(format!("{failure}: {e}")))?;

        token_from_payload(&payload).ok_or_else(|| {
            AuthError::AuthenticationFailed(format!(
                "{failure}: token endpoint returned no usable token"
            ))
        })
    }
}

fn scope_for(audience: &str) -> String {
    format!("{}/.default", audience.trim_end_matches('/'))
}

/// Pulls the OAuth2 `error_description` (or `error` code) out of an error
/// body, if there is one.
fn oauth_error_description(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error_description"]
        .as_str()
        .or_else(|| value["error"].as_str())
        .map(|s| s.to_string())
}

/// Extracts a token from an OAuth2 response payload.
///
/// Expiry is read from the payload itself: `expires_on` (absolute Unix
/// seconds, sent by the identity endpoint and the v1 password grant) takes
/// precedence over `expires_in` (relative seconds, sent by the v2 endpoint).
/// Returns `None` when the bearer string is absent/empty or no validity
/// claim is present.
fn token_from_payload(payload: &serde_json::Value) -> Option<AccessToken> {
    let bearer = payload["access_token"].as_str()?;
    if bearer.is_empty() {
        return None;
    }

    let expires_at = if let Some(expires_on) = claim_as_i64(&payload["expires_on"]) {
        Utc.timestamp_opt(expires_on, 0).single()?
    } else {
        let expires_in = claim_as_i64(&payload["expires_in"])?;
        Utc::now() + chrono::Duration::seconds(expires_in)
    };

    Some(AccessToken::new(bearer.to_string(), expires_at))
}

/// Numeric claims arrive as JSON numbers from v2 endpoints and as quoted
/// strings from the identity endpoint.
fn claim_as_i64(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{ManagedIdentityAuth, ServicePrincipalAuth};
    use serde_json::json;

    #[test]
    fn construction_with_missing_field_fails_before_any_request() {
        let result = Authenticator::new(Credential::ServicePrincipal(ServicePrincipalAuth {
            app_id: "app".to_string(),
            app_secret: "secret".to_string(),
            tenant_id: String::new(),
        }));
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn audience_defaults_to_management_resource() {
        let authenticator = Authenticator::new(Credential::ManagedIdentity(ManagedIdentityAuth {
            tenant_id: "tenant".to_string(),
        }))
        .unwrap();
        assert_eq!(authenticator.audience(), AZURE_MANAGEMENT_RESOURCE);
    }

    #[test]
    fn authority_override_changes_audience() {
        let authenticator = Authenticator::with_authority(
            Credential::ManagedIdentity(ManagedIdentityAuth {
                tenant_id: "tenant".to_string(),
            }),
            "https://myapp.example.com",
        )
        .unwrap();
        assert_eq!(authenticator.audience(), "https://myapp.example.com");
    }

    #[test]
    fn scope_appends_default_suffix_without_double_slash() {
        assert_eq!(
            scope_for("https://management.azure.com/"),
            "https://management.azure.com/.default"
        );
    }

    #[test]
    fn payload_with_expires_in_yields_relative_expiry() {
        let payload = json!({ "access_token": "tok", "expires_in": 3600 });
        let token = token_from_payload(&payload).unwrap();
        assert_eq!(token.bearer_token, "tok");
        assert!(token.expires_at > Utc::now() + chrono::Duration::minutes(59));
    }

    #[test]
    fn payload_with_string_expires_on_yields_absolute_expiry() {
        let payload = json!({ "access_token": "tok", "expires_on": "1956528000" });
        let token = token_from_payload(&payload).unwrap();
        assert_eq!(token.expires_at, Utc.timestamp_opt(1_956_528_000, 0).unwrap());
    }

    #[test]
    fn payload_without_token_or_validity_claim_is_rejected() {
        assert!(token_from_payload(&json!({ "expires_in": 3600 })).is_none());
        assert!(token_from_payload(&json!({ "access_token": "" })).is_none());
        assert!(token_from_payload(&json!({ "access_token": "tok" })).is_none());
    }

    #[test]
    fn oauth_error_description_prefers_description_over_code() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215"}"#;
        assert_eq!(
            oauth_error_description(body).unwrap(),
            "AADSTS7000215"
        );
        assert!(oauth_error_description("not json").is_none());
    }
}
