use thiserror::Error;

/// Errors produced while acquiring tokens or resolving connection strings.
///
/// The variants map onto distinct failure phases: configuration problems are
/// always raised before any network call, authentication failures carry the
/// failing credential flow in the message, and lookup misses are reported as
/// [`AuthError::NotFound`] with the resource name and subscription.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// A credential or target configuration is missing a mandatory field.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The selected credential flow failed to produce a token.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A named resource, authorization rule or key set does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The management API answered with a non-success status.
    #[error("Management API error during {operation}: HTTP {status} - {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    /// A transport-level failure (connect, timeout, malformed body).
    #[error("Network error: {0}")]
    Network(String),
}

impl AuthError {
    pub(crate) fn api(operation: &str, status: u16, message: impl Into<String>) -> Self {
        AuthError::Api {
            operation: operation.to_string(),
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_operation_and_status() {
        let err = AuthError::api("list_namespaces", 403, "forbidden");
        assert_eq!(
            err.to_string(),
            "Management API error during list_namespaces: HTTP 403 - forbidden"
        );
    }

    #[test]
    fn not_found_display_is_verbatim() {
        let err = AuthError::NotFound("namespace ns1 not found".to_string());
        assert_eq!(err.to_string(), "namespace ns1 not found");
    }
}
