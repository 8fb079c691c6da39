//! Startup factory functions.
//!
//! A host application calls one of these once at startup and passes the
//! resulting handle to whatever needs tokens or connection strings; no
//! process-wide registry is involved.

use super::authenticator::Authenticator;
use super::credentials::{
    CertificateAuth, Credential, ManagedIdentityAuth, ResourceOwnerAuth, ServicePrincipalAuth,
};
use crate::errors::AuthError;
use std::sync::Arc;

/// Builds a managed-identity authenticator, optionally targeting a custom
/// audience such as an app registration URL.
pub fn managed_identity_authenticator(
    tenant_id: impl Into<String>,
    authority: Option<String>,
) -> Result<Arc<Authenticator>, AuthError> {
    let credential = Credential::ManagedIdentity(ManagedIdentityAuth {
        tenant_id: tenant_id.into(),
    });
    build(credential, authority)
}

/// Builds a service-principal authenticator, optionally targeting a custom
/// audience.
pub fn service_principal_authenticator(
    app_id: impl Into<String>,
    app_secret: impl Into<String>,
    tenant_id: impl Into<String>,
    authority: Option<String>,
) -> Result<Arc<Authenticator>, AuthError> {
    let credential = Credential::ServicePrincipal(ServicePrincipalAuth {
        app_id: app_id.into(),
        app_secret: app_secret.into(),
        tenant_id: tenant_id.into(),
    });
    build(credential, authority)
}

/// Builds a resource-owner (username/password) authenticator.
pub fn resource_owner_authenticator(
    native_app_id: impl Into<String>,
    username: impl Into<String>,
    password: impl Into<String>,
    resource_app_id: impl Into<String>,
    tenant_id: impl Into<String>,
) -> Result<Arc<Authenticator>, AuthError> {
    let credential = Credential::ResourceOwner(ResourceOwnerAuth {
        username: username.into(),
        password: password.into(),
        native_app_id: native_app_id.into(),
        resource_app_id: resource_app_id.into(),
        tenant_id: tenant_id.into(),
    });
    build(credential, None)
}

/// Builds a client-certificate authenticator. The certificate bundle must
/// contain the certificate and its private key in PEM form.
pub fn certificate_authenticator(
    app_id: impl Into<String>,
    tenant_name: impl Into<String>,
    certificate_pem: impl Into<String>,
    target_uri: impl Into<String>,
) -> Result<Arc<Authenticator>, AuthError> {
    let credential = Credential::Certificate(CertificateAuth {
        app_id: app_id.into(),
        tenant_name: tenant_name.into(),
        certificate_pem: certificate_pem.into(),
        target_uri: target_uri.into(),
    });
    build(credential, None)
}

fn build(
    credential: Credential,
    authority: Option<String>,
) -> Result<Arc<Authenticator>, AuthError> {
    let authenticator = match authority {
        Some(authority) => Authenticator::with_authority(credential, authority)?,
        None => Authenticator::new(credential)?,
    };
    Ok(Arc::new(authenticator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_rejects_empty_mandatory_fields() {
        assert!(managed_identity_authenticator("", None).is_err());
        assert!(service_principal_authenticator("app", "", "tenant", None).is_err());
        assert!(resource_owner_authenticator("native", "user", "", "resource", "tenant").is_err());
    }

    #[test]
    fn factory_returns_shared_handle() {
        let authenticator = managed_identity_authenticator("tenant-1", None).unwrap();
        let clone = Arc::clone(&authenticator);
        assert_eq!(Arc::strong_count(&clone), 2);
    }
}
