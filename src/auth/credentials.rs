use crate::errors::AuthError;

/// Managed identity credential, scoped to a tenant.
///
/// The runtime environment vouches for the caller's identity through the
/// local instance metadata endpoint; no secret material is carried here.
#[derive(Clone, Debug)]
pub struct ManagedIdentityAuth {
    pub tenant_id: String,
}

/// Service principal (application + shared secret) credential.
#[derive(Clone, Debug)]
pub struct ServicePrincipalAuth {
    pub app_id: String,
    pub app_secret: String,
    pub tenant_id: String,
}

/// Resource-owner (username/password grant) credential.
#[derive(Clone, Debug)]
pub struct ResourceOwnerAuth {
    pub username: String,
    pub password: String,
    /// Application id of the native app registration acting as the client.
    pub native_app_id: String,
    /// Application id of the target/resource app registration.
    pub resource_app_id: String,
    pub tenant_id: String,
}

/// Client-certificate credential.
///
/// `certificate_pem` must contain both the certificate and its private key
/// in PEM form; it is parsed at validation time so a broken bundle fails
/// before any token request is attempted.
#[derive(Clone, Debug)]
pub struct CertificateAuth {
    pub app_id: String,
    pub tenant_name: String,
    pub certificate_pem: String,
    /// Authority base the token request is sent to.
    pub target_uri: String,
}

/// The credential mechanism an [`Authenticator`](super::Authenticator) is
/// constructed with. Exactly one variant is active per authenticator and the
/// variant never changes after construction; acquisition dispatches on it
/// with a `match`.
#[derive(Clone, Debug)]
pub enum Credential {
    ManagedIdentity(ManagedIdentityAuth),
    ServicePrincipal(ServicePrincipalAuth),
    ResourceOwner(ResourceOwnerAuth),
    Certificate(CertificateAuth),
}

fn require(value: &str, field: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Configuration(format!(
            "{field} must be set for authentication"
        )));
    }
    Ok(())
}

impl Credential {
    /// Checks every mandatory field is present, reporting the first missing
    /// one. Runs before any network call is made.
    pub fn validate(&self) -> Result<(), AuthError> {
        match self {
            Credential::ManagedIdentity(auth) => require(&auth.tenant_id, "TenantId"),
            Credential::ServicePrincipal(auth) => {
                require(&auth.app_id, "AppId")?;
                require(&auth.app_secret, "AppSecret")?;
                require(&auth.tenant_id, "TenantId")
            }
            Credential::ResourceOwner(auth) => {
                require(&auth.username, "Username")?;
                require(&auth.password, "Password")?;
                require(&auth.native_app_id, "NativeAppId")?;
                require(&auth.resource_app_id, "ResourceAppId")?;
                require(&auth.tenant_id, "TenantId")
            }
            Credential::Certificate(auth) => {
                require(&auth.app_id, "AppId")?;
                require(&auth.tenant_name, "TenantName")?;
                require(&auth.target_uri, "TargetUri")?;
                require(&auth.certificate_pem, "Certificate")?;
                validate_certificate_bundle(&auth.certificate_pem)
            }
        }
    }

    /// Short flow name used in log lines.
    pub fn flow_name(&self) -> &'static str {
        match self {
            Credential::ManagedIdentity(_) => "managed_identity",
            Credential::ServicePrincipal(_) => "service_principal",
            Credential::ResourceOwner(_) => "resource_owner",
            Credential::Certificate(_) => "certificate",
        }
    }
}

fn validate_certificate_bundle(pem_content: &str) -> Result<(), AuthError> {
    let entries = pem::parse_many(pem_content).map_err(|e| {
        AuthError::Configuration(format!("Certificate is not valid PEM: {e}"))
    })?;

    if !entries.iter().any(|p| p.tag() == "CERTIFICATE") {
        return Err(AuthError::Configuration(
            "Certificate bundle contains no CERTIFICATE block".to_string(),
        ));
    }
    if !entries.iter().any(|p| p.tag().contains("PRIVATE KEY")) {
        return Err(AuthError::Configuration(
            "Certificate bundle contains no private key".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_identity_requires_tenant() {
        let cred = Credential::ManagedIdentity(ManagedIdentityAuth {
            tenant_id: String::new(),
        });
        let err = cred.validate().unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
        assert!(err.to_string().contains("TenantId"));
    }

    #[test]
    fn service_principal_reports_first_missing_field() {
        let cred = Credential::ServicePrincipal(ServicePrincipalAuth {
            app_id: "app".to_string(),
            app_secret: String::new(),
            tenant_id: String::new(),
        });
        let err = cred.validate().unwrap_err();
        assert!(err.to_string().contains("AppSecret"));
    }

    #[test]
    fn resource_owner_with_all_fields_is_valid() {
        let cred = Credential::ResourceOwner(ResourceOwnerAuth {
            username: "user@tenant".to_string(),
            password: "pw".to_string(),
            native_app_id: "native".to_string(),
            resource_app_id: "resource".to_string(),
            tenant_id: "tenant".to_string(),
        });
        assert!(cred.validate().is_ok());
    }

    #[test]
    fn certificate_rejects_bundle_without_private_key() {
        let cert_only = "-----BEGIN CERTIFICATE-----\nAQID\n-----END CERTIFICATE-----\n";
        let cred = Credential::Certificate(CertificateAuth {
            app_id: "app".to_string(),
            tenant_name: "contoso.onmicrosoft.com".to_string(),
            certificate_pem: cert_only.to_string(),
            target_uri: "https://login.microsoftonline.com".to_string(),
        });
        let err = cred.validate().unwrap_err();
        assert!(err.to_string().contains("private key"));
    }

    #[test]
    fn whitespace_only_field_counts_as_missing() {
        let cred = Credential::ManagedIdentity(ManagedIdentityAuth {
            tenant_id: "   ".to_string(),
        });
        assert!(cred.validate().is_err());
    }
}
