mod assertion;
pub mod authenticator;
pub mod credentials;
pub mod setup;
pub mod token;
pub mod token_cache;

pub use authenticator::{AZURE_MANAGEMENT_RESOURCE, Authenticator};
pub use credentials::{
    CertificateAuth, Credential, ManagedIdentityAuth, ResourceOwnerAuth, ServicePrincipalAuth,
};
pub use setup::{
    certificate_authenticator, managed_identity_authenticator, resource_owner_authenticator,
    service_principal_authenticator,
};
pub use token::AccessToken;
pub use token_cache::TokenCache;
