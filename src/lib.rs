//! # azure-conn-auth
//!
//! Azure AD bearer-token acquisition and connection-string resolution for
//! Service Bus namespaces and storage accounts.
//!
//! An [`Authenticator`](auth::Authenticator) is constructed once with one of
//! four credential mechanisms (managed identity, service principal,
//! resource-owner password, client certificate) and hands out cached bearer
//! tokens, re-acquiring them synchronously when they expire. The resolvers
//! in [`resolver`] use that token to query the Azure management API for a
//! named namespace or storage account and format a ready-to-use connection
//! string.
//!
//! ## Modules
//!
//! - [`auth`] - Credential variants, token cache and the acquisition state machine
//! - [`management`] - Minimal Azure management REST client with transport retry
//! - [`resolver`] - Service Bus and storage connection-string builders
//! - [`errors`] - Error taxonomy shared across the crate
//!
//! ## Example
//!
//! ```no_run
//! use azure_conn_auth::auth::service_principal_authenticator;
//! use azure_conn_auth::resolver::{
//!     ConnectionStringBuilder, StorageConfig, StorageConnectionBuilder,
//! };
//!
//! # async fn run() -> Result<(), azure_conn_auth::errors::AuthError> {
//! let authenticator =
//!     service_principal_authenticator("app-id", "app-secret", "tenant-id", None)?;
//!
//! let builder = StorageConnectionBuilder::new(
//!     authenticator,
//!     StorageConfig {
//!         subscription_id: "subscription-id".to_string(),
//!         instance_name: "mystorageaccount".to_string(),
//!     },
//! );
//! let connection_string = builder.build_connection_string().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod errors;
pub mod management;
pub mod resolver;

pub use auth::{AccessToken, Authenticator, Credential};
pub use errors::AuthError;
pub use resolver::ConnectionStringBuilder;
