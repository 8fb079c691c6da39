//! Connection-string resolvers for downstream services.
//!
//! Each resolver pairs an [`Authenticator`](crate::auth::Authenticator)
//! with a target configuration and produces a ready-to-use connection
//! string by looking the target up through the management API.

pub mod service_bus;
pub mod storage;

use crate::errors::AuthError;
use async_trait::async_trait;

pub use service_bus::{ServiceBusConfig, ServiceBusConnectionBuilder};
pub use storage::{StorageConfig, StorageConnectionBuilder};

/// Common surface of the connection-string resolvers.
#[async_trait]
pub trait ConnectionStringBuilder: Send + Sync {
    /// Resolves the target resource and formats its connection string.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] if the target config is invalid (raised
    /// before any network call), [`AuthError::AuthenticationFailed`] if no
    /// token could be acquired, [`AuthError::NotFound`] if the named
    /// instance or its keys do not exist in the subscription.
    async fn build_connection_string(&self) -> Result<String, AuthError>;
}
