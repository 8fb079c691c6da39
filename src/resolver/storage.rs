use super::ConnectionStringBuilder;
use crate::auth::Authenticator;
use crate::errors::AuthError;
use crate::management::resource_group_from_id;
use async_trait::async_trait;
use std::sync::Arc;

/// Target description for a storage account connection string.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub subscription_id: String,
    /// Storage account name to look up within the subscription.
    pub instance_name: String,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.instance_name.is_empty() {
            return Err(AuthError::Configuration(
                "InstanceName must be set for storage connection".to_string(),
            ));
        }
        if self.subscription_id.is_empty() {
            return Err(AuthError::Configuration(
                "SubscriptionId must be set for storage connection".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves a storage account connection string from an authenticated
/// management lookup. Always uses the first access key; key rotation is the
/// caller's concern.
pub struct StorageConnectionBuilder {
    authenticator: Arc<Authenticator>,
    config: StorageConfig,
}

impl StorageConnectionBuilder {
    pub fn new(authenticator: Arc<Authenticator>, config: StorageConfig) -> Self {
        Self {
            authenticator,
            config,
        }
    }
}

#[async_trait]
impl ConnectionStringBuilder for StorageConnectionBuilder {
    async fn build_connection_string(&self) -> Result<String, AuthError> {
        self.config.validate()?;

        let management = self
            .authenticator
            .management_client(&self.config.subscription_id)
            .await?;

        let accounts = management.list_storage_accounts().await?;
        let account = accounts
            .iter()
            .find(|a| a.name == self.config.instance_name)
            .ok_or_else(|| {
                AuthError::NotFound(format!(
                    "storage instance {} not found in subscription {}",
                    self.config.instance_name, self.config.subscription_id
                ))
            })?;
        let resource_group = resource_group_from_id(&account.id)?;

        let keys = management
            .list_storage_account_keys(resource_group, &account.name)
            .await?;
        let key = keys.first().ok_or_else(|| {
            AuthError::NotFound(format!(
                "no access keys for storage instance {}",
                self.config.instance_name
            ))
        })?;

        log::debug!(
            "resolved storage connection string for account {}",
            account.name
        );
        Ok(format_connection_string(&account.name, &key.value))
    }
}

fn format_connection_string(account_name: &str, key: &str) -> String {
    format!(
        "DefaultEndpointsProtocol=https;AccountName={account_name};AccountKey={key};EndpointSuffix=core.windows.net"
    )
}
