use super::ConnectionStringBuilder;
use crate::auth::Authenticator;
use crate::errors::AuthError;
use crate::management::{EntityKind, resource_group_from_id};
use async_trait::async_trait;
use std::sync::Arc;

/// Target description for a Service Bus connection string.
#[derive(Clone, Debug)]
pub struct ServiceBusConfig {
    pub subscription_id: String,
    /// Name of the shared access policy (authorization rule) to read keys
    /// from.
    pub shared_access_policy_name: String,
    /// Namespace name to look up within the subscription.
    pub instance_name: String,
    /// Queue or topic name; required unless the policy is namespace-level.
    pub entity_path: String,
    /// When `true`, keys come from the namespace-level rule instead of a
    /// queue/topic rule.
    pub is_service_level_shared_access_policy: bool,
    /// Selects topic over queue when descending to an entity-level rule.
    pub is_topic: bool,
}

impl ServiceBusConfig {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.instance_name.is_empty() {
            return Err(AuthError::Configuration(
                "InstanceName must be set for Service Bus connection".to_string(),
            ));
        }
        if self.subscription_id.is_empty() {
            return Err(AuthError::Configuration(
                "SubscriptionId must be set for Service Bus connection".to_string(),
            ));
        }
        if self.shared_access_policy_name.is_empty() {
            return Err(AuthError::Configuration(
                "SharedAccessPolicyName must be set for Service Bus connection".to_string(),
            ));
        }
        if !self.is_service_level_shared_access_policy && self.entity_path.is_empty() {
            return Err(AuthError::Configuration(
                "When you are not using a service-level shared access policy, \
                 EntityPath must be set for Service Bus connection"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn entity_kind(&self) -> EntityKind {
        if self.is_topic {
            EntityKind::Topic
        } else {
            EntityKind::Queue
        }
    }
}

/// Resolves a Service Bus connection string from an authenticated
/// management lookup.
pub struct ServiceBusConnectionBuilder {
    authenticator: Arc<Authenticator>,
    config: ServiceBusConfig,
}

impl ServiceBusConnectionBuilder {
    pub fn new(authenticator: Arc<Authenticator>, config: ServiceBusConfig) -> Self {
        Self {
            authenticator,
            config,
        }
    }
}

#[async_trait]
impl ConnectionStringBuilder for ServiceBusConnectionBuilder {
    async fn build_connection_string(&self) -> Result<String, AuthError> {
        self.config.validate()?;

        let management = self
            .authenticator
            .management_client(&self.config.subscription_id)
            .await?;

        // Subscriptions hold few namespaces; a linear scan by name is fine.
        let namespaces = management.list_service_bus_namespaces().await?;
        let namespace = namespaces
            .iter()
            .find(|n| n.name == self.config.instance_name)
            .ok_or_else(|| {
                AuthError::NotFound(format!(
                    "service bus namespace {} not found in subscription {}",
                    self.config.instance_name, self.config.subscription_id
                ))
            })?;
        let resource_group = resource_group_from_id(&namespace.id)?;

        let keys = if self.config.is_service_level_shared_access_policy {
            management
                .get_namespace_keys(
                    resource_group,
                    &namespace.name,
                    &self.config.shared_access_policy_name,
                )
                .await?
        } else {
            management
                .get_entity_keys(
                    resource_group,
                    &namespace.name,
                    self.config.entity_kind(),
                    &self.config.entity_path,
                    &self.config.shared_access_policy_name,
                )
                .await?
        };

        log::debug!(
            "resolved service bus connection string for namespace {}",
            namespace.name
        );
        Ok(strip_entity_path(
            &keys.primary_connection_string,
            &self.config.entity_path,
        ))
    }
}

/// Removes the `;EntityPath=<path>` suffix Azure appends to entity-level
/// connection strings. Callers supply their own entity path when they
/// connect, so the returned string stays generic.
fn strip_entity_path(connection_string: &str, entity_path: &str) -> String {
    if entity_path.is_empty() {
        return connection_string.to_string();
    }
    connection_string.replace(&format!(";EntityPath={entity_path}"), "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServiceBusConfig {
        ServiceBusConfig {
            subscription_id: "sub-1".to_string(),
            shared_access_policy_name: "listen-policy".to_string(),
            instance_name: "ns1".to_string(),
            entity_path: "myqueue".to_string(),
            is_service_level_shared_access_policy: false,
            is_topic: false,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn entity_path_required_for_entity_level_policy() {
        let config = ServiceBusConfig {
            entity_path: String::new(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
        assert!(err.to_string().contains("EntityPath"));
    }

    #[test]
    fn entity_path_not_required_for_service_level_policy() {
        let config = ServiceBusConfig {
            entity_path: String::new(),
            is_service_level_shared_access_policy: true,
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_instance_name_is_reported_first() {
        let config = ServiceBusConfig {
            instance_name: String::new(),
            subscription_id: String::new(),
            ..valid_config()
        };
        assert!(config.validate().unwrap_err().to_string().contains("InstanceName"));
    }

    #[test]
    fn entity_path_suffix_is_stripped() {
        let raw = "Endpoint=sb://x;SharedAccessKeyName=y;SharedAccessKey=z;EntityPath=myqueue";
        assert_eq!(
            strip_entity_path(raw, "myqueue"),
            "Endpoint=sb://x;SharedAccessKeyName=y;SharedAccessKey=z"
        );
    }

    #[test]
    fn connection_string_without_suffix_is_unchanged() {
        let raw = "Endpoint=sb://x;SharedAccessKeyName=y;SharedAccessKey=z";
        assert_eq!(strip_entity_path(raw, "myqueue"), raw);
        assert_eq!(strip_entity_path(raw, ""), raw);
    }

    #[test]
    fn topic_flag_selects_topic_entity_kind() {
        let config = ServiceBusConfig {
            is_topic: true,
            ..valid_config()
        };
        assert_eq!(config.entity_kind(), EntityKind::Topic);
        assert_eq!(valid_config().entity_kind(), EntityKind::Queue);
    }
}
