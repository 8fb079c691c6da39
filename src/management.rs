//! Thin client for the Azure resource management REST API.
//!
//! Only the surface needed for connection-string resolution is modeled:
//! listing Service Bus namespaces and storage accounts in a subscription and
//! fetching authorization-rule / account keys by name. Transient transport
//! failures are retried a fixed number of times with constant backoff;
//! non-transient errors propagate unmasked.

use crate::errors::AuthError;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

pub const AZURE_MANAGEMENT_URL: &str = "https://management.azure.com";
const API_VERSION_SERVICE_BUS: &str = "2021-11-01";
const API_VERSION_STORAGE: &str = "2023-01-01";

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// A Service Bus namespace as returned by the management API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceBusNamespace {
    pub id: String,
    pub name: String,
}

/// Keys of a Service Bus authorization rule.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AccessKeys {
    #[serde(rename = "primaryConnectionString")]
    pub primary_connection_string: String,
    #[serde(rename = "secondaryConnectionString")]
    pub secondary_connection_string: Option<String>,
}

/// A storage account as returned by the management API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageAccount {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageAccountKey {
    #[serde(rename = "keyName")]
    pub key_name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct StorageKeyList {
    keys: Vec<StorageAccountKey>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

/// Whether an authorization rule lives on a queue or a topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityKind {
    Queue,
    Topic,
}

impl EntityKind {
    fn path_segment(self) -> &'static str {
        match self {
            EntityKind::Queue => "queues",
            EntityKind::Topic => "topics",
        }
    }
}

/// Management API handle bound to a bearer token and a subscription.
///
/// Produced by [`Authenticator::management_client`]; single-use per token is
/// fine since construction is cheap.
///
/// [`Authenticator::management_client`]: crate::auth::Authenticator::management_client
#[derive(Debug, Clone)]
pub struct ManagementClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
    subscription_id: String,
}

impl ManagementClient {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: String,
        bearer_token: String,
        subscription_id: String,
    ) -> Self {
        Self {
            client,
            base_url,
            bearer_token,
            subscription_id,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Lists all Service Bus namespaces in the subscription.
    pub async fn list_service_bus_namespaces(
        &self,
    ) -> Result<Vec<ServiceBusNamespace>, AuthError> {
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.ServiceBus/namespaces?api-version={}",
            self.base_url, self.subscription_id, API_VERSION_SERVICE_BUS
        );
        let list: ListResponse<ServiceBusNamespace> =
            self.get_json(&url, "list_service_bus_namespaces").await?;
        Ok(list.value)
    }

    /// Fetches the keys of a namespace-level authorization rule.
    pub async fn get_namespace_keys(
        &self,
        resource_group: &str,
        namespace: &str,
        rule_name: &str,
    ) -> Result<AccessKeys, AuthError> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ServiceBus/namespaces/{}/authorizationRules/{}/listKeys?api-version={}",
            self.base_url,
            self.subscription_id,
            resource_group,
            namespace,
            rule_name,
            API_VERSION_SERVICE_BUS
        );
        self.post_keys(&url, "get_namespace_keys", || {
            format!("authorization rule {rule_name} not found on namespace {namespace}")
        })
        .await
    }

    /// Fetches the keys of a queue- or topic-level authorization rule.
    pub async fn get_entity_keys(
        &self,
        resource_group: &str,
        namespace: &str,
        entity_kind: EntityKind,
        entity_path: &str,
        rule_name: &str,
    ) -> Result<AccessKeys, AuthError> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ServiceBus/namespaces/{}/{}/{}/authorizationRules/{}/listKeys?api-version={}",
            self.base_url,
            self.subscription_id,
            resource_group,
            namespace,
            entity_kind.path_segment(),
            entity_path,
            rule_name,
            API_VERSION_SERVICE_BUS
        );
        self.post_keys(&url, "get_entity_keys", || {
            format!(
                "authorization rule {rule_name} not found on {} {entity_path}",
                entity_kind.path_segment().trim_end_matches('s')
            )
        })
        .await
    }

    /// Lists all storage accounts in the subscription.
    pub async fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>, AuthError> {
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.Storage/storageAccounts?api-version={}",
            self.base_url, self.subscription_id, API_VERSION_STORAGE
        );
        let list: ListResponse<StorageAccount> =
            self.get_json(&url, "list_storage_accounts").await?;
        Ok(list.value)
    }

    /// Lists the access keys of a storage account.
    pub async fn list_storage_account_keys(
        &self,
        resource_group: &str,
        account_name: &str,
    ) -> Result<Vec<StorageAccountKey>, AuthError> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}/listKeys?api-version={}",
            self.base_url, self.subscription_id, resource_group, account_name, API_VERSION_STORAGE
        );
        let operation = "list_storage_account_keys";
        let response = self
            .send_with_retry(operation, || {
                self.client
                    .post(&url)
                    .header(AUTHORIZATION, format!("Bearer {}", self.bearer_token))
                    .header(CONTENT_TYPE, "application/json")
                    .body("{}")
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AuthError::NotFound(format!(
                "storage account {account_name} not found in resource group {resource_group}"
            )));
        }
        let response = check_status(response, operation).await?;
        let list: StorageKeyList = response
            .json()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        Ok(list.keys)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        operation: &str,
    ) -> Result<T, AuthError> {
        let response = self
            .send_with_retry(operation, || {
                self.client
                    .get(url)
                    .header(AUTHORIZATION, format!("Bearer {}", self.bearer_token))
            })
            .await?;
        let response = check_status(response, operation).await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))
    }

    async fn post_keys(
        &self,
        url: &str,
        operation: &str,
        not_found: impl Fn() -> String,
    ) -> Result<AccessKeys, AuthError> {
        let response = self
            .send_with_retry(operation, || {
                self.client
                    .post(url)
                    .header(AUTHORIZATION, format!("Bearer {}", self.bearer_token))
                    .header(CONTENT_TYPE, "application/json")
                    // Empty JSON body required for management API POSTs
                    .body("{}")
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AuthError::NotFound(not_found()));
        }
        let response = check_status(response, operation).await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))
    }

    /// Sends a request, retrying transient failures (connect errors, 408,
    /// 429, 5xx) up to [`RETRY_ATTEMPTS`] times with constant backoff.
    async fn send_with_retry(
        &self,
        operation: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AuthError> {
        let mut attempt = 1;
        loop {
            match build().send().await {
                Ok(response) if is_transient_status(response.status()) && attempt < RETRY_ATTEMPTS => {
                    log::warn!(
                        "{operation}: transient HTTP {} on attempt {attempt}, retrying",
                        response.status()
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if attempt < RETRY_ATTEMPTS => {
                    log::warn!("{operation}: transport error on attempt {attempt}, retrying: {e}");
                }
                Err(e) => return Err(AuthError::Network(e.to_string())),
            }
            attempt += 1;
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

async fn check_status(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let error_text = response.text().await.unwrap_or_default();
    Err(AuthError::api(operation, status, error_text))
}

/// Pulls the resource group segment out of an Azure resource id.
///
/// Ids look like `/subscriptions/{sid}/resourceGroups/{rg}/providers/...`.
pub(crate) fn resource_group_from_id(resource_id: &str) -> Result<&str, AuthError> {
    let parts: Vec<&str> = resource_id.split('/').collect();
    if parts.len() < 5 || !parts[3].eq_ignore_ascii_case("resourceGroups") {
        return Err(AuthError::Configuration(format!(
            "Invalid resource id format: {resource_id}"
        )));
    }
    Ok(parts[4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_group_is_extracted_from_resource_id() {
        let id = "/subscriptions/sub-1/resourceGroups/rg-main/providers/Microsoft.ServiceBus/namespaces/ns1";
        assert_eq!(resource_group_from_id(id).unwrap(), "rg-main");
    }

    #[test]
    fn malformed_resource_id_is_rejected() {
        assert!(resource_group_from_id("/subscriptions/sub-1").is_err());
        assert!(resource_group_from_id("/a/b/c/d/e").is_err());
    }

    #[test]
    fn transient_statuses_cover_timeouts_throttling_and_server_errors() {
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn entity_kind_maps_to_api_path_segment() {
        assert_eq!(EntityKind::Queue.path_segment(), "queues");
        assert_eq!(EntityKind::Topic.path_segment(), "topics");
    }
}
