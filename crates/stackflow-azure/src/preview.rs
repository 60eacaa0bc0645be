//! Local preview provisioner
//!
//! Simulates Azure Resource Manager: every request succeeds (unless it is
//! malformed) and yields the attributes a real deployment would report.
//! No network I/O is performed.

use async_trait::async_trait;
use stackflow_core::{
    ProvisionError, ProvisionRequest, ProvisionedResource, Provisioner, ResourceKind,
};
use std::time::Duration;

/// ARM resource type for a kind
pub fn resource_type(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::NetworkSecurityGroup => "Microsoft.Network/networkSecurityGroups",
        ResourceKind::VirtualNetwork => "Microsoft.Network/virtualNetworks",
        ResourceKind::StorageAccount => "Microsoft.Storage/storageAccounts",
        ResourceKind::AppServicePlan => "Microsoft.Web/serverfarms",
        ResourceKind::LogAnalyticsWorkspace => "Microsoft.OperationalInsights/workspaces",
        ResourceKind::KeyVault => "Microsoft.KeyVault/vaults",
        ResourceKind::ServiceBusNamespace => "Microsoft.ServiceBus/namespaces",
        ResourceKind::ServiceBusQueue => "Microsoft.ServiceBus/namespaces/queues",
    }
}

/// Property carrying the physical name of a kind
fn name_property(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::NetworkSecurityGroup => "networkSecurityGroupName",
        ResourceKind::VirtualNetwork => "virtualNetworkName",
        ResourceKind::StorageAccount => "accountName",
        ResourceKind::AppServicePlan => "name",
        ResourceKind::LogAnalyticsWorkspace => "workspaceName",
        ResourceKind::KeyVault => "vaultName",
        ResourceKind::ServiceBusNamespace => "namespaceName",
        ResourceKind::ServiceBusQueue => "queueName",
    }
}

/// Provisioner that fabricates ARM-style results locally
#[derive(Debug, Clone)]
pub struct PreviewProvisioner {
    subscription_id: String,
    default_location: String,
    latency: Option<Duration>,
}

impl PreviewProvisioner {
    pub fn new(subscription_id: impl Into<String>, default_location: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            default_location: default_location.into(),
            latency: None,
        }
    }

    /// Sleep this long before answering each request
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Azure resource ID for a request
    pub fn resource_id(&self, request: &ProvisionRequest) -> Result<String, ProvisionError> {
        let resource_group = request
            .get_str("resourceGroupName")
            .ok_or_else(|| request.fail("missing property resourceGroupName"))?;
        let name = physical_name(request);
        let scope = format!(
            "/subscriptions/{}/resourceGroups/{}/providers",
            self.subscription_id, resource_group
        );

        match request.kind {
            ResourceKind::ServiceBusQueue => {
                let namespace = request
                    .get_str("namespaceName")
                    .ok_or_else(|| request.fail("missing property namespaceName"))?;
                Ok(format!(
                    "{scope}/Microsoft.ServiceBus/namespaces/{namespace}/queues/{name}"
                ))
            }
            kind => Ok(format!("{scope}/{}/{name}", resource_type(kind))),
        }
    }

    fn validate(&self, request: &ProvisionRequest) -> Result<(), ProvisionError> {
        match request.kind {
            ResourceKind::StorageAccount => {
                let name = physical_name(request);
                let valid = (3..=24).contains(&name.len())
                    && name
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
                if !valid {
                    return Err(request.fail(format!(
                        "storage account name `{name}` must be 3-24 lowercase letters or digits"
                    )));
                }
            }
            ResourceKind::KeyVault => {
                let tenant = request
                    .properties
                    .get("properties")
                    .and_then(|p| p.get("tenantId"))
                    .and_then(|t| t.as_str())
                    .unwrap_or_default();
                if tenant.is_empty() {
                    return Err(request.fail("key vault requires a tenantId"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for PreviewProvisioner {
    fn name(&self) -> &str {
        "preview"
    }

    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedResource, ProvisionError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.validate(request)?;
        let id = self.resource_id(request)?;
        let location = request
            .get_str("location")
            .unwrap_or(self.default_location.as_str())
            .to_string();

        tracing::debug!(resource = %request.name, %id, "preview provisioned");

        Ok(ProvisionedResource::new()
            .with_attribute("id", id)
            .with_attribute("name", physical_name(request))
            .with_attribute("type", resource_type(request.kind))
            .with_attribute("location", location))
    }
}

fn physical_name(request: &ProvisionRequest) -> String {
    request
        .get_str(name_property(request.kind))
        .unwrap_or(request.name.as_str())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request(name: &str, kind: ResourceKind, properties: serde_json::Value) -> ProvisionRequest {
        let properties = match properties {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        ProvisionRequest {
            name: name.into(),
            kind,
            properties,
            tags: BTreeMap::new(),
        }
    }

    fn provisioner() -> PreviewProvisioner {
        PreviewProvisioner::new("sub-1", "westeurope")
    }

    #[tokio::test]
    async fn test_storage_attributes() {
        let request = request(
            "drifttest-storage",
            ResourceKind::StorageAccount,
            json!({ "resourceGroupName": "rg", "accountName": "drifttestsaab12cd34" }),
        );

        let resource = provisioner().provision(&request).await.unwrap();
        assert_eq!(
            resource.get_attribute("id"),
            Some(
                "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/drifttestsaab12cd34"
            )
        );
        assert_eq!(resource.get_attribute("name"), Some("drifttestsaab12cd34"));
        assert_eq!(resource.get_attribute("location"), Some("westeurope"));
        assert_eq!(
            resource.get_attribute("type"),
            Some("Microsoft.Storage/storageAccounts")
        );
    }

    #[tokio::test]
    async fn test_queue_id_is_nested_in_namespace() {
        let request = request(
            "queue-orders",
            ResourceKind::ServiceBusQueue,
            json!({
                "resourceGroupName": "rg",
                "queueName": "orders",
                "namespaceName": "drifttest-servicebus",
            }),
        );

        let resource = provisioner().provision(&request).await.unwrap();
        assert!(
            resource
                .get_attribute("id")
                .unwrap()
                .ends_with("/namespaces/drifttest-servicebus/queues/orders")
        );
    }

    #[tokio::test]
    async fn test_invalid_storage_name_fails() {
        let request = request(
            "drifttest-storage",
            ResourceKind::StorageAccount,
            json!({ "resourceGroupName": "rg", "accountName": "Drift-Test" }),
        );

        let error = provisioner().provision(&request).await.unwrap_err();
        assert_eq!(error.resource, "drifttest-storage");
    }

    #[tokio::test]
    async fn test_key_vault_without_tenant_fails() {
        let request = request(
            "drifttest-kv",
            ResourceKind::KeyVault,
            json!({
                "resourceGroupName": "rg",
                "vaultName": "drifttest-kvab12cd34",
                "properties": { "tenantId": "" },
            }),
        );

        assert!(provisioner().provision(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_resource_group_fails() {
        let request = request("drifttest-nsg", ResourceKind::NetworkSecurityGroup, json!({}));
        assert!(provisioner().provision(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_latency() {
        let provisioner = provisioner().with_latency(Duration::from_millis(20));
        let request = request(
            "drifttest-vnet",
            ResourceKind::VirtualNetwork,
            json!({ "resourceGroupName": "rg", "virtualNetworkName": "drifttest-vnet" }),
        );

        let started = tokio::time::Instant::now();
        provisioner.provision(&request).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
