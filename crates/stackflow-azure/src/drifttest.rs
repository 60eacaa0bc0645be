//! Drift-test stack program
//!
//! Declares the Azure resources used to exercise drift detection, each behind
//! its own deploy flag. Every branch hands back its own output fragment and
//! the fragments are merged once at the end, so the exported keys depend only
//! on the flag combination.

use serde_json::json;
use stackflow_config::StackConfig;
use stackflow_core::{
    ConfigurationError, Deferred, Outputs, ResourceDeclaration, ResourceHandle, ResourceKind,
    StackBuilder,
};
use std::collections::BTreeMap;

pub const NSG: &str = "drifttest-nsg";
pub const VNET: &str = "drifttest-vnet";
pub const STORAGE: &str = "drifttest-storage";
pub const APP_SERVICE_PLAN: &str = "drifttest-asp";
pub const LOG_ANALYTICS: &str = "drifttest-law";
pub const KEY_VAULT: &str = "drifttest-kv";
pub const SERVICE_BUS: &str = "drifttest-servicebus";

/// A Service Bus queue created inside the namespace
#[derive(Debug, Clone, Copy)]
pub struct QueueSpec {
    pub name: &'static str,
    pub max_delivery_count: u32,
    pub lock_duration: &'static str,
}

pub const QUEUES: [QueueSpec; 3] = [
    QueueSpec {
        name: "orders",
        max_delivery_count: 10,
        lock_duration: "PT5M",
    },
    QueueSpec {
        name: "deadletter",
        max_delivery_count: 1,
        lock_duration: "PT1M",
    },
    QueueSpec {
        name: "notifications",
        max_delivery_count: 5,
        lock_duration: "PT2M",
    },
];

impl QueueSpec {
    /// Logical name of the queue declaration
    pub fn logical_name(&self) -> String {
        format!("queue-{}", self.name)
    }
}

/// Tags applied to every resource of the stack
pub fn common_tags(config: &StackConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Environment".to_string(), config.environment_name.clone()),
        ("Application".to_string(), config.application_name.clone()),
        ("ResourceType".to_string(), "Infrastructure".to_string()),
        ("IaC".to_string(), "stackflow".to_string()),
    ])
}

/// Register the drift-test resources on `builder` and return the outputs.
///
/// `suffix` is the unique token appended to globally unique names.
pub fn declare(
    config: &StackConfig,
    suffix: Deferred<String>,
    builder: &mut StackBuilder,
) -> Result<Outputs, ConfigurationError> {
    let flags = config.flags;
    let tags = common_tags(config);
    let located = |declaration: ResourceDeclaration| {
        declaration
            .property("resourceGroupName", &config.resource_group_name)
            .property("location", &config.location)
            .tags(tags.clone())
    };

    let mut outputs = Outputs::new();
    outputs
        .export("resourceGroupName", &config.resource_group_name)?
        .export("uniqueSuffix", &suffix)?;

    let nsg = builder.declare_if(flags.nsg, NSG, ResourceKind::NetworkSecurityGroup, |d| {
        located(d)
            .property("networkSecurityGroupName", NSG)
            .property("securityRules", security_rules())
    })?;
    outputs.merge(exported(nsg.as_ref(), "nsgId", "nsgName")?)?;

    let vnet = builder.declare_if(flags.vnet, VNET, ResourceKind::VirtualNetwork, |d| {
        located(d)
            .property("virtualNetworkName", VNET)
            .property("addressSpace", json!({ "addressPrefixes": ["10.0.0.0/16"] }))
            .property("subnets", subnets())
            .property("enableDdosProtection", false)
    })?;
    outputs.merge(exported(vnet.as_ref(), "vnetId", "vnetName")?)?;

    let storage = builder.declare_if(flags.storage, STORAGE, ResourceKind::StorageAccount, |d| {
        located(d)
            .property("accountName", suffix.concat("drifttestsa"))
            .property("sku", json!({ "name": "Standard_LRS" }))
            .property("kind", "StorageV2")
            .property("accessTier", "Hot")
            .property("allowBlobPublicAccess", false)
            .property("allowSharedKeyAccess", true)
            .property("minimumTlsVersion", "TLS1_2")
            .property("enableHttpsTrafficOnly", true)
            .property("isHnsEnabled", false)
            .property("largeFileSharesState", "Disabled")
            // Allow is kept as found on the drift-test fixture
            .property("networkRuleSet", json!({ "defaultAction": "Allow" }))
    })?;
    outputs.merge(exported(
        storage.as_ref(),
        "storageAccountId",
        "storageAccountName",
    )?)?;

    let plan = builder.declare_if(
        flags.app_service_plan,
        APP_SERVICE_PLAN,
        ResourceKind::AppServicePlan,
        |d| {
            located(d)
                .property("name", APP_SERVICE_PLAN)
                .property("sku", json!({ "name": "F1", "tier": "Free" }))
                .property("reserved", false)
                .property("zoneRedundant", false)
        },
    )?;
    outputs.merge(exported(
        plan.as_ref(),
        "appServicePlanId",
        "appServicePlanName",
    )?)?;

    let workspace = builder.declare_if(
        flags.log_analytics,
        LOG_ANALYTICS,
        ResourceKind::LogAnalyticsWorkspace,
        |d| {
            located(d)
                .property("workspaceName", suffix.concat("drifttest-law-"))
                .property("sku", json!({ "name": "PerGB2018" }))
                .property("retentionInDays", 30u32)
                .property(
                    "features",
                    json!({ "enableLogAccessUsingOnlyResourcePermissions": true }),
                )
        },
    )?;
    outputs.merge(exported(
        workspace.as_ref(),
        "logAnalyticsWorkspaceId",
        "logAnalyticsWorkspaceName",
    )?)?;

    let vault = builder.declare_if(flags.key_vault, KEY_VAULT, ResourceKind::KeyVault, |d| {
        let tenant_id = config.tenant_id.clone().unwrap_or_default();
        located(d)
            .property("vaultName", suffix.concat("drifttest-kv"))
            .property(
                "properties",
                json!({
                    "tenantId": tenant_id,
                    "sku": { "family": "A", "name": "standard" },
                    "enabledForDeployment": false,
                    "enabledForTemplateDeployment": false,
                    "enabledForDiskEncryption": false,
                    "enableRbacAuthorization": true,
                    "publicNetworkAccess": "Enabled",
                }),
            )
    })?;
    outputs.merge(exported(vault.as_ref(), "keyVaultId", "keyVaultName")?)?;

    let service_bus = builder.group_if(flags.service_bus, |builder| -> Result<Outputs, ConfigurationError> {
        let namespace = builder.declare_if(true, SERVICE_BUS, ResourceKind::ServiceBusNamespace, |d| {
            located(d)
                .property("namespaceName", SERVICE_BUS)
                .property("sku", json!({ "name": "Basic", "tier": "Basic" }))
                .property("disableLocalAuth", false)
                .property("publicNetworkAccess", "Enabled")
                .property("minimumTlsVersion", "1.2")
        })?;

        for queue in QUEUES {
            builder.declare_if(
                namespace.is_some(),
                queue.logical_name(),
                ResourceKind::ServiceBusQueue,
                |d| queue_declaration(d, &queue, namespace.as_ref(), config),
            )?;
        }

        exported(
            namespace.as_ref(),
            "serviceBusNamespaceId",
            "serviceBusNamespaceName",
        )
    })?;
    outputs.merge(service_bus)?;

    tracing::debug!(outputs = outputs.len(), "drift-test stack declared");
    Ok(outputs)
}

/// Output fragment with the id and name of an included resource
fn exported(
    handle: Option<&ResourceHandle>,
    id_key: &str,
    name_key: &str,
) -> Result<Outputs, ConfigurationError> {
    let mut fragment = Outputs::new();
    if let Some(handle) = handle {
        fragment
            .export(id_key, handle.id())?
            .export(name_key, handle.name())?;
    }
    Ok(fragment)
}

fn queue_declaration(
    declaration: ResourceDeclaration,
    queue: &QueueSpec,
    namespace: Option<&ResourceHandle>,
    config: &StackConfig,
) -> ResourceDeclaration {
    let declaration = declaration
        .property("queueName", queue.name)
        .property("resourceGroupName", &config.resource_group_name)
        .property("maxDeliveryCount", queue.max_delivery_count)
        .property("lockDuration", queue.lock_duration)
        .property("requiresDuplicateDetection", false)
        .property("requiresSession", false)
        .property("deadLetteringOnMessageExpiration", false);

    match namespace {
        Some(namespace) => declaration.property("namespaceName", namespace.name()),
        None => declaration,
    }
}

fn security_rules() -> serde_json::Value {
    let rule = |name: &str, priority: u32, access: &str, protocol: &str, port: &str| {
        json!({
            "name": name,
            "priority": priority,
            "access": access,
            "direction": "Inbound",
            "protocol": protocol,
            "sourcePortRange": "*",
            "destinationPortRange": port,
            "sourceAddressPrefix": "*",
            "destinationAddressPrefix": "*",
        })
    };

    json!([
        rule("AllowHTTP", 100, "Allow", "Tcp", "80"),
        rule("AllowHTTPS", 110, "Allow", "Tcp", "443"),
        rule("DenyAllInbound", 1000, "Deny", "*", "*"),
    ])
}

fn subnets() -> serde_json::Value {
    let subnet = |name: &str, prefix: &str| {
        json!({
            "name": name,
            "addressPrefix": prefix,
            "privateEndpointNetworkPolicies": "Disabled",
            "privateLinkServiceNetworkPolicies": "Enabled",
        })
    };

    json!([
        subnet("drifttest-subnet", "10.0.0.0/24"),
        subnet("drifttest-private-subnet", "10.0.1.0/24"),
        subnet("drifttest-private-subnet-2", "10.0.2.0/24"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_config::DeployFlags;

    fn config(flags: DeployFlags) -> StackConfig {
        let mut config = StackConfig::new("rg-drift");
        config.flags = flags;
        config.tenant_id = Some("tenant".into());
        config.unique_suffix = "ab12cd34".into();
        config
    }

    fn declared(flags: DeployFlags) -> (stackflow_core::Stack, Outputs) {
        let config = config(flags);
        let mut builder = StackBuilder::new();
        let suffix = Deferred::resolved(config.unique_suffix.clone());
        let outputs = declare(&config, suffix, &mut builder).unwrap();
        (builder.build().unwrap(), outputs)
    }

    #[test]
    fn test_default_flags_declare_five_resources() {
        let (stack, outputs) = declared(DeployFlags::default());

        let names: Vec<_> = stack.declarations().map(|d| d.name()).collect();
        assert_eq!(names, vec![NSG, VNET, STORAGE, APP_SERVICE_PLAN, LOG_ANALYTICS]);
        assert!(stack.excluded().contains(KEY_VAULT));
        assert!(stack.excluded().contains(SERVICE_BUS));
        assert_eq!(outputs.len(), 12);
    }

    #[test]
    fn test_service_bus_declares_queues_after_namespace() {
        let flags = DeployFlags {
            service_bus: true,
            ..DeployFlags::none()
        };
        let (stack, outputs) = declared(flags);

        assert_eq!(stack.len(), 4);
        let plan = stack.plan().unwrap();
        assert_eq!(plan.depth(), 2);
        for queue in QUEUES {
            let declaration = stack.get(&queue.logical_name()).unwrap();
            assert!(declaration.dependencies().contains(SERVICE_BUS));
        }

        let keys: Vec<_> = outputs.keys().collect();
        assert_eq!(
            keys,
            vec![
                "resourceGroupName",
                "serviceBusNamespaceId",
                "serviceBusNamespaceName",
                "uniqueSuffix"
            ]
        );
    }

    #[test]
    fn test_disabled_service_bus_records_queue_names() {
        let (stack, _) = declared(DeployFlags::none());

        assert!(stack.is_empty());
        for queue in QUEUES {
            assert!(stack.excluded().contains(&queue.logical_name()));
        }
    }

    #[test]
    fn test_tags() {
        let (stack, _) = declared(DeployFlags::default());
        let nsg = stack.get(NSG).unwrap();

        assert_eq!(nsg.tag_map()["IaC"], "stackflow");
        assert_eq!(nsg.tag_map()["Environment"], "test");
        assert_eq!(nsg.tag_map()["ResourceType"], "Infrastructure");
    }

    #[test]
    fn test_storage_depends_only_on_literals() {
        let (stack, _) = declared(DeployFlags::default());
        assert!(stack.get(STORAGE).unwrap().dependencies().is_empty());
    }
}
