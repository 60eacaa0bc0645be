//! Resource declarations and their inputs

use crate::deferred::{Deferred, Settled};
use crate::handle::ResourceHandle;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Kind of a provisionable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    NetworkSecurityGroup,
    VirtualNetwork,
    StorageAccount,
    AppServicePlan,
    LogAnalyticsWorkspace,
    KeyVault,
    ServiceBusNamespace,
    ServiceBusQueue,
}

impl ResourceKind {
    /// Provider type token, e.g. `azure-native:network:VirtualNetwork`
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::NetworkSecurityGroup => "azure-native:network:NetworkSecurityGroup",
            ResourceKind::VirtualNetwork => "azure-native:network:VirtualNetwork",
            ResourceKind::StorageAccount => "azure-native:storage:StorageAccount",
            ResourceKind::AppServicePlan => "azure-native:web:AppServicePlan",
            ResourceKind::LogAnalyticsWorkspace => "azure-native:operationalinsights:Workspace",
            ResourceKind::KeyVault => "azure-native:keyvault:Vault",
            ResourceKind::ServiceBusNamespace => "azure-native:servicebus:Namespace",
            ResourceKind::ServiceBusQueue => "azure-native:servicebus:Queue",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::NetworkSecurityGroup => write!(f, "network-security-group"),
            ResourceKind::VirtualNetwork => write!(f, "virtual-network"),
            ResourceKind::StorageAccount => write!(f, "storage-account"),
            ResourceKind::AppServicePlan => write!(f, "app-service-plan"),
            ResourceKind::LogAnalyticsWorkspace => write!(f, "log-analytics-workspace"),
            ResourceKind::KeyVault => write!(f, "key-vault"),
            ResourceKind::ServiceBusNamespace => write!(f, "service-bus-namespace"),
            ResourceKind::ServiceBusQueue => write!(f, "service-bus-queue"),
        }
    }
}

/// A property or output value: either known now or deferred
#[derive(Debug, Clone)]
pub enum Input {
    Literal(Value),
    Deferred(Deferred<Value>),
}

impl Input {
    /// Logical names of the resources this value waits on
    pub fn dependencies(&self) -> BTreeSet<String> {
        match self {
            Input::Literal(_) => BTreeSet::new(),
            Input::Deferred(deferred) => deferred.dependencies().clone(),
        }
    }

    pub async fn settle(&self) -> Settled<Value> {
        match self {
            Input::Literal(value) => Ok(value.clone()),
            Input::Deferred(deferred) => deferred.settle().await,
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Literal(value)
    }
}

impl From<Deferred<Value>> for Input {
    fn from(value: Deferred<Value>) -> Self {
        Input::Deferred(value)
    }
}

impl From<Deferred<String>> for Input {
    fn from(value: Deferred<String>) -> Self {
        Input::Deferred(value.map(Value::from))
    }
}

impl From<&Deferred<String>> for Input {
    fn from(value: &Deferred<String>) -> Self {
        Input::Deferred(value.map(Value::from))
    }
}

macro_rules! literal_input {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Input {
                fn from(value: $ty) -> Self {
                    Input::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_input!(&str, String, bool, i64, u32);

impl From<&String> for Input {
    fn from(value: &String) -> Self {
        Input::Literal(Value::String(value.clone()))
    }
}

/// Description of a provisionable entity
#[derive(Debug, Clone)]
pub struct ResourceDeclaration {
    name: String,
    kind: ResourceKind,
    properties: BTreeMap<String, Input>,
    tags: BTreeMap<String, String>,
    depends_on: Vec<ResourceHandle>,
}

impl ResourceDeclaration {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
            tags: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Order this declaration after `handle` without consuming any of its attributes
    pub fn depends_on(mut self, handle: &ResourceHandle) -> Self {
        self.depends_on.push(handle.clone());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn properties(&self) -> &BTreeMap<String, Input> {
        &self.properties
    }

    pub fn tag_map(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Every logical name this declaration must wait for
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut dependencies: BTreeSet<String> = self
            .properties
            .values()
            .flat_map(Input::dependencies)
            .collect();
        dependencies.extend(
            self.depends_on
                .iter()
                .map(|handle| handle.logical_name().to_string()),
        );
        dependencies
    }

    /// Wait for every explicit dependency and property, then return the
    /// fully resolved property values.
    ///
    /// Returns the first failure in `depends_on` order, then property key order.
    pub(crate) async fn resolve_properties(&self) -> Settled<BTreeMap<String, Value>> {
        let ready = join_all(
            self.depends_on
                .iter()
                .map(|handle| async move { handle.ready().settle().await }),
        )
        .await;
        for outcome in ready {
            outcome?;
        }

        let values = join_all(self.properties.values().map(Input::settle)).await;
        self.properties
            .keys()
            .cloned()
            .zip(values)
            .map(|(key, value)| value.map(|value| (key, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use serde_json::json;

    #[tokio::test]
    async fn test_literal_properties_resolve() {
        let declaration = ResourceDeclaration::new("drifttest-asp", ResourceKind::AppServicePlan)
            .property("name", "drifttest-asp")
            .property("reserved", false)
            .property("sku", json!({"name": "F1", "tier": "Free"}))
            .tag("IaC", "stackflow");

        assert!(declaration.dependencies().is_empty());
        let properties = declaration.resolve_properties().await.unwrap();
        assert_eq!(properties["name"], json!("drifttest-asp"));
        assert_eq!(properties["sku"]["tier"], json!("Free"));
        assert_eq!(declaration.tag_map()["IaC"], "stackflow");
    }

    #[tokio::test]
    async fn test_dependencies_from_properties_and_depends_on() {
        let namespace = ResourceHandle::new("drifttest-servicebus");
        let vnet = ResourceHandle::new("drifttest-vnet");

        let declaration = ResourceDeclaration::new("queue-orders", ResourceKind::ServiceBusQueue)
            .property("namespaceName", namespace.name())
            .depends_on(&vnet);

        let dependencies: Vec<_> = declaration.dependencies().into_iter().collect();
        assert_eq!(dependencies, vec!["drifttest-servicebus", "drifttest-vnet"]);
    }

    #[tokio::test]
    async fn test_failed_dependency_fails_resolution() {
        let namespace = ResourceHandle::new("drifttest-servicebus");
        let declaration = ResourceDeclaration::new("queue-orders", ResourceKind::ServiceBusQueue)
            .property("namespaceName", namespace.name());

        namespace.settle(Err(FailureReason::ProvisionFailed("boom".into())));

        let error = declaration.resolve_properties().await.unwrap_err();
        assert_eq!(error.resource, "drifttest-servicebus");
        assert_eq!(error.attribute, "name");
    }

    #[test]
    fn test_kind_display_and_token() {
        assert_eq!(ResourceKind::StorageAccount.to_string(), "storage-account");
        assert_eq!(
            ResourceKind::LogAnalyticsWorkspace.type_token(),
            "azure-native:operationalinsights:Workspace"
        );
    }
}
