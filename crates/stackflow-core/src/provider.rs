//! Provisioner trait definition

use crate::declaration::ResourceKind;
use crate::error::ProvisionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Provisioning abstraction trait
///
/// The engine calls `provision` exactly once per active declaration, with
/// every property already resolved. Retries and rate limiting belong to the
/// implementation.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Returns the provisioner name (e.g., "preview")
    fn name(&self) -> &str;

    /// Create or configure the resource described by `request`
    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedResource, ProvisionError>;
}

/// A declaration with all of its inputs resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Logical name of the declaration
    pub name: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Fully resolved properties
    pub properties: BTreeMap<String, Value>,

    /// Tags applied to the resource
    pub tags: BTreeMap<String, String>,
}

impl ProvisionRequest {
    /// Get a property as a specific type
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.properties
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Shorthand for a failure attributed to this request
    pub fn fail(&self, message: impl Into<String>) -> ProvisionError {
        ProvisionError::new(&self.name, message)
    }
}

/// What a provisioner reports back for a created resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedResource {
    /// Resource attributes (id, name, ...)
    pub attributes: BTreeMap<String, String>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,
}

impl ProvisionedResource {
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl Default for ProvisionedResource {
    fn default() -> Self {
        Self::new()
    }
}
