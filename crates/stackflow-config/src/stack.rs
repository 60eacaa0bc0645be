//! Stack configuration loading
//!
//! Reads the camelCase YAML settings, applies `key=value` overrides and
//! fills in defaults. Pulumi-style stack files are accepted as well: settings
//! nested under a top-level `config:` map and keys prefixed with a project
//! namespace (`drifttest:deployVnet`).

use crate::error::{ConfigError, Result};
use rand::Rng;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::path::Path;

pub const DEFAULT_LOCATION: &str = "westeurope";
pub const DEFAULT_ENVIRONMENT: &str = "test";
pub const DEFAULT_APPLICATION: &str = "drifttest";
pub const DEFAULT_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";
pub const SUFFIX_LENGTH: usize = 8;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Which resource groups of the stack are declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployFlags {
    pub vnet: bool,
    pub nsg: bool,
    pub storage: bool,
    pub app_service_plan: bool,
    pub log_analytics: bool,
    pub key_vault: bool,
    pub service_bus: bool,
}

impl Default for DeployFlags {
    fn default() -> Self {
        Self {
            vnet: true,
            nsg: true,
            storage: true,
            app_service_plan: true,
            log_analytics: true,
            key_vault: false,
            service_bus: false,
        }
    }
}

impl DeployFlags {
    /// Every flag off
    pub fn none() -> Self {
        Self {
            vnet: false,
            nsg: false,
            storage: false,
            app_service_plan: false,
            log_analytics: false,
            key_vault: false,
            service_bus: false,
        }
    }
}

/// Validated stack configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub resource_group_name: String,
    pub location: String,
    pub environment_name: String,
    pub application_name: String,
    pub flags: DeployFlags,
    pub tenant_id: Option<String>,
    pub subscription_id: String,
    /// Token appended to globally unique resource names
    pub unique_suffix: String,
}

impl StackConfig {
    /// Configuration with defaults for everything but the resource group
    pub fn new(resource_group_name: impl Into<String>) -> Self {
        Self {
            resource_group_name: resource_group_name.into(),
            location: DEFAULT_LOCATION.to_string(),
            environment_name: DEFAULT_ENVIRONMENT.to_string(),
            application_name: DEFAULT_APPLICATION.to_string(),
            flags: DeployFlags::default(),
            tenant_id: None,
            subscription_id: DEFAULT_SUBSCRIPTION.to_string(),
            unique_suffix: generate_suffix(SUFFIX_LENGTH),
        }
    }

    /// Load from a YAML file, then apply overrides
    pub fn from_file<S: AsRef<str>>(path: &Path, overrides: &[S]) -> Result<Self> {
        tracing::debug!("Loading stack configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, overrides)
    }

    /// Parse YAML content, then apply `key=value` overrides in order
    pub fn from_yaml<S: AsRef<str>>(content: &str, overrides: &[S]) -> Result<Self> {
        let mut settings = parse_document(content)?;
        for entry in overrides {
            let (key, value) = parse_override(entry.as_ref())?;
            tracing::debug!("Override {} = {}", key, value);
            settings.insert(Value::String(key), Value::String(value));
        }

        let raw: RawConfig = serde_yaml::from_value(Value::Mapping(settings))?;
        raw.resolve()
    }
}

/// Generate a random token from lowercase letters and digits
pub fn generate_suffix(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default, deserialize_with = "text")]
    resource_group_name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    location: Option<String>,
    #[serde(default, deserialize_with = "text")]
    environment_name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    application_name: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    deploy_vnet: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    deploy_nsg: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    deploy_storage: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    deploy_app_service_plan: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    deploy_log_analytics: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    deploy_key_vault: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    deploy_service_bus: Option<bool>,
    #[serde(default, deserialize_with = "text")]
    tenant_id: Option<String>,
    #[serde(default, deserialize_with = "text")]
    subscription_id: Option<String>,
    #[serde(default, deserialize_with = "text")]
    unique_suffix: Option<String>,
}

impl RawConfig {
    fn resolve(self) -> Result<StackConfig> {
        let resource_group_name = non_empty(self.resource_group_name)
            .ok_or_else(|| ConfigError::MissingKey("resourceGroupName".into()))?;

        let defaults = DeployFlags::default();
        let flags = DeployFlags {
            vnet: self.deploy_vnet.unwrap_or(defaults.vnet),
            nsg: self.deploy_nsg.unwrap_or(defaults.nsg),
            storage: self.deploy_storage.unwrap_or(defaults.storage),
            app_service_plan: self
                .deploy_app_service_plan
                .unwrap_or(defaults.app_service_plan),
            log_analytics: self.deploy_log_analytics.unwrap_or(defaults.log_analytics),
            key_vault: self.deploy_key_vault.unwrap_or(defaults.key_vault),
            service_bus: self.deploy_service_bus.unwrap_or(defaults.service_bus),
        };

        let tenant_id = non_empty(self.tenant_id);
        if flags.key_vault && tenant_id.is_none() {
            return Err(ConfigError::MissingKey("tenantId".into()));
        }

        let unique_suffix = match non_empty(self.unique_suffix) {
            Some(suffix) => {
                validate_suffix(&suffix)?;
                suffix
            }
            None => {
                let suffix = generate_suffix(SUFFIX_LENGTH);
                tracing::debug!("Generated unique suffix {}", suffix);
                suffix
            }
        };

        Ok(StackConfig {
            resource_group_name,
            location: non_empty(self.location).unwrap_or_else(|| DEFAULT_LOCATION.into()),
            environment_name: non_empty(self.environment_name)
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.into()),
            application_name: non_empty(self.application_name)
                .unwrap_or_else(|| DEFAULT_APPLICATION.into()),
            flags,
            tenant_id,
            subscription_id: non_empty(self.subscription_id)
                .unwrap_or_else(|| DEFAULT_SUBSCRIPTION.into()),
            unique_suffix,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_suffix(suffix: &str) -> Result<()> {
    if suffix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: "uniqueSuffix".into(),
            message: "only lowercase letters and digits are allowed".into(),
        })
    }
}

/// Booleans may be written as YAML booleans or as strings
fn flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(value)) => Ok(Some(value)),
        Some(Flag::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got `{}`",
                other
            ))),
        },
    }
}

/// Plain YAML scalars such as `12345678` are accepted as text
fn text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(Option::<Text>::deserialize(deserializer)?.map(|value| match value {
        Text::Text(text) => text,
        Text::Unsigned(number) => number.to_string(),
        Text::Signed(number) => number.to_string(),
        Text::Float(number) => number.to_string(),
    }))
}

fn parse_document(content: &str) -> Result<Mapping> {
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }

    let mapping = match serde_yaml::from_str::<Value>(content)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "<root>".into(),
                message: "expected a mapping of settings".into(),
            });
        }
    };

    let mapping = match mapping.get("config") {
        Some(Value::Mapping(nested)) => nested.clone(),
        _ => mapping,
    };

    Ok(mapping
        .into_iter()
        .map(|(key, value)| match key {
            Value::String(key) => (Value::String(strip_namespace(&key).to_string()), value),
            other => (other, value),
        })
        .collect())
}

fn strip_namespace(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, name)| name)
}

fn parse_override(entry: &str) -> Result<(String, String)> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidOverride(entry.to_string()))?;
    let key = strip_namespace(key.trim());
    if key.is_empty() {
        return Err(ConfigError::InvalidOverride(entry.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_OVERRIDES: &[&str] = &[];

    #[test]
    fn test_defaults() {
        let config = StackConfig::from_yaml("resourceGroupName: rg-drift", NO_OVERRIDES).unwrap();

        assert_eq!(config.resource_group_name, "rg-drift");
        assert_eq!(config.location, "westeurope");
        assert_eq!(config.environment_name, "test");
        assert_eq!(config.application_name, "drifttest");
        assert_eq!(config.flags, DeployFlags::default());
        assert_eq!(config.subscription_id, DEFAULT_SUBSCRIPTION);
        assert_eq!(config.unique_suffix.len(), SUFFIX_LENGTH);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
resourceGroupName: rg-drift
location: northeurope
environmentName: prod
applicationName: drift
deployVnet: false
deployKeyVault: true
deployServiceBus: "yes"
tenantId: 11111111-2222-3333-4444-555555555555
uniqueSuffix: ab12cd34
"#;
        let config = StackConfig::from_yaml(yaml, NO_OVERRIDES).unwrap();

        assert_eq!(config.location, "northeurope");
        assert_eq!(config.environment_name, "prod");
        assert!(!config.flags.vnet);
        assert!(config.flags.nsg);
        assert!(config.flags.key_vault);
        assert!(config.flags.service_bus);
        assert_eq!(config.unique_suffix, "ab12cd34");
    }

    #[test]
    fn test_pulumi_style_namespaced_keys() {
        let yaml = r#"
config:
  drifttest:resourceGroupName: rg-drift
  drifttest:deployStorage: "false"
"#;
        let config = StackConfig::from_yaml(yaml, NO_OVERRIDES).unwrap();

        assert_eq!(config.resource_group_name, "rg-drift");
        assert!(!config.flags.storage);
    }

    #[test]
    fn test_overrides_apply_after_file() {
        let config = StackConfig::from_yaml(
            "resourceGroupName: rg-drift\ndeployVnet: true",
            &["deployVnet=false", "uniqueSuffix=0123abcd", "location = eastus"],
        )
        .unwrap();

        assert!(!config.flags.vnet);
        assert_eq!(config.unique_suffix, "0123abcd");
        assert_eq!(config.location, "eastus");
    }

    #[test]
    fn test_missing_resource_group() {
        let result = StackConfig::from_yaml("location: westeurope", NO_OVERRIDES);
        assert!(matches!(result, Err(ConfigError::MissingKey(key)) if key == "resourceGroupName"));
    }

    #[test]
    fn test_key_vault_requires_tenant() {
        let result = StackConfig::from_yaml(
            "resourceGroupName: rg\ndeployKeyVault: true",
            NO_OVERRIDES,
        );
        assert!(matches!(result, Err(ConfigError::MissingKey(key)) if key == "tenantId"));
    }

    #[test]
    fn test_invalid_boolean() {
        let result = StackConfig::from_yaml("resourceGroupName: rg\ndeployNsg: maybe", NO_OVERRIDES);
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_invalid_override() {
        let result = StackConfig::from_yaml("resourceGroupName: rg", &["deployNsg"]);
        assert!(matches!(result, Err(ConfigError::InvalidOverride(_))));
    }

    #[test]
    fn test_invalid_suffix() {
        let result = StackConfig::from_yaml("resourceGroupName: rg\nuniqueSuffix: AB-12", NO_OVERRIDES);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_numeric_scalars_are_read_as_text() {
        let yaml = r#"
resourceGroupName: 2024
uniqueSuffix: 12345678
deployKeyVault: true
tenantId: 42
"#;
        let config = StackConfig::from_yaml(yaml, NO_OVERRIDES).unwrap();
        assert_eq!(config.resource_group_name, "2024");
        assert_eq!(config.unique_suffix, "12345678");
        assert_eq!(config.tenant_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_generate_suffix() {
        let suffix = generate_suffix(SUFFIX_LENGTH);
        assert_eq!(suffix.len(), 8);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_empty_document_reports_missing_key() {
        let result = StackConfig::from_yaml("", NO_OVERRIDES);
        assert!(matches!(result, Err(ConfigError::MissingKey(_))));
    }
}
