//! Output aggregation
//!
//! Each conditional branch of a stack program returns its own [`Outputs`]
//! fragment; fragments are merged once, so the key set is fixed by the flag
//! combination and never mutated while values resolve.

use crate::builder::Stack;
use crate::declaration::Input;
use crate::error::{AggregateOutputError, ConfigurationError, OutputFailure};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;

/// Append-only mapping from output key to a literal or deferred value
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    entries: BTreeMap<String, Input>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key; keys can never be overwritten
    pub fn export(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Input>,
    ) -> Result<&mut Self, ConfigurationError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(ConfigurationError::DuplicateOutput(key));
        }
        self.entries.insert(key, value.into());
        Ok(self)
    }

    /// Append every key of `other`; nothing is added if any key collides
    pub fn merge(&mut self, other: Outputs) -> Result<(), ConfigurationError> {
        if let Some(key) = other.entries.keys().find(|k| self.entries.contains_key(*k)) {
            return Err(ConfigurationError::DuplicateOutput(key.clone()));
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Input> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every deferred output must come from an included declaration
    pub fn check_references(&self, stack: &Stack) -> Result<(), ConfigurationError> {
        for (key, input) in &self.entries {
            for referenced in input.dependencies() {
                stack.check_reference(&format!("outputs.{key}"), &referenced)?;
            }
        }
        Ok(())
    }

    /// Wait for every value and flatten into concrete JSON values.
    ///
    /// Fails once, listing every key whose source failed, after all values
    /// have settled.
    pub async fn finalize(self) -> Result<BTreeMap<String, Value>, AggregateOutputError> {
        let settled = join_all(self.entries.values().map(Input::settle)).await;

        let mut resolved = BTreeMap::new();
        let mut failures = Vec::new();
        for (key, outcome) in self.entries.keys().zip(settled) {
            match outcome {
                Ok(value) => {
                    resolved.insert(key.clone(), value);
                }
                Err(error) => {
                    tracing::warn!(output = %key, %error, "output failed to resolve");
                    failures.push(OutputFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(resolved)
        } else {
            Err(AggregateOutputError { failures, resolved })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;
    use crate::error::{DeferredError, FailureReason};
    use serde_json::json;

    #[tokio::test]
    async fn test_finalize_mixes_literals_and_deferreds() {
        let mut outputs = Outputs::new();
        outputs
            .export("resourceGroupName", "rg-drift")
            .unwrap()
            .export("uniqueSuffix", Deferred::resolved("ab12cd34".to_string()))
            .unwrap();

        let map = outputs.finalize().await.unwrap();
        assert_eq!(map["resourceGroupName"], json!("rg-drift"));
        assert_eq!(map["uniqueSuffix"], json!("ab12cd34"));
    }

    #[tokio::test]
    async fn test_finalize_reports_every_failed_key() {
        let failed = |attribute: &str| {
            Deferred::<String>::failed(DeferredError::new(
                "drifttest-nsg",
                attribute,
                FailureReason::ProvisionFailed("denied".into()),
            ))
        };

        let mut outputs = Outputs::new();
        outputs.export("nsgId", failed("id")).unwrap();
        outputs.export("nsgName", failed("name")).unwrap();
        outputs.export("vnetName", "drifttest-vnet").unwrap();

        let error = outputs.finalize().await.unwrap_err();
        assert_eq!(error.keys(), vec!["nsgId", "nsgName"]);
        assert_eq!(error.failures[1].error.attribute, "name");
        assert_eq!(error.resolved["vnetName"], json!("drifttest-vnet"));
        assert!(error.to_string().contains("nsgId"));
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let mut outputs = Outputs::new();
        outputs.export("vnetId", "a").unwrap();
        assert_eq!(
            outputs.export("vnetId", "b").unwrap_err(),
            ConfigurationError::DuplicateOutput("vnetId".into())
        );
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let mut base = Outputs::new();
        base.export("vnetId", "a").unwrap();

        let mut fragment = Outputs::new();
        fragment.export("nsgId", "b").unwrap();
        fragment.export("vnetId", "c").unwrap();

        assert!(base.merge(fragment).is_err());
        assert_eq!(base.keys().collect::<Vec<_>>(), vec!["vnetId"]);

        let mut fragment = Outputs::new();
        fragment.export("nsgId", "b").unwrap();
        base.merge(fragment).unwrap();
        assert_eq!(base.len(), 2);
    }
}
