//! Error types for graph assembly, provisioning and output aggregation

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors detected while assembling the resource graph.
///
/// All of these abort a run before any provisioning call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Duplicate logical resource name: {0}")]
    DuplicateName(String),

    #[error("Duplicate output key: {0}")]
    DuplicateOutput(String),

    #[error("`{resource}` references excluded resource `{referenced}`")]
    ExcludedReference { resource: String, referenced: String },

    #[error("`{resource}` references undeclared resource `{referenced}`")]
    UnknownReference { resource: String, referenced: String },

    #[error("Dependency cycle detected: {}", .members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error("`{0}` is declared unconditionally inside a disabled group; use declare_if")]
    DisabledGroup(String),
}

/// Failure reported by a provisioner for a single declaration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Provisioning `{resource}` failed: {message}")]
pub struct ProvisionError {
    /// Logical name of the declaration that failed
    pub resource: String,

    /// Provider supplied reason
    pub message: String,
}

impl ProvisionError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Why a deferred value never received a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("provisioning failed: {0}")]
    ProvisionFailed(String),

    #[error("dependency `{0}` failed")]
    DependencyFailed(String),

    #[error("attribute was not reported by the provisioner")]
    MissingAttribute,

    #[error("run was cancelled")]
    Cancelled,

    #[error("value was never resolved")]
    Unresolved,
}

/// A deferred value that settled with a failure.
///
/// Always names the logical resource and attribute the value came from;
/// values derived through `map`/`zip` keep the origin of the first failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{resource}.{attribute}: {reason}")]
pub struct DeferredError {
    pub resource: String,
    pub attribute: String,
    pub reason: FailureReason,
}

impl DeferredError {
    pub fn new(
        resource: impl Into<String>,
        attribute: impl Into<String>,
        reason: FailureReason,
    ) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
            reason,
        }
    }
}

/// A single output key whose source failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFailure {
    pub key: String,
    pub error: DeferredError,
}

/// Raised once by `Outputs::finalize` when one or more keys failed.
///
/// Keys that did resolve are kept in `resolved` so callers can still report
/// the outputs of independent branches.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} output(s) failed to resolve: {}", .failures.len(), failed_keys(.failures))]
pub struct AggregateOutputError {
    pub failures: Vec<OutputFailure>,
    pub resolved: BTreeMap<String, Value>,
}

impl AggregateOutputError {
    /// Keys of the failed outputs, in key order
    pub fn keys(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.key.as_str()).collect()
    }
}

fn failed_keys(failures: &[OutputFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.key, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Crate level error
#[derive(Error, Debug)]
pub enum StackError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    AggregateOutput(#[from] AggregateOutputError),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StackError>;
