//! Per-resource results of a run

use crate::declaration::ResourceKind;
use crate::error::AggregateOutputError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How a declaration ended up after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Provisioned and attributes published
    Provisioned,
    /// The provisioner reported an error
    Failed { message: String },
    /// Never provisioned because a dependency failed
    Skipped { upstream: String },
    /// The run was cancelled before the resource settled
    Cancelled,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Provisioned => write!(f, "provisioned"),
            ResourceStatus::Failed { message } => write!(f, "failed: {}", message),
            ResourceStatus::Skipped { upstream } => write!(f, "skipped ({} failed)", upstream),
            ResourceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a single declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOutcome {
    /// Logical name
    pub name: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Final status
    pub status: ResourceStatus,

    /// Published attributes, empty unless provisioned
    pub attributes: BTreeMap<String, String>,

    /// Time from the start of the run until this declaration settled
    pub duration_ms: u64,
}

impl ResourceOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ResourceStatus::Provisioned
    }
}

/// Result of evaluating a whole stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// One outcome per active declaration, in declaration order
    pub resources: Vec<ResourceOutcome>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl DeploymentReport {
    pub fn is_success(&self) -> bool {
        self.resources.iter().all(ResourceOutcome::is_success)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceOutcome> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn failed(&self) -> Vec<&ResourceOutcome> {
        self.resources.iter().filter(|r| !r.is_success()).collect()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for resource in &self.resources {
            match resource.status {
                ResourceStatus::Provisioned => summary.provisioned += 1,
                ResourceStatus::Failed { .. } => summary.failed += 1,
                ResourceStatus::Skipped { .. } => summary.skipped += 1,
                ResourceStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }
}

/// Counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub provisioned: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} provisioned, {} failed, {} skipped, {} cancelled",
            self.provisioned, self.failed, self.skipped, self.cancelled
        )
    }
}

/// A finished run together with its finalized outputs
#[derive(Debug, Clone)]
pub struct Deployment {
    pub report: DeploymentReport,
    pub outputs: Result<BTreeMap<String, Value>, AggregateOutputError>,
}

impl Deployment {
    pub fn is_success(&self) -> bool {
        self.report.is_success() && self.outputs.is_ok()
    }

    /// Outputs that resolved, whether or not others failed
    pub fn resolved_outputs(&self) -> &BTreeMap<String, Value> {
        match &self.outputs {
            Ok(outputs) => outputs,
            Err(error) => &error.resolved,
        }
    }
}
