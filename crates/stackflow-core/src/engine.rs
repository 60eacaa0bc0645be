//! Resolution engine
//!
//! Every active declaration is evaluated concurrently on the calling task.
//! A declaration waits on the deferred values it references, so provisioning
//! follows the dependency graph without any explicit scheduling:
//!
//! ```text
//!   suffix ─▶ drifttest-storage            drifttest-vnet
//!   drifttest-servicebus ─▶ queue-orders   (independent, runs immediately)
//! ```
//!
//! The graph is validated first; a cycle would otherwise make the
//! participants wait on each other forever.

use crate::builder::{Stack, StackEntry};
use crate::error::{ConfigurationError, FailureReason};
use crate::output::Outputs;
use crate::provider::{ProvisionRequest, Provisioner};
use crate::report::{Deployment, DeploymentReport, ResourceOutcome, ResourceStatus};
use futures_util::future::{FutureExt, join_all};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Provisions a [`Stack`] in dependency order
pub struct Engine {
    provisioner: Arc<dyn Provisioner>,
    parallelism: Option<usize>,
}

impl Engine {
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            provisioner,
            parallelism: None,
        }
    }

    /// Limit the number of provisioning calls in flight at once
    pub fn with_parallelism(mut self, limit: usize) -> Self {
        self.parallelism = Some(limit.max(1));
        self
    }

    /// Provision every declaration of `stack`
    pub async fn run(&self, stack: Stack) -> Result<DeploymentReport, ConfigurationError> {
        self.run_until(stack, std::future::pending()).await
    }

    /// Provision every declaration of `stack` unless `cancel` completes first.
    ///
    /// On cancellation, in-flight provisioning futures are dropped and every
    /// declaration that has not settled yet is reported as cancelled. Values
    /// that already resolved stay resolved.
    pub async fn run_until<C>(
        &self,
        stack: Stack,
        cancel: C,
    ) -> Result<DeploymentReport, ConfigurationError>
    where
        C: Future<Output = ()>,
    {
        stack.validate()?;

        tracing::info!(
            provisioner = self.provisioner.name(),
            resources = stack.len(),
            "starting run"
        );

        let started = Instant::now();
        let permits = self.parallelism.map(|limit| Arc::new(Semaphore::new(limit)));
        let cancel = cancel.shared();

        let evaluations = stack.entries.iter().map(|entry| {
            let cancel = cancel.clone();
            let permits = permits.clone();
            async move {
                tokio::select! {
                    outcome = self.evaluate(entry, permits, started) => outcome,
                    () = cancel => cancelled(entry, started),
                }
            }
        });
        let resources = join_all(evaluations).await;

        let report = DeploymentReport {
            resources,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(summary = %report.summary(), "run finished");
        Ok(report)
    }

    /// Provision `stack`, then finalize `outputs`
    pub async fn deploy(
        &self,
        stack: Stack,
        outputs: Outputs,
    ) -> Result<Deployment, ConfigurationError> {
        self.deploy_until(stack, outputs, std::future::pending()).await
    }

    pub async fn deploy_until<C>(
        &self,
        stack: Stack,
        outputs: Outputs,
        cancel: C,
    ) -> Result<Deployment, ConfigurationError>
    where
        C: Future<Output = ()>,
    {
        outputs.check_references(&stack)?;
        let report = self.run_until(stack, cancel).await?;
        let outputs = outputs.finalize().await;
        Ok(Deployment { report, outputs })
    }

    async fn evaluate(
        &self,
        entry: &StackEntry,
        permits: Option<Arc<Semaphore>>,
        started: Instant,
    ) -> ResourceOutcome {
        let declaration = &entry.declaration;
        let name = declaration.name();

        let properties = match declaration.resolve_properties().await {
            Ok(properties) => properties,
            Err(cause) => {
                tracing::warn!(resource = %name, upstream = %cause.resource, %cause, "skipping resource");
                entry
                    .handle
                    .settle(Err(FailureReason::DependencyFailed(cause.resource.clone())));
                return outcome(
                    entry,
                    ResourceStatus::Skipped {
                        upstream: cause.resource,
                    },
                    BTreeMap::new(),
                    started,
                );
            }
        };

        // the semaphore is never closed
        let _permit = match permits {
            Some(permits) => permits.acquire_owned().await.ok(),
            None => None,
        };

        let request = ProvisionRequest {
            name: name.to_string(),
            kind: declaration.kind(),
            properties,
            tags: declaration.tag_map().clone(),
        };

        tracing::info!(resource = %name, kind = %request.kind, "provisioning");
        match self.provisioner.provision(&request).await {
            Ok(resource) => {
                tracing::info!(resource = %name, attributes = resource.attributes.len(), "provisioned");
                entry.handle.settle(Ok(resource.attributes.clone()));
                outcome(entry, ResourceStatus::Provisioned, resource.attributes, started)
            }
            Err(error) => {
                tracing::warn!(resource = %name, %error, "provisioning failed");
                entry
                    .handle
                    .settle(Err(FailureReason::ProvisionFailed(error.message.clone())));
                outcome(
                    entry,
                    ResourceStatus::Failed {
                        message: error.message,
                    },
                    BTreeMap::new(),
                    started,
                )
            }
        }
    }
}

fn cancelled(entry: &StackEntry, started: Instant) -> ResourceOutcome {
    tracing::warn!(resource = %entry.declaration.name(), "cancelled");
    entry.handle.settle(Err(FailureReason::Cancelled));
    outcome(entry, ResourceStatus::Cancelled, BTreeMap::new(), started)
}

fn outcome(
    entry: &StackEntry,
    status: ResourceStatus,
    attributes: BTreeMap<String, String>,
    started: Instant,
) -> ResourceOutcome {
    ResourceOutcome {
        name: entry.declaration.name().to_string(),
        kind: entry.declaration.kind(),
        status,
        attributes,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
