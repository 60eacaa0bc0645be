use async_trait::async_trait;
use parking_lot::Mutex;
use stackflow_azure::PreviewProvisioner;
use stackflow_config::{DeployFlags, StackConfig};
use stackflow_core::{
    Deferred, Outputs, ProvisionError, ProvisionRequest, ProvisionedResource, Provisioner, Stack,
    StackBuilder,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

pub const SUFFIX: &str = "ab12cd34";

/// Preview provisioner that records requests, delays and fails on demand
pub struct RecordingProvisioner {
    inner: PreviewProvisioner,
    failing: BTreeSet<String>,
    delays: BTreeMap<String, Duration>,
    requests: Mutex<Vec<ProvisionRequest>>,
    completed: Mutex<Vec<String>>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self {
            inner: PreviewProvisioner::new("00000000-0000-0000-0000-000000000000", "westeurope"),
            failing: BTreeSet::new(),
            delays: BTreeMap::new(),
            requests: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Hold the provisioning call for `name` for `delay` before answering
    #[allow(dead_code)]
    pub fn delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<ProvisionRequest> {
        self.requests.lock().clone()
    }

    #[allow(dead_code)]
    pub fn request(&self, name: &str) -> Option<ProvisionRequest> {
        self.requests.lock().iter().find(|r| r.name == name).cloned()
    }

    #[allow(dead_code)]
    pub fn order(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.name.clone()).collect()
    }

    /// Names of successfully provisioned resources, in completion order
    #[allow(dead_code)]
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    fn name(&self) -> &str {
        "recording"
    }

    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedResource, ProvisionError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delays.get(&request.name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&request.name) {
            return Err(request.fail("simulated provisioning failure"));
        }
        let resource = self.inner.provision(request).await?;
        self.completed.lock().push(request.name.clone());
        Ok(resource)
    }
}

pub fn config(flags: DeployFlags) -> StackConfig {
    let mut config = StackConfig::new("rg-drifttest");
    config.flags = flags;
    config.tenant_id = Some("11111111-2222-3333-4444-555555555555".into());
    config.unique_suffix = SUFFIX.into();
    config
}

/// Declare the drift-test stack for `flags`
pub fn declare(flags: DeployFlags) -> (Stack, Outputs) {
    let config = config(flags);
    let mut builder = StackBuilder::new();
    let suffix = Deferred::resolved(config.unique_suffix.clone());
    let outputs = stackflow_azure::declare(&config, suffix, &mut builder).unwrap();
    (builder.build().unwrap(), outputs)
}

#[allow(dead_code)]
pub fn keys(outputs: &BTreeMap<String, serde_json::Value>) -> Vec<&str> {
    outputs.keys().map(String::as_str).collect()
}
