//! State file for the last run
//!
//! Manages `.stackflow/state.json`, a record of what the most recent run
//! provisioned and which outputs it produced. It is never diffed against.

use crate::declaration::ResourceKind;
use crate::error::{Result, StackError};
use crate::report::{Deployment, ResourceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stackflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";

/// Everything recorded about the last run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by logical name
    pub resources: BTreeMap<String, ResourceRecord>,

    /// Outputs that resolved
    pub outputs: BTreeMap<String, Value>,

    /// Output keys that failed, with the reason
    #[serde(default)]
    pub failed_outputs: BTreeMap<String, String>,
}

impl Default for StackState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            failed_outputs: BTreeMap::new(),
        }
    }
}

impl StackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a finished deployment
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let now = Utc::now();
        let resources = deployment
            .report
            .resources
            .iter()
            .map(|outcome| {
                (
                    outcome.name.clone(),
                    ResourceRecord {
                        kind: outcome.kind,
                        status: outcome.status.clone(),
                        attributes: outcome.attributes.clone(),
                        recorded_at: now,
                    },
                )
            })
            .collect();

        let failed_outputs = match &deployment.outputs {
            Ok(_) => BTreeMap::new(),
            Err(error) => error
                .failures
                .iter()
                .map(|f| (f.key.clone(), f.error.to_string()))
                .collect(),
        };

        Self {
            version: STATE_VERSION,
            updated_at: now,
            resources,
            outputs: deployment.resolved_outputs().clone(),
            failed_outputs,
        }
    }

    pub fn get_resource(&self, name: &str) -> Option<&ResourceRecord> {
        self.resources.get(name)
    }
}

/// Recorded result of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,

    pub status: ResourceStatus,

    /// Resource attributes (id, name, ...)
    pub attributes: BTreeMap<String, String>,

    pub recorded_at: DateTime<Utc>,
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    /// Load the last recorded state, or an empty one
    pub async fn load(&self) -> Result<StackState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(StackState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: StackState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(StackError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &StackState) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }

        let path = self.state_path();
        let backup = self.backup_path();
        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }
}
