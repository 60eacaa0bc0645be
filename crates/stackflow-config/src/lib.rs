pub mod error;
pub mod stack;

pub use error::*;
pub use stack::{DeployFlags, StackConfig, generate_suffix};

use std::path::PathBuf;

/// Environment variable pointing directly at a configuration file
pub const CONFIG_PATH_ENV: &str = "STACKFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["stackflow.local.yaml", "stackflow.yaml"];

/// Locate the stack configuration file
///
/// Search order:
/// 1. `STACKFLOW_CONFIG_PATH` (direct path)
/// 2. current directory: stackflow.local.yaml, stackflow.yaml
/// 3. `./.stackflow/` with the same candidates
/// 4. `~/.config/stackflow/stackflow.yaml` (global)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(".stackflow")] {
        if let Some(path) = CANDIDATES
            .iter()
            .map(|filename| dir.join(filename))
            .find(|path| path.exists())
        {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackflow").join("stackflow.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}
