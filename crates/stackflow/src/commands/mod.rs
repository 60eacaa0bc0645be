pub mod outputs;
pub mod preview;
pub mod up;

use colored::Colorize;
use stackflow_config::StackConfig;
use stackflow_core::{Deferred, Outputs, Stack, StackBuilder};
use std::path::Path;

/// Load the stack configuration, from `path` or by searching for it
pub fn load_config(path: Option<&Path>, overrides: &[String]) -> anyhow::Result<StackConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => stackflow_config::find_config_file()?,
    };
    eprintln!("Configuration: {}", path.display().to_string().cyan());

    let config = StackConfig::from_file(&path, overrides)?;
    tracing::debug!(flags = ?config.flags, "configuration loaded");
    Ok(config)
}

/// Assemble the drift-test stack for `config`
pub fn assemble(config: &StackConfig) -> anyhow::Result<(Stack, Outputs)> {
    let mut builder = StackBuilder::new();
    let suffix = Deferred::resolved(config.unique_suffix.clone());
    let outputs = stackflow_azure::declare(config, suffix, &mut builder)?;
    let stack = builder.build()?;
    Ok((stack, outputs))
}
