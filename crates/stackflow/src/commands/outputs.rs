use colored::Colorize;
use stackflow_core::StateManager;
use std::path::Path;

pub async fn handle(project_root: &Path) -> anyhow::Result<()> {
    let manager = StateManager::new(project_root);
    if !manager.state_path().exists() {
        anyhow::bail!("No recorded run found. Run `stack up` first");
    }

    let state = manager.load().await?;
    eprintln!(
        "Recorded {}",
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().cyan()
    );
    for (key, reason) in &state.failed_outputs {
        eprintln!("  {} {}: {}", "✗".red(), key, reason);
    }

    println!("{}", serde_json::to_string_pretty(&state.outputs)?);
    Ok(())
}
