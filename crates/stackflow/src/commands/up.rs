use colored::Colorize;
use stackflow_azure::PreviewProvisioner;
use stackflow_config::StackConfig;
use stackflow_core::{Engine, ResourceStatus, StackState, StateManager};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub async fn handle(
    config: &StackConfig,
    project_root: &Path,
    parallel: Option<usize>,
    latency_ms: u64,
) -> anyhow::Result<()> {
    let (stack, outputs) = super::assemble(config)?;

    let mut provisioner = PreviewProvisioner::new(&config.subscription_id, &config.location);
    if latency_ms > 0 {
        provisioner = provisioner.with_latency(Duration::from_millis(latency_ms));
    }

    let mut engine = Engine::new(Arc::new(provisioner));
    if let Some(limit) = parallel {
        engine = engine.with_parallelism(limit);
    }

    eprintln!(
        "{} {} resources into {}",
        "Provisioning".blue(),
        stack.len(),
        config.resource_group_name.cyan()
    );

    let deployment = engine.deploy_until(stack, outputs, interrupted()).await?;

    for resource in &deployment.report.resources {
        let marker = match &resource.status {
            ResourceStatus::Provisioned => "✓".green(),
            ResourceStatus::Failed { .. } => "✗".red(),
            ResourceStatus::Skipped { .. } | ResourceStatus::Cancelled => "-".yellow(),
        };
        eprintln!(
            "  {} {} {} ({}ms)",
            marker,
            resource.name.cyan(),
            resource.status,
            resource.duration_ms
        );
    }
    eprintln!("{}", deployment.report.summary().to_string().bold());

    let state = StackState::from_deployment(&deployment);
    StateManager::new(project_root).save(&state).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(deployment.resolved_outputs())?
    );

    match deployment.outputs {
        Ok(_) if deployment.report.is_success() => Ok(()),
        Ok(_) => anyhow::bail!("{} resource(s) failed", deployment.report.failed().len()),
        Err(error) => Err(error.into()),
    }
}

/// Completes on Ctrl-C; never completes when the signal cannot be installed
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    eprintln!("{}", "Interrupted, cancelling outstanding resources".yellow());
}
