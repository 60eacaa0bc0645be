mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Declare it once. Deploy what the flags say.", long_about = None)]
struct Cli {
    /// Stack configuration file (searched for when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override a configuration key (key=value, repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    set: Vec<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which resources would be provisioned, in order
    Preview,
    /// Provision the stack and print its outputs
    Up {
        /// Maximum number of resources provisioned at once
        #[arg(short, long, env = "STACKFLOW_PARALLEL")]
        parallel: Option<usize>,
        /// Simulated provisioning latency in milliseconds
        #[arg(long, default_value = "0")]
        latency_ms: u64,
    },
    /// Print the outputs recorded by the last run
    Outputs,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command results, logs go to stderr
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let project_root = std::env::current_dir()?;

    match cli.command {
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Outputs => {
            commands::outputs::handle(&project_root).await?;
        }
        Commands::Preview => {
            let config = commands::load_config(cli.config.as_deref(), &cli.set)?;
            commands::preview::handle(&config)?;
        }
        Commands::Up {
            parallel,
            latency_ms,
        } => {
            let config = commands::load_config(cli.config.as_deref(), &cli.set)?;
            commands::up::handle(&config, &project_root, parallel, latency_ms).await?;
        }
    }

    Ok(())
}
