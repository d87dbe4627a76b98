use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "apiwatch",
    about = "apiwatch — control-plane API availability during deployments",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the API until the deployment finishes, then judge reliability.
    ///
    /// Exits non-zero if no probe ever succeeded, if reliability fell
    /// below the target, or if the deployment status stayed unreachable.
    Run {
        /// Path to apiwatch.toml (optional; environment variables apply on top)
        #[arg(short, long, default_value = "apiwatch.toml")]
        config: PathBuf,
        /// Report format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Load and validate the configuration, then print it
    CheckConfig {
        #[arg(short, long, default_value = "apiwatch.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,apiwatch=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, format } => commands::run::run(&config, &format).await,
        Commands::CheckConfig { config } => commands::check::check_config(&config),
    }
}
