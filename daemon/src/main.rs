//! Sehat daemon: entry point for running a claims-chain node.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sehat_node::{init_logging, LogFormat, NodeConfig, SehatNode, ShutdownController};
use sehat_state::{LoggingSink, TariffTable};

#[derive(Parser)]
#[command(name = "sehat-daemon", about = "Sehat permissioned claims-chain node")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "SEHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Node id. Validators use their id from the validator list.
    #[arg(long, env = "SEHAT_NODE_ID")]
    node_id: Option<String>,

    /// Shared secret for handshakes and signing.
    #[arg(long, env = "SEHAT_SECRET")]
    secret: Option<String>,

    /// Port for P2P connections.
    #[arg(long, env = "SEHAT_P2P_PORT")]
    port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SEHAT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SEHAT_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT or SIGTERM.
    Run,
    /// Write a default configuration file.
    #[command(name = "init-config")]
    InitConfig {
        #[arg(long, default_value = "sehat.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(node_id) = &cli.node_id {
        config.node_id = node_id.clone();
    }
    if let Some(secret) = &cli.secret {
        config.secret = secret.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
            }
            let contents = NodeConfig::default().to_toml_string()?;
            std::fs::write(output, contents)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("wrote default config to {}", output.display());
        }
        Command::Run => {
            let config = load_config(&cli)?;
            let format: LogFormat = config
                .log_format
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            init_logging(format, &config.log_level);

            tracing::info!(
                node = %config.node_id,
                port = config.port,
                validators = config.validators.len(),
                "starting Sehat node"
            );

            let node = SehatNode::new(
                config,
                Arc::new(TariffTable::default()),
                Arc::new(LoggingSink),
            )?;
            let signals = ShutdownController::new();
            tokio::select! {
                started = node.start() => {
                    let addr = started?;
                    tracing::info!(%addr, "node running");
                    signals.wait_for_signal().await;
                }
                _ = signals.wait_for_signal() => {}
            }

            tracing::info!("shutdown signal received, stopping node");
            node.stop().await;
            tracing::info!("Sehat daemon exited cleanly");
        }
    }

    Ok(())
}
