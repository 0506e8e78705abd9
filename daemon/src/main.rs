//! xeld: entry point for running an XEL node.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use xel_node::{init_logging, LogFormat, NodeConfig, XelNode};
use xel_types::NetworkId;

#[derive(Parser)]
#[command(name = "xeld", about = "XEL node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and environment variables override them.
    #[arg(long, env = "XEL_CONFIG")]
    config: Option<PathBuf>,

    /// Network preset: "main" or "test".
    #[arg(long, env = "XEL_NETWORK")]
    network: Option<String>,

    /// Directory holding the LMDB environment.
    #[arg(long, env = "XEL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "XEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "XEL_LOG_JSON")]
    log_json: bool,

    /// Track node metrics in a Prometheus registry.
    #[arg(long, env = "XEL_ENABLE_METRICS")]
    metrics: bool,

    /// Secret phrases of accounts to forge with (comma-separated).
    #[arg(long, env = "XEL_FORGING_PHRASES", value_delimiter = ',', hide_env_values = true)]
    forge: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Open the chain and run until SIGINT or SIGTERM.
    Run,
    /// Rebuild the derived state from stored blocks, then exit.
    Rescan {
        /// First height to replay.
        #[arg(long, default_value_t = 0)]
        height: u32,
        /// Fully validate every block while replaying.
        #[arg(long)]
        validate: bool,
    },
    /// Roll the chain back to a height, then exit.
    PopOff {
        height: u32,
    },
    /// Print the effective configuration as TOML.
    PrintConfig,
}

fn parse_network(s: &str) -> anyhow::Result<NetworkId> {
    match s.to_lowercase().as_str() {
        "main" => Ok(NetworkId::Main),
        "test" => Ok(NetworkId::Test),
        other => bail!("unknown network {other:?}, expected \"main\" or \"test\""),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(network) = &cli.network {
        config.network = parse_network(network)?;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.log_json {
        config.log_format = LogFormat::Json;
    }
    config.enable_metrics |= cli.metrics;
    if !cli.forge.is_empty() {
        config.forging_secret_phrases = cli.forge.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Command::PrintConfig = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(config.log_format, &config.log_level);
    tracing::info!(
        network = config.network.as_str(),
        data_dir = %config.data_dir.display(),
        "xeld starting"
    );

    let data_dir = config.data_dir.clone();
    let mut node = XelNode::open(config)
        .with_context(|| format!("opening chain in {}", data_dir.display()))?;

    match cli.command {
        Command::Run => {
            node.start();
            node.run_until_signal().await?;
            tracing::info!("xeld exited cleanly");
        }
        Command::Rescan { height, validate } => {
            node.engine
                .scan(height, validate)
                .with_context(|| format!("rescanning from height {height}"))?;
            tracing::info!(height = node.engine.height(), "rescan finished");
        }
        Command::PopOff { height } => {
            let popped = node
                .engine
                .pop_off_to(height)
                .with_context(|| format!("popping off to height {height}"))?;
            tracing::info!(
                popped = popped.len(),
                height = node.engine.height(),
                "chain rolled back"
            );
        }
        Command::PrintConfig => {}
    }
    Ok(())
}
