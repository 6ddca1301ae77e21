mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use widget_bridge_cache::{FsCacheOptions, FsWidgetCache};
use widget_bridge_core::cache::ArtifactCache;
use widget_bridge_core::config::Config;
use widget_bridge_frame::{ComposeOptions, compose_document};
use widget_bridge_gateway::GatewayState;

#[derive(Parser)]
#[command(
    name = "widget-bridge",
    about = "Store, render and serve sandboxed tool-result widgets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the widget gateway
    Serve {
        /// Port to listen on (default: 18790)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Remove expired widgets once and exit
    Cleanup,

    /// Print the composed document for a stored widget
    Render { id: String },

    /// Show cache and gateway status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a config value by dotted path
    Get { path: String },
}

/// Open the process-wide cache. One-shot commands skip the recurring sweep.
async fn open_cache(config: &Config, sweep: bool) -> anyhow::Result<Arc<FsWidgetCache>> {
    let mut options = FsCacheOptions::from_config(&config.cache());
    if !sweep {
        options = options.with_cleanup_interval(Duration::ZERO);
    }
    let dir = options.cache_dir.clone();
    FsWidgetCache::open(options)
        .await
        .with_context(|| format!("Failed to initialise widget cache at {}", dir.display()))
}

async fn serve(config: Config, port: Option<u16>, bind: Option<String>) -> anyhow::Result<()> {
    let (warnings, errors) = config.validate();
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    if !errors.is_empty() {
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    let port = port.unwrap_or_else(|| config.port());
    let bind = bind.unwrap_or_else(|| config.bind());

    let cache = open_cache(&config, true).await?;
    tracing::info!(dir = %cache.dir().display(), max_age_secs = cache.max_age().as_secs(), "Widget cache ready");

    let state = GatewayState::new(Arc::new(config), cache)?;
    #[cfg(feature = "metrics")]
    let state = state.with_metrics(widget_bridge_gateway::metrics::install_prometheus_recorder()?);

    widget_bridge_gateway::start_gateway(Arc::new(state), &bind, port).await
}

async fn gateway_running(config: &Config) -> bool {
    let url = format!("http://{}:{}/health", config.bind(), config.port());
    let Ok(client) = reqwest::Client::builder().timeout(Duration::from_secs(2)).build() else {
        return false;
    };
    matches!(client.get(url).send().await, Ok(resp) if resp.status().is_success())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.map(PathBuf::from).unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init_logging(&config.logging.clone().unwrap_or_default(), cli.verbose)?;

    match cli.command {
        Commands::Serve { port, bind } => serve(config, port, bind).await?,
        Commands::Cleanup => {
            let cache = open_cache(&config, false).await?;
            let removed = cache.cleanup().await;
            println!("Removed {removed} expired widget(s) from {}", cache.dir().display());
        }
        Commands::Render { id } => {
            let cache = open_cache(&config, false).await?;
            let record = cache
                .get(&id)
                .await
                .with_context(|| format!("Widget not found or expired: {id}"))?;
            let document = compose_document(&id, &record, &ComposeOptions::from(&config.render()))?;
            println!("{document}");
        }
        Commands::Status => {
            let cache = config.cache();
            println!("widget-bridge v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Cache dir: {}", cache.resolve_dir().display());
            println!("Max age: {}s", cache.max_age().as_secs());
            println!("Gateway: http://{}:{}", config.bind(), config.port());
            let running = gateway_running(&config).await;
            println!("Status: {}", if running { "running" } else { "not running" });
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { path } => match config.get_path(&path) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("{path} is not set"),
            },
        },
    }

    Ok(())
}
