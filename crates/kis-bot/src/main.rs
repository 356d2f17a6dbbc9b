//! KIS automated trading client - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// KRX equities auto-trader against the KIS open API
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via KIS_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    kis_ws::init_crypto();

    let args = Args::parse();

    kis_telemetry::init_logging()?;

    info!("Starting kis-bot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("KIS_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = kis_bot::AppConfig::load(&config_path)?;

    let app = kis_bot::Application::new(config);
    app.run().await?;

    Ok(())
}
