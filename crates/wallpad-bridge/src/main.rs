use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wallpad_protocol::SchemaSet;

use wallpad_bridge::config::BridgeConfig;
use wallpad_bridge::service::BridgeService;

#[derive(Parser, Debug)]
#[command(name = "wallpad-bridge", about = "RS485 wallpad bus to MQTT bridge")]
struct Cli {
    /// Path to the bridge configuration document.
    #[arg(long, env = "WALLPAD_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Path to the vendor packet schema document.
    #[arg(long, env = "WALLPAD_SCHEMA", default_value = "schemas/commax.yaml")]
    schema: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig::load(&cli.config)?;
    let schemas = SchemaSet::load(&cli.schema)?;
    info!(
        schema = %cli.schema.display(),
        devices = schemas.len(),
        broker = %config.mqtt.broker_host,
        "starting wallpad bridge"
    );

    let (service, eventloop) = BridgeService::new(config, schemas);
    service.run(eventloop).await
}
