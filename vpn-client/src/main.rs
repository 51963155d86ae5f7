//! Tunnel client binary: loads config, connects, and runs until the
//! connection is closed for good or the process is interrupted.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vpn_core::config::ClientConfig;
use vpn_client::engine::{ClientDeps, ClientTunnel};

mod device;

#[derive(Parser, Debug)]
#[command(name = "vpn-client", about = "Tunnel protocol client")]
struct Args {
    /// Path to the client's TOML config file.
    #[arg(short, long, default_value = "client.toml")]
    config: String,
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let text = std::fs::read_to_string(&args.config)?;
    let config: ClientConfig = toml::from_str(&text)?;
    init_logging(&config.logging.level, config.logging.json);

    info!(config = %args.config, server = %config.server_host, "starting tunnel client");

    let deps = ClientDeps {
        device: Arc::new(device::NullDevice),
    };
    let tunnel = Arc::new(ClientTunnel::new(config, deps));
    tunnel.run().await?;
    Ok(())
}
