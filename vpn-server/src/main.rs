//! Tunnel server binary: loads config, wires collaborators, runs the
//! TLS listener until the process is interrupted.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vpn_server::config;
use vpn_server::directory::ConfigUserDirectory;
use vpn_server::engine::{ServerDeps, TunnelServer};

mod device;

#[derive(Parser, Debug)]
#[command(name = "vpn-server", about = "Tunnel protocol server")]
struct Args {
    /// Path to the server's TOML config file.
    #[arg(short, long, default_value = "server.toml")]
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
    let file_config = config::load(&args.config)?;
    init_logging(&file_config.server.logging.level, file_config.server.logging.json);

    info!(config = %args.config, "starting tunnel server");

    let directory = Arc::new(ConfigUserDirectory::from_entries(file_config.users));
    let device = Arc::new(device::NullDevice);
    let policy = Arc::new(device::NoopNetworkPolicy);

    let server = Arc::new(TunnelServer::new(
        file_config.server,
        ServerDeps {
            directory,
            device,
            policy,
        },
    ));
    server.run().await?;
    Ok(())
}
