//! netdash daemon - main entry point
//!
//! Serves the home-network dashboard and its JSON API.

mod api;
mod config;
mod server;
mod speedtest;
mod state;
mod system;
mod tools;
mod vendor_fetch;
mod wol;

use anyhow::Result;
use clap::Parser;
use netdash_discovery::Subnet;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "netdash")]
#[command(about = "Home network dashboard with ARP device discovery")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "netdash.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Subnet to sweep in CIDR form (e.g., 192.168.1.0/24)
    #[arg(short, long)]
    subnet: Option<Subnet>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single discovery scan, print the results and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("netdash v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }
    if let Some(subnet) = args.subnet {
        config.discovery.subnet = subnet.network();
        config.discovery.prefix_len = subnet.prefix_len();
    }

    info!(
        subnet = %config.subnet()?,
        timeout_ms = config.discovery.timeout_ms,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone()).await?;

    if args.scan_once {
        let scan = state.scanner.config();
        info!(
            subnet = %scan.subnet,
            interface = scan.interface.as_deref().unwrap_or("auto"),
            "Running single discovery scan"
        );
        let devices = state.scanner.scan().await?;
        println!("Discovered {} devices:", devices.len());
        for device in devices {
            println!("  - {:<15}  {}  {}", device.ip.to_string(), device.mac, device.vendor);
        }
    } else {
        server::run(state, &config.daemon.bind, config.daemon.tls.as_ref()).await?;
    }

    Ok(())
}
