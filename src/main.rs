//! Thin demo entrypoint: detect a driver, enumerate interfaces, scan, and
//! optionally connect. Detection and command failures surface as distinct,
//! legible errors through the error chain.

use anyhow::{Context, Result};
use std::time::Duration;
use structopt::StructOpt;
use tracing::info;

use wifictl::{setup_tracing, Secret, WifiDriverFactory};

#[derive(StructOpt, Debug)]
#[structopt(name = "wifictl", about = "Drive the platform Wi-Fi control tool")]
struct Args {
    /// Tracing filter (e.g. "debug" or "wifictl=debug")
    #[structopt(long, default_value = "info")]
    log: String,

    /// Seconds to wait for a scan, and per connect attempt
    #[structopt(long, default_value = "10")]
    timeout: u64,

    /// Sudo password for backends that need elevation (prompted when
    /// omitted and needed)
    #[structopt(long)]
    sudo_password: Option<Secret>,

    /// SSID to connect to after scanning
    #[structopt(long)]
    connect: Option<String>,

    /// Password for --connect
    #[structopt(long, default_value = "")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::from_args();
    setup_tracing(&args.log)?;
    let timeout = Duration::from_secs(args.timeout);

    let mut factory = WifiDriverFactory::new();
    if let Some(secret) = args.sudo_password.clone() {
        factory = factory.with_sudo_password(secret);
    }

    let wifi = factory
        .first_interface_controller()
        .await
        .context("Detecting a usable Wi-Fi backend")?;
    info!("Using interface {}", wifi.interface());

    if !wifi.is_enabled().await.context("Querying adapter state")? {
        info!("Adapter is disabled; enabling it");
        wifi.enable(true).await.context("Enabling the adapter")?;
    }

    let results = wifi.scan(timeout).await.context("Scanning for networks")?;
    for result in &results {
        println!("{:>4}  {}", result.signal, result.ssid);
    }

    if let Some(ssid) = args.connect {
        if wifi
            .connect(&ssid, &args.password, timeout)
            .await
            .with_context(|| format!("Connecting to {ssid}"))?
        {
            let (state, connected_ssid) = wifi.connection_state().await?;
            info!("Connected to {} ({:?})", connected_ssid, state);
        } else {
            anyhow::bail!("every connect attempt to {ssid} timed out");
        }
    }
    Ok(())
}
