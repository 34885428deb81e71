#![warn(missing_docs)]
//! Locate, select and drive a platform-appropriate Wi-Fi control backend.
//!
//! [`WifiDriverFactory`] probes the host for an available control tool, the
//! privilege it needs and the system language, then hands back a
//! [`WifiDriver`] exposing one operation set (enumerate interfaces, scan,
//! connect, disconnect, enable/disable, query state) whatever the
//! underlying OS tool is. Nothing here speaks 802.11 itself; the crate
//! orchestrates and parses the output of `netsh`, `nmcli`, `wpa_cli` and
//! `networksetup`.

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

pub mod command;
pub mod controller;
pub mod detect;
pub mod drivers;
pub mod error;
pub mod factory;
pub mod secret;

pub use controller::WifiInterfaceController;
pub use drivers::{
    BackendType, ConnectionState, ScanResult, ScanState, SystemLanguage, WifiDriver,
};
pub use error::Error;
pub use factory::WifiDriverFactory;
pub use secret::Secret;

/// Setup logging to stdout.
///
/// One-time contract: the first call installs the subscriber; any later
/// call is a no-op returning `Ok` so libraries and tests can both route
/// through here without fighting over the global default.
pub fn setup_tracing(filter: &str) -> Result<()> {
    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer = EnvFilter::try_new(filter).context("Initializing log filter")?;

    if tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        debug!("tracing subscriber already installed, keeping the existing one");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    /// Tests that touch process-global environment variables serialize on
    /// this lock.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());
}
