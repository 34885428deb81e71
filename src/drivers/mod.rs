//! The uniform Wi-Fi driver interface and its per-backend implementations.
//!
//! One implementation exists per (system language, backend type) pair; each
//! composes a [`CommandRunner`](crate::command::CommandRunner) with pure
//! output parsers. Drivers hold no shared mutable state and are not safe for
//! concurrent use against the same interface; callers serialize per
//! interface.

mod nmcli;
mod nmcli_legacy;
mod nmcli_parse;
mod osx;
mod osx_parse;
mod windows;
mod windows_parse;
mod wpa;
mod wpa_parse;

pub use nmcli::EnglishNmcli;
pub use nmcli_legacy::EnglishNmcliLegacy;
pub use osx::EnglishMacOs;
pub use windows::EnglishWindows;
pub use wpa::EnglishWpaSupplicant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::Result;
use crate::secret::Secret;

/// The OS tool family a driver wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// NetworkManager CLI, version 0.9.9.0 or newer.
    LinuxNmcliModern,
    /// NetworkManager CLI older than 0.9.9.0.
    LinuxNmcliLegacy,
    /// wpa_supplicant control interface (`wpa_cli`).
    LinuxWpaSupplicant,
    /// macOS `networksetup` / `airport`.
    MacOs,
    /// Windows `netsh wlan`.
    Windows,
}

/// The locale dialect a driver's text parsers expect from its backend.
///
/// Unsupported locales are a first-class failure during detection, never a
/// silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SystemLanguage {
    /// English command output (en_US).
    English,
}

/// An interface's current connection state.
///
/// Always paired with an SSID string when queried; the SSID may be empty
/// only when `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not associated with any network.
    Disconnected,
    /// Association or authentication in progress.
    Connecting,
    /// Associated and authenticated.
    Connected,
}

/// An interface's current scanning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    /// No scan in progress.
    Idle,
    /// The backend reports a scan in progress.
    Scanning,
}

/// One reported SSID with its signal measurement from a single scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Network name as reported by the backend.
    pub ssid: String,
    /// Signal measurement; unit is backend-specific (dBm or percent).
    /// Backends that do not report one use 0.
    pub signal: i32,
}

/// Bounded number of connect attempts per [`WifiDriver::connect`] call.
pub(crate) const CONNECT_ATTEMPTS: u32 = 5;

/// Interval between connection-state polls inside a connect attempt.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Prefix `command` so it runs under sudo, piping the validated secret to
/// `sudo -S`. Without a secret the command is returned untouched.
pub(crate) fn with_sudo(elevation: Option<&Secret>, command: &str) -> String {
    match elevation {
        Some(secret) => format!("echo '{}' | sudo -S {}", secret.expose(), command),
        None => command.to_string(),
    }
}

/// Uniform operation set over one Wi-Fi backend.
///
/// All operations propagate [`Error::Command`](crate::error::Error::Command)
/// unchanged when the underlying tool fails; no local recovery happens at
/// this layer.
#[async_trait]
pub trait WifiDriver: Send + Sync {
    /// The backend tool family this driver wraps.
    fn backend_type(&self) -> BackendType;

    /// The system language this driver's parsers expect.
    fn system_language(&self) -> SystemLanguage;

    /// All currently available Wi-Fi interfaces, recomputed on every call.
    async fn available_interfaces(&self) -> Result<HashSet<String>>;

    /// Is the Wi-Fi adapter behind `interface` currently enabled?
    async fn is_enabled(&self, interface: &str) -> Result<bool>;

    /// Scan for SSIDs on `interface`, blocking up to `timeout`.
    ///
    /// Returns whatever the backend reported, even if scanning had not
    /// fully settled. Duplicate SSIDs are not deduplicated.
    async fn scan(&self, interface: &str, timeout: Duration) -> Result<Vec<ScanResult>>;

    /// Connect `interface` to `ssid`, retrying up to 5 attempts with
    /// `timeout` enforced per attempt. Returns `false` when every attempt
    /// timed out; a rejected connect request is an error instead.
    async fn connect(
        &self,
        interface: &str,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool>;

    /// Disconnect `interface` from its current network.
    async fn disconnect(&self, interface: &str) -> Result<bool>;

    /// Current `(state, ssid)` of `interface`. The SSID is empty only when
    /// disconnected.
    async fn connection_state(&self, interface: &str) -> Result<(ConnectionState, String)>;

    /// Current scan state of `interface`.
    async fn scan_state(&self, interface: &str) -> Result<ScanState>;

    /// Enable or disable `interface`.
    async fn enable(&self, interface: &str, enable: bool) -> Result<bool>;
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn leave_command_untouched_without_elevation() {
        assert_eq!(with_sudo(None, "nmcli radio wifi"), "nmcli radio wifi");
    }

    #[test]
    fn pipe_secret_to_sudo_when_elevated() {
        let secret = Secret::new("hunter2".into());
        assert_eq!(
            with_sudo(Some(&secret), "wpa_cli -i wlan0 status"),
            "echo 'hunter2' | sudo -S wpa_cli -i wlan0 status"
        );
    }
}
