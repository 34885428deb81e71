//! A controller binding a driver to one interface.
//!
//! A driver can manage all of its interfaces; a controller drives exactly
//! one, serially, and drops the interface parameter from every operation.

use std::time::Duration;

use crate::drivers::{ConnectionState, ScanResult, ScanState, WifiDriver};
use crate::error::Result;

/// One Wi-Fi interface, driven through the backend driver that discovered
/// it.
pub struct WifiInterfaceController {
    driver: Box<dyn WifiDriver>,
    interface: String,
}

impl WifiInterfaceController {
    /// Bind `driver` to `interface`.
    pub fn new(driver: Box<dyn WifiDriver>, interface: String) -> Self {
        Self { driver, interface }
    }

    /// The OS-level name of the controlled interface.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Is the adapter currently enabled?
    pub async fn is_enabled(&self) -> Result<bool> {
        self.driver.is_enabled(&self.interface).await
    }

    /// Scan for SSIDs, blocking up to `timeout`.
    pub async fn scan(&self, timeout: Duration) -> Result<Vec<ScanResult>> {
        self.driver.scan(&self.interface, timeout).await
    }

    /// Connect to `ssid`, with `timeout` enforced per attempt.
    pub async fn connect(&self, ssid: &str, password: &str, timeout: Duration) -> Result<bool> {
        self.driver
            .connect(&self.interface, ssid, password, timeout)
            .await
    }

    /// Disconnect from the current network.
    pub async fn disconnect(&self) -> Result<bool> {
        self.driver.disconnect(&self.interface).await
    }

    /// Current `(state, ssid)` of the interface.
    pub async fn connection_state(&self) -> Result<(ConnectionState, String)> {
        self.driver.connection_state(&self.interface).await
    }

    /// Current scan state of the interface.
    pub async fn scan_state(&self) -> Result<ScanState> {
        self.driver.scan_state(&self.interface).await
    }

    /// Enable or disable the interface.
    pub async fn enable(&self, enable: bool) -> Result<bool> {
        self.driver.enable(&self.interface, enable).await
    }
}
