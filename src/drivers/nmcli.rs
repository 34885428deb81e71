//! Modern NetworkManager (nmcli ≥ 0.9.9.0) driver for the English system
//! language.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::command::{run_ok, CommandRunner};
use crate::drivers::{
    nmcli_parse, with_sudo, BackendType, ConnectionState, ScanResult, ScanState, SystemLanguage,
    WifiDriver, CONNECT_ATTEMPTS,
};
use crate::error::{Error, Result};
use crate::secret::Secret;

/// Modern nmcli driver (`ifname`, `nmcli radio wifi`, terse listings).
pub struct EnglishNmcli {
    runner: Arc<dyn CommandRunner>,
    elevation: Option<Secret>,
}

impl EnglishNmcli {
    /// Create a driver over the given command runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            elevation: None,
        }
    }

    /// Create a driver whose commands run under sudo with the validated
    /// elevation secret (detection found the permission set insufficient).
    pub fn with_elevation(runner: Arc<dyn CommandRunner>, elevation: Option<Secret>) -> Self {
        Self { runner, elevation }
    }

    fn cmd(&self, command: &str) -> String {
        with_sudo(self.elevation.as_ref(), command)
    }
}

#[async_trait]
impl WifiDriver for EnglishNmcli {
    fn backend_type(&self) -> BackendType {
        BackendType::LinuxNmcliModern
    }

    fn system_language(&self) -> SystemLanguage {
        SystemLanguage::English
    }

    async fn available_interfaces(&self) -> Result<HashSet<String>> {
        let response = run_ok(
            self.runner.as_ref(),
            &self.cmd("nmcli -t -f DEVICE,TYPE device"),
        )
        .await?;
        Ok(nmcli_parse::wifi_devices(&response.stdout))
    }

    async fn is_enabled(&self, _interface: &str) -> Result<bool> {
        let response = run_ok(self.runner.as_ref(), &self.cmd("nmcli radio wifi")).await?;
        Ok(response.stdout.contains("enabled"))
    }

    async fn scan(&self, interface: &str, timeout: Duration) -> Result<Vec<ScanResult>> {
        let rescan = self.cmd(&format!(
            r#"nmcli -t -f SSID,SIGNAL device wifi list ifname "{interface}" --rescan yes"#
        ));
        match tokio::time::timeout(timeout, run_ok(self.runner.as_ref(), &rescan)).await {
            Ok(response) => Ok(nmcli_parse::scan_results(&response?.stdout)),
            Err(_) => {
                // Scan did not settle in time; return whatever the backend
                // currently reports.
                debug!("nmcli rescan exceeded {:?}, returning cached view", timeout);
                let cached = self.cmd(&format!(
                    r#"nmcli -t -f SSID,SIGNAL device wifi list ifname "{interface}" --rescan no"#
                ));
                let response = run_ok(self.runner.as_ref(), &cached).await?;
                Ok(nmcli_parse::scan_results(&response.stdout))
            }
        }
    }

    async fn connect(
        &self,
        interface: &str,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool> {
        info!("Attempting to establish Wifi connection to {}...", ssid);
        // Start fresh each time; a missing profile is not an error.
        self.runner
            .run(&self.cmd(&format!(r#"nmcli connection delete id "{ssid}""#)))
            .await?;

        let command = self.cmd(&format!(
            r#"nmcli device wifi connect "{ssid}" password "{password}" ifname "{interface}""#
        ));
        for attempt in 1..=CONNECT_ATTEMPTS {
            // The connect command itself blocks until activation finishes,
            // so the per-attempt timeout races the command; the abandoned
            // child is killed on drop.
            match tokio::time::timeout(timeout, run_ok(self.runner.as_ref(), &command)).await {
                Ok(response) => {
                    let response = response?;
                    if response.stdout.contains("successfully activated") {
                        debug!("Connected to {} on attempt {}", ssid, attempt);
                        return Ok(true);
                    }
                    return Err(Error::UnexpectedOutput {
                        command: command.clone(),
                        stdout: response.stdout,
                    });
                }
                Err(_) => {
                    debug!(
                        "Connect attempt {}/{} timed out after {:?}",
                        attempt, CONNECT_ATTEMPTS, timeout
                    );
                }
            }
        }
        Ok(false)
    }

    async fn disconnect(&self, interface: &str) -> Result<bool> {
        let response = run_ok(
            self.runner.as_ref(),
            &self.cmd(&format!(r#"nmcli device disconnect "{interface}""#)),
        )
        .await?;
        Ok(response.stdout.contains("successfully disconnected"))
    }

    async fn connection_state(&self, interface: &str) -> Result<(ConnectionState, String)> {
        let response = run_ok(
            self.runner.as_ref(),
            &self.cmd("nmcli -t -f DEVICE,STATE,CONNECTION device"),
        )
        .await?;
        nmcli_parse::device_state(&response.stdout, interface)
    }

    async fn scan_state(&self, interface: &str) -> Result<ScanState> {
        // nmcli never reports a scanning phase; confirm the interface exists
        // and report idle.
        let interfaces = self.available_interfaces().await?;
        if !interfaces.contains(interface) {
            return Err(Error::MalformedOutput(format!(
                "interface '{interface}' not present in nmcli device output"
            )));
        }
        Ok(ScanState::Idle)
    }

    async fn enable(&self, _interface: &str, enable: bool) -> Result<bool> {
        let arg = if enable { "on" } else { "off" };
        run_ok(
            self.runner.as_ref(),
            &self.cmd(&format!("nmcli radio wifi {arg}")),
        )
        .await?;
        Ok(true)
    }
}
