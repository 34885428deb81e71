//! Legacy NetworkManager (nmcli < 0.9.9.0) driver for the English system
//! language.
//!
//! The legacy CLI spells things differently: `iface` instead of `ifname`,
//! `nmcli nm wifi on|off` for the radio switch, and the active connection
//! name only appears in `con status` rather than on the device row.

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

/// Legacy nmcli driver.
pub struct EnglishNmcliLegacy {
    runner: Arc<dyn CommandRunner>,
    elevation: Option<Secret>,
}

impl EnglishNmcliLegacy {
    /// Create a driver over the given command runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            elevation: None,
        }
    }

    /// Create a driver whose commands run under sudo with the validated
    /// elevation secret.
    pub fn with_elevation(runner: Arc<dyn CommandRunner>, elevation: Option<Secret>) -> Self {
        Self { runner, elevation }
    }

    fn cmd(&self, command: &str) -> String {
        with_sudo(self.elevation.as_ref(), command)
    }
}

#[async_trait]
impl WifiDriver for EnglishNmcliLegacy {
    fn backend_type(&self) -> BackendType {
        BackendType::LinuxNmcliLegacy
    }

    fn system_language(&self) -> SystemLanguage {
        SystemLanguage::English
    }

    async fn available_interfaces(&self) -> Result<HashSet<String>> {
        let response = run_ok(
            self.runner.as_ref(),
            &self.cmd("nmcli -t -f DEVICE,TYPE dev"),
        )
        .await?;
        Ok(nmcli_parse::wifi_devices(&response.stdout))
    }

    async fn is_enabled(&self, _interface: &str) -> Result<bool> {
        let response = run_ok(self.runner.as_ref(), &self.cmd("nmcli nm wifi")).await?;
        Ok(response.stdout.contains("enabled"))
    }

    async fn scan(&self, interface: &str, timeout: Duration) -> Result<Vec<ScanResult>> {
        let list = self.cmd(&format!(
            r#"nmcli -t -f SSID,SIGNAL dev wifi list iface "{interface}""#
        ));
        match tokio::time::timeout(timeout, run_ok(self.runner.as_ref(), &list)).await {
            Ok(response) => Ok(nmcli_parse::scan_results(&response?.stdout)),
            Err(_) => {
                debug!("legacy nmcli scan exceeded {:?}", timeout);
                Ok(Vec::new())
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
        self.runner
            .run(&self.cmd(&format!(r#"nmcli con delete id "{ssid}""#)))
            .await?;

        let command = self.cmd(&format!(
            r#"nmcli dev wifi connect "{ssid}" password "{password}" iface "{interface}""#
        ));
        for attempt in 1..=CONNECT_ATTEMPTS {
            match tokio::time::timeout(timeout, run_ok(self.runner.as_ref(), &command)).await {
                Ok(response) => {
                    // Legacy nmcli prints nothing on success; a message
                    // about the connection means the request was rejected.
                    let response = response?;
                    if response.stdout.trim().is_empty()
                        || response.stdout.contains("successfully activated")
                    {
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
        // Legacy nmcli reports failure through the exit code alone.
        run_ok(
            self.runner.as_ref(),
            &self.cmd(&format!(r#"nmcli dev disconnect iface "{interface}""#)),
        )
        .await?;
        Ok(true)
    }

    async fn connection_state(&self, interface: &str) -> Result<(ConnectionState, String)> {
        let response = run_ok(
            self.runner.as_ref(),
            &self.cmd("nmcli -t -f DEVICE,STATE dev"),
        )
        .await?;
        let state = nmcli_parse::legacy_device_state(&response.stdout, interface)?;
        if state == ConnectionState::Disconnected {
            return Ok((state, String::new()));
        }
        let status = run_ok(
            self.runner.as_ref(),
            &self.cmd("nmcli -t -f NAME,DEVICES con status"),
        )
        .await?;
        match nmcli_parse::active_connection_name(&status.stdout, interface) {
            Some(ssid) => Ok((state, ssid)),
            // An activating connection may not be registered in `con status`
            // yet; a connected one must be.
            None if state == ConnectionState::Connecting => Ok((state, String::new())),
            None => Err(Error::MalformedOutput(format!(
                "no active connection listed for interface '{interface}'"
            ))),
        }
    }

    async fn scan_state(&self, interface: &str) -> Result<ScanState> {
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
        run_ok(self.runner.as_ref(), &self.cmd(&format!("nmcli nm wifi {arg}"))).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::command::{CmdOutput, MockCommandRunner};

    fn ok(stdout: &str) -> Result<CmdOutput> {
        Ok(CmdOutput {
            status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    #[tokio::test]
    async fn compose_state_and_ssid_from_two_commands() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("-f DEVICE,STATE"))
            .times(1)
            .returning(|_| ok("wlan0:connected\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("con status"))
            .times(1)
            .returning(|_| ok("HomeWifi:wlan0\n"));

        let driver = EnglishNmcliLegacy::new(Arc::new(mock));
        let (state, ssid) = driver.connection_state("wlan0").await.unwrap();
        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(ssid, "HomeWifi");
    }

    #[tokio::test]
    async fn skip_connection_lookup_when_disconnected() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("-f DEVICE,STATE"))
            .times(1)
            .returning(|_| ok("wlan0:disconnected\n"));

        let driver = EnglishNmcliLegacy::new(Arc::new(mock));
        let (state, ssid) = driver.connection_state("wlan0").await.unwrap();
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(ssid, "");
    }

    #[tokio::test]
    async fn use_legacy_radio_spelling() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c == "nmcli nm wifi on")
            .times(1)
            .returning(|_| ok(""));

        let driver = EnglishNmcliLegacy::new(Arc::new(mock));
        assert!(driver.enable("wlan0", true).await.unwrap());
    }
}
