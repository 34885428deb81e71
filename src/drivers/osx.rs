//! macOS driver for the English system language, over `networksetup` and
//! the `airport` private framework binary.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::command::{run_ok, CommandRunner};
use crate::drivers::{
    osx_parse, BackendType, ConnectionState, ScanResult, ScanState, SystemLanguage, WifiDriver,
    CONNECT_ATTEMPTS, POLL_INTERVAL,
};
use crate::error::{Error, Result};

/// The airport binary has no PATH entry; Apple ships it inside the
/// Apple80211 framework.
const AIRPORT: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/A/Resources/airport";

/// `networksetup` / `airport` driver.
pub struct EnglishMacOs {
    runner: Arc<dyn CommandRunner>,
}

impl EnglishMacOs {
    /// Create a driver over the given command runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl WifiDriver for EnglishMacOs {
    fn backend_type(&self) -> BackendType {
        BackendType::MacOs
    }

    fn system_language(&self) -> SystemLanguage {
        SystemLanguage::English
    }

    async fn available_interfaces(&self) -> Result<HashSet<String>> {
        let response = run_ok(
            self.runner.as_ref(),
            "networksetup -listallhardwareports",
        )
        .await?;
        Ok(osx_parse::wifi_devices(&response.stdout))
    }

    async fn is_enabled(&self, interface: &str) -> Result<bool> {
        let response = run_ok(
            self.runner.as_ref(),
            &format!(r#"networksetup -getairportpower "{interface}""#),
        )
        .await?;
        Ok(response.stdout.contains("On"))
    }

    async fn scan(&self, _interface: &str, timeout: Duration) -> Result<Vec<ScanResult>> {
        let command = format!("{AIRPORT} -s");
        match tokio::time::timeout(timeout, run_ok(self.runner.as_ref(), &command)).await {
            Ok(response) => Ok(osx_parse::scan_results(&response?.stdout)),
            Err(_) => {
                debug!("airport scan exceeded {:?}", timeout);
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
        // Drop the remembered network so the attempt starts clean; a network
        // that was never remembered is not an error.
        self.runner
            .run(&format!(
                r#"networksetup -removepreferredwirelessnetwork "{interface}" "{ssid}""#
            ))
            .await?;

        let target = (ConnectionState::Connected, ssid.to_string());
        for attempt in 1..=CONNECT_ATTEMPTS {
            let command = format!(
                r#"networksetup -setairportnetwork "{interface}" "{ssid}" "{password}""#
            );
            let response = run_ok(self.runner.as_ref(), &command).await?;
            // networksetup reports join failures on stdout with exit 0.
            if response.stdout.contains("Failed to join") || response.stdout.contains("Error") {
                return Err(Error::UnexpectedOutput {
                    command,
                    stdout: response.stdout,
                });
            }

            let poll = async {
                while self.connection_state(interface).await? != target {
                    sleep(POLL_INTERVAL).await;
                }
                Ok::<(), Error>(())
            };
            match tokio::time::timeout(timeout, poll).await {
                Ok(polled) => {
                    polled?;
                    debug!("Connected to {} on attempt {}", ssid, attempt);
                    return Ok(true);
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

    async fn disconnect(&self, _interface: &str) -> Result<bool> {
        run_ok(self.runner.as_ref(), &format!("{AIRPORT} -z")).await?;
        Ok(true)
    }

    async fn connection_state(&self, _interface: &str) -> Result<(ConnectionState, String)> {
        let response = run_ok(self.runner.as_ref(), &format!("{AIRPORT} -I")).await?;
        osx_parse::connection_info(&response.stdout)
    }

    async fn scan_state(&self, _interface: &str) -> Result<ScanState> {
        let response = run_ok(self.runner.as_ref(), &format!("{AIRPORT} -I")).await?;
        Ok(osx_parse::scan_state(&response.stdout))
    }

    async fn enable(&self, interface: &str, enable: bool) -> Result<bool> {
        let arg = if enable { "on" } else { "off" };
        run_ok(
            self.runner.as_ref(),
            &format!(r#"networksetup -setairportpower "{interface}" {arg}"#),
        )
        .await?;
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
    async fn report_adapter_power_state() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("-getairportpower"))
            .times(1)
            .returning(|_| ok("Wi-Fi Power (en0): On\n"));

        let driver = EnglishMacOs::new(Arc::new(mock));
        assert!(driver.is_enabled("en0").await.unwrap());
    }

    #[tokio::test]
    async fn hard_fail_when_join_is_rejected() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("-removepreferredwirelessnetwork"))
            .times(1)
            .returning(|_| ok(""));
        mock.expect_run()
            .withf(|c: &str| c.contains("-setairportnetwork"))
            .times(1)
            .returning(|_| ok("Failed to join network FunHouse.\n"));

        let driver = EnglishMacOs::new(Arc::new(mock));
        let err = driver
            .connect("en0", "FunHouse", "hunter2", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedOutput { .. }));
    }
}
