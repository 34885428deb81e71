//! wpa_supplicant driver for the English system language, over `wpa_cli`.
//!
//! The control socket is root-owned on most distributions, so this backend
//! always goes through the elevation flow and every command is piped
//! through `sudo -S`.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::command::{run_ok, CommandRunner};
use crate::drivers::{
    with_sudo, wpa_parse, BackendType, ConnectionState, ScanResult, ScanState, SystemLanguage,
    WifiDriver, CONNECT_ATTEMPTS, POLL_INTERVAL,
};
use crate::error::{Error, Result};
use crate::secret::Secret;

/// Escape a value for embedding in a wpa_supplicant quoted string.
fn quote_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `wpa_cli` driver.
pub struct EnglishWpaSupplicant {
    runner: Arc<dyn CommandRunner>,
    elevation: Option<Secret>,
}

impl EnglishWpaSupplicant {
    /// Create a driver over the given command runner and the validated
    /// elevation secret obtained during detection.
    pub fn with_elevation(runner: Arc<dyn CommandRunner>, elevation: Option<Secret>) -> Self {
        Self { runner, elevation }
    }

    fn cmd(&self, command: &str) -> String {
        with_sudo(self.elevation.as_ref(), command)
    }

    async fn wpa(&self, interface: &str, args: &str) -> Result<String> {
        let command = self.cmd(&format!(r#"wpa_cli -i "{interface}" {args}"#));
        Ok(run_ok(self.runner.as_ref(), &command).await?.stdout)
    }

    /// Run a wpa_cli command that must acknowledge with `OK`.
    async fn wpa_ok(&self, interface: &str, args: &str) -> Result<()> {
        let command = self.cmd(&format!(r#"wpa_cli -i "{interface}" {args}"#));
        let response = run_ok(self.runner.as_ref(), &command).await?;
        if response.stdout.lines().any(|l| l.trim() == "OK") {
            Ok(())
        } else {
            Err(Error::UnexpectedOutput {
                command,
                stdout: response.stdout,
            })
        }
    }

    /// Disconnect and drop any existing network entry for `ssid`.
    async fn clean(&self, interface: &str, ssid: &str) -> Result<()> {
        self.runner
            .run(&self.cmd(&format!(r#"wpa_cli -i "{interface}" disconnect"#)))
            .await?;
        let listing = self.wpa(interface, "list_networks").await?;
        if let Some(id) = wpa_parse::network_id(&listing, ssid) {
            self.runner
                .run(&self.cmd(&format!(r#"wpa_cli -i "{interface}" remove_network {id}"#)))
                .await?;
        }
        Ok(())
    }

    /// Register the network entry (the wpa equivalent of installing a
    /// profile document) and return its id.
    async fn install_network(&self, interface: &str, ssid: &str, password: &str) -> Result<String> {
        let added = self.wpa(interface, "add_network").await?;
        let id = wpa_parse::added_network_id(&added)?;
        self.wpa_ok(
            interface,
            &format!(r#"set_network {id} ssid '"{}"'"#, quote_value(ssid)),
        )
        .await?;
        self.wpa_ok(
            interface,
            &format!(r#"set_network {id} psk '"{}"'"#, quote_value(password)),
        )
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl WifiDriver for EnglishWpaSupplicant {
    fn backend_type(&self) -> BackendType {
        BackendType::LinuxWpaSupplicant
    }

    fn system_language(&self) -> SystemLanguage {
        SystemLanguage::English
    }

    async fn available_interfaces(&self) -> Result<HashSet<String>> {
        let response = run_ok(self.runner.as_ref(), &self.cmd("wpa_cli interface")).await?;
        Ok(wpa_parse::interfaces(&response.stdout))
    }

    async fn is_enabled(&self, interface: &str) -> Result<bool> {
        let status = self.wpa(interface, "status").await?;
        Ok(!status.contains("wpa_state=INTERFACE_DISABLED"))
    }

    async fn scan(&self, interface: &str, timeout: Duration) -> Result<Vec<ScanResult>> {
        self.wpa_ok(interface, "scan").await?;
        let poll = async {
            loop {
                sleep(POLL_INTERVAL).await;
                let listing = self.wpa(interface, "scan_results").await?;
                let results = wpa_parse::scan_results(&listing);
                if !results.is_empty() {
                    return Ok::<_, Error>(results);
                }
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(results) => results,
            Err(_) => {
                // Scan never settled; report the backend's current view.
                let listing = self.wpa(interface, "scan_results").await?;
                Ok(wpa_parse::scan_results(&listing))
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
        self.clean(interface, ssid).await?;
        let id = self.install_network(interface, ssid, password).await?;

        let target = (ConnectionState::Connected, ssid.to_string());
        for attempt in 1..=CONNECT_ATTEMPTS {
            self.wpa_ok(interface, &format!("select_network {id}")).await?;

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

    async fn disconnect(&self, interface: &str) -> Result<bool> {
        Ok(self.wpa_ok(interface, "disconnect").await.is_ok())
    }

    async fn connection_state(&self, interface: &str) -> Result<(ConnectionState, String)> {
        let status = self.wpa(interface, "status").await?;
        wpa_parse::connection_state(&status)
    }

    async fn scan_state(&self, interface: &str) -> Result<ScanState> {
        let status = self.wpa(interface, "status").await?;
        Ok(wpa_parse::scan_state(&status))
    }

    async fn enable(&self, interface: &str, enable: bool) -> Result<bool> {
        let arg = if enable { "up" } else { "down" };
        run_ok(
            self.runner.as_ref(),
            &self.cmd(&format!(r#"ifconfig "{interface}" {arg}"#)),
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

    fn driver(mock: MockCommandRunner) -> EnglishWpaSupplicant {
        EnglishWpaSupplicant::with_elevation(
            Arc::new(mock),
            Some(Secret::new("hunter2".into())),
        )
    }

    #[tokio::test]
    async fn connect_when_status_settles_on_target_ssid() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("disconnect"))
            .times(1)
            .returning(|_| ok("OK\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("list_networks"))
            .times(1)
            .returning(|_| ok("network id / ssid / bssid / flags\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("add_network"))
            .times(1)
            .returning(|_| ok("0\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("set_network"))
            .times(2)
            .returning(|_| ok("OK\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("select_network"))
            .times(1)
            .returning(|_| ok("OK\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("status"))
            .returning(|_| ok("ssid=FunHouse\nwpa_state=COMPLETED\n"));

        let connected = driver(mock)
            .connect("wlan0", "FunHouse", "hunter2", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(connected);
    }

    #[tokio::test]
    async fn hard_fail_when_select_network_is_rejected() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("disconnect"))
            .times(1)
            .returning(|_| ok("OK\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("list_networks"))
            .times(1)
            .returning(|_| ok(""));
        mock.expect_run()
            .withf(|c: &str| c.contains("add_network"))
            .times(1)
            .returning(|_| ok("0\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("set_network"))
            .times(2)
            .returning(|_| ok("OK\n"));
        mock.expect_run()
            .withf(|c: &str| c.contains("select_network"))
            .times(1)
            .returning(|_| ok("FAIL\n"));

        let err = driver(mock)
            .connect("wlan0", "FunHouse", "hunter2", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedOutput { .. }));
    }

    #[tokio::test]
    async fn run_every_command_under_sudo() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.starts_with("echo 'hunter2' | sudo -S wpa_cli interface"))
            .times(1)
            .returning(|_| ok("Available interfaces:\nwlan0\n"));

        let interfaces = driver(mock).available_interfaces().await.unwrap();
        assert_eq!(interfaces, HashSet::from(["wlan0".to_string()]));
    }
}
