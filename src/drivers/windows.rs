//! Windows driver for the English system language, over `netsh wlan`.
//!
//! This is the reference text-parsing backend: it carries the full
//! connection-establishment protocol (profile install, bounded attempts,
//! poll-vs-timeout race) that the other backends reproduce in their own
//! command dialects.

use async_trait::async_trait;
use quick_xml::escape::escape;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::command::{run_ok, CommandRunner};
use crate::drivers::{
    windows_parse, BackendType, ConnectionState, ScanResult, ScanState, SystemLanguage,
    WifiDriver, CONNECT_ATTEMPTS, POLL_INTERVAL,
};
use crate::error::{Error, Result};

/// Network-profile document installed before each connect attempt.
const PROFILE_TEMPLATE: &str = r#"<?xml version="1.0"?>
<WLANProfile xmlns="http://www.microsoft.com/networking/WLAN/profile/v1">
    <name>{ssid}</name>
    <SSIDConfig>
        <SSID>
            <name>{ssid}</name>
        </SSID>
    </SSIDConfig>
    <connectionType>ESS</connectionType>
    <connectionMode>manual</connectionMode>
    <MSM>
        <security>
            <authEncryption>
                <authentication>{auth}</authentication>
                <encryption>{encrypt}</encryption>
                <useOneX>false</useOneX>
            </authEncryption>
            <sharedKey>
                <keyType>passPhrase</keyType>
                <protected>false</protected>
                <keyMaterial>{passwd}</keyMaterial>
            </sharedKey>
        </security>
    </MSM>
    <MacRandomization xmlns="http://www.microsoft.com/networking/WLAN/profile/v3">
        <enableRandomization>false</enableRandomization>
    </MacRandomization>
</WLANProfile>"#;

/// `netsh wlan` driver for English command output.
pub struct EnglishWindows {
    runner: Arc<dyn CommandRunner>,
}

impl EnglishWindows {
    /// Create a driver over the given command runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Render the WPA2-PSK profile document. `ssid` and `passwd` must
    /// already be escaped for markup.
    fn render_profile(ssid: &str, passwd: &str) -> String {
        PROFILE_TEMPLATE
            .replace("{ssid}", ssid)
            .replace("{auth}", "WPA2PSK")
            .replace("{encrypt}", "AES")
            .replace("{passwd}", passwd)
    }

    /// Disconnect and delete any pre-existing profile for `ssid` so a
    /// connect attempt starts from a clean slate. "Not found" outcomes are
    /// ignored.
    async fn clean(&self, ssid: &str) -> Result<()> {
        run_ok(self.runner.as_ref(), "netsh wlan disconnect").await?;
        self.runner
            .run(&format!(r#"netsh wlan delete profile name="{ssid}""#))
            .await?;
        Ok(())
    }

    /// Write the rendered profile to a transient file and install it.
    async fn install_profile(&self, ssid: &str, password: &str) -> Result<()> {
        let profile = Self::render_profile(&escape(ssid), &escape(password));
        let tmp = mktemp::Temp::new_file().map_err(|e| Error::Command {
            command: "mktemp".to_string(),
            message: format!("failed to create transient profile file: {e}"),
        })?;
        let path = tmp.to_path_buf();
        tokio::fs::write(&path, profile.as_bytes())
            .await
            .map_err(|e| Error::Command {
                command: format!("write {}", path.display()),
                message: e.to_string(),
            })?;

        let command = format!(r#"netsh wlan add profile filename="{}""#, path.display());
        let response = run_ok(self.runner.as_ref(), &command).await?;
        if !response.stdout.contains("is added on interface") {
            return Err(Error::UnexpectedOutput {
                command,
                stdout: response.stdout,
            });
        }
        // Dropping the guard removes the profile document.
        drop(tmp);
        Ok(())
    }
}

#[async_trait]
impl WifiDriver for EnglishWindows {
    fn backend_type(&self) -> BackendType {
        BackendType::Windows
    }

    fn system_language(&self) -> SystemLanguage {
        SystemLanguage::English
    }

    async fn available_interfaces(&self) -> Result<HashSet<String>> {
        let response = run_ok(self.runner.as_ref(), "netsh wlan show interfaces").await?;
        Ok(windows_parse::interface_names(&response.stdout))
    }

    async fn is_enabled(&self, _interface: &str) -> Result<bool> {
        let response = run_ok(self.runner.as_ref(), "netsh wlan show interfaces").await?;
        Ok(!response
            .stdout
            .to_lowercase()
            .contains("no wireless interface"))
    }

    async fn scan(&self, _interface: &str, _timeout: Duration) -> Result<Vec<ScanResult>> {
        // netsh reports its current scan view immediately.
        let response = run_ok(self.runner.as_ref(), "netsh wlan show networks").await?;
        Ok(windows_parse::scan_ssids(&response.stdout))
    }

    async fn connect(
        &self,
        interface: &str,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<bool> {
        info!("Attempting to establish Wifi connection to {}...", ssid);
        self.clean(ssid).await?;
        self.install_profile(ssid, password).await?;

        let target = (ConnectionState::Connected, ssid.to_string());
        for attempt in 1..=CONNECT_ATTEMPTS {
            let command = format!(
                r#"netsh wlan connect ssid="{ssid}" name="{ssid}" interface="{interface}""#
            );
            let response = run_ok(self.runner.as_ref(), &command).await?;
            if !response.stdout.contains("was completed successfully") {
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
            // Ok here means the poll future itself completed; Err(Elapsed)
            // means the timer won and the poll was cancelled by drop. The
            // winner is never inferred from a result set.
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
        let response = run_ok(
            self.runner.as_ref(),
            &format!(r#"netsh wlan disconnect interface="{interface}""#),
        )
        .await?;
        Ok(response
            .stdout
            .to_lowercase()
            .contains("completed successfully"))
    }

    async fn connection_state(&self, interface: &str) -> Result<(ConnectionState, String)> {
        let response = run_ok(self.runner.as_ref(), "netsh wlan show interfaces").await?;
        windows_parse::connection_state(&response.stdout, interface)
    }

    async fn scan_state(&self, interface: &str) -> Result<ScanState> {
        // netsh never reports a scanning phase; confirm the interface exists
        // and report idle.
        let response = run_ok(self.runner.as_ref(), "netsh wlan show interfaces").await?;
        if !windows_parse::interface_names(&response.stdout).contains(interface) {
            return Err(Error::MalformedOutput(format!(
                "interface '{interface}' not present in netsh output"
            )));
        }
        Ok(ScanState::Idle)
    }

    async fn enable(&self, interface: &str, enable: bool) -> Result<bool> {
        let arg = if enable { "enable" } else { "disable" };
        let response = run_ok(
            self.runner.as_ref(),
            &format!(r#"netsh interface set interface "{interface}" "{arg}""#),
        )
        .await?;
        Ok(!response.stdout.contains("not exist"))
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::command::{CmdOutput, MockCommandRunner};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ok(stdout: &str) -> Result<CmdOutput> {
        Ok(CmdOutput {
            status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    const CONNECTING: &str = "\
    Name                   : Wi-Fi
    State                  : authenticating
    SSID                   : FunHouse
";

    const CONNECTED: &str = "\
    Name                   : Wi-Fi
    State                  : connected
    SSID                   : FunHouse
";

    /// Mock the clean + install phase so connect reaches the attempt loop.
    fn expect_clean_and_install(mock: &mut MockCommandRunner) {
        mock.expect_run()
            .withf(|c: &str| c == "netsh wlan disconnect")
            .times(1)
            .returning(|_| ok("Disconnection request was completed successfully."));
        mock.expect_run()
            .withf(|c: &str| c.contains("delete profile"))
            .times(1)
            .returning(|_| ok(r#"Profile "FunHouse" is deleted from interface "Wi-Fi"."#));
        mock.expect_run()
            .withf(|c: &str| c.contains("add profile"))
            .times(1)
            .returning(|_| ok("Profile FunHouse is added on interface Wi-Fi."));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaust_all_attempts_when_poll_never_wins_the_race() {
        let mut mock = MockCommandRunner::new();
        expect_clean_and_install(&mut mock);
        // Each attempt's poller would see "connected" on its third tick, but
        // the per-attempt timeout fires after two. A cancelled attempt must
        // not carry its progress into the next one, so all 5 attempts lose.
        let polls = std::sync::Arc::new(AtomicU32::new(0));
        let polls_reset = polls.clone();
        mock.expect_run()
            .withf(|c: &str| c.contains("wlan connect"))
            .times(5)
            .returning(move |_| {
                polls_reset.store(0, Ordering::SeqCst);
                ok("Connection request was completed successfully.")
            });
        mock.expect_run()
            .withf(|c: &str| c.contains("show interfaces"))
            .returning(move |_| {
                if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                    ok(CONNECTING)
                } else {
                    ok(CONNECTED)
                }
            });

        let driver = EnglishWindows::new(Arc::new(mock));
        let connected = driver
            .connect("Wi-Fi", "FunHouse", "hunter2", Duration::from_millis(1500))
            .await
            .unwrap();
        assert!(!connected);
    }

    #[tokio::test(start_paused = true)]
    async fn return_true_on_first_attempt_when_poll_wins_the_race() {
        let mut mock = MockCommandRunner::new();
        expect_clean_and_install(&mut mock);
        mock.expect_run()
            .withf(|c: &str| c.contains("wlan connect"))
            .times(1)
            .returning(|_| ok("Connection request was completed successfully."));
        let polls = AtomicU32::new(0);
        mock.expect_run()
            .withf(|c: &str| c.contains("show interfaces"))
            .returning(move |_| {
                // Two poll ticks of "connecting" before the state settles.
                if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                    ok(CONNECTING)
                } else {
                    ok(CONNECTED)
                }
            });

        let driver = EnglishWindows::new(Arc::new(mock));
        let connected = driver
            .connect("Wi-Fi", "FunHouse", "hunter2", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(connected);
    }

    #[tokio::test]
    async fn hard_fail_when_connect_request_is_rejected() {
        let mut mock = MockCommandRunner::new();
        expect_clean_and_install(&mut mock);
        mock.expect_run()
            .withf(|c: &str| c.contains("wlan connect"))
            .times(1)
            .returning(|_| ok("The network specified by profile is not available."));

        let driver = EnglishWindows::new(Arc::new(mock));
        let err = driver
            .connect("Wi-Fi", "FunHouse", "hunter2", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedOutput { .. }));
    }

    #[tokio::test]
    async fn hard_fail_when_profile_install_is_not_confirmed() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c == "netsh wlan disconnect")
            .times(1)
            .returning(|_| ok(""));
        mock.expect_run()
            .withf(|c: &str| c.contains("delete profile"))
            .times(1)
            .returning(|_| ok(""));
        mock.expect_run()
            .withf(|c: &str| c.contains("add profile"))
            .times(1)
            .returning(|_| ok("The profile is corrupted."));

        let driver = EnglishWindows::new(Arc::new(mock));
        let err = driver
            .connect("Wi-Fi", "FunHouse", "hunter2", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedOutput { .. }));
    }

    #[tokio::test]
    async fn report_same_result_when_enable_is_called_twice() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("set interface"))
            .times(2)
            .returning(|_| ok(""));

        let driver = EnglishWindows::new(Arc::new(mock));
        let first = driver.enable("Wi-Fi", true).await.unwrap();
        let second = driver.enable("Wi-Fi", true).await.unwrap();
        assert!(first && second);
    }

    #[tokio::test]
    async fn list_interfaces_from_netsh_output() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c.contains("show interfaces"))
            .times(1)
            .returning(|_| ok(CONNECTED));

        let driver = EnglishWindows::new(Arc::new(mock));
        let interfaces = driver.available_interfaces().await.unwrap();
        assert_eq!(interfaces, HashSet::from(["Wi-Fi".to_string()]));
    }
}
