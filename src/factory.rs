//! Entrypoint for a client to get a suitable Wi-Fi driver.
//!
//! The registry is static configuration: adding a (language, backend)
//! combination is a table edit, not a new code branch.

use std::sync::Arc;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::controller::WifiInterfaceController;
use crate::detect::{CapabilityDetector, StdinPrompt};
use crate::drivers::{
    BackendType, EnglishMacOs, EnglishNmcli, EnglishNmcliLegacy, EnglishWindows,
    EnglishWpaSupplicant, SystemLanguage, WifiDriver,
};
use crate::error::{Error, Result};
use crate::secret::Secret;

/// Everything a driver constructor receives from the factory.
pub(crate) struct DriverContext {
    pub(crate) runner: Arc<dyn CommandRunner>,
    pub(crate) elevation: Option<Secret>,
}

type DriverCtor = fn(&DriverContext) -> Box<dyn WifiDriver>;

fn windows_driver(ctx: &DriverContext) -> Box<dyn WifiDriver> {
    Box::new(EnglishWindows::new(ctx.runner.clone()))
}

fn macos_driver(ctx: &DriverContext) -> Box<dyn WifiDriver> {
    Box::new(EnglishMacOs::new(ctx.runner.clone()))
}

fn nmcli_driver(ctx: &DriverContext) -> Box<dyn WifiDriver> {
    Box::new(EnglishNmcli::with_elevation(
        ctx.runner.clone(),
        ctx.elevation.clone(),
    ))
}

fn nmcli_legacy_driver(ctx: &DriverContext) -> Box<dyn WifiDriver> {
    Box::new(EnglishNmcliLegacy::with_elevation(
        ctx.runner.clone(),
        ctx.elevation.clone(),
    ))
}

fn wpa_driver(ctx: &DriverContext) -> Box<dyn WifiDriver> {
    Box::new(EnglishWpaSupplicant::with_elevation(
        ctx.runner.clone(),
        ctx.elevation.clone(),
    ))
}

/// Fixed mapping from a detected (language, backend) pair to a driver
/// constructor.
const REGISTRY: &[(SystemLanguage, BackendType, DriverCtor)] = &[
    (SystemLanguage::English, BackendType::Windows, windows_driver),
    (SystemLanguage::English, BackendType::MacOs, macos_driver),
    (
        SystemLanguage::English,
        BackendType::LinuxNmcliModern,
        nmcli_driver,
    ),
    (
        SystemLanguage::English,
        BackendType::LinuxNmcliLegacy,
        nmcli_legacy_driver,
    ),
    (
        SystemLanguage::English,
        BackendType::LinuxWpaSupplicant,
        wpa_driver,
    ),
];

fn lookup(language: SystemLanguage, backend: BackendType) -> Option<DriverCtor> {
    REGISTRY
        .iter()
        .find(|(l, b, _)| *l == language && *b == backend)
        .map(|(_, _, ctor)| *ctor)
}

/// Factory to discover and configure a Wi-Fi driver.
pub struct WifiDriverFactory {
    runner: Arc<dyn CommandRunner>,
    detector: CapabilityDetector,
}

impl WifiDriverFactory {
    /// Create a factory probing the real system.
    pub fn new() -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let detector = CapabilityDetector::new(runner.clone(), Box::new(StdinPrompt));
        Self { runner, detector }
    }

    /// Create a factory over explicit parts (used by tests and embedders
    /// with their own command execution).
    pub fn from_parts(runner: Arc<dyn CommandRunner>, detector: CapabilityDetector) -> Self {
        Self { runner, detector }
    }

    /// Pre-supply the sudo password instead of prompting for it when a
    /// backend needs elevation.
    pub fn with_sudo_password(mut self, secret: Secret) -> Self {
        self.detector = self.detector.with_sudo_password(secret);
        self
    }

    /// Detect the host capabilities and construct the matching driver.
    pub async fn get_driver(&mut self) -> Result<Box<dyn WifiDriver>> {
        let backend = self.detector.detect_backend_type().await?;
        let language = self.detector.detect_language().await?;
        let ctor = lookup(language, backend).ok_or_else(|| {
            Error::UnsupportedConfiguration(format!(
                "no driver for {language:?}/{backend:?}"
            ))
        })?;
        let context = DriverContext {
            runner: self.runner.clone(),
            elevation: self.detector.validated_secret().cloned(),
        };
        Ok(ctor(&context))
    }

    /// Construct a per-interface controller for the first discovered Wi-Fi
    /// interface (lexicographically, for determinism).
    pub async fn first_interface_controller(&mut self) -> Result<WifiInterfaceController> {
        let driver = self.get_driver().await?;
        let mut names: Vec<String> = driver.available_interfaces().await?.into_iter().collect();
        names.sort();
        let interface = names.into_iter().next().ok_or_else(|| {
            Error::UnsupportedConfiguration("no wifi interface available".to_string())
        })?;
        Ok(WifiInterfaceController::new(driver, interface))
    }
}

impl Default for WifiDriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::command::{CmdOutput, MockCommandRunner};
    use crate::detect::{HostOs, MockSecretPrompt};

    #[test]
    fn register_every_backend_for_english() {
        for backend in [
            BackendType::Windows,
            BackendType::MacOs,
            BackendType::LinuxNmcliModern,
            BackendType::LinuxNmcliLegacy,
            BackendType::LinuxWpaSupplicant,
        ] {
            assert!(
                lookup(SystemLanguage::English, backend).is_some(),
                "missing registry entry for {backend:?}"
            );
        }
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn construct_the_driver_matching_the_detected_backend() {
        let _guard = crate::testutil::ENV_LOCK.lock().unwrap();
        std::env::set_var("LANG", "en_US.UTF-8");

        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|c: &str| c == "where netsh" || c == "which networksetup")
            .returning(|_| {
                Ok(CmdOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            });
        mock.expect_run()
            .withf(|c: &str| c == "which nmcli")
            .returning(|_| {
                Ok(CmdOutput {
                    status: 0,
                    stdout: "/usr/bin/nmcli\n".to_string(),
                    stderr: String::new(),
                })
            });
        mock.expect_run()
            .withf(|c: &str| c == "nmcli general permissions")
            .returning(|_| {
                Ok(CmdOutput {
                    status: 0,
                    stdout: "org.freedesktop.NetworkManager.enable-disable-wifi yes\n\
                             org.freedesktop.NetworkManager.wifi.scan yes\n"
                        .to_string(),
                    stderr: String::new(),
                })
            });
        mock.expect_run()
            .withf(|c: &str| c == "nmcli --version")
            .returning(|_| {
                Ok(CmdOutput {
                    status: 0,
                    stdout: "nmcli tool, version 1.44.2-1.fc39\n".to_string(),
                    stderr: String::new(),
                })
            });

        let runner: Arc<dyn CommandRunner> = Arc::new(mock);
        let detector = CapabilityDetector::new(runner.clone(), Box::new(MockSecretPrompt::new()))
            .with_host_os(HostOs::Linux);
        let mut factory = WifiDriverFactory::from_parts(runner, detector);

        let driver = factory.get_driver().await.unwrap();
        assert_eq!(driver.backend_type(), BackendType::LinuxNmcliModern);
        assert_eq!(driver.system_language(), SystemLanguage::English);
    }
}
