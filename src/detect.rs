//! Capability detection: probe the host for a usable Wi-Fi control tool,
//! the privilege level it needs, and the system language its output will be
//! in.
//!
//! Detection runs in a fixed priority order reflecting platform
//! specificity, not best-available: a Windows host with `netsh` always
//! resolves to the Windows backend even when other tools are also visible.

use std::sync::Arc;
use tracing::debug;

use crate::command::{run_ok, CommandRunner};
use crate::drivers::{BackendType, SystemLanguage};
use crate::error::{Error, Result};
use crate::secret::Secret;

/// Version at which nmcli switched to the modern CLI surface (inclusive).
const NMCLI_MODERN_THRESHOLD: [u32; 4] = [0, 9, 9, 0];

/// Where distributions install nmcli when it is not on PATH.
const NMCLI_FALLBACK_PATH: &str = "/usr/bin/nmcli";

/// Host OS flavor consulted by the detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Windows.
    Windows,
    /// macOS.
    MacOs,
    /// Linux.
    Linux,
    /// Anything else; only tool probing applies.
    Other,
}

impl HostOs {
    /// The OS this process is running on.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => HostOs::Windows,
            "macos" => HostOs::MacOs,
            "linux" => HostOs::Linux,
            _ => HostOs::Other,
        }
    }
}

/// Interactive source of the elevation secret. Credential prompting is an
/// external collaborator; the detector only defines the boundary.
#[cfg_attr(test, mockall::automock)]
pub trait SecretPrompt: Send + Sync {
    /// Ask the user for a secret.
    fn read_secret(&self, prompt: &str) -> Result<Secret>;
}

/// Read the secret from standard input.
pub struct StdinPrompt;

impl SecretPrompt for StdinPrompt {
    fn read_secret(&self, prompt: &str) -> Result<Secret> {
        use std::io::{BufRead, Write};
        print!("{prompt}");
        std::io::stdout()
            .flush()
            .map_err(|e| Error::InvalidCredential(format!("cannot prompt for secret: {e}")))?;
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| Error::InvalidCredential(format!("cannot read secret: {e}")))?;
        Ok(Secret::new(line.trim_end().to_string()))
    }
}

/// Elevation progress, threaded explicitly rather than mutated in place as
/// a hidden optional.
enum Elevation {
    /// No validated secret yet; holds a pre-supplied candidate if any.
    Unverified(Option<Secret>),
    /// The probe confirmed this secret.
    Validated(Secret),
}

/// Probes the host for an available backend, required elevation and system
/// language.
///
/// The validated elevation secret is cached for the lifetime of the
/// detector and never re-validated or persisted.
pub struct CapabilityDetector {
    runner: Arc<dyn CommandRunner>,
    prompt: Box<dyn SecretPrompt>,
    host_os: HostOs,
    elevation: Elevation,
}

impl CapabilityDetector {
    /// Create a detector probing through `runner` and prompting through
    /// `prompt` when elevation is needed.
    pub fn new(runner: Arc<dyn CommandRunner>, prompt: Box<dyn SecretPrompt>) -> Self {
        Self {
            runner,
            prompt,
            host_os: HostOs::current(),
            elevation: Elevation::Unverified(None),
        }
    }

    /// Pre-supply the sudo password instead of prompting for it.
    pub fn with_sudo_password(mut self, secret: Secret) -> Self {
        self.elevation = Elevation::Unverified(Some(secret));
        self
    }

    /// Override the host OS consulted by the priority order.
    pub fn with_host_os(mut self, host_os: HostOs) -> Self {
        self.host_os = host_os;
        self
    }

    /// The elevation secret, if one has been validated.
    pub fn validated_secret(&self) -> Option<&Secret> {
        match &self.elevation {
            Elevation::Validated(secret) => Some(secret),
            Elevation::Unverified(_) => None,
        }
    }

    async fn tool_on_path(&self, tool: &str) -> Result<bool> {
        let probe = if self.host_os == HostOs::Windows {
            format!("where {tool}")
        } else {
            format!("which {tool}")
        };
        Ok(self.runner.run(&probe).await?.is_ok())
    }

    /// Resolve the backend tool family available on this host.
    ///
    /// First match wins, in order: Windows netsh, macOS networksetup,
    /// NetworkManager CLI (split on the 0.9.9.0 version threshold, after a
    /// permission check that may require elevation), wpa_cli (always
    /// elevated).
    pub async fn detect_backend_type(&mut self) -> Result<BackendType> {
        if self.host_os == HostOs::Windows && self.tool_on_path("netsh").await? {
            debug!("Detected Windows netsh backend");
            return Ok(BackendType::Windows);
        }
        if self.tool_on_path("networksetup").await? {
            debug!("Detected macOS networksetup backend");
            return Ok(BackendType::MacOs);
        }

        let nmcli_present = self.tool_on_path("nmcli").await?
            || self
                .runner
                .run(&format!("test -x {NMCLI_FALLBACK_PATH}"))
                .await?
                .is_ok();
        if nmcli_present {
            let permissions =
                run_ok(self.runner.as_ref(), "nmcli general permissions").await?;
            if nmcli_permissions_denied(&permissions.stdout) {
                debug!("nmcli permissions insufficient, requesting elevation");
                self.ensure_elevated().await?;
            }
            let version_output = run_ok(self.runner.as_ref(), "nmcli --version").await?;
            let version = nmcli_version(&version_output.stdout)?;
            let backend = classify_nmcli_version(&version);
            debug!("Detected nmcli {} => {:?}", version, backend);
            return Ok(backend);
        }

        if self.tool_on_path("wpa_cli").await? {
            self.ensure_elevated().await?;
            debug!("Detected wpa_supplicant backend");
            return Ok(BackendType::LinuxWpaSupplicant);
        }

        Err(Error::UnsupportedConfiguration(
            "no compatible wifi backend found".to_string(),
        ))
    }

    /// Obtain and validate the elevation secret, prompting if none was
    /// pre-supplied. Validated once per detector lifetime.
    async fn ensure_elevated(&mut self) -> Result<()> {
        let candidate = match &self.elevation {
            Elevation::Validated(_) => return Ok(()),
            Elevation::Unverified(candidate) => candidate.clone(),
        };
        let secret = match candidate {
            Some(secret) => secret,
            None => self.prompt.read_secret("[sudo] password: ")?,
        };
        if secret.is_empty() {
            return Err(Error::InvalidCredential(
                "no sudo password provided".to_string(),
            ));
        }

        // -k discards any cached sudo timestamp so the probe actually
        // exercises the password.
        let probe = format!("echo '{}' | sudo -S -k whoami", secret.expose());
        let response = self.runner.run(&probe).await?;
        if !response.stdout.contains("root") {
            return Err(Error::InvalidCredential(
                "sudo rejected the password".to_string(),
            ));
        }
        debug!("Elevation secret validated");
        self.elevation = Elevation::Validated(secret);
        Ok(())
    }

    /// Resolve the system language the backend's output will be in.
    ///
    /// Windows reads the user's UI locale from the registry; everywhere
    /// else the `LANG` environment variable decides. The mapping is exact:
    /// unmapped locales fail instead of falling back.
    pub async fn detect_language(&self) -> Result<SystemLanguage> {
        language_from_locale(&self.raw_locale()?)
    }

    #[cfg(target_os = "windows")]
    fn raw_locale(&self) -> Result<String> {
        use winreg::enums::HKEY_CURRENT_USER;
        use winreg::RegKey;
        let key = RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey(r"Control Panel\International")
            .map_err(|e| {
                Error::UnsupportedConfiguration(format!("cannot read locale from registry: {e}"))
            })?;
        key.get_value("LocaleName").map_err(|e| {
            Error::UnsupportedConfiguration(format!("cannot read LocaleName: {e}"))
        })
    }

    #[cfg(not(target_os = "windows"))]
    fn raw_locale(&self) -> Result<String> {
        std::env::var("LANG")
            .map_err(|_| Error::UnsupportedConfiguration("LANG is not set".to_string()))
    }
}

/// Strip a trailing non-numeric build suffix: "1.44.2-1.fc39" → "1.44.2".
fn strip_build_suffix(version: &str) -> &str {
    match version.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(pos) => &version[..pos],
        None => version,
    }
}

/// Numeric components of a version string, build suffix excluded.
fn version_components(version: &str) -> Vec<u32> {
    strip_build_suffix(version)
        .split('.')
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Pick the nmcli backend flavor for a version string.
fn classify_nmcli_version(version: &str) -> BackendType {
    if version_components(version) >= NMCLI_MODERN_THRESHOLD.to_vec() {
        BackendType::LinuxNmcliModern
    } else {
        BackendType::LinuxNmcliLegacy
    }
}

/// Extract the version from `nmcli --version` output
/// ("nmcli tool, version 1.44.2-1.fc39").
fn nmcli_version(output: &str) -> Result<String> {
    output
        .split_whitespace()
        .last()
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::MalformedOutput(format!("no version in nmcli output: {output:?}"))
        })
}

/// Is either needed NetworkManager permission missing or not granted in
/// `nmcli general permissions` output?
fn nmcli_permissions_denied(output: &str) -> bool {
    const NEEDED: [&str; 2] = [
        "org.freedesktop.NetworkManager.enable-disable-wifi",
        "org.freedesktop.NetworkManager.wifi.scan",
    ];
    NEEDED.iter().any(|permission| {
        !output.lines().any(|line| {
            line.contains(permission) && line.split_whitespace().last() == Some("yes")
        })
    })
}

/// Map a raw locale string onto [`SystemLanguage`]. The encoding suffix
/// ("en_US.UTF-8") is not part of the dialect and is dropped; everything
/// else must match exactly.
fn language_from_locale(raw: &str) -> Result<SystemLanguage> {
    let dialect = raw.split_once('.').map(|(d, _)| d).unwrap_or(raw);
    match dialect {
        "en_US" | "en-US" => Ok(SystemLanguage::English),
        other => Err(Error::UnsupportedConfiguration(format!(
            "unsupported system language '{other}'"
        ))),
    }
}
