//! Pure parsers for terse (`-t`) nmcli output, shared by the modern and
//! legacy NetworkManager drivers. No side effects.
//!
//! Terse mode separates fields with `:` and escapes literal colons and
//! backslashes in values with a backslash.

use std::collections::HashSet;

use crate::drivers::{ConnectionState, ScanResult};
use crate::error::{Error, Result};

/// Undo terse-mode escaping (`\:` and `\\`).
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Extract Wi-Fi device names from `nmcli -t -f DEVICE,TYPE device` output.
pub(crate) fn wifi_devices(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let (device, typ) = line.rsplit_once(':')?;
            if typ == "wifi" {
                Some(unescape(device))
            } else {
                None
            }
        })
        .collect()
}

/// Extract scan results from `nmcli -t -f SSID,SIGNAL device wifi list`
/// output. The SSID may itself contain escaped colons, so the signal field
/// is split off from the right.
pub(crate) fn scan_results(output: &str) -> Vec<ScanResult> {
    output
        .lines()
        .filter_map(|line| {
            let (ssid, signal) = line.rsplit_once(':')?;
            let signal = signal.trim().parse::<i32>().ok()?;
            Some(ScanResult {
                ssid: unescape(ssid),
                signal,
            })
        })
        .collect()
}

/// Map an nmcli device state string onto [`ConnectionState`].
///
/// nmcli reports states the reference mapping never sees (`unavailable`,
/// `unmanaged`); both mean no association exists. Transitional states
/// (`connecting (configuring)`, `deactivating`, ...) map to `Connecting`.
fn map_state(state: &str) -> ConnectionState {
    match state {
        "connected" => ConnectionState::Connected,
        "disconnected" | "unavailable" | "unmanaged" => ConnectionState::Disconnected,
        _ => ConnectionState::Connecting,
    }
}

/// Parse `(state, ssid)` for `interface` out of
/// `nmcli -t -f DEVICE,STATE,CONNECTION device` output (modern nmcli).
pub(crate) fn device_state(output: &str, interface: &str) -> Result<(ConnectionState, String)> {
    for line in output.lines() {
        let mut fields = line.splitn(3, ':');
        let (Some(device), Some(state)) = (fields.next(), fields.next()) else {
            continue;
        };
        if unescape(device) != interface {
            continue;
        }
        let connection = fields.next().map(unescape).unwrap_or_default();
        return Ok((map_state(state), connection));
    }
    Err(Error::MalformedOutput(format!(
        "interface '{interface}' not present in nmcli device output"
    )))
}

/// Parse the state for `interface` out of `nmcli -t -f DEVICE,STATE dev`
/// output (legacy nmcli, which has no CONNECTION field on device rows).
pub(crate) fn legacy_device_state(output: &str, interface: &str) -> Result<ConnectionState> {
    for line in output.lines() {
        if let Some((device, state)) = line.split_once(':') {
            if unescape(device) == interface {
                return Ok(map_state(state));
            }
        }
    }
    Err(Error::MalformedOutput(format!(
        "interface '{interface}' not present in nmcli device output"
    )))
}

/// Find the active connection name for `device` in
/// `nmcli -t -f NAME,DEVICES con status` output (legacy nmcli).
pub(crate) fn active_connection_name(output: &str, device: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (name, devices) = line.rsplit_once(':')?;
        if devices.split(',').any(|d| d == device) {
            Some(unescape(name))
        } else {
            None
        }
    })
}
