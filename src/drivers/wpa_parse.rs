//! Pure parsers for `wpa_cli` output. No side effects.

use std::collections::HashSet;

use crate::drivers::{ConnectionState, ScanResult, ScanState};
use crate::error::{Error, Result};

/// Look up a key in `wpa_cli status` key=value output.
fn status_field<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        if k.trim() == key {
            Some(v.trim())
        } else {
            None
        }
    })
}

/// Parse `(state, ssid)` out of `wpa_cli status` output.
///
/// `wpa_state=COMPLETED` means associated and authenticated; the transient
/// states (SCANNING, ASSOCIATING, 4WAY_HANDSHAKE, ...) all map to
/// `Connecting`. A COMPLETED block without an `ssid` field is malformed.
pub(crate) fn connection_state(output: &str) -> Result<(ConnectionState, String)> {
    let wpa_state = status_field(output, "wpa_state").ok_or_else(|| {
        Error::MalformedOutput("no wpa_state field in wpa_cli status output".to_string())
    })?;
    let ssid = status_field(output, "ssid").map(str::to_owned);
    match wpa_state {
        "COMPLETED" => {
            let ssid = ssid.ok_or_else(|| {
                Error::MalformedOutput(
                    "wpa_state is COMPLETED but no ssid field is present".to_string(),
                )
            })?;
            Ok((ConnectionState::Connected, ssid))
        }
        "DISCONNECTED" | "INACTIVE" | "INTERFACE_DISABLED" => {
            Ok((ConnectionState::Disconnected, ssid.unwrap_or_default()))
        }
        _ => Ok((ConnectionState::Connecting, ssid.unwrap_or_default())),
    }
}

/// Parse the scan state out of `wpa_cli status` output. wpa_supplicant is
/// the one backend that reports scanning directly.
pub(crate) fn scan_state(output: &str) -> ScanState {
    if status_field(output, "wpa_state") == Some("SCANNING") {
        ScanState::Scanning
    } else {
        ScanState::Idle
    }
}

/// Parse `wpa_cli interface` output into interface names.
pub(crate) fn interfaces(output: &str) -> HashSet<String> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("Available interfaces"))
        .skip(1)
        .map(|line| line.trim().to_owned())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse `wpa_cli scan_results` output (tab-separated columns:
/// bssid / frequency / signal level / flags / ssid).
pub(crate) fn scan_results(output: &str) -> Vec<ScanResult> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 5 {
                return None;
            }
            let signal = fields[2].trim().parse::<i32>().ok()?;
            Some(ScanResult {
                ssid: fields[4..].join("\t").trim().to_owned(),
                signal,
            })
        })
        .collect()
}

/// Find the id of the network named `ssid` in `wpa_cli list_networks`
/// output (columns: network id / ssid / bssid / flags).
pub(crate) fn network_id(output: &str, ssid: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() >= 2 && fields[0].trim().parse::<u32>().is_ok() && fields[1] == ssid {
            Some(fields[0].trim().to_owned())
        } else {
            None
        }
    })
}

/// Extract the id printed by `wpa_cli add_network`.
pub(crate) fn added_network_id(output: &str) -> Result<String> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::MalformedOutput(format!("add_network did not print a network id: {output}"))
        })
}
