//! Pure parsers for `netsh wlan` output. No side effects.

use std::collections::HashSet;

use crate::drivers::{ConnectionState, ScanResult};
use crate::error::{Error, Result};

/// Extract interface names from `netsh wlan show interfaces` output.
///
/// We're parsing, for example, the following line to find "Wi-Fi":
/// `Name                   : Wi-Fi`
pub(crate) fn interface_names(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let (label, value) = line.split_once(':')?;
            if label.trim() == "Name" {
                Some(value.trim().to_owned())
            } else {
                None
            }
        })
        .collect()
}

/// Extract scan results from `netsh wlan show networks` output.
///
/// Matches numbered `SSID <n> : <value>` lines; `<n>` may be multi-digit.
/// netsh does not report per-SSID signal in this listing, so signal is 0.
pub(crate) fn scan_ssids(output: &str) -> Vec<ScanResult> {
    output
        .lines()
        .filter_map(|line| {
            let (label, value) = line.split_once(':')?;
            let mut words = label.split_whitespace();
            if words.next() != Some("SSID") {
                return None;
            }
            words.next()?.parse::<u32>().ok()?;
            Some(ScanResult {
                ssid: value.trim().to_owned(),
                signal: 0,
            })
        })
        .collect()
}

/// Scanner state while walking an interface block.
enum ParseState {
    SeekInterface,
    SeekState,
    SeekSsid,
}

/// Parse `(state, ssid)` for `interface` out of `netsh wlan show interfaces`
/// output.
///
/// Here is an example of what we are parsing (to find the FunHouse SSID):
///
/// ```text
/// Name                   : Wi-Fi
/// Description            : TP-Link Wireless USB Adapter
/// GUID                   : 093d8022-33cb-4400-8362-275eaf24cb86
/// Physical address       : 98:48:27:88:cb:18
/// State                  : connected
/// SSID                   : FunHouse
/// ```
///
/// Advances `SeekInterface → SeekState → SeekSsid`; an interface block that
/// never yields an SSID field is malformed backend output, not a normal
/// disconnected state.
pub(crate) fn connection_state(output: &str, interface: &str) -> Result<(ConnectionState, String)> {
    let mut parse_state = ParseState::SeekInterface;
    let mut network_state: Option<String> = None;
    let mut ssid: Option<String> = None;

    for line in output.lines() {
        match parse_state {
            ParseState::SeekInterface => {
                if line.contains("Name") && line.contains(interface) {
                    parse_state = ParseState::SeekState;
                }
            }
            ParseState::SeekState => {
                if line.contains("State") {
                    if let Some((_, value)) = line.split_once(':') {
                        network_state = Some(value.trim().to_lowercase());
                        parse_state = ParseState::SeekSsid;
                    }
                }
            }
            ParseState::SeekSsid => {
                if line.contains("SSID") {
                    if let Some((_, value)) = line.split_once(':') {
                        ssid = Some(value.trim().to_owned());
                        break;
                    }
                }
            }
        }
    }

    let state = match network_state.as_deref() {
        Some("connected") => ConnectionState::Connected,
        Some("disconnected") => ConnectionState::Disconnected,
        _ => ConnectionState::Connecting,
    };
    let ssid = ssid.ok_or_else(|| {
        Error::MalformedOutput(format!(
            "no SSID field found for interface '{interface}' in netsh output"
        ))
    })?;
    Ok((state, ssid))
}
