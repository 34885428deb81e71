//! Pure parsers for `networksetup` and `airport` output. No side effects.

use std::collections::HashSet;

use crate::drivers::{ConnectionState, ScanResult, ScanState};
use crate::error::{Error, Result};

/// Extract Wi-Fi device names from `networksetup -listallhardwareports`
/// output (a `Hardware Port:` / `Device:` pair per adapter).
pub(crate) fn wifi_devices(output: &str) -> HashSet<String> {
    let mut devices = HashSet::new();
    let mut in_wifi_port = false;
    for line in output.lines() {
        if let Some(port) = line.strip_prefix("Hardware Port:") {
            in_wifi_port = port.contains("Wi-Fi") || port.contains("AirPort");
        } else if let Some(device) = line.strip_prefix("Device:") {
            if in_wifi_port {
                devices.insert(device.trim().to_owned());
            }
        }
    }
    devices
}

/// Does this token look like a BSSID (aa:bb:cc:dd:ee:ff)?
fn is_bssid(token: &str) -> bool {
    token.len() == 17 && token.split(':').count() == 6
}

/// Parse `airport -s` columnar output. The SSID column is right-aligned and
/// may contain spaces, so everything left of the BSSID column is the SSID.
pub(crate) fn scan_results(output: &str) -> Vec<ScanResult> {
    output
        .lines()
        .filter(|line| !(line.contains("SSID") && line.contains("BSSID")))
        .filter_map(|line| {
            let bssid = line.split_whitespace().find(|t| is_bssid(t))?;
            let bssid_pos = line.find(bssid)?;
            let ssid = line[..bssid_pos].trim();
            let signal = line[bssid_pos + bssid.len()..]
                .split_whitespace()
                .next()?
                .parse::<i32>()
                .ok()?;
            Some(ScanResult {
                ssid: ssid.to_owned(),
                signal,
            })
        })
        .collect()
}

/// Look up a `key: value` field in `airport -I` output. Keys are matched
/// exactly so `SSID` is never satisfied by the `BSSID` line.
fn info_field<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        if k.trim() == key {
            Some(v.trim())
        } else {
            None
        }
    })
}

/// Parse `(state, ssid)` out of `airport -I` output.
pub(crate) fn connection_info(output: &str) -> Result<(ConnectionState, String)> {
    if output.contains("AirPort: Off") {
        return Ok((ConnectionState::Disconnected, String::new()));
    }
    let state = info_field(output, "state").ok_or_else(|| {
        Error::MalformedOutput("no state field in airport output".to_string())
    })?;
    let ssid = info_field(output, "SSID").map(str::to_owned);
    match state {
        "running" => {
            let ssid = ssid.ok_or_else(|| {
                Error::MalformedOutput(
                    "airport reports running but no SSID field is present".to_string(),
                )
            })?;
            Ok((ConnectionState::Connected, ssid))
        }
        "init" => Ok((ConnectionState::Disconnected, ssid.unwrap_or_default())),
        _ => Ok((ConnectionState::Connecting, ssid.unwrap_or_default())),
    }
}

/// Parse the scan state out of `airport -I` output.
pub(crate) fn scan_state(output: &str) -> ScanState {
    if info_field(output, "state") == Some("scanning") {
        ScanState::Scanning
    } else {
        ScanState::Idle
    }
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn extract_wifi_devices_from_hardware_ports() {
        let output = "\
Hardware Port: Thunderbolt Ethernet
Device: en4
Ethernet Address: 00:11:22:33:44:55

Hardware Port: Wi-Fi
Device: en0
Ethernet Address: 66:77:88:99:aa:bb
";
        assert_eq!(wifi_devices(output), HashSet::from(["en0".to_string()]));
    }

    #[test]
    fn parse_columnar_scan_output_with_spaced_ssids() {
        let output = "\
                            SSID BSSID             RSSI CHANNEL HT CC SECURITY (auth/unicast/group)
                        FunHouse aa:bb:cc:dd:ee:ff -44  6       Y  US WPA2(PSK/AES/AES)
                     Cafe Lounge 11:22:33:44:55:66 -67  11      Y  -- NONE
";
        let results = scan_results(output);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].ssid, "FunHouse");
        assert_eq!(results[0].signal, -44);
        assert_eq!(results[1].ssid, "Cafe Lounge");
        assert_eq!(results[1].signal, -67);
    }

    #[test]
    fn report_running_state_with_ssid() {
        let output = "\
     agrCtlRSSI: -54
          state: running
        op mode: station
          BSSID: aa:bb:cc:dd:ee:ff
           SSID: FunHouse
";
        let (state, ssid) = connection_info(output).unwrap();
        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(ssid, "FunHouse");
    }

    #[test]
    fn report_disconnected_when_airport_is_off() {
        let (state, ssid) = connection_info("AirPort: Off\n").unwrap();
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(ssid, "");
    }

    #[test]
    fn fail_loudly_when_running_block_lacks_ssid() {
        let err = connection_info("          state: running\n").unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
    }

    #[test]
    fn report_scanning_scan_state() {
        assert_eq!(scan_state("          state: scanning\n"), ScanState::Scanning);
        assert_eq!(scan_state("          state: running\n"), ScanState::Idle);
    }
}
