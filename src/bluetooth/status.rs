// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! STATUS response parsing and block collection.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use super::protocol::ResponseKind;

static MAC_RE: LazyLock<Regex> = LazyLock::new(|| rest_of_line("MAC"));
static IP_RE: LazyLock<Regex> = LazyLock::new(|| rest_of_line("IP"));
static FLASH_RE: LazyLock<Regex> = LazyLock::new(|| rest_of_line("Flash"));
static WIFI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"WiFi:[ \t]*(CONNECTED|DISCONNECTED)\b").unwrap());
static RSSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RSSI:[ \t]*([^\r\n]*?)[ \t]*dBm").unwrap());
static GPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"GPS:[ \t]*(NO FIX|FIX)").unwrap());
static LAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Lat=([\d.-]+)").unwrap());
static LNG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Lng=([\d.-]+)").unwrap());

fn rest_of_line(label: &str) -> Regex {
    Regex::new(&format!(r"{}:[ \t]*([^\r\n]*)", label)).unwrap()
}

/// WiFi link state reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiState {
    #[serde(rename = "CONNECTED")]
    Connected,
    #[serde(rename = "DISCONNECTED")]
    Disconnected,
}

impl WifiState {
    /// Convert to the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

/// GPS fix information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsInfo {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<String>,
}

/// Parsed snapshot of a STATUS response.
///
/// Every field is optional; a field is `None` when its label did not
/// appear in the response text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsInfo>,
}

impl DeviceStatus {
    /// Parse accumulated STATUS text.
    ///
    /// Each field is located independently, so line order does not matter
    /// and a missing field never hides another. Values are extracted as
    /// text; no range checks are made.
    pub fn parse(text: &str) -> Self {
        let gps = GPS_RE.captures(text).map(|caps| {
            let valid = &caps[1] == "FIX";
            let coordinate = |re: &Regex| {
                if valid {
                    re.captures(text).map(|c| c[1].to_string())
                } else {
                    None
                }
            };
            GpsInfo {
                valid,
                lat: coordinate(&LAT_RE),
                lng: coordinate(&LNG_RE),
            }
        });

        Self {
            mac: capture_trimmed(&MAC_RE, text),
            wifi: WIFI_RE.captures(text).map(|caps| match &caps[1] {
                "CONNECTED" => WifiState::Connected,
                _ => WifiState::Disconnected,
            }),
            ip: capture_trimmed(&IP_RE, text),
            rssi: capture_trimmed(&RSSI_RE, text),
            flash: capture_trimmed(&FLASH_RE, text),
            gps,
        }
    }

    /// Check if no field was found.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn capture_trimmed(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A complete STATUS block received from the device.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: DeviceStatus,
    pub raw: String,
    pub received_at: DateTime<Utc>,
}

/// Accumulates `DataReceived` lines into STATUS blocks.
///
/// The protocol has no length header or end marker. A block completes as
/// soon as the GPS state is resolved (`NO FIX`, or `FIX` with both `Lat=`
/// and `Lng=`) and the `Flash:` line has arrived. Otherwise it completes on
/// the next header or when the caller [`flush`](Self::flush)es it after the
/// link has gone quiet.
pub struct StatusCollector {
    buffer: String,
    active: bool,
}

impl StatusCollector {
    /// Create an idle collector.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            active: false,
        }
    }

    /// Process one received line.
    ///
    /// Returns `Some(report)` when the line completes a STATUS block. A
    /// header arriving mid-block completes the previous block and starts
    /// a new one.
    pub fn push_line(&mut self, line: &str) -> Option<StatusReport> {
        if ResponseKind::classify(line) == ResponseKind::StatusHeader {
            let previous = self.flush();
            self.buffer.clear();
            self.active = true;
            self.buffer.push_str(line);
            self.buffer.push('\n');
            return previous;
        }

        if !self.active {
            return None;
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        if gps_resolved(&self.buffer) && FLASH_RE.is_match(&self.buffer) {
            self.finish()
        } else {
            None
        }
    }

    /// Complete the current block with whatever has arrived.
    ///
    /// Returns `None` if no block is active or no field was recognized.
    pub fn flush(&mut self) -> Option<StatusReport> {
        if !self.active {
            return None;
        }
        if DeviceStatus::parse(&self.buffer).is_empty() {
            return None;
        }
        self.finish()
    }

    fn finish(&mut self) -> Option<StatusReport> {
        let raw = std::mem::take(&mut self.buffer);
        self.active = false;
        debug!("STATUS block complete: {} bytes", raw.len());

        Some(StatusReport {
            status: DeviceStatus::parse(&raw),
            raw,
            received_at: Utc::now(),
        })
    }

    /// Discard a partially collected block.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.active = false;
    }

    /// Check if a block is being collected.
    pub fn is_collecting(&self) -> bool {
        self.active
    }
}

/// Check if the GPS line and any coordinates it announces have arrived.
fn gps_resolved(text: &str) -> bool {
    match GPS_RE.captures(text) {
        Some(caps) if &caps[1] == "FIX" => LAT_RE.is_match(text) && LNG_RE.is_match(text),
        Some(_) => true,
        None => false,
    }
}

impl Default for StatusCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "MAC: 00:11:22:33:44:55\nWiFi: CONNECTED\nIP: 192.168.1.5\nRSSI: -42 dBm\nGPS: FIX\nLat=12.34\nLng=56.78\nFlash: OK";

    #[test]
    fn test_parse_full_status() {
        let status = DeviceStatus::parse(FULL);
        assert_eq!(status.mac.as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(status.wifi, Some(WifiState::Connected));
        assert_eq!(status.ip.as_deref(), Some("192.168.1.5"));
        assert_eq!(status.rssi.as_deref(), Some("-42"));
        assert_eq!(status.flash.as_deref(), Some("OK"));
        assert_eq!(
            status.gps,
            Some(GpsInfo {
                valid: true,
                lat: Some("12.34".to_string()),
                lng: Some("56.78".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_no_fix() {
        let status = DeviceStatus::parse("GPS: NO FIX");
        assert_eq!(
            status,
            DeviceStatus {
                gps: Some(GpsInfo {
                    valid: false,
                    lat: None,
                    lng: None,
                }),
                ..Default::default()
            }
        );

        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"gps":{"valid":false}}"#);
    }

    #[test]
    fn test_parse_no_fix_ignores_coordinates() {
        let status = DeviceStatus::parse("GPS: NO FIX\nLat=1.0\nLng=2.0");
        let gps = status.gps.unwrap();
        assert!(!gps.valid);
        assert!(gps.lat.is_none());
        assert!(gps.lng.is_none());
    }

    #[test]
    fn test_parse_empty() {
        let status = DeviceStatus::parse("");
        assert!(status.is_empty());
        assert_eq!(serde_json::to_string(&status).unwrap(), "{}");
    }

    #[test]
    fn test_parse_fix_without_coordinates() {
        let status = DeviceStatus::parse("GPS: FIX");
        let gps = status.gps.unwrap();
        assert!(gps.valid);
        assert!(gps.lat.is_none());
        assert!(gps.lng.is_none());
    }

    #[test]
    fn test_parse_coordinates_on_gps_line() {
        let status = DeviceStatus::parse("GPS: FIX Lat=-33.8688 Lng=151.2093");
        let gps = status.gps.unwrap();
        assert_eq!(gps.lat.as_deref(), Some("-33.8688"));
        assert_eq!(gps.lng.as_deref(), Some("151.2093"));
    }

    #[test]
    fn test_parse_wifi_unknown_value_omitted() {
        let status = DeviceStatus::parse("WiFi: CONNECTING\nIP: 0.0.0.0");
        assert!(status.wifi.is_none());
        assert_eq!(status.ip.as_deref(), Some("0.0.0.0"));

        let status = DeviceStatus::parse("WiFi: DISCONNECTED");
        assert_eq!(status.wifi, Some(WifiState::Disconnected));
    }

    #[test]
    fn test_parse_order_independent() {
        let reversed: Vec<&str> = FULL.lines().rev().collect();
        assert_eq!(
            DeviceStatus::parse(&reversed.join("\n")),
            DeviceStatus::parse(FULL)
        );
    }

    #[test]
    fn test_parse_empty_value_does_not_borrow_next_line() {
        let status = DeviceStatus::parse("MAC:\nFlash: OK\r\n");
        assert!(status.mac.is_none());
        assert_eq!(status.flash.as_deref(), Some("OK"));
    }

    #[test]
    fn test_collector_completes_on_gps_and_flash() {
        let mut collector = StatusCollector::new();
        assert!(collector.push_line("WIFI_CONFIG OK").is_none());
        assert!(!collector.is_collecting());

        assert!(collector.push_line("=== STATUS ===").is_none());
        assert!(collector.push_line("MAC: 00:11:22:33:44:55").is_none());
        assert!(collector.push_line("WiFi: DISCONNECTED").is_none());
        assert!(collector.push_line("Flash: OK").is_none());
        let report = collector.push_line("GPS: NO FIX").unwrap();

        assert_eq!(report.status.mac.as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(report.status.wifi, Some(WifiState::Disconnected));
        assert!(report.raw.starts_with("=== STATUS ===\n"));
        assert!(!collector.is_collecting());
    }

    #[test]
    fn test_collector_waits_for_coordinates_on_later_lines() {
        let mut collector = StatusCollector::new();
        let lines = [
            "=== STATUS ===",
            "MAC: 00:11:22:33:44:55",
            "WiFi: CONNECTED",
            "IP: 192.168.1.5",
            "RSSI: -42 dBm",
            "GPS: FIX",
            "Lat=12.34",
            "Lng=56.78",
        ];
        for line in lines {
            assert!(collector.push_line(line).is_none(), "completed early at {}", line);
        }

        let report = collector.push_line("Flash: OK").unwrap();
        let gps = report.status.gps.unwrap();
        assert!(gps.valid);
        assert_eq!(gps.lat.as_deref(), Some("12.34"));
        assert_eq!(gps.lng.as_deref(), Some("56.78"));
        assert_eq!(report.status.flash.as_deref(), Some("OK"));
        assert_eq!(report.status.rssi.as_deref(), Some("-42"));
    }

    #[test]
    fn test_collector_flush_after_quiet_link() {
        let mut collector = StatusCollector::new();
        assert!(collector.flush().is_none());

        collector.push_line("=== STATUS ===");
        assert!(collector.flush().is_none());
        assert!(collector.is_collecting());

        collector.push_line("WiFi: CONNECTED");
        collector.push_line("GPS: FIX");
        let report = collector.flush().unwrap();
        assert_eq!(report.status.wifi, Some(WifiState::Connected));
        assert_eq!(
            report.status.gps,
            Some(GpsInfo {
                valid: true,
                lat: None,
                lng: None,
            })
        );
        assert!(!collector.is_collecting());
    }

    #[test]
    fn test_collector_new_header_completes_previous_block() {
        let mut collector = StatusCollector::new();
        collector.push_line("=== STATUS ===");
        collector.push_line("GPS: NO FIX");

        let report = collector.push_line("=== STATUS ===").unwrap();
        assert_eq!(report.status.gps.map(|g| g.valid), Some(false));
        assert!(collector.is_collecting());
    }

    #[test]
    fn test_collector_reset() {
        let mut collector = StatusCollector::new();
        collector.push_line("=== STATUS ===");
        collector.push_line("MAC: stale");
        collector.reset();
        assert!(collector.flush().is_none());

        collector.push_line("=== STATUS ===");
        collector.push_line("GPS: NO FIX");
        let report = collector.push_line("Flash: OK").unwrap();
        assert!(report.status.mac.is_none());
    }
}
