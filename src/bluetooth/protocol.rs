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

//! Keiros serial command protocol.
//!
//! Commands are ASCII lines terminated by `\n`. Responses are free text
//! with no request ids, so callers correlate them by content.

/// Line terminator required by the firmware.
pub const LINE_TERMINATOR: char = '\n';

/// Header printed before a STATUS block.
pub const STATUS_HEADER: &str = "=== STATUS ===";

/// Acknowledgement of a WIFI_CONFIG command.
pub const WIFI_CONFIG_OK: &str = "WIFI_CONFIG OK";

/// Prefix marking an error reported by the device.
pub const ERROR_MARKER: &str = "ERR:";

/// Reply to a command the firmware does not know.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Commands understood by (or planned for) the device firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Request the STATUS block.
    Status,
    /// Store WiFi credentials.
    WifiConfig { ssid: String, password: String },
    /// Dump the flash log.
    FlashRead,
    /// GPS check (answered by STATUS).
    CheckGps,
    /// WiFi check (answered by STATUS).
    VerifyWifi,
    /// Not implemented by the firmware.
    RestartDevice,
    /// Not implemented by the firmware.
    ShutdownDevice,
    /// Arbitrary command text.
    Raw(String),
}

impl DeviceCommand {
    /// Name used in logs and error messages.
    pub fn name(&self) -> &str {
        match self {
            Self::Status => "STATUS",
            Self::WifiConfig { .. } => "WIFI_CONFIG",
            Self::FlashRead => "FLASH_READ",
            Self::CheckGps => "CHECK_GPS",
            Self::VerifyWifi => "VERIFY_WIFI",
            Self::RestartDevice => "RESTART_DEVICE",
            Self::ShutdownDevice => "SHUTDOWN_DEVICE",
            Self::Raw(text) => text,
        }
    }

    /// Text sent on the wire, without terminator.
    ///
    /// Returns `None` for commands the firmware does not implement.
    /// WiFi credentials are inserted verbatim; a `:` inside the SSID is
    /// not escaped.
    pub fn wire_text(&self) -> Option<String> {
        match self {
            Self::Status | Self::CheckGps | Self::VerifyWifi => Some("STATUS".to_string()),
            Self::WifiConfig { ssid, password } => Some(wifi_config(ssid, password)),
            Self::FlashRead => Some("FLASH_READ".to_string()),
            Self::RestartDevice | Self::ShutdownDevice => None,
            Self::Raw(text) => Some(text.clone()),
        }
    }

    /// Check if the response to this command is a STATUS block.
    pub fn expects_status(&self) -> bool {
        matches!(self, Self::Status | Self::CheckGps | Self::VerifyWifi)
    }
}

/// Build a `WIFI_CONFIG:<ssid>:<password>` command.
pub fn wifi_config(ssid: &str, password: &str) -> String {
    format!("WIFI_CONFIG:{}:{}", ssid, password)
}

/// Terminate a command with exactly one trailing newline.
///
/// Text already ending in `\n` is returned unchanged.
pub fn terminate(command: &str) -> String {
    if command.ends_with(LINE_TERMINATOR) {
        command.to_string()
    } else {
        format!("{}{}", command, LINE_TERMINATOR)
    }
}

/// Coarse classification of a received line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    StatusHeader,
    WifiConfigOk,
    /// The device reported an error; carries the full line.
    DeviceError(String),
    UnknownCommand,
    Other,
}

impl ResponseKind {
    /// Classify a single trimmed line.
    pub fn classify(line: &str) -> Self {
        if line.contains(STATUS_HEADER) {
            Self::StatusHeader
        } else if line.contains(WIFI_CONFIG_OK) {
            Self::WifiConfigOk
        } else if line.contains(ERROR_MARKER) {
            Self::DeviceError(line.to_string())
        } else if line.contains(UNKNOWN_COMMAND) {
            Self::UnknownCommand
        } else {
            Self::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_is_idempotent() {
        assert_eq!(terminate("STATUS"), "STATUS\n");
        assert_eq!(terminate("STATUS\n"), "STATUS\n");
        assert_eq!(terminate(&terminate("FLASH_READ")), "FLASH_READ\n");
    }

    #[test]
    fn test_wire_text() {
        assert_eq!(DeviceCommand::Status.wire_text().as_deref(), Some("STATUS"));
        assert_eq!(DeviceCommand::CheckGps.wire_text().as_deref(), Some("STATUS"));
        assert_eq!(DeviceCommand::VerifyWifi.wire_text().as_deref(), Some("STATUS"));
        assert_eq!(DeviceCommand::FlashRead.wire_text().as_deref(), Some("FLASH_READ"));
        assert_eq!(DeviceCommand::RestartDevice.wire_text(), None);
        assert_eq!(DeviceCommand::ShutdownDevice.wire_text(), None);
    }

    #[test]
    fn test_expects_status() {
        assert!(DeviceCommand::Status.expects_status());
        assert!(DeviceCommand::CheckGps.expects_status());
        assert!(DeviceCommand::VerifyWifi.expects_status());
        assert!(!DeviceCommand::FlashRead.expects_status());
        assert!(!DeviceCommand::Raw("STATUS".to_string()).expects_status());
    }

    #[test]
    fn test_wifi_config_not_escaped() {
        let cmd = DeviceCommand::WifiConfig {
            ssid: "Cafe:Guest".to_string(),
            password: "p:w".to_string(),
        };
        assert_eq!(cmd.wire_text().as_deref(), Some("WIFI_CONFIG:Cafe:Guest:p:w"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(ResponseKind::classify("=== STATUS ==="), ResponseKind::StatusHeader);
        assert_eq!(ResponseKind::classify("WIFI_CONFIG OK"), ResponseKind::WifiConfigOk);
        assert_eq!(
            ResponseKind::classify("ERR: bad format"),
            ResponseKind::DeviceError("ERR: bad format".to_string())
        );
        assert_eq!(
            ResponseKind::classify("Unknown command: FOO"),
            ResponseKind::UnknownCommand
        );
        assert_eq!(ResponseKind::classify("MAC: 00:11"), ResponseKind::Other);
    }
}
