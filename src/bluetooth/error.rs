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

//! Errors returned by the session manager.

use thiserror::Error;

/// Failure of a session manager operation.
///
/// Errors reported by the device itself (`ERR:` lines) are not represented
/// here; they arrive as ordinary data lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The Bluetooth adapter is off or could not be queried.
    #[error("Bluetooth unavailable: {0}")]
    TransportUnavailable(String),

    /// The requested id was not part of the last scan.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The transport could not open a link to the device.
    #[error("Failed to connect to {device_id}: {reason}")]
    ConnectionFailed { device_id: String, reason: String },

    /// A command was issued without an active connection.
    #[error("Not connected to any device")]
    NotConnected,

    /// A caller supplied argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport failed to write a command.
    #[error("Failed to send command: {0}")]
    SendFailed(String),

    /// The firmware does not implement this command.
    #[error("{0} is not implemented by the device firmware")]
    UnsupportedCommand(String),
}
