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

//! Application state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::{ConnectionState, StatusReport};

/// Shared application state, as seen by the console.
#[derive(Debug)]
pub struct AppState {
    /// Current connection state.
    pub connection_state: RwLock<ConnectionState>,

    /// Connected device name.
    pub connected_device: RwLock<Option<String>>,

    /// Last complete STATUS block.
    pub last_status: RwLock<Option<StatusReport>>,

    /// Last line received from the device.
    pub last_response: RwLock<Option<String>>,

    /// Last error reported by the session.
    pub last_error: RwLock<Option<String>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_state: RwLock::new(ConnectionState::Disconnected),
            connected_device: RwLock::new(None),
            last_status: RwLock::new(None),
            last_response: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connected(&self, device_name: String) {
        *self.connection_state.write() = ConnectionState::Connected;
        *self.connected_device.write() = Some(device_name);
        *self.last_error.write() = None;
    }

    pub fn set_disconnected(&self) {
        *self.connection_state.write() = ConnectionState::Disconnected;
        *self.connected_device.write() = None;
    }

    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    pub fn get_state(&self) -> ConnectionState {
        *self.connection_state.read()
    }

    pub fn get_device_name(&self) -> Option<String> {
        self.connected_device.read().clone()
    }

    pub fn set_last_status(&self, report: StatusReport) {
        *self.last_status.write() = Some(report);
    }

    pub fn get_last_status(&self) -> Option<StatusReport> {
        self.last_status.read().clone()
    }

    pub fn set_last_response(&self, line: String) {
        *self.last_response.write() = Some(line);
    }

    pub fn get_last_response(&self) -> Option<String> {
        self.last_response.read().clone()
    }

    pub fn get_last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}
