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

//! Discovered device representation.

use serde::{Deserialize, Serialize};

use super::transport::PairedEntry;

/// Name used when the adapter reports none.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// A paired Bluetooth device that passed the name filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Platform identifier used to connect.
    pub id: String,
    /// Advertised name.
    pub name: String,
    /// Hardware address, `XX:XX:XX:XX:XX:XX`.
    pub address: String,
}

impl Device {
    /// Build a device from an adapter entry.
    ///
    /// Missing ids and addresses fall back to each other; an entry with
    /// neither is rejected.
    pub fn from_entry(entry: &PairedEntry) -> Option<Self> {
        let id = entry.id.clone().or_else(|| entry.address.clone())?;
        let address = entry.address.clone().unwrap_or_else(|| id.clone());
        let name = entry
            .name
            .clone()
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());

        Some(Self { id, name, address })
    }
}

/// Check if a device name contains any of the keywords, ignoring case.
pub fn matches_keywords(name: &str, keywords: &[String]) -> bool {
    let name = name.to_lowercase();
    keywords
        .iter()
        .any(|keyword| name.contains(&keyword.to_lowercase()))
}
