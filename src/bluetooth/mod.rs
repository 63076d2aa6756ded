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

//! Bluetooth communication module.
//!
//! Manages the Classic Bluetooth serial session with a Keiros device.

mod device;
mod error;
mod framer;
pub mod protocol;
mod session;
mod status;
pub mod transport;

pub use device::{matches_keywords, Device, UNKNOWN_DEVICE_NAME};
pub use error::SessionError;
pub use framer::LineFramer;
pub use protocol::{DeviceCommand, ResponseKind};
pub use session::{ConnectionState, ConnectionStatus, SessionEvent, SessionManager};
pub use status::{DeviceStatus, GpsInfo, StatusCollector, StatusReport, WifiState};
pub use transport::{MemoryTransport, PairedEntry, RfcommTransport, Transport, TransportEvent};
