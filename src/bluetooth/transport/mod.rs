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

//! Serial transport abstraction.
//!
//! The session manager only talks to the radio through [`Transport`].
//! [`RfcommTransport`] drives BlueZ; [`MemoryTransport`] is an in-memory
//! stand-in for tests.

mod memory;
mod rfcomm;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use memory::MemoryTransport;
pub use rfcomm::RfcommTransport;

/// Capacity of the inbound event channel.
pub const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// A paired device as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// Events produced by an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw bytes read from the link.
    Data(Vec<u8>),
    /// The remote end closed the link or the link failed.
    LinkLost,
}

/// Capabilities required from a Classic Bluetooth serial binding.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Check if the adapter is powered.
    async fn is_enabled(&self) -> Result<bool>;

    /// Power on the adapter.
    async fn enable(&self) -> Result<()>;

    /// List devices paired with the adapter.
    async fn paired_devices(&self) -> Result<Vec<PairedEntry>>;

    /// Open a serial link to the device with the given id.
    async fn connect(&self, device_id: &str) -> Result<()>;

    /// Write raw bytes to the open link.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Route inbound events to a new receiver, replacing any previous one.
    ///
    /// Events read while no receiver is installed are dropped, so callers
    /// subscribe before `connect`.
    fn subscribe(&self) -> mpsc::Receiver<TransportEvent>;

    /// Stop routing inbound events.
    fn unsubscribe(&self);

    /// Close the open link.
    async fn disconnect(&self) -> Result<()>;
}
