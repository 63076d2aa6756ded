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

//! In-memory transport for exercising the session manager without a radio.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{PairedEntry, Transport, TransportEvent, INBOUND_CHANNEL_CAPACITY};

#[derive(Default)]
struct Inner {
    enabled: bool,
    fail_enable: bool,
    devices: Vec<PairedEntry>,
    failing: HashSet<String>,
    connect_delay: Option<Duration>,
    fail_disconnect: bool,
    fail_write: bool,
    linked: Option<String>,
    on_connect: Vec<TransportEvent>,
    subscriber: Option<mpsc::Sender<TransportEvent>>,
    written: Vec<u8>,
    connects: Vec<String>,
    disconnects: usize,
}

/// Scriptable transport that records every call.
///
/// Clones share state, so a test can keep one handle while the session
/// manager owns another.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    /// Create an enabled transport with no paired devices.
    pub fn new() -> Self {
        let transport = Self::default();
        transport.inner.lock().enabled = true;
        transport
    }

    /// Add a paired device.
    pub fn with_device(self, id: &str, name: Option<&str>, address: &str) -> Self {
        self.inner.lock().devices.push(PairedEntry {
            id: Some(id.to_string()),
            name: name.map(str::to_string),
            address: Some(address.to_string()),
        });
        self
    }

    /// Set whether the adapter reports itself as powered.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().enabled = enabled;
    }

    /// Make `enable` fail.
    pub fn fail_enable(&self) {
        self.inner.lock().fail_enable = true;
    }

    /// Make connects to `device_id` fail.
    pub fn fail_connect(&self, device_id: &str) {
        self.inner.lock().failing.insert(device_id.to_string());
    }

    /// Delay every connect by `delay`.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.inner.lock().connect_delay = Some(delay);
    }

    /// Make `disconnect` fail.
    pub fn fail_disconnect(&self) {
        self.inner.lock().fail_disconnect = true;
    }

    /// Make `write` fail.
    pub fn fail_write(&self) {
        self.inner.lock().fail_write = true;
    }

    /// Deliver `event` as soon as the next connect opens the link.
    ///
    /// Events reach only a subscriber installed before the connect.
    pub fn emit_on_connect(&self, event: TransportEvent) {
        self.inner.lock().on_connect.push(event);
    }

    /// Deliver bytes as if read from the link.
    pub async fn push_data(&self, data: impl AsRef<[u8]>) {
        let tx = self.inner.lock().subscriber.clone();
        if let Some(tx) = tx {
            let _ = tx.send(TransportEvent::Data(data.as_ref().to_vec())).await;
        }
    }

    /// Simulate the remote end dropping the link.
    pub async fn drop_link(&self) {
        let tx = {
            let mut inner = self.inner.lock();
            inner.linked = None;
            inner.subscriber.clone()
        };
        if let Some(tx) = tx {
            let _ = tx.send(TransportEvent::LinkLost).await;
        }
    }

    /// Everything written so far, as text.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().written).to_string()
    }

    /// Ids passed to successful and failed connects, in order.
    pub fn connect_calls(&self) -> Vec<String> {
        self.inner.lock().connects.clone()
    }

    /// Number of disconnect calls.
    pub fn disconnect_calls(&self) -> usize {
        self.inner.lock().disconnects
    }

    /// Id of the currently linked device.
    pub fn linked_device(&self) -> Option<String> {
        self.inner.lock().linked.clone()
    }

    /// Check if an inbound subscriber is installed.
    pub fn has_subscriber(&self) -> bool {
        self.inner.lock().subscriber.is_some()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.inner.lock().enabled)
    }

    async fn enable(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_enable {
            return Err(anyhow!("Adapter refused to power on"));
        }
        inner.enabled = true;
        Ok(())
    }

    async fn paired_devices(&self) -> Result<Vec<PairedEntry>> {
        let inner = self.inner.lock();
        if !inner.enabled {
            return Err(anyhow!("Adapter is powered off"));
        }
        Ok(inner.devices.clone())
    }

    async fn connect(&self, device_id: &str) -> Result<()> {
        let delay = {
            let mut inner = self.inner.lock();
            inner.connects.push(device_id.to_string());
            inner.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        if inner.failing.contains(device_id) {
            return Err(anyhow!("Connection refused by {}", device_id));
        }
        inner.linked = Some(device_id.to_string());

        let events = std::mem::take(&mut inner.on_connect);
        if let Some(tx) = &inner.subscriber {
            for event in events {
                let _ = tx.try_send(event);
            }
        }
        Ok(())
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_write {
            return Err(anyhow!("Broken pipe"));
        }
        if inner.linked.is_none() {
            return Err(anyhow!("No open link"));
        }
        inner.written.extend_from_slice(data);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<TransportEvent> {
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        self.inner.lock().subscriber = Some(tx);
        rx
    }

    fn unsubscribe(&self) {
        self.inner.lock().subscriber = None;
    }

    async fn disconnect(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.disconnects += 1;
        inner.linked = None;
        if inner.fail_disconnect {
            return Err(anyhow!("Socket already closed"));
        }
        Ok(())
    }
}
