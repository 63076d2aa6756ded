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

//! Bluetooth RFCOMM (Serial Port Profile) transport backed by BlueZ.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bluer::rfcomm::stream::{OwnedReadHalf, OwnedWriteHalf};
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, Address};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{PairedEntry, Transport, TransportEvent, INBOUND_CHANNEL_CAPACITY};

/// Size of a single read from the socket.
const READ_CHUNK_SIZE: usize = 1024;

type Subscriber = Arc<Mutex<Option<mpsc::Sender<TransportEvent>>>>;

/// Classic Bluetooth serial transport over an RFCOMM socket.
pub struct RfcommTransport {
    adapter: Adapter,
    channel: u8,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    subscriber: Subscriber,
}

impl RfcommTransport {
    /// Open a BlueZ session on the default adapter.
    pub async fn new(channel: u8) -> Result<Self> {
        info!("Initializing RFCOMM transport...");

        // Create BlueZ session
        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self {
            adapter,
            channel,
            writer: tokio::sync::Mutex::new(None),
            reader_task: Mutex::new(None),
            subscriber: Arc::new(Mutex::new(None)),
        })
    }

    /// Forward socket reads to the current subscriber until the link drops.
    async fn read_loop(mut reader: OwnedReadHalf, subscriber: Subscriber) {
        let mut buf = [0u8; READ_CHUNK_SIZE];

        loop {
            let event = match reader.read(&mut buf).await {
                Ok(0) => {
                    info!("RFCOMM link closed by remote");
                    TransportEvent::LinkLost
                }
                Ok(n) => {
                    debug!("Read {} bytes", n);
                    TransportEvent::Data(buf[..n].to_vec())
                }
                Err(e) => {
                    error!("RFCOMM read error: {}", e);
                    TransportEvent::LinkLost
                }
            };

            let link_lost = event == TransportEvent::LinkLost;
            let tx = subscriber.lock().clone();
            if let Some(tx) = tx {
                if tx.send(event).await.is_err() {
                    debug!("Inbound subscriber dropped");
                }
            }

            if link_lost {
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for RfcommTransport {
    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.adapter.is_powered().await?)
    }

    async fn enable(&self) -> Result<()> {
        if !self.adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            self.adapter.set_powered(true).await?;
        }
        Ok(())
    }

    async fn paired_devices(&self) -> Result<Vec<PairedEntry>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.name().await.unwrap_or(None);
                devices.push(PairedEntry {
                    id: Some(addr.to_string()),
                    name,
                    address: Some(addr.to_string()),
                });
            }
        }

        debug!("Adapter reports {} paired devices", devices.len());
        Ok(devices)
    }

    async fn connect(&self, device_id: &str) -> Result<()> {
        let address: Address = device_id
            .parse()
            .map_err(|_| anyhow!("Invalid Bluetooth address: {}", device_id))?;

        info!("Opening RFCOMM link to {} on channel {}", address, self.channel);
        let stream = Stream::connect(SocketAddr::new(address, self.channel))
            .await
            .with_context(|| format!("RFCOMM connect to {} failed", address))?;

        let (reader, writer) = stream.into_split();
        *self.writer.lock().await = Some(writer);

        let subscriber = self.subscriber.clone();
        let handle = tokio::spawn(Self::read_loop(reader, subscriber));
        let previous = self.reader_task.lock().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }

        info!("RFCOMM link established");
        Ok(())
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| anyhow!("No open RFCOMM link"))?;

        writer.write_all(data).await?;
        writer.flush().await?;
        debug!("Wrote {} bytes", data.len());
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<TransportEvent> {
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        *self.subscriber.lock() = Some(tx);
        rx
    }

    fn unsubscribe(&self) {
        self.subscriber.lock().take();
    }

    async fn disconnect(&self) -> Result<()> {
        let reader_task = self.reader_task.lock().take();
        if let Some(handle) = reader_task {
            handle.abort();
        }

        match self.writer.lock().await.take() {
            Some(mut writer) => {
                if let Err(e) = writer.shutdown().await {
                    warn!("RFCOMM shutdown error: {}", e);
                }
                info!("RFCOMM link closed");
            }
            None => debug!("No RFCOMM link to close"),
        }

        Ok(())
    }
}
