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

//! Serial session manager.
//!
//! Owns the single device connection: discovery, connect/disconnect,
//! command writes and framing of inbound data into lines.

use anyhow::anyhow;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::device::{matches_keywords, Device};
use super::error::SessionError;
use super::framer::LineFramer;
use super::protocol::{self, DeviceCommand};
use super::transport::{Transport, TransportEvent};
use crate::config::BluetoothConfig;

/// Events emitted by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A matching device was found during a scan.
    DeviceFound(Device),
    /// Connection established.
    Connected(Device),
    /// Connection closed.
    Disconnected,
    /// A complete line arrived from the device.
    DataReceived(String),
    /// An operation failed.
    Error(String),
}

/// Connection state as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Snapshot returned by [`SessionManager::get_connection_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub device: Option<Device>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Internal state; the device lives inside the variant.
#[derive(Debug, Clone)]
enum SessionState {
    Disconnected,
    Connecting(Device),
    Connected(Device),
}

struct Session {
    state: SessionState,
    /// Bumped on every successful connect so a stale link-loss report
    /// cannot end a newer session.
    epoch: u64,
}

struct Shared {
    transport: Arc<dyn Transport>,
    keywords: Vec<String>,
    connect_timeout: Duration,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    session: RwLock<Session>,
    framer: Mutex<LineFramer>,
    devices: RwLock<Vec<Device>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Serializes connect, disconnect and link-loss handling.
    op_lock: tokio::sync::Mutex<()>,
}

/// Manager for the serial session with a Keiros device.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    /// Create a new session manager.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &BluetoothConfig,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                keywords: config.device_keywords.clone(),
                connect_timeout: config.connect_timeout(),
                event_tx,
                session: RwLock::new(Session {
                    state: SessionState::Disconnected,
                    epoch: 0,
                }),
                framer: Mutex::new(LineFramer::new()),
                devices: RwLock::new(Vec::new()),
                reader: Mutex::new(None),
                op_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Check if the Bluetooth adapter is powered.
    pub async fn is_bluetooth_enabled(&self) -> bool {
        match self.shared.transport.is_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!("Bluetooth check error: {:#}", e);
                false
            }
        }
    }

    /// Power on the Bluetooth adapter if it is off.
    pub async fn enable_bluetooth(&self) -> Result<(), SessionError> {
        self.shared.transport.enable().await.map_err(|e| {
            self.shared.fail(SessionError::TransportUnavailable(format!(
                "Failed to enable Bluetooth: {:#}",
                e
            )))
        })?;
        info!("Bluetooth adapter enabled");
        Ok(())
    }

    /// List paired devices whose names match the keyword allowlist.
    ///
    /// Replaces the set of devices `connect_to_device` accepts and emits
    /// `DeviceFound` for each match.
    pub async fn scan_for_devices(&self) -> Result<Vec<Device>, SessionError> {
        if !self.shared.transport.is_enabled().await.unwrap_or(false) {
            return Err(self.shared.fail(SessionError::TransportUnavailable(
                "Bluetooth is not enabled".to_string(),
            )));
        }

        let entries = self.shared.transport.paired_devices().await.map_err(|e| {
            self.shared.fail(SessionError::TransportUnavailable(format!(
                "Failed to list paired devices: {:#}",
                e
            )))
        })?;

        let found: Vec<Device> = entries
            .iter()
            .filter(|entry| {
                entry
                    .name
                    .as_deref()
                    .is_some_and(|name| matches_keywords(name, &self.shared.keywords))
            })
            .filter_map(Device::from_entry)
            .collect();

        info!(
            "Scan matched {} of {} paired devices",
            found.len(),
            entries.len()
        );

        *self.shared.devices.write() = found.clone();
        for device in &found {
            debug!("Found device: {} ({})", device.name, device.address);
            self.shared.emit(SessionEvent::DeviceFound(device.clone()));
        }

        Ok(found)
    }

    /// Devices returned by the last scan.
    pub fn devices(&self) -> Vec<Device> {
        self.shared.devices.read().clone()
    }

    /// Connect to a device from the last scan.
    ///
    /// Any existing connection is torn down first. An unknown id fails
    /// without touching the current session.
    pub async fn connect_to_device(&self, device_id: &str) -> Result<Device, SessionError> {
        let _op = self.shared.op_lock.lock().await;

        let device = self
            .shared
            .devices
            .read()
            .iter()
            .find(|d| d.id == device_id)
            .cloned();
        let Some(device) = device else {
            return Err(self
                .shared
                .fail(SessionError::DeviceNotFound(device_id.to_string())));
        };

        self.shared.teardown().await;

        self.shared.session.write().state = SessionState::Connecting(device.clone());
        info!("Connecting to {} ({})", device.name, device.id);

        // Inbound events are queued from the moment the link opens.
        self.shared.framer.lock().reset();
        let inbound = self.shared.transport.subscribe();

        let timeout = self.shared.connect_timeout;
        let result =
            match tokio::time::timeout(timeout, self.shared.transport.connect(&device.id)).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(e) = self.shared.transport.disconnect().await {
                        debug!("Cleanup after connect timeout failed: {:#}", e);
                    }
                    Err(anyhow!("timed out after {}s", timeout.as_secs()))
                }
            };

        if let Err(e) = result {
            drop(inbound);
            self.shared.transport.unsubscribe();
            self.shared.session.write().state = SessionState::Disconnected;
            return Err(self.shared.fail(SessionError::ConnectionFailed {
                device_id: device.id.clone(),
                reason: format!("{:#}", e),
            }));
        }

        let epoch = {
            let mut session = self.shared.session.write();
            session.epoch += 1;
            session.state = SessionState::Connected(device.clone());
            session.epoch
        };

        info!("Connected to {}", device.name);
        self.shared.emit(SessionEvent::Connected(device.clone()));

        let handle = tokio::spawn(Shared::pump(self.shared.clone(), inbound, epoch));
        *self.shared.reader.lock() = Some(handle);

        Ok(device)
    }

    /// Close the current connection.
    ///
    /// Always leaves the manager disconnected; transport errors during
    /// teardown are logged and dropped.
    pub async fn disconnect(&self) {
        let _op = self.shared.op_lock.lock().await;
        self.shared.teardown().await;
    }

    /// Send a command line, appending `\n` if missing.
    ///
    /// Does not wait for a reply; replies arrive as `DataReceived` events.
    pub async fn send_command(&self, command: &str) -> Result<(), SessionError> {
        if !self.shared.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let line = protocol::terminate(command);
        debug!("Sending command: {}", line.trim_end());

        self.shared
            .transport
            .write(line.as_bytes())
            .await
            .map_err(|e| self.shared.fail(SessionError::SendFailed(format!("{:#}", e))))
    }

    /// Send WiFi credentials as `WIFI_CONFIG:<ssid>:<password>`.
    pub async fn configure_wifi(&self, ssid: &str, password: &str) -> Result<(), SessionError> {
        if ssid.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "WiFi SSID cannot be empty".to_string(),
            ));
        }

        info!("Sending WiFi configuration for SSID '{}'", ssid);
        self.send_command(&protocol::wifi_config(ssid, password))
            .await
    }

    /// Send a typed device command.
    pub async fn send(&self, command: &DeviceCommand) -> Result<(), SessionError> {
        match command {
            DeviceCommand::WifiConfig { ssid, password } => {
                self.configure_wifi(ssid, password).await
            }
            _ => {
                let text = command
                    .wire_text()
                    .ok_or_else(|| SessionError::UnsupportedCommand(command.name().to_string()))?;
                self.send_command(&text).await
            }
        }
    }

    /// Current connection state and device.
    pub fn get_connection_status(&self) -> ConnectionStatus {
        match &self.shared.session.read().state {
            SessionState::Disconnected => ConnectionStatus {
                state: ConnectionState::Disconnected,
                device: None,
            },
            SessionState::Connecting(_) => ConnectionStatus {
                state: ConnectionState::Connecting,
                device: None,
            },
            SessionState::Connected(device) => ConnectionStatus {
                state: ConnectionState::Connected,
                device: Some(device.clone()),
            },
        }
    }

    /// Release the connection before the application exits.
    pub async fn shutdown(&self) {
        info!("Shutting down session manager");
        self.disconnect().await;
    }
}

impl Shared {
    /// Emit an event.
    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Report an error to consumers and hand it back to the caller.
    fn fail(&self, err: SessionError) -> SessionError {
        error!("{}", err);
        self.emit(SessionEvent::Error(err.to_string()));
        err
    }

    fn is_connected(&self) -> bool {
        matches!(self.session.read().state, SessionState::Connected(_))
    }

    /// Tear down whatever link exists. Caller holds `op_lock`.
    async fn teardown(&self) {
        let reader = self.reader.lock().take();
        if let Some(handle) = reader {
            handle.abort();
        }
        self.transport.unsubscribe();

        let previous = std::mem::replace(
            &mut self.session.write().state,
            SessionState::Disconnected,
        );
        self.framer.lock().reset();

        match previous {
            SessionState::Disconnected => {}
            SessionState::Connecting(device) => {
                info!("Abandoning pending connection to {}", device.name);
                if let Err(e) = self.transport.disconnect().await {
                    warn!("Disconnect error (ignored): {:#}", e);
                }
            }
            SessionState::Connected(device) => {
                info!("Disconnecting from {}", device.name);
                if let Err(e) = self.transport.disconnect().await {
                    warn!("Disconnect error (ignored): {:#}", e);
                }
                self.emit(SessionEvent::Disconnected);
            }
        }
    }

    /// Feed inbound chunks to the framer until the link ends.
    async fn pump(shared: Arc<Shared>, mut inbound: mpsc::Receiver<TransportEvent>, epoch: u64) {
        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Data(bytes) => {
                    let lines = shared.framer.lock().feed(&bytes);
                    for line in lines {
                        debug!("Received: {}", line);
                        shared.emit(SessionEvent::DataReceived(line));
                    }
                }
                TransportEvent::LinkLost => {
                    shared.handle_link_lost(epoch).await;
                    break;
                }
            }
        }
        debug!("Inbound pump for session {} stopped", epoch);
    }

    async fn handle_link_lost(&self, epoch: u64) {
        let _op = self.op_lock.lock().await;

        let device = {
            let mut session = self.session.write();
            if session.epoch != epoch {
                return;
            }
            match std::mem::replace(&mut session.state, SessionState::Disconnected) {
                SessionState::Connected(device) => device,
                other => {
                    session.state = other;
                    return;
                }
            }
        };

        warn!("Link to {} lost", device.name);
        self.reader.lock().take();
        self.transport.unsubscribe();
        self.framer.lock().reset();
        if let Err(e) = self.transport.disconnect().await {
            debug!("Disconnect after link loss failed: {:#}", e);
        }
        self.emit(SessionEvent::Disconnected);
    }
}
