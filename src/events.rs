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

//! Event processing for session events.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bluetooth::{ResponseKind, SessionEvent, StatusCollector, StatusReport};
use crate::state::AppState;

/// Quiet period after which a partially received STATUS block is closed.
pub const STATUS_SETTLE: Duration = Duration::from_millis(500);

/// Process events from the session manager.
pub struct EventProcessor {
    state: Arc<AppState>,
    collector: StatusCollector,
    reports: Option<mpsc::UnboundedSender<StatusReport>>,
}

impl EventProcessor {
    /// Create a new event processor.
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            collector: StatusCollector::new(),
            reports: None,
        }
    }

    /// Also forward every completed STATUS block to `tx`.
    pub fn with_status_reports(mut self, tx: mpsc::UnboundedSender<StatusReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Process a single event.
    pub fn process_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::DeviceFound(device) => {
                debug!("Device found: {} ({})", device.name, device.id);
            }
            SessionEvent::Connected(device) => {
                info!("Device connected: {}", device.name);
                self.collector.reset();
                self.state.set_connected(device.name);
            }
            SessionEvent::Disconnected => {
                info!("Device disconnected");
                self.collector.reset();
                self.state.set_disconnected();
            }
            SessionEvent::DataReceived(line) => self.handle_line(line),
            SessionEvent::Error(e) => {
                error!("Session error: {}", e);
                self.state.set_error(e);
            }
        }
    }

    fn handle_line(&mut self, line: String) {
        match ResponseKind::classify(&line) {
            ResponseKind::StatusHeader => debug!("STATUS block started"),
            ResponseKind::WifiConfigOk => info!("Device accepted WiFi configuration"),
            ResponseKind::DeviceError(msg) => warn!("Device reported error: {}", msg),
            ResponseKind::UnknownCommand => warn!("Device did not recognize the command"),
            ResponseKind::Other => debug!("Device: {}", line),
        }

        if let Some(report) = self.collector.push_line(&line) {
            self.publish(report);
        }

        self.state.set_last_response(line);
    }

    /// Close a STATUS block that stopped short of its last line.
    ///
    /// A block with no recognizable field is dropped.
    pub fn flush_status(&mut self) {
        match self.collector.flush() {
            Some(report) => self.publish(report),
            None => {
                debug!("Dropping empty STATUS block");
                self.collector.reset();
            }
        }
    }

    fn publish(&mut self, report: StatusReport) {
        info!(
            "Status: wifi={} gps_fix={}",
            report.status.wifi.map_or("?", |w| w.as_str()),
            report.status.gps.as_ref().is_some_and(|g| g.valid)
        );
        self.state.set_last_status(report.clone());
        if let Some(tx) = &self.reports {
            let _ = tx.send(report);
        }
    }

    /// Consume events until the session manager is dropped.
    ///
    /// While a STATUS block is open, a gap of [`STATUS_SETTLE`] closes it.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        loop {
            let event = if self.collector.is_collecting() {
                match tokio::time::timeout(STATUS_SETTLE, rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        self.flush_status();
                        continue;
                    }
                }
            } else {
                rx.recv().await
            };

            let Some(event) = event else {
                break;
            };
            self.process_event(event);
        }
        debug!("Event processor stopped");
    }
}
