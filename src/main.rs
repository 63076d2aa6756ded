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

//! Keiros Link console

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keiros_link::bluetooth::{DeviceCommand, RfcommTransport, SessionManager, StatusReport};
use keiros_link::config::Config;
use keiros_link::events::EventProcessor;
use keiros_link::state::AppState;

const HELP: &str = "Commands: scan | connect <id> | status | gps | \
wifi <ssid|\"ssid with spaces\"> [password] | flash | send <text> | state | disconnect | quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keiros_link=info".parse()?),
        )
        .init();

    info!("Starting Keiros Link v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Configuration loaded");

    let transport = Arc::new(RfcommTransport::new(config.bluetooth.rfcomm_channel).await?);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let session = SessionManager::new(transport, &config.bluetooth, event_tx);

    if !session.is_bluetooth_enabled().await {
        if config.bluetooth.auto_enable {
            info!("Bluetooth is off, powering on adapter");
            if let Err(e) = session.enable_bluetooth().await {
                warn!("Could not enable Bluetooth: {}", e);
            }
        } else {
            warn!("Bluetooth is off");
        }
    }

    let state = AppState::new();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let processor = EventProcessor::new(state.clone()).with_status_reports(report_tx);
    tokio::spawn(processor.run(event_rx));

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" || line == "exit" {
                    break;
                }
                if let Err(e) = run_command(&session, &state, &config, &mut report_rx, line).await {
                    error!("{}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    session.shutdown().await;
    info!("Keiros Link stopped");
    Ok(())
}

async fn run_command(
    session: &SessionManager,
    state: &AppState,
    config: &Config,
    reports: &mut mpsc::UnboundedReceiver<StatusReport>,
    line: &str,
) -> Result<()> {
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match verb {
        "scan" => {
            let devices = session.scan_for_devices().await?;
            if devices.is_empty() {
                println!("No Keiros devices paired");
            }
            for device in devices {
                println!("{}  {}  {}", device.id, device.address, device.name);
            }
        }
        "connect" => {
            let device = session.connect_to_device(rest).await?;
            println!("Connected to {}", device.name);
        }
        "status" | "gps" => {
            let command = if verb == "gps" {
                DeviceCommand::CheckGps
            } else {
                DeviceCommand::Status
            };
            send_and_report(session, config, reports, &command).await?;
        }
        "wifi" => {
            let Some((ssid, password)) = parse_wifi_args(rest) else {
                println!("Usage: wifi <ssid|\"ssid with spaces\"> [password]");
                return Ok(());
            };
            session
                .send(&DeviceCommand::WifiConfig { ssid, password })
                .await?;
        }
        "flash" => session.send(&DeviceCommand::FlashRead).await?,
        "send" => {
            send_and_report(session, config, reports, &DeviceCommand::Raw(rest.to_string())).await?
        }
        "state" => {
            let status = session.get_connection_status();
            match status.device {
                Some(device) => println!("{} ({})", status.state.as_str(), device.name),
                None => println!("{}", status.state.as_str()),
            }
            if let Some(response) = state.get_last_response() {
                println!("Last response: {}", response);
            }
            if let Some(report) = state.get_last_status() {
                println!(
                    "Last status at {}: {}",
                    report.received_at.format("%H:%M:%S"),
                    serde_json::to_string(&report.status)?
                );
            }
        }
        "disconnect" => session.disconnect().await,
        _ => println!("{}", HELP),
    }

    Ok(())
}

/// Send `command`, then print the STATUS block it produces, if any.
async fn send_and_report(
    session: &SessionManager,
    config: &Config,
    reports: &mut mpsc::UnboundedReceiver<StatusReport>,
    command: &DeviceCommand,
) -> Result<()> {
    while reports.try_recv().is_ok() {}
    session.send(command).await?;

    if !command.expects_status() {
        return Ok(());
    }

    match tokio::time::timeout(config.console.status_timeout(), reports.recv()).await {
        Ok(Some(report)) => println!("{}", serde_json::to_string_pretty(&report.status)?),
        Ok(None) => {}
        Err(_) => warn!(
            "No STATUS response within {}s",
            config.console.status_timeout_secs
        ),
    }
    Ok(())
}

/// Split `wifi` arguments into SSID and password.
///
/// An SSID containing spaces must be wrapped in double quotes. Returns
/// `None` for an unterminated quote.
fn parse_wifi_args(args: &str) -> Option<(String, String)> {
    let args = args.trim();
    let (ssid, password) = match args.strip_prefix('"') {
        Some(quoted) => {
            let end = quoted.find('"')?;
            (&quoted[..end], &quoted[end + 1..])
        }
        None => args.split_once(' ').unwrap_or((args, "")),
    };
    Some((ssid.to_string(), password.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wifi_args() {
        assert_eq!(
            parse_wifi_args("HomeNet s3cret"),
            Some(("HomeNet".to_string(), "s3cret".to_string()))
        );
        assert_eq!(
            parse_wifi_args("\"Cafe Guest\" pass word"),
            Some(("Cafe Guest".to_string(), "pass word".to_string()))
        );
        assert_eq!(
            parse_wifi_args("\"Open Net\""),
            Some(("Open Net".to_string(), String::new()))
        );
        assert_eq!(parse_wifi_args("\"Broken"), None);
        assert_eq!(parse_wifi_args(""), Some((String::new(), String::new())));
    }
}
