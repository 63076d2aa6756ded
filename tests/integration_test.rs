//! Integration tests for the full session flow.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use keiros_link::bluetooth::{
    ConnectionState, DeviceCommand, LineFramer, MemoryTransport, SessionError, SessionEvent,
    SessionManager, StatusReport, WifiState,
};
use keiros_link::config::BluetoothConfig;
use keiros_link::events::EventProcessor;
use keiros_link::state::AppState;

const STATUS_RESPONSE: &str = "=== STATUS ===\r\n\
MAC: 24:6F:28:AA:BB:CC\r\n\
WiFi: CONNECTED\r\n\
IP: 192.168.1.42\r\n\
RSSI: -61 dBm\r\n\
Flash: 128 entries\r\n\
GPS: FIX Lat=48.1374 Lng=11.5755\r\n";

fn setup() -> (
    MemoryTransport,
    SessionManager,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    let transport = MemoryTransport::new()
        .with_device("keiros-1", Some("Keiros Device GPS-001"), "24:6F:28:AA:BB:CC")
        .with_device("speaker", Some("JBL Flip 5"), "10:20:30:40:50:60");
    let (tx, rx) = mpsc::unbounded_channel();
    let session = SessionManager::new(
        Arc::new(transport.clone()),
        &BluetoothConfig::default(),
        tx,
    );
    (transport, session, rx)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_status_round_trip() {
    let (transport, session, events) = setup();
    let state = AppState::new();
    let (report_tx, mut reports) = mpsc::unbounded_channel::<StatusReport>();
    tokio::spawn(
        EventProcessor::new(state.clone())
            .with_status_reports(report_tx)
            .run(events),
    );

    session.scan_for_devices().await.unwrap();
    session.connect_to_device("keiros-1").await.unwrap();
    session.send(&DeviceCommand::Status).await.unwrap();
    assert_eq!(transport.written(), "STATUS\n");

    // Deliver the reply in awkward chunks
    for chunk in STATUS_RESPONSE.as_bytes().chunks(7) {
        transport.push_data(chunk).await;
    }

    let report = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .unwrap()
        .unwrap();
    let status = report.status;
    assert_eq!(status.mac.as_deref(), Some("24:6F:28:AA:BB:CC"));
    assert_eq!(status.wifi, Some(WifiState::Connected));
    assert_eq!(status.ip.as_deref(), Some("192.168.1.42"));
    assert_eq!(status.rssi.as_deref(), Some("-61"));
    assert_eq!(status.flash.as_deref(), Some("128 entries"));
    let gps = status.gps.unwrap();
    assert!(gps.valid);
    assert_eq!(gps.lat.as_deref(), Some("48.1374"));
    assert_eq!(gps.lng.as_deref(), Some("11.5755"));

    assert_eq!(state.get_state(), ConnectionState::Connected);
    assert_eq!(state.get_device_name().as_deref(), Some("Keiros Device GPS-001"));
}

#[tokio::test]
async fn test_status_with_coordinates_on_separate_lines() {
    let (transport, session, events) = setup();
    let (report_tx, mut reports) = mpsc::unbounded_channel::<StatusReport>();
    tokio::spawn(
        EventProcessor::new(AppState::new())
            .with_status_reports(report_tx)
            .run(events),
    );

    session.scan_for_devices().await.unwrap();
    session.connect_to_device("keiros-1").await.unwrap();
    session.send(&DeviceCommand::CheckGps).await.unwrap();
    transport
        .push_data(
            "=== STATUS ===\nMAC: 00:11:22:33:44:55\nWiFi: CONNECTED\nIP: 192.168.1.5\n\
RSSI: -42 dBm\nGPS: FIX\nLat=12.34\nLng=56.78\nFlash: OK\n",
        )
        .await;

    let report = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .unwrap()
        .unwrap();
    let gps = report.status.gps.unwrap();
    assert!(gps.valid);
    assert_eq!(gps.lat.as_deref(), Some("12.34"));
    assert_eq!(gps.lng.as_deref(), Some("56.78"));
    assert_eq!(report.status.flash.as_deref(), Some("OK"));
}

#[tokio::test]
async fn test_wifi_configuration_flow() {
    let (transport, session, mut events) = setup();
    session.scan_for_devices().await.unwrap();
    session.connect_to_device("keiros-1").await.unwrap();
    while events.try_recv().is_ok() {}

    session.configure_wifi("HomeNet", "hunter22").await.unwrap();
    assert_eq!(transport.written(), "WIFI_CONFIG:HomeNet:hunter22\n");

    transport.push_data("WIFI_CONFIG OK\n").await;
    assert_eq!(
        recv(&mut events).await,
        SessionEvent::DataReceived("WIFI_CONFIG OK".to_string())
    );
}

#[tokio::test]
async fn test_commands_rejected_while_disconnected() {
    let (transport, session, _events) = setup();

    for command in ["STATUS", "FLASH_READ", ""] {
        assert_eq!(
            session.send_command(command).await,
            Err(SessionError::NotConnected)
        );
    }
    assert_eq!(
        session.configure_wifi("HomeNet", "pw").await,
        Err(SessionError::NotConnected)
    );
    assert_eq!(transport.written(), "");
}

#[tokio::test]
async fn test_non_matching_devices_are_not_connectable() {
    let (transport, session, _events) = setup();

    let devices = session.scan_for_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(session.devices(), devices);

    assert_eq!(
        session.connect_to_device("speaker").await,
        Err(SessionError::DeviceNotFound("speaker".to_string()))
    );
    assert!(transport.connect_calls().is_empty());
}

#[tokio::test]
async fn test_device_drop_then_reconnect() {
    let (transport, session, mut events) = setup();
    session.scan_for_devices().await.unwrap();
    session.connect_to_device("keiros-1").await.unwrap();
    while events.try_recv().is_ok() {}

    transport.drop_link().await;
    assert_eq!(recv(&mut events).await, SessionEvent::Disconnected);
    assert!(!session.get_connection_status().is_connected());

    let device = session.connect_to_device("keiros-1").await.unwrap();
    assert_eq!(recv(&mut events).await, SessionEvent::Connected(device));
    session.send_command("STATUS").await.unwrap();
    assert_eq!(transport.written(), "STATUS\n");

    session.shutdown().await;
    assert_eq!(recv(&mut events).await, SessionEvent::Disconnected);
    session.shutdown().await;
    assert!(events.try_recv().is_err());
}

#[test]
fn test_framer_chunking_is_invisible() {
    let stream = STATUS_RESPONSE.as_bytes();

    let mut whole = LineFramer::new();
    let expected = whole.feed(stream);
    assert_eq!(expected.len(), 7);

    for size in [1, 2, 5, 16, 64] {
        let mut framer = LineFramer::new();
        let got: Vec<String> = stream
            .chunks(size)
            .flat_map(|chunk| framer.feed(chunk))
            .collect();
        assert_eq!(got, expected, "chunk size {}", size);
    }
}
