//! Hardware integration tests for robotooth-core
//!
//! These tests require a Bluetooth adapter and a powered serial bridge
//! module in range, and should be run with:
//! ```text
//! cargo test --package robotooth-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Set `ROBOTOOTH_DEVICE` to the identifier of the module to connect to
//! (MAC address on Linux/Windows, CoreBluetooth UUID on macOS). Tests that
//! need it are skipped when it is not set.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use robotooth_core::{
    BtleConfig, BtleRadio, ChannelObserver, ConnectionState, Notification, NotificationReceiver,
    Observer, PeripheralId, Transport, TransportConfig, pump_events,
};

/// Default timeout for BLE operations
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Scan window used by the scan-only test
const SCAN_WINDOW: Duration = Duration::from_secs(10);

fn get_device() -> Option<PeripheralId> {
    env::var("ROBOTOOTH_DEVICE")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PeripheralId::new)
}

struct Rig {
    transport: Arc<Transport<BtleRadio>>,
    rx: NotificationReceiver,
    _observer: Arc<dyn Observer>,
}

async fn rig() -> Rig {
    let (radio, events) = BtleRadio::new(BtleConfig::for_current_platform())
        .await
        .expect("Failed to open Bluetooth adapter");
    let cancel = radio.cancellation_token();
    let transport = Arc::new(Transport::new(radio, TransportConfig::default()).unwrap());

    let channel = Arc::new(ChannelObserver::new(256));
    let rx = channel.subscribe();
    let observer: Arc<dyn Observer> = channel;
    transport.set_observer(&observer);
    tokio::spawn(pump_events(Arc::clone(&transport), events, cancel));

    Rig {
        transport,
        rx,
        _observer: observer,
    }
}

async fn wait_for(
    rx: &mut NotificationReceiver,
    mut predicate: impl FnMut(&Notification) -> bool,
) -> Notification {
    timeout(BLE_TIMEOUT, async {
        loop {
            let notification = rx.recv().await.expect("notification channel closed");
            if predicate(&notification) {
                return notification;
            }
        }
    })
    .await
    .expect("Timed out waiting for notification")
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_lists_serial_peripherals() {
    let rig = rig().await;
    rig.transport.start_scan().unwrap();
    sleep(SCAN_WINDOW).await;
    rig.transport.stop_scan().unwrap();

    let snapshot = rig.transport.peripherals();
    println!("Found {} peripherals", snapshot.len());
    for p in &snapshot {
        println!("  {} ({} dBm, connected: {})", p.id, p.signal_strength, p.connected);
    }
    assert!(
        snapshot
            .as_slice()
            .windows(2)
            .all(|w| w[0].signal_strength <= w[1].signal_strength)
    );
    assert_eq!(rig.transport.state(), ConnectionState::Scanning);
    rig.transport.dispose();
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_connect_send_disconnect_cycle() {
    let Some(device) = get_device() else {
        println!("ROBOTOOTH_DEVICE not set, skipping");
        return;
    };
    let mut rig = rig().await;
    rig.transport.start_scan().unwrap();

    wait_for(&mut rig.rx, |n| {
        matches!(n, Notification::Discovered { peripheral } if peripheral.id.matches(device.as_str()))
    })
    .await;
    rig.transport.connect(&device).unwrap();
    wait_for(&mut rig.rx, |n| matches!(n, Notification::Ready { .. })).await;

    assert!(rig.transport.is_ready());
    rig.transport.send_text("robotooth\r\n").unwrap();

    rig.transport.read_signal_strength().unwrap();
    let rssi = wait_for(&mut rig.rx, |n| {
        matches!(n, Notification::SignalStrength { .. })
    })
    .await;
    println!("Signal: {:?}", rssi);

    rig.transport.disconnect();
    assert_eq!(rig.transport.state(), ConnectionState::Disconnected);
    rig.transport.dispose();
}
