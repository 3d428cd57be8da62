//! Example: Serial Echo
//!
//! Connects to a serial bridge module, sends a line of text and prints
//! whatever comes back for a few seconds.
//!
//! Run with: `cargo run --example serial_echo -- <DEVICE_ID> [TEXT]`

use std::sync::Arc;
use std::time::Duration;

use robotooth_core::{
    BtleConfig, BtleRadio, ChannelObserver, Notification, Observer, PeripheralId, Transport,
    TransportConfig, pump_events,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(device) = args.next() else {
        eprintln!("Usage: serial_echo <DEVICE_ID> [TEXT]");
        std::process::exit(2);
    };
    let text = args.next().unwrap_or_else(|| "hello".to_string());
    let device = PeripheralId::new(device);

    let (radio, events) = BtleRadio::new(BtleConfig::for_current_platform()).await?;
    let cancel = radio.cancellation_token();
    let transport = Arc::new(Transport::new(radio, TransportConfig::default())?);

    let channel = Arc::new(ChannelObserver::default());
    let mut rx = channel.subscribe();
    let observer: Arc<dyn Observer> = channel;
    transport.set_observer(&observer);
    tokio::spawn(pump_events(Arc::clone(&transport), events, cancel));

    println!("Looking for {}...", device);
    transport.start_scan()?;

    let session = async {
        while let Ok(notification) = rx.recv().await {
            match notification {
                Notification::Discovered { peripheral } if peripheral.id.matches(device.as_str()) => {
                    if !transport.state().has_target() {
                        transport.connect(&peripheral.id)?;
                    }
                }
                Notification::Ready { peripheral } => {
                    println!("Connected to {}", peripheral);
                    transport.send_text(&text)?;
                }
                Notification::DataReceived { data, .. } => {
                    println!("< {}", String::from_utf8_lossy(&data));
                }
                Notification::ConnectFailed { reason, .. } => {
                    println!("Connect failed: {}", reason);
                    break;
                }
                Notification::Disconnected { reason, .. } => {
                    println!("Disconnected: {}", reason);
                    break;
                }
                _ => {}
            }
        }
        Ok::<(), robotooth_core::Error>(())
    };

    match tokio::time::timeout(Duration::from_secs(30), session).await {
        Ok(result) => result?,
        Err(_) => println!("Done."),
    }

    transport.disconnect();
    transport.dispose();
    Ok(())
}
