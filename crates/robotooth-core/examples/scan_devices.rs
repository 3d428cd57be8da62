//! Example: Scanning for Serial Bridge Modules
//!
//! This example scans for peripherals advertising the `FFE0` serial
//! service (HM-10 and compatible modules) and prints them ordered by
//! signal strength, strongest last.
//!
//! Run with: `cargo run --example scan_devices`

use std::sync::Arc;
use std::time::Duration;

use robotooth_core::{BtleConfig, BtleRadio, Transport, TransportConfig, pump_events};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let (radio, events) = BtleRadio::new(BtleConfig::default()).await?;
    let cancel = radio.cancellation_token();
    let transport = Arc::new(Transport::new(radio, TransportConfig::default())?);
    tokio::spawn(pump_events(Arc::clone(&transport), events, cancel));

    println!("Scanning for serial modules...");
    println!();

    transport.start_scan()?;
    tokio::time::sleep(Duration::from_secs(10)).await;
    transport.stop_scan()?;

    let peripherals = transport.peripherals();
    if peripherals.is_empty() {
        println!("No serial modules found.");
        println!();
        println!("Make sure:");
        println!("  - The module is powered and not connected to another host");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The module is within range");
    } else {
        println!("Found {} module(s):", peripherals.len());
        println!();

        for p in &peripherals {
            println!("  {}", p.id);
            println!("    RSSI: {} dBm ({})", p.signal_strength, p.signal_quality().description());
            if p.connected {
                println!("    Already connected to this host");
            }
            println!();
        }
    }

    transport.dispose();
    Ok(())
}
