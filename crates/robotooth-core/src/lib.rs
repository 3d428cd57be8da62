//! Serial-over-BLE transport for HM-10 style bridge modules.
//!
//! This crate discovers, connects to and exchanges byte streams with a
//! single peripheral exposing a serial service (`FFE0`) and a writable,
//! notifying characteristic (`FFE1`). It is built around three pieces:
//!
//! - **[`DeviceRegistry`]**: peripherals seen in the current scan session,
//!   one entry per identity, ordered by signal strength
//! - **[`Session`]**: the connection state machine, the single owner of
//!   lifecycle state
//! - **[`Transport`]**: the public facade callers drive, which forwards
//!   lifecycle and data events to one [`Observer`]
//!
//! The platform Bluetooth stack sits behind the [`Radio`] trait. The
//! [`BtleRadio`] backend implements it with btleplug; [`MockRadio`] records
//! requests for tests.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Scanning -> Connecting -> ResolvingAttributes -> Ready
//! ```
//!
//! A failed connect or attribute resolution ends in `Failed`, a closed link
//! in `Disconnected`. Both are left only by starting a new scan. A radio
//! power-off resets everything to `Idle`.
//!
//! # Platform Differences
//!
//! - **macOS**: peripherals are identified by a CoreBluetooth UUID that is
//!   stable per host but differs between machines.
//! - **Linux/Windows**: peripherals are identified by their MAC address
//!   (e.g., `AA:BB:CC:DD:EE:FF`).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use robotooth_core::{
//!     BtleConfig, BtleRadio, ChannelObserver, Notification, Observer, Transport,
//!     TransportConfig, pump_events,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (radio, events) = BtleRadio::new(BtleConfig::default()).await?;
//!     let cancel = radio.cancellation_token();
//!     let transport = Arc::new(Transport::new(radio, TransportConfig::default())?);
//!
//!     let observer = Arc::new(ChannelObserver::default());
//!     let mut rx = observer.subscribe();
//!     let as_dyn: Arc<dyn Observer> = observer.clone();
//!     transport.set_observer(&as_dyn);
//!     tokio::spawn(pump_events(Arc::clone(&transport), events, cancel));
//!
//!     transport.start_scan()?;
//!     while let Ok(notification) = rx.recv().await {
//!         match notification {
//!             Notification::Discovered { peripheral } if !transport.state().has_target() => {
//!                 transport.connect(&peripheral.id)?
//!             }
//!             Notification::Ready { .. } => {
//!                 transport.send(&[0x5F])?;
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!     transport.dispose();
//!     Ok(())
//! }
//! ```

pub mod btle;
pub mod config;
pub mod error;
pub mod events;
pub mod mock;
pub mod radio;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export types and uuid modules from robotooth-types
pub use robotooth_types::types;
pub use robotooth_types::uuid as uuids;

pub use btle::{BtleConfig, BtleRadio, get_adapter, pump_events};
pub use config::{TransportConfig, WriteMode};
pub use error::{ConnectionFailureReason, Error, Result};
pub use events::{
    ChannelObserver, DisconnectReason, EventDispatcher, Notification, NotificationReceiver,
    NotificationSender, Observer,
};
pub use mock::{MockRadio, RadioCall};
pub use radio::{Radio, RadioEvent, SessionToken};
pub use registry::{DeviceRegistry, Snapshot};
pub use session::Session;
pub use transport::Transport;

// Re-export commonly used types from robotooth-types
pub use robotooth_types::{
    ConnectionState, DiscoveredPeripheral, PeripheralId, RadioState, SignalQuality,
};

/// Type alias for a transport shared between the caller and an event pump.
pub type SharedTransport<R> = std::sync::Arc<Transport<R>>;
