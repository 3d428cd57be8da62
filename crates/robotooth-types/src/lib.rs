//! Platform-agnostic types for serial-over-BLE bridge peripherals.
//!
//! This crate provides the shared vocabulary used by `robotooth-core`
//! and by callers that only need to describe peripherals without
//! pulling in a Bluetooth stack.
//!
//! # Features
//!
//! - Peripheral identities and discovery records
//! - Connection and radio state enums
//! - UUID constants for the serial bridge service
//! - Hex payload parsing for command-line callers
//!
//! # Example
//!
//! ```
//! use robotooth_types::{DiscoveredPeripheral, PeripheralId, SignalQuality};
//!
//! let peripheral = DiscoveredPeripheral::new(PeripheralId::new("AA:BB:CC:DD:EE:FF"), -58);
//! assert_eq!(peripheral.signal_quality(), SignalQuality::Excellent);
//! ```

pub mod error;
pub mod payload;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use payload::{format_hex, parse_hex};
pub use types::{ConnectionState, DiscoveredPeripheral, PeripheralId, RadioState, SignalQuality};
pub use uuid as uuids;
