//! Command-line interface for serial-over-BLE bridge modules.
//!
//! The `robotooth` binary drives HM-10 style modules (serial service
//! `FFE0`, characteristic `FFE1`) through [`robotooth_core`].
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Scan for nearby modules, weakest signal first |
//! | `send` | Connect, send hex or text, optionally listen for replies |
//! | `monitor` | Connect and print received data until Ctrl-C |
//! | `rssi` | Connect and print the link's signal strength |
//! | `config` | Manage the default device and aliases |
//! | `completions` | Generate shell completions |
//!
//! # Configuration
//!
//! The CLI stores configuration in `~/.config/robotooth/config.toml` (or
//! platform equivalent):
//!
//! - `device`: Default device identifier or alias
//! - `scan_timeout`: Default scan duration in seconds
//! - `with_response`: Acknowledge every write
//! - `no_color`: Disable colored output
//! - `aliases`: Friendly name to device identifier map
//!
//! # Environment Variables
//!
//! - `ROBOTOOTH_DEVICE`: Default device (overridden by `--device`)
//! - `NO_COLOR`: Disable colored output when set
//! - `RUST_LOG`: Log filter when neither `--verbose` nor `--quiet` is given
//!
//! # Examples
//!
//! ```bash
//! robotooth scan --timeout 5
//! robotooth config alias rover AA:BB:CC:DD:EE:FF
//! robotooth send --device rover --hex 5F
//! robotooth send --device rover --text "AT\r\n" --listen 3
//! robotooth monitor --device rover --display hex
//! ```

// The binary lives in main.rs; this target re-exports the libraries it
// drives for programmatic use.
pub use robotooth_core;
pub use robotooth_types;
