//! Command implementations for the CLI.

mod config;
mod monitor;
mod rssi;
mod scan;
mod send;

pub use config::cmd_config;
pub use monitor::cmd_monitor;
pub use rssi::cmd_rssi;
pub use scan::cmd_scan;
pub use send::{Payload, SendOptions, cmd_send};
