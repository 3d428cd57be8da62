//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// How received bytes are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DataDisplay {
    /// Lossy UTF-8 text
    #[default]
    Text,
    /// Space-separated hex bytes
    Hex,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device identifier (MAC address or UUID) or alias, or use ROBOTOOTH_DEVICE env var
    #[arg(short, long, env = "ROBOTOOTH_DEVICE")]
    pub device: Option<String>,

    /// Seconds to wait for the device to appear and become ready
    #[arg(short = 'T', long, default_value = "30")]
    pub timeout: u64,

    /// Acknowledge every write (slower, for modules that drop write commands)
    #[arg(long)]
    pub with_response: bool,
}

/// Bytes to send. Exactly one source is required.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct PayloadArgs {
    /// Hex bytes, e.g. "5F" or "0x01 0xff"
    #[arg(long)]
    pub hex: Option<String>,

    /// UTF-8 text
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Parser)]
#[command(name = "robotooth")]
#[command(author, version, about = "CLI for serial-over-BLE bridge modules", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby serial bridge modules
    Scan {
        /// Scan timeout in seconds (defaults to the configured scan timeout, then 10)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Connect to a device and send bytes
    Send {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        payload: PayloadArgs,

        /// Print received data for this many seconds after sending
        #[arg(short, long)]
        listen: Option<u64>,

        /// How received data is printed
        #[arg(long, value_enum, default_value = "text")]
        display: DataDisplay,
    },

    /// Connect to a device and print received data until Ctrl-C
    Monitor {
        #[command(flatten)]
        device: DeviceArgs,

        /// How received data is printed
        #[arg(long, value_enum, default_value = "text")]
        display: DataDisplay,
    },

    /// Connect to a device and print its signal strength
    Rssi {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show configuration file path
    Path,

    /// Show current configuration
    Show,

    /// Set the default device
    SetDevice {
        /// Device identifier or alias
        device: String,
    },

    /// Clear the default device
    UnsetDevice,

    /// Set a device alias
    Alias {
        /// Friendly name for the device (e.g., "rover", "arm")
        name: String,

        /// Device identifier (MAC address or UUID)
        device: String,
    },

    /// Remove a device alias
    #[command(alias = "rm-alias")]
    Unalias {
        /// Alias name to remove
        name: String,
    },
}
