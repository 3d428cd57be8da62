//! Output formatting for scan results, signal strength and received data.

use anyhow::Result;
use owo_colors::OwoColorize;
use robotooth_core::{DiscoveredPeripheral, SignalQuality};
use robotooth_types::format_hex;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::DataDisplay;
use crate::config::Config;
use crate::style;

/// Formatting options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool, compact: bool) -> Self {
        Self { no_color, compact }
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

// ============================================================================
// Scan formatting
// ============================================================================

#[derive(Serialize)]
struct PeripheralJson<'a> {
    id: &'a str,
    alias: Option<&'a str>,
    signal_strength: i16,
    quality: SignalQuality,
    connected: bool,
}

/// Format scan results as JSON, in registry order (weakest first).
pub fn format_scan_json(
    peripherals: &[DiscoveredPeripheral],
    config: &Config,
    opts: &FormatOptions,
) -> Result<String> {
    #[derive(Serialize)]
    struct ScanResult<'a> {
        count: usize,
        peripherals: Vec<PeripheralJson<'a>>,
    }

    let result = ScanResult {
        count: peripherals.len(),
        peripherals: peripherals
            .iter()
            .map(|p| PeripheralJson {
                id: p.id.as_str(),
                alias: config.alias_for(p.id.as_str()),
                signal_strength: p.signal_strength,
                quality: p.signal_quality(),
                connected: p.connected,
            })
            .collect(),
    };

    opts.as_json(&result)
}

/// Format scan results as a table, in registry order (weakest first).
#[must_use]
pub fn format_scan_text(
    peripherals: &[DiscoveredPeripheral],
    config: &Config,
    opts: &FormatOptions,
) -> String {
    #[derive(Tabled)]
    struct PeripheralRow {
        #[tabled(rename = "Identifier")]
        id: String,
        #[tabled(rename = "Alias")]
        alias: String,
        #[tabled(rename = "Signal")]
        signal: String,
        #[tabled(rename = "Quality")]
        quality: String,
        #[tabled(rename = "Connected")]
        connected: &'static str,
    }

    if peripherals.is_empty() {
        return "No serial bridge modules found.\n".to_string();
    }

    let count = if opts.no_color {
        peripherals.len().to_string()
    } else {
        format!("{}", peripherals.len().to_string().green().bold())
    };
    let header = format!("Found {} peripheral(s)\n\n", count);

    let rows: Vec<PeripheralRow> = peripherals
        .iter()
        .map(|p| PeripheralRow {
            id: if opts.no_color {
                p.id.to_string()
            } else {
                format!("{}", p.id.as_str().cyan())
            },
            alias: config
                .alias_for(p.id.as_str())
                .unwrap_or("-")
                .to_string(),
            signal: style::format_signal_bar(p.signal_strength, opts.no_color),
            quality: style::format_quality_colored(p.signal_quality(), opts.no_color),
            connected: if p.connected { "yes" } else { "no" },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!("{}{}\n", header, table)
}

// ============================================================================
// Signal strength formatting
// ============================================================================

/// One-line signal strength report.
#[must_use]
pub fn format_rssi_text(device: &str, rssi: i16, opts: &FormatOptions) -> String {
    let quality = SignalQuality::from_rssi(rssi);
    format!(
        "{}: {} dBm ({})\n",
        device,
        rssi,
        style::format_quality_colored(quality, opts.no_color)
    )
}

pub fn format_rssi_json(device: &str, rssi: i16, opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct RssiJson<'a> {
        device: &'a str,
        rssi: i16,
        quality: SignalQuality,
        description: &'static str,
    }

    let quality = SignalQuality::from_rssi(rssi);
    opts.as_json(&RssiJson {
        device,
        rssi,
        quality,
        description: quality.description(),
    })
}

// ============================================================================
// Received data
// ============================================================================

/// Render one chunk of received bytes.
#[must_use]
pub fn format_received(data: &[u8], display: DataDisplay) -> String {
    match display {
        DataDisplay::Text => String::from_utf8_lossy(data).into_owned(),
        DataDisplay::Hex => format!("{}\n", format_hex(data)),
    }
}
