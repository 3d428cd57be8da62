//! Visual styling utilities for the CLI.
//!
//! Spinners for the slow BLE phases and colored signal strength output.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use robotooth_core::SignalQuality;

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Create a spinner for scanning operations.
pub fn scanning_spinner(timeout_secs: u64) -> ProgressBar {
    spinner(format!(
        "Scanning for serial bridge modules... ({}s)",
        timeout_secs
    ))
}

/// Create a spinner for connecting to a device.
pub fn connecting_spinner(device: &str) -> ProgressBar {
    spinner(format!("Looking for {}...", device))
}

/// Format RSSI as a visual signal bar.
/// RSSI typically ranges from -100 dBm (weak) to -30 dBm (strong).
pub fn format_signal_bar(rssi: i16, no_color: bool) -> String {
    // -30 dBm = excellent (10), -100 dBm = very weak (0)
    let strength = ((rssi + 100).clamp(0, 70) as f32 / 7.0).round() as usize;
    let filled = strength.min(10);
    let empty = 10 - filled;

    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));

    if no_color {
        format!("{} {:>4}", bar, rssi)
    } else if filled >= 7 {
        format!("{} {:>4}", bar.green(), rssi)
    } else if filled >= 4 {
        format!("{} {:>4}", bar.yellow(), rssi)
    } else {
        format!("{} {:>4}", bar.red(), rssi)
    }
}

/// Short label for a signal quality band.
pub fn quality_label(quality: SignalQuality) -> &'static str {
    match quality {
        SignalQuality::Excellent => "Excellent",
        SignalQuality::Good => "Good",
        SignalQuality::Fair => "Fair",
        SignalQuality::Poor => "Poor",
    }
}

/// Signal quality label, colored by band.
pub fn format_quality_colored(quality: SignalQuality, no_color: bool) -> String {
    let label = quality_label(quality);
    if no_color {
        return label.to_string();
    }
    match quality {
        SignalQuality::Excellent | SignalQuality::Good => format!("{}", label.green()),
        SignalQuality::Fair => format!("{}", label.yellow()),
        SignalQuality::Poor => format!("{}", label.red()),
    }
}

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_bar_bounds() {
        assert_eq!(format_signal_bar(-30, true), "██████████  -30");
        assert_eq!(format_signal_bar(-110, true), "░░░░░░░░░░ -110");
        assert_eq!(format_signal_bar(0, true), "██████████    0");
    }

    #[test]
    fn test_quality_plain() {
        assert_eq!(
            format_quality_colored(SignalQuality::from_rssi(-50), true),
            "Excellent"
        );
        assert_eq!(
            format_quality_colored(SignalQuality::from_rssi(-90), true),
            "Poor"
        );
    }

    #[test]
    fn test_messages_plain() {
        assert_eq!(format_success("sent", true), "[OK] sent");
        assert_eq!(format_warning("lost", true), "[!!] lost");
    }
}
