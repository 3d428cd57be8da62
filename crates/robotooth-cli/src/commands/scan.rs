//! Scan command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use robotooth_core::TransportConfig;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::{FormatOptions, format_scan_json, format_scan_text};
use crate::style;
use crate::util::Link;

pub async fn cmd_scan(
    timeout: u64,
    format: OutputFormat,
    quiet: bool,
    opts: &FormatOptions,
    config: &Config,
) -> Result<()> {
    let link = Link::start(TransportConfig::default()).await?;
    link.transport()
        .start_scan()
        .context("Failed to start scan")?;

    // Show spinner for text output (unless quiet)
    let spinner = (!quiet && format == OutputFormat::Text).then(|| style::scanning_spinner(timeout));
    tokio::time::sleep(Duration::from_secs(timeout)).await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    link.transport().stop_scan().context("Failed to stop scan")?;
    let snapshot = link.transport().peripherals();
    link.close().await;

    let content = match format {
        OutputFormat::Json => format_scan_json(snapshot.as_slice(), config, opts)?,
        OutputFormat::Text => format_scan_text(snapshot.as_slice(), config, opts),
    };
    print!("{}", content);

    Ok(())
}
