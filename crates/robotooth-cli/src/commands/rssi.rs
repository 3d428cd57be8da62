//! Signal strength command implementation.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use robotooth_core::{Notification, PeripheralId, WriteMode};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_rssi_json, format_rssi_text};
use crate::util::Link;

/// How long to wait for the platform to answer a signal strength read.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn cmd_rssi(
    device: &PeripheralId,
    write_mode: WriteMode,
    timeout: Duration,
    format: OutputFormat,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let mut link = Link::connect(device, write_mode, timeout, quiet).await?;
    let result = read_rssi(&mut link).await;
    link.close().await;
    let rssi = result?;

    let content = match format {
        OutputFormat::Json => format_rssi_json(device.as_str(), rssi, opts)?,
        OutputFormat::Text => format_rssi_text(device.as_str(), rssi, opts),
    };
    print!("{}", content);
    Ok(())
}

async fn read_rssi(link: &mut Link) -> Result<i16> {
    link.transport()
        .read_signal_strength()
        .context("Failed to request signal strength")?;

    tokio::time::timeout(READ_TIMEOUT, wait_for_rssi(link))
        .await
        .context("Timed out waiting for signal strength")?
}

async fn wait_for_rssi(link: &mut Link) -> Result<i16> {
    loop {
        match link.next().await? {
            Notification::SignalStrength { rssi, .. } => return Ok(rssi),
            Notification::Disconnected { peripheral, reason } => {
                bail!("{} disconnected: {}", peripheral, reason)
            }
            _ => {}
        }
    }
}
