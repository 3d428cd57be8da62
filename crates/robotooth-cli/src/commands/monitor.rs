//! Monitor command implementation.

use std::time::Duration;

use anyhow::Result;
use robotooth_core::{Notification, PeripheralId, WriteMode};

use super::send::emit;
use crate::cli::DataDisplay;
use crate::style;
use crate::util::Link;

pub async fn cmd_monitor(
    device: &PeripheralId,
    write_mode: WriteMode,
    timeout: Duration,
    display: DataDisplay,
    quiet: bool,
    no_color: bool,
) -> Result<()> {
    let mut link = Link::connect(device, write_mode, timeout, quiet).await?;
    if !quiet {
        eprintln!(
            "{}",
            style::format_success(
                &format!("Connected to {}. Press Ctrl-C to stop.", device),
                no_color
            )
        );
    }

    let result = loop {
        let notification = tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            notification = link.next() => notification,
        };
        match notification {
            Ok(Notification::DataReceived { data, .. }) => {
                if let Err(e) = emit(&data, display) {
                    break Err(e);
                }
            }
            Ok(Notification::Disconnected { peripheral, reason }) => {
                eprintln!(
                    "{}",
                    style::format_warning(
                        &format!("{} disconnected: {}", peripheral, reason),
                        no_color
                    )
                );
                break Ok(());
            }
            Ok(_) => {}
            Err(e) => break Err(e),
        }
    };

    link.close().await;
    result
}
