//! Send command implementation.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use robotooth_core::{Notification, PeripheralId, WriteMode};
use robotooth_types::parse_hex;
use tokio::time::Instant;

use crate::cli::{DataDisplay, PayloadArgs};
use crate::format::format_received;
use crate::style;
use crate::util::Link;

/// Bytes to write, decoded from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn from_args(args: &PayloadArgs) -> Result<Self> {
        let bytes = match (&args.hex, &args.text) {
            (Some(hex), _) => {
                parse_hex(hex).with_context(|| format!("Invalid hex payload '{}'", hex))?
            }
            (None, Some(text)) => text.as_bytes().to_vec(),
            (None, None) => bail!("Nothing to send. Use --hex or --text."),
        };
        if bytes.is_empty() {
            bail!("Nothing to send. The payload is empty.");
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

pub struct SendOptions {
    pub write_mode: WriteMode,
    pub timeout: Duration,
    pub listen: Option<Duration>,
    pub display: DataDisplay,
    pub quiet: bool,
    pub no_color: bool,
}

pub async fn cmd_send(device: &PeripheralId, payload: &Payload, opts: SendOptions) -> Result<()> {
    let mut link = Link::connect(device, opts.write_mode, opts.timeout, opts.quiet).await?;
    let result = send_and_listen(&mut link, device, payload, &opts).await;
    link.close().await;
    result
}

async fn send_and_listen(
    link: &mut Link,
    device: &PeripheralId,
    payload: &Payload,
    opts: &SendOptions,
) -> Result<()> {
    link.transport()
        .send(payload.as_bytes())
        .with_context(|| format!("Failed to send to {}", device))?;
    if !opts.quiet {
        eprintln!(
            "{}",
            style::format_success(
                &format!("Sent {} byte(s) to {}", payload.as_bytes().len(), device),
                opts.no_color
            )
        );
    }

    let Some(listen) = opts.listen else {
        return Ok(());
    };
    let deadline = Instant::now() + listen;
    loop {
        let notification = match tokio::time::timeout_at(deadline, link.next()).await {
            Ok(notification) => notification?,
            Err(_) => return Ok(()),
        };
        match notification {
            Notification::DataReceived { data, .. } => emit(&data, opts.display)?,
            Notification::Disconnected { peripheral, reason } => {
                if !opts.quiet {
                    eprintln!(
                        "{}",
                        style::format_warning(
                            &format!("{} disconnected: {}", peripheral, reason),
                            opts.no_color
                        )
                    );
                }
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Print received bytes to stdout as they arrive.
pub(crate) fn emit(data: &[u8], display: DataDisplay) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(format_received(data, display).as_bytes())?;
    stdout.flush()?;
    Ok(())
}
