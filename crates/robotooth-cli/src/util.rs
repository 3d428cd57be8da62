//! Utility functions for CLI operations.
//!
//! [`Link`] wires a btleplug radio, a transport, a channel observer and the
//! event pump together so commands only deal with notifications.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use robotooth_core::{
    BtleConfig, BtleRadio, ChannelObserver, Notification, NotificationReceiver, Observer,
    PeripheralId, SharedTransport, Transport, TransportConfig, WriteMode, pump_events,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Config, resolve_device, update_last_device};
use crate::style;

/// Notification buffer for CLI sessions.
const NOTIFICATION_CAPACITY: usize = 256;

/// Resolve the device to talk to, with a helpful error message.
pub fn require_device(device: Option<String>, config: &Config) -> Result<PeripheralId> {
    let device = resolve_device(device, config).ok_or_else(|| {
        anyhow::anyhow!(
            "No device specified. Use --device <ID>, set ROBOTOOTH_DEVICE, or run \
             'robotooth config set-device <ID>'.\n\
             Run 'robotooth scan' to find nearby modules."
        )
    })?;
    device
        .parse::<PeripheralId>()
        .with_context(|| format!("Invalid device identifier '{}'", device))
}

/// Write mode from the command line flag or the config default.
pub fn write_mode(with_response: bool, config: &Config) -> WriteMode {
    if with_response || config.with_response {
        WriteMode::WithResponse
    } else {
        WriteMode::WithoutResponse
    }
}

/// A running transport with its event pump and notification stream.
pub struct Link {
    transport: SharedTransport<BtleRadio>,
    rx: NotificationReceiver,
    _observer: Arc<dyn Observer>,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl Link {
    /// Open the default adapter and start pumping its events.
    pub async fn start(config: TransportConfig) -> Result<Self> {
        let (radio, events) = BtleRadio::new(BtleConfig::for_current_platform())
            .await
            .context("Failed to open Bluetooth adapter")?;
        let cancel = radio.cancellation_token();
        let transport = Arc::new(Transport::new(radio, config)?);

        let channel = Arc::new(ChannelObserver::new(NOTIFICATION_CAPACITY));
        let rx = channel.subscribe();
        let observer: Arc<dyn Observer> = channel;
        transport.set_observer(&observer);

        let pump = tokio::spawn(pump_events(
            Arc::clone(&transport),
            events,
            cancel.clone(),
        ));

        Ok(Self {
            transport,
            rx,
            _observer: observer,
            cancel,
            pump,
        })
    }

    /// Start a link and connect it to `device`.
    pub async fn connect(
        device: &PeripheralId,
        write_mode: WriteMode,
        wait: Duration,
        quiet: bool,
    ) -> Result<Self> {
        let mut link = Self::start(TransportConfig::default().write_mode(write_mode)).await?;

        let spinner = (!quiet).then(|| style::connecting_spinner(device.as_str()));
        let result = tokio::time::timeout(wait, link.wait_until_ready(device)).await;
        if let Some(sp) = spinner {
            sp.finish_and_clear();
        }

        let outcome = match result {
            Ok(Ok(peripheral)) => {
                if let Err(e) = update_last_device(peripheral.as_str()) {
                    debug!(error = %e, "Could not record last device");
                }
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow::anyhow!(
                "Timed out after {}s waiting for {}.\n\
                 Make sure the module is powered on and in range.",
                wait.as_secs(),
                device
            )),
        };

        match outcome {
            Ok(()) => Ok(link),
            Err(e) => {
                link.close().await;
                Err(e)
            }
        }
    }

    async fn wait_until_ready(&mut self, device: &PeripheralId) -> Result<PeripheralId> {
        self.transport
            .start_scan()
            .context("Failed to start scan")?;

        loop {
            match self.next().await? {
                Notification::Discovered { peripheral }
                    if peripheral.id.matches(device.as_str()) =>
                {
                    if !self.transport.state().has_target() {
                        debug!(peripheral = %peripheral.id, rssi = peripheral.signal_strength, "Target found");
                        self.transport
                            .connect(&peripheral.id)
                            .with_context(|| format!("Failed to connect to {}", peripheral.id))?;
                    }
                }
                Notification::Connected { peripheral } => {
                    debug!(%peripheral, "Link up, resolving serial characteristic");
                }
                Notification::Ready { peripheral } => return Ok(peripheral),
                Notification::ConnectFailed { peripheral, reason } => {
                    bail!("Failed to connect to {}: {}", peripheral, reason)
                }
                Notification::Disconnected { peripheral, reason } => {
                    bail!("{} disconnected during setup: {}", peripheral, reason)
                }
                Notification::StateChanged { state } if state.is_off() => {
                    bail!("Bluetooth adapter is {}", state)
                }
                _ => {}
            }
        }
    }

    /// The transport being driven.
    pub fn transport(&self) -> &Transport<BtleRadio> {
        &self.transport
    }

    /// Next notification. Lagging receivers skip what they missed.
    pub async fn next(&mut self) -> Result<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Ok(notification),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification receiver lagged");
                }
                Err(RecvError::Closed) => bail!("Notification channel closed"),
            }
        }
    }

    /// Disconnect, dispose the transport and stop the event pump.
    pub async fn close(self) {
        self.transport.disconnect();
        self.transport.dispose();
        self.cancel.cancel();
        if let Err(e) = self.pump.await {
            debug!(error = %e, "Event pump task ended abnormally");
        }
    }
}
