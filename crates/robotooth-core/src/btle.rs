//! btleplug-backed [`Radio`].
//!
//! [`BtleRadio`] maps the request/event contract of [`Radio`] onto the
//! async btleplug API. Every request spawns a short tokio task on the
//! runtime the radio was created on, and every completion is sent as a
//! [`RadioEvent`] on the channel returned by [`BtleRadio::new`]. Feed that
//! channel into a transport with [`pump_events`].
//!
//! A long-lived task watches the adapter's central events for
//! discoveries, link loss and adapter power changes. All tasks stop when
//! the radio's [`CancellationToken`] is cancelled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{self, Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use robotooth_types::{PeripheralId, RadioState};

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::events::DisconnectReason;
use crate::radio::{Radio, RadioEvent, SessionToken};
use crate::transport::Transport;

/// Timeouts and buffering for [`BtleRadio`].
#[derive(Debug, Clone)]
pub struct BtleConfig {
    /// Timeout for establishing a link.
    pub connect_timeout: Duration,
    /// Timeout for service discovery.
    pub discovery_timeout: Duration,
    /// Timeout for writes, subscriptions and signal reads.
    pub operation_timeout: Duration,
    /// Capacity of the event channel.
    pub event_capacity: usize,
}

impl Default for BtleConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            discovery_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(5),
            event_capacity: 256,
        }
    }
}

impl BtleConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config tuned for the current platform.
    ///
    /// CoreBluetooth tends to be slower to connect and discover services.
    pub fn for_current_platform() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::default()
                .connect_timeout(Duration::from_secs(20))
                .discovery_timeout(Duration::from_secs(15))
        }
        #[cfg(not(target_os = "macos"))]
        {
            Self::default()
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the operation timeout.
    #[must_use]
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::RadioUnavailable(RadioState::Unsupported))
}

/// Format a btleplug peripheral id as a string.
///
/// On macOS peripheral ids are UUIDs; elsewhere they wrap a MAC address.
fn format_platform_id(id: &platform::PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Build the transport-level identity of a peripheral.
///
/// CoreBluetooth reports a zero address, so the platform id is used there.
fn identity_for(address: &str, id: &platform::PeripheralId) -> PeripheralId {
    if address == "00:00:00:00:00:00" {
        PeripheralId::new(format_platform_id(id))
    } else {
        PeripheralId::new(address)
    }
}

fn radio_state_from(state: CentralState) -> RadioState {
    match state {
        CentralState::PoweredOn => RadioState::PoweredOn,
        CentralState::PoweredOff => RadioState::PoweredOff,
        CentralState::Unknown => RadioState::Unknown,
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveScan {
    token: SessionToken,
    service: Uuid,
}

struct Shared {
    adapter: Adapter,
    events: mpsc::Sender<RadioEvent>,
    config: BtleConfig,
    cancel: CancellationToken,
    scan: Mutex<Option<ActiveScan>>,
    peripherals: Mutex<HashMap<PeripheralId, Peripheral>>,
    identities: Mutex<HashMap<platform::PeripheralId, PeripheralId>>,
    characteristics: Mutex<HashMap<PeripheralId, Vec<Characteristic>>>,
    notification_tasks: Mutex<HashMap<PeripheralId, JoinHandle<()>>>,
    /// Session each open link was connected under.
    links: Mutex<HashMap<PeripheralId, SessionToken>>,
    /// Disconnects still in flight; the next connect to the same peripheral waits on them.
    teardowns: Mutex<HashMap<PeripheralId, JoinHandle<()>>>,
}

impl Shared {
    async fn emit(&self, event: RadioEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }

    fn remember(&self, id: PeripheralId, peripheral: Peripheral) {
        self.identities.lock().insert(peripheral.id(), id.clone());
        self.peripherals.lock().insert(id, peripheral);
    }

    fn peripheral(&self, id: &PeripheralId) -> Result<Peripheral> {
        self.peripherals
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::connect_failed(id.clone(), ConnectionFailureReason::UnknownPeripheral))
    }

    fn characteristic(&self, id: &PeripheralId, uuid: Uuid) -> Option<Characteristic> {
        self.characteristics
            .lock()
            .get(id)
            .and_then(|chars| chars.iter().find(|c| c.uuid == uuid).cloned())
    }

    fn stop_notifications(&self, id: &PeripheralId) {
        if let Some(handle) = self.notification_tasks.lock().remove(id) {
            handle.abort();
        }
    }

    async fn identify(&self, peripheral: &Peripheral) -> Option<(PeripheralId, Option<i16>, Vec<Uuid>)> {
        let properties = match peripheral.properties().await {
            Ok(Some(properties)) => properties,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "Failed to read peripheral properties");
                return None;
            }
        };
        let id = identity_for(&properties.address.to_string(), &peripheral.id());
        Some((id, properties.rssi, properties.services))
    }

    async fn on_central_event(&self, event: CentralEvent) {
        match event {
            CentralEvent::DeviceDiscovered(pid) | CentralEvent::DeviceUpdated(pid) => {
                let Some(scan) = *self.scan.lock() else {
                    return;
                };
                let Ok(peripheral) = self.adapter.peripheral(&pid).await else {
                    return;
                };
                let Some((id, rssi, services)) = self.identify(&peripheral).await else {
                    return;
                };
                if !services.contains(&scan.service) {
                    return;
                }
                self.remember(id.clone(), peripheral);
                self.emit(RadioEvent::Discovered {
                    token: scan.token,
                    peripheral: id,
                    rssi,
                    already_connected: false,
                })
                .await;
            }
            CentralEvent::DeviceDisconnected(pid) => {
                let Some(id) = self.identities.lock().get(&pid).cloned() else {
                    return;
                };
                self.stop_notifications(&id);
                self.characteristics.lock().remove(&id);
                let token = self.links.lock().remove(&id).unwrap_or_default();
                info!(peripheral = %id, token = %token, "Link lost");
                self.emit(RadioEvent::Disconnected {
                    token,
                    peripheral: id,
                    reason: DisconnectReason::LinkLost,
                })
                .await;
            }
            CentralEvent::StateUpdate(state) => {
                self.emit(RadioEvent::StateChanged(radio_state_from(state)))
                    .await;
            }
            _ => {}
        }
    }

    /// Report peripherals the host already holds a link to.
    async fn report_connected(&self, scan: ActiveScan) {
        let peripherals = match self.adapter.peripherals().await {
            Ok(peripherals) => peripherals,
            Err(e) => {
                warn!(error = %e, "Failed to list known peripherals");
                return;
            }
        };
        for peripheral in peripherals {
            if !peripheral.is_connected().await.unwrap_or(false) {
                continue;
            }
            let Some((id, rssi, mut services)) = self.identify(&peripheral).await else {
                continue;
            };
            services.extend(peripheral.services().iter().map(|s| s.uuid));
            if !services.contains(&scan.service) {
                continue;
            }
            self.remember(id.clone(), peripheral);
            self.emit(RadioEvent::Discovered {
                token: scan.token,
                peripheral: id,
                rssi,
                already_connected: true,
            })
            .await;
        }
    }
}

/// [`Radio`] implementation over the host's first Bluetooth adapter.
pub struct BtleRadio {
    shared: Arc<Shared>,
    runtime: Handle,
    central_task: JoinHandle<()>,
}

impl std::fmt::Debug for BtleRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleRadio")
            .field("config", &self.shared.config)
            .field("known_peripherals", &self.shared.peripherals.lock().len())
            .field("scanning", &self.shared.scan.lock().is_some())
            .finish()
    }
}

impl BtleRadio {
    /// Open the first adapter and start watching its events.
    ///
    /// Must be called from within a tokio runtime. Returns the radio and
    /// the receiving end of its event channel.
    pub async fn new(config: BtleConfig) -> Result<(Self, mpsc::Receiver<RadioEvent>)> {
        let adapter = get_adapter().await?;
        Self::with_adapter(adapter, config).await
    }

    /// Like [`new`](Self::new), with an explicit adapter.
    pub async fn with_adapter(
        adapter: Adapter,
        config: BtleConfig,
    ) -> Result<(Self, mpsc::Receiver<RadioEvent>)> {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let mut central_events = adapter.events().await?;

        let initial_state = match adapter.adapter_state().await {
            Ok(state) => radio_state_from(state),
            Err(e) => {
                debug!(error = %e, "Adapter state not available");
                RadioState::Unknown
            }
        };

        let shared = Arc::new(Shared {
            adapter,
            events: tx,
            config,
            cancel: CancellationToken::new(),
            scan: Mutex::new(None),
            peripherals: Mutex::new(HashMap::new()),
            identities: Mutex::new(HashMap::new()),
            characteristics: Mutex::new(HashMap::new()),
            notification_tasks: Mutex::new(HashMap::new()),
            links: Mutex::new(HashMap::new()),
            teardowns: Mutex::new(HashMap::new()),
        });

        shared.emit(RadioEvent::StateChanged(initial_state)).await;

        let pump = Arc::clone(&shared);
        let central_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = pump.cancel.cancelled() => break,
                    event = central_events.next() => match event {
                        Some(event) => pump.on_central_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("Central event task stopped");
        });

        Ok((
            Self {
                shared,
                runtime: Handle::current(),
                central_task,
            },
            rx,
        ))
    }

    /// The adapter in use.
    pub fn adapter(&self) -> &Adapter {
        &self.shared.adapter
    }

    /// Token that stops every background task when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Stop all background tasks.
    pub fn shutdown(&self) {
        self.shared.cancel.cancel();
        self.central_task.abort();
        for (_, handle) in self.shared.notification_tasks.lock().drain() {
            handle.abort();
        }
    }

    fn spawn<F>(&self, task: impl FnOnce(Arc<Shared>) -> F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let future = task(Arc::clone(&self.shared));
        let cancel = self.shared.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = future => {}
            }
        })
    }
}

impl Drop for BtleRadio {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Radio for BtleRadio {
    fn request_scan(&self, token: SessionToken, service: Uuid) -> Result<()> {
        let scan = ActiveScan { token, service };
        *self.shared.scan.lock() = Some(scan);
        self.spawn(move |shared| async move {
            let filter = ScanFilter {
                services: vec![service],
            };
            if let Err(e) = shared.adapter.start_scan(filter).await {
                warn!(error = %e, "Failed to start scan");
                return;
            }
            info!(service = %service, "Scan started");
            shared.report_connected(scan).await;
        });
        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        if self.shared.scan.lock().take().is_none() {
            return Ok(());
        }
        self.spawn(|shared| async move {
            if let Err(e) = shared.adapter.stop_scan().await {
                debug!(error = %e, "Failed to stop scan");
            }
        });
        Ok(())
    }

    fn request_connect(&self, token: SessionToken, peripheral: &PeripheralId) -> Result<()> {
        let target = self.shared.peripheral(peripheral)?;
        let id = peripheral.clone();
        let teardown = self.shared.teardowns.lock().remove(peripheral);
        self.spawn(move |shared| async move {
            if let Some(teardown) = teardown {
                if let Err(e) = teardown.await {
                    debug!(peripheral = %id, error = %e, "Previous disconnect ended abnormally");
                }
            }
            let limit = shared.config.connect_timeout;
            let event = match timeout(limit, target.connect()).await {
                Ok(Ok(())) => {
                    info!(peripheral = %id, token = %token, "Connected");
                    shared.links.lock().insert(id.clone(), token);
                    RadioEvent::Connected {
                        token,
                        peripheral: id,
                    }
                }
                Ok(Err(e)) => RadioEvent::ConnectFailed {
                    token,
                    peripheral: id,
                    reason: ConnectionFailureReason::BleError(e.to_string()),
                },
                Err(_) => RadioEvent::ConnectFailed {
                    token,
                    peripheral: id,
                    reason: ConnectionFailureReason::Timeout,
                },
            };
            shared.emit(event).await;
        });
        Ok(())
    }

    fn request_disconnect(&self, token: SessionToken, peripheral: &PeripheralId) -> Result<()> {
        self.shared.stop_notifications(peripheral);
        self.shared.characteristics.lock().remove(peripheral);
        self.shared.links.lock().remove(peripheral);
        let target = self.shared.peripheral(peripheral)?;
        let id = peripheral.clone();
        let handle = self.spawn(move |shared| async move {
            if let Err(e) = target.disconnect().await {
                debug!(peripheral = %id, error = %e, "Disconnect failed (may already be closed)");
            }
            shared
                .emit(RadioEvent::Disconnected {
                    token,
                    peripheral: id,
                    reason: DisconnectReason::UserRequested,
                })
                .await;
        });
        self.shared
            .teardowns
            .lock()
            .insert(peripheral.clone(), handle);
        Ok(())
    }

    fn discover_attributes(
        &self,
        token: SessionToken,
        peripheral: &PeripheralId,
        service: Uuid,
    ) -> Result<()> {
        let target = self.shared.peripheral(peripheral)?;
        let id = peripheral.clone();
        self.spawn(move |shared| async move {
            let limit = shared.config.discovery_timeout;
            let failure = match timeout(limit, target.discover_services()).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(Error::timeout("discover services", limit).to_string()),
            };
            if let Some(reason) = failure {
                shared
                    .emit(RadioEvent::AttributeDiscoveryFailed {
                        token,
                        peripheral: id,
                        reason,
                    })
                    .await;
                return;
            }

            let found: Vec<Characteristic> = target
                .services()
                .into_iter()
                .filter(|s| s.uuid == service)
                .flat_map(|s| s.characteristics)
                .collect();
            debug!(peripheral = %id, count = found.len(), "Characteristics discovered");
            let characteristics = found.iter().map(|c| c.uuid).collect();
            shared.characteristics.lock().insert(id.clone(), found);
            shared
                .emit(RadioEvent::AttributesDiscovered {
                    token,
                    peripheral: id,
                    characteristics,
                })
                .await;
        });
        Ok(())
    }

    fn subscribe_notifications(
        &self,
        peripheral: &PeripheralId,
        characteristic: Uuid,
    ) -> Result<()> {
        let target = self.shared.peripheral(peripheral)?;
        let Some(chr) = self.shared.characteristic(peripheral, characteristic) else {
            return Err(Error::radio(format!(
                "characteristic {characteristic} not discovered on {peripheral}"
            )));
        };
        let id = peripheral.clone();
        let shared = Arc::clone(&self.shared);
        let handle = self.runtime.spawn(async move {
            if let Err(e) = target.subscribe(&chr).await {
                warn!(peripheral = %id, error = %e, "Failed to subscribe");
                return;
            }
            let mut stream = match target.notifications().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(peripheral = %id, error = %e, "Failed to open notification stream");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    notification = stream.next() => match notification {
                        Some(n) if n.uuid == characteristic => {
                            shared
                                .emit(RadioEvent::ValueUpdated {
                                    peripheral: id.clone(),
                                    characteristic,
                                    data: Bytes::from(n.value),
                                })
                                .await;
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        });
        if let Some(previous) = self
            .shared
            .notification_tasks
            .lock()
            .insert(peripheral.clone(), handle)
        {
            previous.abort();
        }
        Ok(())
    }

    fn write_bytes(
        &self,
        peripheral: &PeripheralId,
        characteristic: Uuid,
        data: Bytes,
        ack_requested: bool,
    ) -> Result<()> {
        let target = self.shared.peripheral(peripheral)?;
        let Some(chr) = self.shared.characteristic(peripheral, characteristic) else {
            return Err(Error::radio(format!(
                "characteristic {characteristic} not discovered on {peripheral}"
            )));
        };
        let write_type = if ack_requested {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        let id = peripheral.clone();
        self.spawn(move |shared| async move {
            let limit = shared.config.operation_timeout;
            match timeout(limit, target.write(&chr, &data, write_type)).await {
                Ok(Ok(())) => debug!(peripheral = %id, len = data.len(), "Write complete"),
                Ok(Err(e)) => warn!(peripheral = %id, error = %e, "Write failed"),
                Err(_) => warn!(peripheral = %id, "Write timed out"),
            }
        });
        Ok(())
    }

    fn read_signal_strength(&self, peripheral: &PeripheralId) -> Result<()> {
        let target = self.shared.peripheral(peripheral)?;
        let id = peripheral.clone();
        self.spawn(move |shared| async move {
            let limit = shared.config.operation_timeout;
            match timeout(limit, target.properties()).await {
                Ok(Ok(Some(properties))) => match properties.rssi {
                    Some(rssi) => {
                        shared
                            .emit(RadioEvent::SignalStrength {
                                peripheral: id,
                                rssi,
                            })
                            .await
                    }
                    None => debug!(peripheral = %id, "No signal strength reported"),
                },
                Ok(Ok(None)) => debug!(peripheral = %id, "No properties reported"),
                Ok(Err(e)) => warn!(peripheral = %id, error = %e, "Signal read failed"),
                Err(_) => warn!(peripheral = %id, "Signal read timed out"),
            }
        });
        Ok(())
    }
}

/// Forward radio events into `transport` until `cancel` fires or the
/// channel closes.
pub async fn pump_events<R: Radio>(
    transport: Arc<Transport<R>>,
    mut events: mpsc::Receiver<RadioEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => transport.handle_event(event),
                None => break,
            },
        }
    }
    debug!("Event pump stopped");
}
