//! Transport facade.
//!
//! [`Transport`] is the public send/receive surface. It owns the session,
//! the registry and the observer slot, and is driven from two sides:
//! callers invoke operations, and the platform radio delivers
//! [`RadioEvent`]s through [`Transport::handle_event`].
//!
//! Every operation and event runs under one `parking_lot` mutex. Radio
//! requests are issued while the lock is held. Observer notifications are
//! queued before it is released and delivered afterwards, in lock order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use robotooth_types::{ConnectionState, PeripheralId, RadioState};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, Observer};
use crate::radio::{Radio, RadioEvent};
use crate::registry::{DeviceRegistry, Snapshot};
use crate::session::{Context, Notifications, Session};

/// Serial-over-BLE transport for a single peripheral.
///
/// Share it as `Arc<Transport<R>>` between the caller and whatever feeds
/// radio events in. There is no global instance; call
/// [`dispose`](Self::dispose) when done.
///
/// # Example
///
/// ```
/// use robotooth_core::{MockRadio, RadioEvent, Transport, TransportConfig};
/// use robotooth_types::{ConnectionState, PeripheralId};
///
/// let transport = Transport::new(MockRadio::new(), TransportConfig::default()).unwrap();
/// transport.start_scan().unwrap();
///
/// let token = transport.radio().last_token();
/// transport.handle_event(RadioEvent::Discovered {
///     token,
///     peripheral: PeripheralId::new("HMSoft"),
///     rssi: Some(-52),
///     already_connected: false,
/// });
///
/// assert_eq!(transport.peripherals().len(), 1);
/// transport.connect(&PeripheralId::new("HMSoft")).unwrap();
/// assert_eq!(transport.state(), ConnectionState::Connecting);
/// ```
pub struct Transport<R: Radio> {
    radio: R,
    config: TransportConfig,
    session: Mutex<Session>,
    registry: DeviceRegistry,
    dispatcher: EventDispatcher,
    disposed: AtomicBool,
}

impl<R: Radio> std::fmt::Debug for Transport<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session.lock();
        f.debug_struct("Transport")
            .field("state", &session.state())
            .field("target", &session.target())
            .field("radio_state", &session.radio_state())
            .field("peripherals", &self.registry.len())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<R: Radio> Transport<R> {
    /// Create a transport over `radio`.
    pub fn new(radio: R, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            radio,
            config,
            session: Mutex::new(Session::new()),
            registry: DeviceRegistry::new(),
            dispatcher: EventDispatcher::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// The platform radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// The configuration in use.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Register the observer, replacing any previous one.
    ///
    /// Only a weak reference is kept; the caller owns the observer.
    pub fn set_observer(&self, observer: &Arc<dyn Observer>) {
        self.dispatcher.set_observer(observer);
    }

    /// Remove the observer.
    pub fn clear_observer(&self) {
        self.dispatcher.clear_observer();
    }

    fn context(&self) -> Context<'_> {
        Context {
            radio: &self.radio,
            registry: &self.registry,
            config: &self.config,
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }

    fn publish(&self, session: MutexGuard<'_, Session>, notifications: Notifications) {
        self.dispatcher.enqueue(notifications);
        drop(session);
        self.dispatcher.flush();
    }

    /// Open a new scan session for the configured service.
    ///
    /// The registry is cleared first. Fails with
    /// [`Error::RadioUnavailable`] if the radio is known to be unusable and
    /// with [`Error::AlreadyInProgress`] while a connection is pending or up.
    #[tracing::instrument(level = "info", skip_all, fields(service = %self.config.service))]
    pub fn start_scan(&self) -> Result<()> {
        self.ensure_alive()?;
        self.session.lock().start_scan(self.context())
    }

    /// Stop the platform scan. The state stays `Scanning`.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn stop_scan(&self) -> Result<()> {
        self.ensure_alive()?;
        self.session.lock().stop_scan(self.context())
    }

    /// Connect to `peripheral`.
    ///
    /// Only legal while scanning. Completion is reported through
    /// `on_connected` and `on_ready`, or `on_connect_failed`.
    #[tracing::instrument(level = "info", skip_all, fields(peripheral = %peripheral))]
    pub fn connect(&self, peripheral: &PeripheralId) -> Result<()> {
        self.ensure_alive()?;
        self.session.lock().connect(peripheral, self.context())
    }

    /// Close the current scan or connection. Always safe to call.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn disconnect(&self) {
        if self.ensure_alive().is_err() {
            return;
        }
        let mut session = self.session.lock();
        let notifications = session.disconnect(self.context());
        self.publish(session, notifications);
    }

    /// Send raw bytes. Fails with [`Error::NotReady`] outside `Ready`.
    #[tracing::instrument(level = "debug", skip_all, fields(len = data.len()))]
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.ensure_alive()?;
        self.session
            .lock()
            .send(Bytes::copy_from_slice(data), self.context())
    }

    /// Send a string as UTF-8.
    pub fn send_text(&self, text: &str) -> Result<()> {
        self.send(text.as_bytes())
    }

    /// Request the link's signal strength; the answer arrives as
    /// `on_signal_strength`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn read_signal_strength(&self) -> Result<()> {
        self.ensure_alive()?;
        self.session.lock().read_signal_strength(self.context())
    }

    /// Whether data can be sent.
    pub fn is_ready(&self) -> bool {
        self.session.lock().is_ready()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.session.lock().state()
    }

    /// Peripheral targeted by the current connection.
    pub fn target(&self) -> Option<PeripheralId> {
        self.session.lock().target().cloned()
    }

    /// Last reported radio state.
    pub fn radio_state(&self) -> RadioState {
        self.session.lock().radio_state()
    }

    /// Peripherals discovered in the current scan session, weakest first.
    pub fn peripherals(&self) -> Snapshot {
        self.registry.snapshot()
    }

    /// Feed a platform radio event into the state machine.
    ///
    /// Stale events are logged at debug level and dropped.
    pub fn handle_event(&self, event: RadioEvent) {
        if self.ensure_alive().is_err() {
            debug!(kind = event.kind(), "Event after dispose dropped");
            return;
        }
        let kind = event.kind();
        let mut session = self.session.lock();
        let result = session.apply(event, self.context());
        match result {
            Ok(notifications) => self.publish(session, notifications),
            Err(Error::StaleEvent) => debug!(kind, "Stale radio event dropped"),
            Err(e) => debug!(kind, error = %e, "Radio event rejected"),
        }
    }

    /// Tear down scan and link, clear the registry and drop the observer.
    ///
    /// Subsequent operations fail with [`Error::Disposed`]. Calling this
    /// more than once is harmless.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.session.lock().reset(self.context());
        self.dispatcher.clear_observer();
        info!("Transport disposed");
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelObserver, Notification};
    use crate::mock::MockRadio;

    fn transport() -> Transport<MockRadio> {
        Transport::new(MockRadio::new(), TransportConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = TransportConfig::default().service(uuid::Uuid::nil());
        assert!(matches!(
            Transport::new(MockRadio::new(), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dispose_blocks_operations() {
        let transport = transport();
        transport.start_scan().unwrap();
        transport.dispose();
        transport.dispose();

        assert!(transport.is_disposed());
        assert_eq!(transport.state(), ConnectionState::Idle);
        assert!(matches!(transport.start_scan(), Err(Error::Disposed)));
        assert!(matches!(transport.send(&[1]), Err(Error::Disposed)));
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_dispatches_through_weak_observer() {
        let transport = transport();
        let observer = Arc::new(ChannelObserver::new(4));
        let mut rx = observer.subscribe();
        let as_dyn: Arc<dyn Observer> = observer.clone();
        transport.set_observer(&as_dyn);

        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        assert_eq!(
            rx.recv().await.unwrap(),
            Notification::StateChanged {
                state: RadioState::PoweredOn
            }
        );

        drop(as_dyn);
        drop(observer);
        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOff));
        assert_eq!(transport.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_debug_output() {
        let debug = format!("{:?}", transport());
        assert!(debug.contains("Transport"));
        assert!(debug.contains("Idle"));
    }
}
