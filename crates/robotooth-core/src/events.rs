//! Observer interface and event dispatch.
//!
//! The transport reports lifecycle and data events to at most one
//! [`Observer`]. The [`EventDispatcher`] only holds a weak reference, so
//! dropping the observer is enough to stop notifications.
//!
//! Notifications are queued in the order the session produced them and
//! delivered by one thread at a time, so an observer never sees a later
//! transition before an earlier one.
//!
//! Async callers that would rather await events than implement a trait
//! can register a [`ChannelObserver`], which forwards every call as a
//! serializable [`Notification`] on a broadcast channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use robotooth_types::{DiscoveredPeripheral, PeripheralId, RadioState};

use crate::error::ConnectionFailureReason;

/// Reason for disconnection.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Normal disconnection requested by the caller.
    UserRequested,
    /// Peripheral went out of range or closed the link.
    LinkLost,
    /// BLE error occurred.
    BleError(String),
    /// Unknown reason.
    Unknown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserRequested => write!(f, "requested by user"),
            Self::LinkLost => write!(f, "link lost"),
            Self::BleError(msg) => write!(f, "BLE error: {}", msg),
            Self::Unknown => write!(f, "unknown reason"),
        }
    }
}

/// Receiver of transport notifications.
///
/// Methods run synchronously on whichever thread is delivering, after the
/// transport has released its state lock, so an observer may call back
/// into the transport. Notifications raised by such a call are delivered
/// after the current method returns.
///
/// `on_state_changed`, `on_disconnected` and `on_connect_failed` are
/// mandatory. Every other method defaults to a no-op.
pub trait Observer: Send + Sync {
    /// Host radio state changed. A powered-off radio has already reset the
    /// transport to `Idle` when this is called.
    fn on_state_changed(&self, state: RadioState);

    /// The link to `peripheral` was closed, by the caller or the platform.
    fn on_disconnected(&self, peripheral: &PeripheralId, reason: &DisconnectReason);

    /// Connecting to `peripheral` failed, either at link level or because the
    /// serial characteristic could not be resolved.
    fn on_connect_failed(&self, peripheral: &PeripheralId, reason: &ConnectionFailureReason);

    /// A peripheral was discovered or re-discovered during a scan.
    fn on_discovered(&self, _peripheral: &DiscoveredPeripheral) {}

    /// The link is up; attribute discovery has started.
    fn on_connected(&self, _peripheral: &PeripheralId) {}

    /// The serial characteristic is resolved and subscribed.
    fn on_ready(&self, _peripheral: &PeripheralId) {}

    /// Bytes received from the peripheral.
    fn on_data_received(&self, _peripheral: &PeripheralId, _data: &[u8]) {}

    /// Received bytes that form valid UTF-8, called right after
    /// [`on_data_received`](Self::on_data_received).
    fn on_text_received(&self, _peripheral: &PeripheralId, _text: &str) {}

    /// Answer to [`Transport::read_signal_strength`](crate::Transport::read_signal_strength).
    fn on_signal_strength(&self, _peripheral: &PeripheralId, _rssi: i16) {}
}

/// Events emitted by the transport.
///
/// All notifications are serializable for logging, persistence, and IPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Host radio state changed.
    StateChanged { state: RadioState },
    /// Peripheral discovered during a scan.
    Discovered { peripheral: DiscoveredPeripheral },
    /// Link established.
    Connected { peripheral: PeripheralId },
    /// Serial channel ready.
    Ready { peripheral: PeripheralId },
    /// Link closed.
    Disconnected {
        peripheral: PeripheralId,
        reason: DisconnectReason,
    },
    /// Connect or attribute resolution failed.
    ConnectFailed {
        peripheral: PeripheralId,
        reason: ConnectionFailureReason,
    },
    /// Data received on the serial channel.
    DataReceived { peripheral: PeripheralId, data: Bytes },
    /// Signal strength of the current link.
    SignalStrength { peripheral: PeripheralId, rssi: i16 },
}

impl Notification {
    /// Deliver this notification to `observer`.
    pub fn deliver(&self, observer: &dyn Observer) {
        match self {
            Notification::StateChanged { state } => observer.on_state_changed(*state),
            Notification::Discovered { peripheral } => observer.on_discovered(peripheral),
            Notification::Connected { peripheral } => observer.on_connected(peripheral),
            Notification::Ready { peripheral } => observer.on_ready(peripheral),
            Notification::Disconnected { peripheral, reason } => {
                observer.on_disconnected(peripheral, reason)
            }
            Notification::ConnectFailed { peripheral, reason } => {
                observer.on_connect_failed(peripheral, reason)
            }
            Notification::DataReceived { peripheral, data } => {
                observer.on_data_received(peripheral, data);
                if let Ok(text) = std::str::from_utf8(data) {
                    observer.on_text_received(peripheral, text);
                }
            }
            Notification::SignalStrength { peripheral, rssi } => {
                observer.on_signal_strength(peripheral, *rssi)
            }
        }
    }
}

/// Holds the single registered observer, weakly.
#[derive(Default)]
pub struct EventDispatcher {
    observer: RwLock<Option<Weak<dyn Observer>>>,
    pending: Mutex<VecDeque<Notification>>,
    draining: AtomicBool,
}

/// Releases the delivery slot, even if an observer panics.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_observer", &self.has_observer())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl EventDispatcher {
    /// Create a dispatcher with no observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer`, replacing any previous one.
    pub fn set_observer(&self, observer: &Arc<dyn Observer>) {
        *self.observer.write() = Some(Arc::downgrade(observer));
    }

    /// Remove the registered observer.
    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    /// Whether a live observer is registered.
    pub fn has_observer(&self) -> bool {
        self.observer
            .read()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Deliver `notification` to the observer, if it is still alive.
    pub fn dispatch(&self, notification: &Notification) {
        // Upgrade outside the read guard so the observer can re-register.
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            notification.deliver(observer.as_ref());
        }
    }

    /// Queue notifications behind any not yet delivered.
    ///
    /// Call while still holding the lock that ordered the transitions
    /// producing them, then [`flush`](Self::flush) once it is released.
    pub fn enqueue(&self, notifications: impl IntoIterator<Item = Notification>) {
        self.pending.lock().extend(notifications);
    }

    /// Deliver queued notifications in order.
    ///
    /// Only one thread delivers at a time. A thread that finds delivery in
    /// progress returns at once; the delivering thread picks up what it
    /// queued.
    pub fn flush(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                return;
            }
            let guard = DrainGuard(&self.draining);
            loop {
                let next = self.pending.lock().pop_front();
                match next {
                    Some(notification) => self.dispatch(&notification),
                    None => break,
                }
            }
            drop(guard);
            // Something may have been queued after the last pop but before
            // the slot was released.
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }
}

/// Sender for transport notifications.
pub type NotificationSender = broadcast::Sender<Notification>;

/// Receiver for transport notifications.
pub type NotificationReceiver = broadcast::Receiver<Notification>;

/// Observer that republishes every call on a broadcast channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: NotificationSender,
}

impl ChannelObserver {
    /// Create a channel observer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to notifications.
    pub fn subscribe(&self) -> NotificationReceiver {
        self.sender.subscribe()
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, notification: Notification) {
        // Ignore error if no receivers
        let _ = self.sender.send(notification);
    }
}

impl Default for ChannelObserver {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Observer for ChannelObserver {
    fn on_state_changed(&self, state: RadioState) {
        self.publish(Notification::StateChanged { state });
    }

    fn on_disconnected(&self, peripheral: &PeripheralId, reason: &DisconnectReason) {
        self.publish(Notification::Disconnected {
            peripheral: peripheral.clone(),
            reason: reason.clone(),
        });
    }

    fn on_connect_failed(&self, peripheral: &PeripheralId, reason: &ConnectionFailureReason) {
        self.publish(Notification::ConnectFailed {
            peripheral: peripheral.clone(),
            reason: reason.clone(),
        });
    }

    fn on_discovered(&self, peripheral: &DiscoveredPeripheral) {
        self.publish(Notification::Discovered {
            peripheral: peripheral.clone(),
        });
    }

    fn on_connected(&self, peripheral: &PeripheralId) {
        self.publish(Notification::Connected {
            peripheral: peripheral.clone(),
        });
    }

    fn on_ready(&self, peripheral: &PeripheralId) {
        self.publish(Notification::Ready {
            peripheral: peripheral.clone(),
        });
    }

    fn on_data_received(&self, peripheral: &PeripheralId, data: &[u8]) {
        self.publish(Notification::DataReceived {
            peripheral: peripheral.clone(),
            data: Bytes::copy_from_slice(data),
        });
    }

    fn on_signal_strength(&self, peripheral: &PeripheralId, rssi: i16) {
        self.publish(Notification::SignalStrength {
            peripheral: peripheral.clone(),
            rssi,
        });
    }
}
