//! Platform radio abstraction.
//!
//! The [`Radio`] trait is the only boundary between the transport and a
//! Bluetooth stack. Every method is a fire-and-forget request: the outcome
//! arrives later as a [`RadioEvent`] handed to
//! [`Transport::handle_event`](crate::Transport::handle_event).
//!
//! Requests whose completion is asynchronous carry a [`SessionToken`]. The
//! radio echoes that token back on the matching completion event so the
//! state machine can tell a current completion from one belonging to a
//! session that was torn down in the meantime.
//!
//! Implementations must not deliver events synchronously from inside a
//! request method; the transport holds its state lock while issuing them.

use std::fmt;

use bytes::Bytes;
use uuid::Uuid;

use robotooth_types::{PeripheralId, RadioState};

use crate::error::{ConnectionFailureReason, Result};
use crate::events::DisconnectReason;

/// Epoch of a connection session.
///
/// Advanced on every new scan, connect, disconnect, failure and power loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Create a token from a raw epoch value.
    pub const fn new(epoch: u64) -> Self {
        Self(epoch)
    }

    /// Raw epoch value.
    pub const fn epoch(&self) -> u64 {
        self.0
    }

    /// The token that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Requests the transport issues to the platform radio.
pub trait Radio: Send + Sync {
    /// Start scanning for peripherals advertising `service`.
    ///
    /// Results arrive as [`RadioEvent::Discovered`] tagged with `token`,
    /// including peripherals the host is already linked to.
    fn request_scan(&self, token: SessionToken, service: Uuid) -> Result<()>;

    /// Stop an active scan. Must be harmless when no scan is active.
    fn stop_scan(&self) -> Result<()>;

    /// Open a link to `peripheral`.
    ///
    /// Completes with [`RadioEvent::Connected`] or [`RadioEvent::ConnectFailed`].
    fn request_connect(&self, token: SessionToken, peripheral: &PeripheralId) -> Result<()>;

    /// Tear down the link (or the pending connect) to `peripheral`.
    ///
    /// `token` is the session the link was opened under. Completes with
    /// [`RadioEvent::Disconnected`] tagged with that token.
    fn request_disconnect(&self, token: SessionToken, peripheral: &PeripheralId) -> Result<()>;

    /// Discover the characteristics of `service` on a linked peripheral.
    ///
    /// Completes with [`RadioEvent::AttributesDiscovered`] or
    /// [`RadioEvent::AttributeDiscoveryFailed`].
    fn discover_attributes(
        &self,
        token: SessionToken,
        peripheral: &PeripheralId,
        service: Uuid,
    ) -> Result<()>;

    /// Enable notifications on `characteristic`.
    ///
    /// Values arrive as [`RadioEvent::ValueUpdated`].
    fn subscribe_notifications(&self, peripheral: &PeripheralId, characteristic: Uuid)
    -> Result<()>;

    /// Write `data` to `characteristic`.
    fn write_bytes(
        &self,
        peripheral: &PeripheralId,
        characteristic: Uuid,
        data: Bytes,
        ack_requested: bool,
    ) -> Result<()>;

    /// Read the link's current signal strength.
    ///
    /// Completes with [`RadioEvent::SignalStrength`].
    fn read_signal_strength(&self, peripheral: &PeripheralId) -> Result<()>;
}

/// Events delivered by the platform radio.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    /// Host radio state changed.
    StateChanged(RadioState),
    /// A peripheral was seen during the scan opened with `token`.
    Discovered {
        token: SessionToken,
        peripheral: PeripheralId,
        /// Advertised signal strength, absent for already-linked peripherals.
        rssi: Option<i16>,
        /// The host already holds a link to this peripheral.
        already_connected: bool,
    },
    /// Link established.
    Connected {
        token: SessionToken,
        peripheral: PeripheralId,
    },
    /// Link could not be established.
    ConnectFailed {
        token: SessionToken,
        peripheral: PeripheralId,
        reason: ConnectionFailureReason,
    },
    /// Link lost or closed.
    ///
    /// `token` is the session the link was opened under. Links the
    /// transport never opened (reported by a scan as already connected)
    /// carry [`SessionToken::default`].
    Disconnected {
        token: SessionToken,
        peripheral: PeripheralId,
        reason: DisconnectReason,
    },
    /// Characteristics found in the requested service (empty if the service is absent).
    AttributesDiscovered {
        token: SessionToken,
        peripheral: PeripheralId,
        characteristics: Vec<Uuid>,
    },
    /// Attribute discovery failed.
    AttributeDiscoveryFailed {
        token: SessionToken,
        peripheral: PeripheralId,
        reason: String,
    },
    /// Answer to [`Radio::read_signal_strength`].
    SignalStrength { peripheral: PeripheralId, rssi: i16 },
    /// Notification received on a subscribed characteristic.
    ValueUpdated {
        peripheral: PeripheralId,
        characteristic: Uuid,
        data: Bytes,
    },
}

impl RadioEvent {
    /// Peripheral this event concerns, if any.
    pub fn peripheral(&self) -> Option<&PeripheralId> {
        match self {
            RadioEvent::StateChanged(_) => None,
            RadioEvent::Discovered { peripheral, .. }
            | RadioEvent::Connected { peripheral, .. }
            | RadioEvent::ConnectFailed { peripheral, .. }
            | RadioEvent::Disconnected { peripheral, .. }
            | RadioEvent::AttributesDiscovered { peripheral, .. }
            | RadioEvent::AttributeDiscoveryFailed { peripheral, .. }
            | RadioEvent::SignalStrength { peripheral, .. }
            | RadioEvent::ValueUpdated { peripheral, .. } => Some(peripheral),
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RadioEvent::StateChanged(_) => "state_changed",
            RadioEvent::Discovered { .. } => "discovered",
            RadioEvent::Connected { .. } => "connected",
            RadioEvent::ConnectFailed { .. } => "connect_failed",
            RadioEvent::Disconnected { .. } => "disconnected",
            RadioEvent::AttributesDiscovered { .. } => "attributes_discovered",
            RadioEvent::AttributeDiscoveryFailed { .. } => "attribute_discovery_failed",
            RadioEvent::SignalStrength { .. } => "signal_strength",
            RadioEvent::ValueUpdated { .. } => "value_updated",
        }
    }
}
