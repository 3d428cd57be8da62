//! Error types for robotooth-core.
//!
//! Every error is local to a single operation. The transport never retries
//! a failed connect or a failed attribute discovery on its own; after any
//! failure the state machine sits in `Idle`, `Disconnected` or `Failed`,
//! from which a new scan can begin.
//!
//! | Error Type | Surfaced via | Caller action |
//! |------------|--------------|---------------|
//! | [`Error::NotReady`] | direct result | wait for `on_ready` |
//! | [`Error::NotScanning`] | direct result | call `start_scan` first |
//! | [`Error::AlreadyInProgress`] | direct result | `disconnect` first |
//! | [`Error::ConnectFailed`] | observer `on_connect_failed` | scan again, then retry |
//! | [`ConnectionFailureReason::AttributeNotFound`] | observer `on_connect_failed` | wrong module or firmware |
//! | [`Error::RadioUnavailable`] | direct result | enable Bluetooth |
//! | [`Error::StaleEvent`] | never (dropped) | none |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use robotooth_types::{PeripheralId, RadioState};

/// Errors that can occur while driving the serial transport.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Send or signal read attempted outside the `Ready` state.
    #[error("Transport is not ready")]
    NotReady,

    /// Connect attempted while no scan session is open.
    #[error("Not scanning: start a scan before connecting")]
    NotScanning,

    /// Connect attempted while another session is pending or established.
    #[error("Connection to {target} already in progress")]
    AlreadyInProgress {
        /// The peripheral the current session targets.
        target: PeripheralId,
    },

    /// The platform reported a connect failure.
    #[error("Connection to {peripheral} failed: {reason}")]
    ConnectFailed {
        /// The peripheral that failed to connect.
        peripheral: PeripheralId,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// A radio callback that belongs to a superseded session.
    #[error("Stale event for a superseded session")]
    StaleEvent,

    /// The host radio is off or not usable.
    #[error("Bluetooth radio unavailable ({0})")]
    RadioUnavailable(RadioState),

    /// A platform radio request was rejected.
    #[error("Radio request failed: {0}")]
    Radio(String),

    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport was disposed.
    #[error("Transport has been disposed")]
    Disposed,
}

/// Structured reasons for connection failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// Peripheral unknown to the platform radio.
    UnknownPeripheral,
    /// Connection attempt timed out.
    Timeout,
    /// Serial service/characteristic missing after attribute discovery.
    AttributeNotFound,
    /// Attribute discovery itself failed.
    DiscoveryFailed(String),
    /// Generic BLE error.
    BleError(String),
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPeripheral => write!(f, "peripheral unknown to the radio"),
            Self::Timeout => write!(f, "connection timed out"),
            Self::AttributeNotFound => write!(f, "serial characteristic not found"),
            Self::DiscoveryFailed(msg) => write!(f, "attribute discovery failed: {}", msg),
            Self::BleError(msg) => write!(f, "BLE error: {}", msg),
        }
    }
}

impl Error {
    /// Create a radio request error.
    pub fn radio(message: impl Into<String>) -> Self {
        Self::Radio(message.into())
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connection failure with structured reason.
    pub fn connect_failed(peripheral: PeripheralId, reason: ConnectionFailureReason) -> Self {
        Self::ConnectFailed { peripheral, reason }
    }
}

/// Result type alias using robotooth-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NotReady.to_string(), "Transport is not ready");

        let err = Error::AlreadyInProgress {
            target: PeripheralId::new("HMSoft"),
        };
        assert!(err.to_string().contains("HMSoft"));

        let err = Error::connect_failed(PeripheralId::new("X"), ConnectionFailureReason::Timeout);
        assert!(err.to_string().contains("X"));
        assert!(err.to_string().contains("timed out"));

        let err = Error::timeout("connect", Duration::from_secs(10));
        assert!(err.to_string().contains("connect"));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_radio_unavailable_display() {
        let err = Error::RadioUnavailable(RadioState::PoweredOff);
        assert!(err.to_string().contains("powered off"));
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = ConnectionFailureReason::DiscoveryFailed("gatt error".to_string());
        assert_eq!(reason.to_string(), "attribute discovery failed: gatt error");
        assert_eq!(
            ConnectionFailureReason::AttributeNotFound.to_string(),
            "serial characteristic not found"
        );
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
