//! Core types for serial bridge peripherals.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Opaque peripheral identifier.
///
/// On Linux and Windows this is usually the Bluetooth MAC address
/// (`AA:BB:CC:DD:EE:FF`); on macOS it is the CoreBluetooth UUID. It is
/// only guaranteed to be stable for the lifetime of a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PeripheralId(String);

impl PeripheralId {
    /// Create a new identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison, ignoring `:` separators in addresses.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        let normalize = |s: &str| s.replace(':', "").to_lowercase();
        normalize(&self.0) == normalize(other)
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeripheralId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeripheralId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeripheralId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for PeripheralId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyIdentifier);
        }
        Ok(Self::new(trimmed))
    }
}

/// A peripheral seen during the current scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiscoveredPeripheral {
    /// Peripheral identity.
    pub id: PeripheralId,
    /// Last advertised signal strength in dBm (more negative is weaker).
    pub signal_strength: i16,
    /// Whether a link to this peripheral has been confirmed by the radio.
    pub connected: bool,
}

impl DiscoveredPeripheral {
    /// Create an unconnected entry.
    pub fn new(id: PeripheralId, signal_strength: i16) -> Self {
        Self {
            id,
            signal_strength,
            connected: false,
        }
    }

    /// Signal quality band for this peripheral's last signal strength.
    #[must_use]
    pub fn signal_quality(&self) -> SignalQuality {
        SignalQuality::from_rssi(self.signal_strength)
    }
}

/// Lifecycle state of the single connection session.
///
/// ```text
/// Idle -> Scanning -> Connecting -> ResolvingAttributes -> Ready
///            ^             |                 |              |
///            |             v                 v              v
///            +------ Failed / Disconnected <-+--------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Scan session open; discoveries populate the registry.
    Scanning,
    /// Platform connect requested.
    Connecting,
    /// Link up, looking for the serial characteristic.
    ResolvingAttributes,
    /// Serial characteristic resolved and subscribed.
    Ready,
    /// Link torn down by the caller or the peripheral.
    Disconnected,
    /// Connect or attribute discovery failed.
    Failed,
}

impl ConnectionState {
    /// States in which a target peripheral is held.
    #[must_use]
    pub fn has_target(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::ResolvingAttributes | ConnectionState::Ready
        )
    }

    /// States that only a new scan can leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::ResolvingAttributes => "resolving attributes",
            ConnectionState::Ready => "ready",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Power/authorization state of the host radio.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new states
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum RadioState {
    /// Not reported yet. Many backends never report it.
    #[default]
    Unknown,
    /// Radio stack restarting.
    Resetting,
    /// No BLE support on this host.
    Unsupported,
    /// The application is not allowed to use Bluetooth.
    Unauthorized,
    /// Radio switched off.
    PoweredOff,
    /// Radio on and usable.
    PoweredOn,
}

impl RadioState {
    /// Whether a scan may be started in this state.
    ///
    /// `Unknown` is accepted since several platform backends never
    /// report adapter state.
    #[must_use]
    pub fn allows_scanning(&self) -> bool {
        matches!(self, RadioState::Unknown | RadioState::PoweredOn)
    }

    /// Whether this state tears down any session in progress.
    #[must_use]
    pub fn is_off(&self) -> bool {
        !self.allows_scanning()
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RadioState::Unknown => "unknown",
            RadioState::Resetting => "resetting",
            RadioState::Unsupported => "unsupported",
            RadioState::Unauthorized => "unauthorized",
            RadioState::PoweredOff => "powered off",
            RadioState::PoweredOn => "powered on",
        };
        f.write_str(label)
    }
}

/// Signal strength quality levels based on RSSI values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SignalQuality {
    /// Signal too weak for reliable operation (<= -85 dBm).
    Poor,
    /// Usable but may have issues (-85 to -75 dBm).
    Fair,
    /// Good signal strength (-75 to -60 dBm).
    Good,
    /// Excellent signal strength (> -60 dBm).
    Excellent,
}

impl SignalQuality {
    /// Determine signal quality from RSSI value in dBm.
    #[must_use]
    pub fn from_rssi(rssi: i16) -> Self {
        match rssi {
            r if r > -60 => SignalQuality::Excellent,
            r if r > -75 => SignalQuality::Good,
            r if r > -85 => SignalQuality::Fair,
            _ => SignalQuality::Poor,
        }
    }

    /// Get a human-readable description of the signal quality.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            SignalQuality::Excellent => "Excellent signal",
            SignalQuality::Good => "Good signal",
            SignalQuality::Fair => "Fair signal - connection may be unstable",
            SignalQuality::Poor => "Poor signal - consider moving closer",
        }
    }

    /// Check if the signal is strong enough for reliable operations.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !matches!(self, SignalQuality::Poor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peripheral_id_parse() {
        let id: PeripheralId = "  AA:BB:CC:DD:EE:FF ".parse().unwrap();
        assert_eq!(id.as_str(), "AA:BB:CC:DD:EE:FF");
        assert_eq!("".parse::<PeripheralId>(), Err(ParseError::EmptyIdentifier));
    }

    #[test]
    fn test_peripheral_id_matches() {
        let id = PeripheralId::new("AA:BB:CC:DD:EE:FF");
        assert!(id.matches("aabbccddeeff"));
        assert!(id.matches("aa:bb:cc:dd:ee:ff"));
        assert!(!id.matches("aa:bb:cc:dd:ee:00"));
    }

    #[test]
    fn test_discovered_peripheral_starts_unconnected() {
        let p = DiscoveredPeripheral::new(PeripheralId::new("P1"), -70);
        assert!(!p.connected);
        assert_eq!(p.signal_quality(), SignalQuality::Good);
    }

    #[test]
    fn test_connection_state_predicates() {
        assert!(ConnectionState::Connecting.has_target());
        assert!(ConnectionState::ResolvingAttributes.has_target());
        assert!(ConnectionState::Ready.has_target());
        assert!(!ConnectionState::Scanning.has_target());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(!ConnectionState::Idle.is_terminal());
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn test_radio_state_gating() {
        assert!(RadioState::Unknown.allows_scanning());
        assert!(RadioState::PoweredOn.allows_scanning());
        assert!(RadioState::PoweredOff.is_off());
        assert!(RadioState::Unauthorized.is_off());
        assert!(RadioState::Resetting.is_off());
    }

    #[test]
    fn test_signal_quality_bands() {
        assert_eq!(SignalQuality::from_rssi(-40), SignalQuality::Excellent);
        assert_eq!(SignalQuality::from_rssi(-60), SignalQuality::Good);
        assert_eq!(SignalQuality::from_rssi(-80), SignalQuality::Fair);
        assert_eq!(SignalQuality::from_rssi(-85), SignalQuality::Poor);
        assert!(SignalQuality::Excellent > SignalQuality::Poor);
        assert!(!SignalQuality::Poor.is_usable());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_representation() {
        let p = DiscoveredPeripheral::new(PeripheralId::new("P1"), -42);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"id\":\"P1\""));
        assert!(json.contains("\"signal_strength\":-42"));

        let state = serde_json::to_string(&ConnectionState::ResolvingAttributes).unwrap();
        assert_eq!(state, "\"resolving_attributes\"");
    }
}
