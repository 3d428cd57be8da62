//! Transport configuration.

use uuid::Uuid;

use robotooth_types::uuids::{SERIAL_CHARACTERISTIC, SERIAL_SERVICE};

use crate::error::{Error, Result};

/// How outbound writes are issued on the serial characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Fire-and-forget write command. HM-10 style bridges expect this.
    #[default]
    WithoutResponse,
    /// Write request acknowledged by the peripheral.
    WithResponse,
}

impl WriteMode {
    /// Whether the platform should request an acknowledgment.
    #[must_use]
    pub fn ack_requested(&self) -> bool {
        matches!(self, WriteMode::WithResponse)
    }
}

/// Configuration for a [`crate::Transport`].
///
/// The service and characteristic identifiers are fixed for the lifetime
/// of a transport; they are never negotiated with the peripheral.
///
/// # Example
///
/// ```
/// use robotooth_core::{TransportConfig, WriteMode};
/// use robotooth_core::uuids::from_short;
///
/// let config = TransportConfig::default()
///     .service(from_short(0xFFE0))
///     .characteristic(from_short(0xFFE1))
///     .write_mode(WriteMode::WithResponse);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Service scanned for and resolved after connect.
    pub service: Uuid,
    /// Characteristic used for writes and notifications.
    pub characteristic: Uuid,
    /// Outbound write mode.
    pub write_mode: WriteMode,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            service: SERIAL_SERVICE,
            characteristic: SERIAL_CHARACTERISTIC,
            write_mode: WriteMode::default(),
        }
    }
}

impl TransportConfig {
    /// Create a config with the HM-10 defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service UUID.
    #[must_use]
    pub fn service(mut self, service: Uuid) -> Self {
        self.service = service;
        self
    }

    /// Set the characteristic UUID.
    #[must_use]
    pub fn characteristic(mut self, characteristic: Uuid) -> Self {
        self.characteristic = characteristic;
        self
    }

    /// Set the write mode.
    #[must_use]
    pub fn write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Check the configuration for obviously unusable values.
    pub fn validate(&self) -> Result<()> {
        if self.service.is_nil() {
            return Err(Error::invalid_config("service UUID must not be nil"));
        }
        if self.characteristic.is_nil() {
            return Err(Error::invalid_config("characteristic UUID must not be nil"));
        }
        if self.service == self.characteristic {
            return Err(Error::invalid_config(
                "service and characteristic UUIDs must differ",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.service, SERIAL_SERVICE);
        assert_eq!(config.characteristic, SERIAL_CHARACTERISTIC);
        assert_eq!(config.write_mode, WriteMode::WithoutResponse);
        assert!(!config.write_mode.ack_requested());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nil_and_equal() {
        let config = TransportConfig::default().service(Uuid::nil());
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = TransportConfig::default().characteristic(SERIAL_SERVICE);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_with_response() {
        let config = TransportConfig::new().write_mode(WriteMode::WithResponse);
        assert!(config.write_mode.ack_requested());
    }
}
