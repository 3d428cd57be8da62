//! Bluetooth UUIDs for serial bridge peripherals.
//!
//! HM-10 and compatible modules (CC2541, JDY-08, AT-09, ...) expose a single
//! vendor service with one characteristic that is readable, writable and
//! notifiable. The module firmware can change both with `AT+UUID` and
//! `AT+CHAR`; the values here are the factory defaults.

use uuid::{Uuid, uuid};

/// Bluetooth SIG base UUID, used to expand 16-bit short UUIDs.
pub const BLUETOOTH_BASE_UUID: Uuid = uuid!("00000000-0000-1000-8000-00805f9b34fb");

/// Serial bridge service (short form `FFE0`).
pub const SERIAL_SERVICE: Uuid = uuid!("0000ffe0-0000-1000-8000-00805f9b34fb");

/// Serial bridge data characteristic (short form `FFE1`): read, write, notify.
pub const SERIAL_CHARACTERISTIC: Uuid = uuid!("0000ffe1-0000-1000-8000-00805f9b34fb");

/// Expand a 16-bit short UUID into a full 128-bit UUID on the SIG base.
#[must_use]
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID.as_u128() | ((short as u128) << 96))
}

/// Return the 16-bit short form if `uuid` lies on the SIG base.
#[must_use]
pub fn to_short(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = (value >> 96) as u16;
    if value & !(0xFFFF_u128 << 96) == BLUETOOTH_BASE_UUID.as_u128() {
        Some(short)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_service_uuid() {
        let expected = "0000ffe0-0000-1000-8000-00805f9b34fb";
        assert_eq!(SERIAL_SERVICE.to_string(), expected);
    }

    #[test]
    fn test_serial_characteristic_uuid() {
        let expected = "0000ffe1-0000-1000-8000-00805f9b34fb";
        assert_eq!(SERIAL_CHARACTERISTIC.to_string(), expected);
    }

    #[test]
    fn test_from_short_matches_constants() {
        assert_eq!(from_short(0xFFE0), SERIAL_SERVICE);
        assert_eq!(from_short(0xFFE1), SERIAL_CHARACTERISTIC);
    }

    #[test]
    fn test_to_short() {
        assert_eq!(to_short(&SERIAL_SERVICE), Some(0xFFE0));
        assert_eq!(to_short(&SERIAL_CHARACTERISTIC), Some(0xFFE1));

        let vendor = uuid!("f0cd1400-95da-4f4b-9ac8-aa55d312af0c");
        assert_eq!(to_short(&vendor), None);
    }

    #[test]
    fn test_service_and_characteristic_differ() {
        assert_ne!(SERIAL_SERVICE, SERIAL_CHARACTERISTIC);
    }
}
