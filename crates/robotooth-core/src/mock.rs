//! Mock radio implementation for testing.
//!
//! [`MockRadio`] implements [`Radio`] without any Bluetooth hardware. It
//! records every request as a [`RadioCall`] and never produces events on
//! its own: tests play the platform by feeding [`RadioEvent`]s to
//! [`Transport::handle_event`](crate::Transport::handle_event), usually
//! tagged with [`MockRadio::last_token`].
//!
//! # Features
//!
//! - **Call recording**: inspect requests with [`MockRadio::calls`] and [`MockRadio::writes`]
//! - **Failure injection**: reject every request, the next `n` requests, or only the next connect
//!
//! [`RadioEvent`]: crate::RadioEvent

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use robotooth_types::PeripheralId;

use crate::error::{Error, Result};
use crate::radio::{Radio, SessionToken};

/// A request recorded by [`MockRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    /// `request_scan`.
    Scan { token: SessionToken, service: Uuid },
    /// `stop_scan`.
    StopScan,
    /// `request_connect`.
    Connect {
        token: SessionToken,
        peripheral: PeripheralId,
    },
    /// `request_disconnect`.
    Disconnect {
        token: SessionToken,
        peripheral: PeripheralId,
    },
    /// `discover_attributes`.
    DiscoverAttributes {
        token: SessionToken,
        peripheral: PeripheralId,
        service: Uuid,
    },
    /// `subscribe_notifications`.
    Subscribe {
        peripheral: PeripheralId,
        characteristic: Uuid,
    },
    /// `write_bytes`.
    Write {
        peripheral: PeripheralId,
        characteristic: Uuid,
        data: Bytes,
        ack_requested: bool,
    },
    /// `read_signal_strength`.
    ReadSignalStrength { peripheral: PeripheralId },
}

/// A platform radio stand-in for tests.
///
/// # Example
///
/// ```
/// use robotooth_core::{MockRadio, Transport, TransportConfig};
///
/// let transport = Transport::new(MockRadio::new(), TransportConfig::default()).unwrap();
/// transport.start_scan().unwrap();
/// assert_eq!(transport.radio().calls().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockRadio {
    calls: Mutex<Vec<RadioCall>>,
    last_token: Mutex<SessionToken>,
    should_fail: AtomicBool,
    fail_message: Mutex<String>,
    /// Number of requests to fail before succeeding.
    remaining_failures: AtomicU32,
    fail_next_connect: Mutex<Option<String>>,
}

impl MockRadio {
    /// Create a mock radio that accepts every request.
    pub fn new() -> Self {
        Self {
            fail_message: Mutex::new("Mock failure".to_string()),
            ..Default::default()
        }
    }

    /// All requests issued so far, oldest first.
    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().clone()
    }

    /// Forget recorded requests.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Payloads of every `write_bytes` request, oldest first.
    pub fn writes(&self) -> Vec<Bytes> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RadioCall::Write { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded requests matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&RadioCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// Token passed with the most recent scan, connect or discovery request.
    pub fn last_token(&self) -> SessionToken {
        *self.last_token.lock()
    }

    /// Make every request fail until cleared.
    pub fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *self.fail_message.lock() = msg.to_string();
        }
    }

    /// Fail the next `count` requests, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Reject only the next connect request.
    pub fn fail_next_connect(&self, message: &str) {
        *self.fail_next_connect.lock() = Some(message.to_string());
    }

    fn record(&self, call: RadioCall) -> Result<()> {
        let failure = self.check_should_fail();
        if failure.is_ok() {
            self.calls.lock().push(call);
        }
        failure
    }

    fn check_should_fail(&self) -> Result<()> {
        let remaining = self.remaining_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::Relaxed);
            return Err(Error::radio(self.fail_message.lock().clone()));
        }
        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::radio(self.fail_message.lock().clone()))
        } else {
            Ok(())
        }
    }

    fn remember(&self, token: SessionToken) {
        *self.last_token.lock() = token;
    }
}

impl Radio for MockRadio {
    fn request_scan(&self, token: SessionToken, service: Uuid) -> Result<()> {
        self.remember(token);
        self.record(RadioCall::Scan { token, service })
    }

    fn stop_scan(&self) -> Result<()> {
        self.record(RadioCall::StopScan)
    }

    fn request_connect(&self, token: SessionToken, peripheral: &PeripheralId) -> Result<()> {
        self.remember(token);
        if let Some(message) = self.fail_next_connect.lock().take() {
            return Err(Error::radio(message));
        }
        self.record(RadioCall::Connect {
            token,
            peripheral: peripheral.clone(),
        })
    }

    fn request_disconnect(&self, token: SessionToken, peripheral: &PeripheralId) -> Result<()> {
        self.record(RadioCall::Disconnect {
            token,
            peripheral: peripheral.clone(),
        })
    }

    fn discover_attributes(
        &self,
        token: SessionToken,
        peripheral: &PeripheralId,
        service: Uuid,
    ) -> Result<()> {
        self.remember(token);
        self.record(RadioCall::DiscoverAttributes {
            token,
            peripheral: peripheral.clone(),
            service,
        })
    }

    fn subscribe_notifications(
        &self,
        peripheral: &PeripheralId,
        characteristic: Uuid,
    ) -> Result<()> {
        self.record(RadioCall::Subscribe {
            peripheral: peripheral.clone(),
            characteristic,
        })
    }

    fn write_bytes(
        &self,
        peripheral: &PeripheralId,
        characteristic: Uuid,
        data: Bytes,
        ack_requested: bool,
    ) -> Result<()> {
        self.record(RadioCall::Write {
            peripheral: peripheral.clone(),
            characteristic,
            data,
            ack_requested,
        })
    }

    fn read_signal_strength(&self, peripheral: &PeripheralId) -> Result<()> {
        self.record(RadioCall::ReadSignalStrength {
            peripheral: peripheral.clone(),
        })
    }
}
