//! Connection state machine.
//!
//! [`Session`] is the single owner of connection state. It is not
//! synchronized on its own; [`Transport`](crate::Transport) keeps it behind
//! a mutex and hands every caller operation and radio event to it under
//! that lock. Transitions issue radio requests directly and return the
//! observer [`Notification`]s to deliver once the lock is released.
//!
//! Completion events carry the [`SessionToken`] of the request that caused
//! them. Any event whose token, target or characteristic does not match
//! the current session is rejected with [`Error::StaleEvent`] and leaves
//! the session untouched.

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use robotooth_types::{ConnectionState, PeripheralId, RadioState};

use crate::config::TransportConfig;
use crate::error::{ConnectionFailureReason, Error, Result};
use crate::events::{DisconnectReason, Notification};
use crate::radio::{Radio, RadioEvent, SessionToken};
use crate::registry::DeviceRegistry;

/// Collaborators a transition may touch.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// Platform radio that receives requests.
    pub radio: &'a dyn Radio,
    /// Registry populated by discoveries.
    pub registry: &'a DeviceRegistry,
    /// Service and characteristic in use.
    pub config: &'a TransportConfig,
}

/// Notifications produced by a transition.
pub type Notifications = Vec<Notification>;

/// The one connection session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: ConnectionState,
    target: Option<PeripheralId>,
    channel: Option<Uuid>,
    token: SessionToken,
    scan_active: bool,
    radio_state: RadioState,
}

impl Session {
    /// Create an idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Peripheral targeted by the pending or established connection.
    pub fn target(&self) -> Option<&PeripheralId> {
        self.target.as_ref()
    }

    /// Resolved writable characteristic. Only set while `Ready`.
    pub fn channel(&self) -> Option<Uuid> {
        self.channel
    }

    /// Current session epoch.
    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Whether the platform scan is running.
    pub fn is_scan_active(&self) -> bool {
        self.scan_active
    }

    /// Last reported radio state.
    pub fn radio_state(&self) -> RadioState {
        self.radio_state
    }

    /// Whether data can be sent.
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready && self.channel.is_some()
    }

    fn advance(&mut self) -> SessionToken {
        self.token = self.token.next();
        self.token
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            info!(from = %self.state, to = %to, token = %self.token, "Session transition");
            self.state = to;
        }
        if to != ConnectionState::Ready {
            self.channel = None;
        }
    }

    /// Open a new scan session.
    ///
    /// Clears the registry and supersedes any earlier scan. Fails with
    /// [`Error::AlreadyInProgress`] while a connection is pending or up.
    pub fn start_scan(&mut self, ctx: Context<'_>) -> Result<()> {
        if !self.radio_state.allows_scanning() {
            return Err(Error::RadioUnavailable(self.radio_state));
        }
        if let Some(target) = self.target.as_ref().filter(|_| self.state.has_target()) {
            return Err(Error::AlreadyInProgress {
                target: target.clone(),
            });
        }

        let token = self.advance();
        ctx.registry.clear();
        ctx.radio.request_scan(token, ctx.config.service)?;
        self.scan_active = true;
        self.transition(ConnectionState::Scanning);
        Ok(())
    }

    /// Stop the platform scan but stay in `Scanning`.
    ///
    /// The registry stays browsable and [`connect`](Self::connect) remains
    /// legal; discoveries that arrive afterwards are stale.
    pub fn stop_scan(&mut self, ctx: Context<'_>) -> Result<()> {
        if self.state != ConnectionState::Scanning || !self.scan_active {
            return Ok(());
        }
        self.scan_active = false;
        self.advance();
        ctx.radio.stop_scan()?;
        debug!("Scan stopped");
        Ok(())
    }

    /// Start connecting to `id`.
    ///
    /// Only legal in `Scanning`. A pending or established connection is
    /// never re-targeted.
    pub fn connect(&mut self, id: &PeripheralId, ctx: Context<'_>) -> Result<()> {
        match self.state {
            ConnectionState::Scanning => {}
            state if state.has_target() => {
                return Err(Error::AlreadyInProgress {
                    target: self.target.clone().unwrap_or_else(|| id.clone()),
                });
            }
            _ => return Err(Error::NotScanning),
        }

        if self.scan_active {
            self.scan_active = false;
            if let Err(e) = ctx.radio.stop_scan() {
                warn!(error = %e, "Failed to stop scan before connecting");
            }
        }

        let token = self.advance();
        self.target = Some(id.clone());
        self.transition(ConnectionState::Connecting);

        if let Err(e) = ctx.radio.request_connect(token, id) {
            warn!(peripheral = %id, error = %e, "Connect request rejected");
            self.target = None;
            self.advance();
            self.transition(ConnectionState::Failed);
            return Err(e);
        }
        Ok(())
    }

    /// Tear down whatever is in progress. Never fails.
    pub fn disconnect(&mut self, ctx: Context<'_>) -> Notifications {
        match self.state {
            ConnectionState::Idle | ConnectionState::Disconnected => Vec::new(),
            ConnectionState::Scanning => {
                if self.scan_active {
                    self.scan_active = false;
                    if let Err(e) = ctx.radio.stop_scan() {
                        warn!(error = %e, "Failed to stop scan");
                    }
                }
                self.advance();
                self.transition(ConnectionState::Disconnected);
                Vec::new()
            }
            ConnectionState::Failed => {
                self.advance();
                self.transition(ConnectionState::Disconnected);
                Vec::new()
            }
            ConnectionState::Connecting
            | ConnectionState::ResolvingAttributes
            | ConnectionState::Ready => {
                let Some(target) = self.target.take() else {
                    self.advance();
                    self.transition(ConnectionState::Disconnected);
                    return Vec::new();
                };
                if let Err(e) = ctx.radio.request_disconnect(self.token, &target) {
                    warn!(peripheral = %target, error = %e, "Disconnect request failed");
                }
                ctx.registry.mark_connected(&target, false);
                self.advance();
                self.transition(ConnectionState::Disconnected);
                vec![Notification::Disconnected {
                    peripheral: target,
                    reason: DisconnectReason::UserRequested,
                }]
            }
        }
    }

    /// Write `data` to the resolved channel.
    pub fn send(&self, data: Bytes, ctx: Context<'_>) -> Result<()> {
        let (target, channel) = self.ready_link()?;
        ctx.radio
            .write_bytes(target, channel, data, ctx.config.write_mode.ack_requested())
    }

    /// Ask the radio for the link's signal strength.
    pub fn read_signal_strength(&self, ctx: Context<'_>) -> Result<()> {
        let (target, _) = self.ready_link()?;
        ctx.radio.read_signal_strength(target)
    }

    fn ready_link(&self) -> Result<(&PeripheralId, Uuid)> {
        match (self.state, self.target.as_ref(), self.channel) {
            (ConnectionState::Ready, Some(target), Some(channel)) => Ok((target, channel)),
            _ => Err(Error::NotReady),
        }
    }

    /// Return to `Idle` and forget everything. Used on dispose.
    pub fn reset(&mut self, ctx: Context<'_>) {
        if self.scan_active {
            self.scan_active = false;
            if let Err(e) = ctx.radio.stop_scan() {
                debug!(error = %e, "Failed to stop scan during reset");
            }
        }
        if let Some(target) = self.target.take() {
            if let Err(e) = ctx.radio.request_disconnect(self.token, &target) {
                debug!(peripheral = %target, error = %e, "Failed to release link during reset");
            }
        }
        ctx.registry.clear();
        self.advance();
        self.transition(ConnectionState::Idle);
    }

    /// Apply a platform radio event.
    pub fn apply(&mut self, event: RadioEvent, ctx: Context<'_>) -> Result<Notifications> {
        match event {
            RadioEvent::StateChanged(state) => Ok(self.on_radio_state(state, ctx)),
            RadioEvent::Discovered {
                token,
                peripheral,
                rssi,
                already_connected,
            } => {
                if self.state != ConnectionState::Scanning || !self.scan_active || token != self.token
                {
                    return Err(Error::StaleEvent);
                }
                let strength = rssi.unwrap_or(0);
                let entry = if already_connected {
                    ctx.registry.upsert_connected(&peripheral, strength)
                } else {
                    ctx.registry.upsert(&peripheral, strength)
                };
                Ok(vec![Notification::Discovered { peripheral: entry }])
            }
            RadioEvent::Connected { token, peripheral } => {
                self.expect(ConnectionState::Connecting, token, &peripheral)?;
                ctx.registry.mark_connected(&peripheral, true);
                self.transition(ConnectionState::ResolvingAttributes);

                let mut notes = vec![Notification::Connected {
                    peripheral: peripheral.clone(),
                }];
                if let Err(e) = ctx
                    .radio
                    .discover_attributes(token, &peripheral, ctx.config.service)
                {
                    notes.extend(self.fail_resolution(
                        peripheral,
                        ConnectionFailureReason::DiscoveryFailed(e.to_string()),
                        ctx,
                    ));
                }
                Ok(notes)
            }
            RadioEvent::ConnectFailed {
                token,
                peripheral,
                reason,
            } => {
                self.expect(ConnectionState::Connecting, token, &peripheral)?;
                warn!(peripheral = %peripheral, reason = %reason, "Connect failed");
                self.target = None;
                self.advance();
                self.transition(ConnectionState::Failed);
                Ok(vec![Notification::ConnectFailed { peripheral, reason }])
            }
            RadioEvent::AttributesDiscovered {
                token,
                peripheral,
                characteristics,
            } => {
                self.expect(ConnectionState::ResolvingAttributes, token, &peripheral)?;
                let wanted = ctx.config.characteristic;
                if !characteristics.contains(&wanted) {
                    return Ok(self.fail_resolution(
                        peripheral,
                        ConnectionFailureReason::AttributeNotFound,
                        ctx,
                    ));
                }
                if let Err(e) = ctx.radio.subscribe_notifications(&peripheral, wanted) {
                    return Ok(self.fail_resolution(
                        peripheral,
                        ConnectionFailureReason::DiscoveryFailed(e.to_string()),
                        ctx,
                    ));
                }
                self.channel = Some(wanted);
                self.transition(ConnectionState::Ready);
                Ok(vec![Notification::Ready { peripheral }])
            }
            RadioEvent::AttributeDiscoveryFailed {
                token,
                peripheral,
                reason,
            } => {
                self.expect(ConnectionState::ResolvingAttributes, token, &peripheral)?;
                Ok(self.fail_resolution(
                    peripheral,
                    ConnectionFailureReason::DiscoveryFailed(reason),
                    ctx,
                ))
            }
            RadioEvent::Disconnected {
                token,
                peripheral,
                reason,
            } => {
                let is_target = self.state.has_target() && self.target.as_ref() == Some(&peripheral);
                if !is_target {
                    // A non-target link (reported by a scan) went away.
                    ctx.registry.mark_connected(&peripheral, false);
                    return Err(Error::StaleEvent);
                }
                if token != self.token {
                    // Teardown of an earlier link to the current target.
                    return Err(Error::StaleEvent);
                }
                ctx.registry.mark_connected(&peripheral, false);
                self.target = None;
                self.advance();
                self.transition(ConnectionState::Disconnected);
                Ok(vec![Notification::Disconnected { peripheral, reason }])
            }
            RadioEvent::SignalStrength { peripheral, rssi } => {
                if self.state != ConnectionState::Ready || self.target.as_ref() != Some(&peripheral) {
                    return Err(Error::StaleEvent);
                }
                Ok(vec![Notification::SignalStrength { peripheral, rssi }])
            }
            RadioEvent::ValueUpdated {
                peripheral,
                characteristic,
                data,
            } => {
                let current = self.ready_link().ok();
                if current != Some((&peripheral, characteristic)) {
                    return Err(Error::StaleEvent);
                }
                Ok(vec![Notification::DataReceived { peripheral, data }])
            }
        }
    }

    fn expect(
        &self,
        state: ConnectionState,
        token: SessionToken,
        peripheral: &PeripheralId,
    ) -> Result<()> {
        if self.state == state && self.token == token && self.target.as_ref() == Some(peripheral) {
            Ok(())
        } else {
            Err(Error::StaleEvent)
        }
    }

    fn fail_resolution(
        &mut self,
        peripheral: PeripheralId,
        reason: ConnectionFailureReason,
        ctx: Context<'_>,
    ) -> Notifications {
        warn!(peripheral = %peripheral, reason = %reason, "Attribute resolution failed");
        if let Err(e) = ctx.radio.request_disconnect(self.token, &peripheral) {
            warn!(peripheral = %peripheral, error = %e, "Failed to release link");
        }
        ctx.registry.mark_connected(&peripheral, false);
        self.target = None;
        self.advance();
        self.transition(ConnectionState::Failed);
        vec![Notification::ConnectFailed { peripheral, reason }]
    }

    fn on_radio_state(&mut self, state: RadioState, ctx: Context<'_>) -> Notifications {
        let previous = std::mem::replace(&mut self.radio_state, state);
        if previous != state {
            info!(from = %previous, to = %state, "Radio state changed");
        }
        if state.is_off() {
            self.scan_active = false;
            self.target = None;
            ctx.registry.clear();
            self.advance();
            self.transition(ConnectionState::Idle);
        }
        vec![Notification::StateChanged { state }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRadio, RadioCall};
    use robotooth_types::uuids::{SERIAL_CHARACTERISTIC, SERIAL_SERVICE};

    struct Fixture {
        radio: MockRadio,
        registry: DeviceRegistry,
        config: TransportConfig,
        session: Session,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                radio: MockRadio::new(),
                registry: DeviceRegistry::new(),
                config: TransportConfig::default(),
                session: Session::new(),
            }
        }

        fn split(&mut self) -> (&mut Session, Context<'_>) {
            (
                &mut self.session,
                Context {
                    radio: &self.radio,
                    registry: &self.registry,
                    config: &self.config,
                },
            )
        }

        fn apply(&mut self, event: RadioEvent) -> Result<Notifications> {
            let (session, ctx) = self.split();
            session.apply(event, ctx)
        }

        fn ready(&mut self, id: &PeripheralId) {
            let (session, ctx) = self.split();
            session.start_scan(ctx).unwrap();
            session.connect(id, ctx).unwrap();
            let token = session.token();
            self.apply(RadioEvent::Connected {
                token,
                peripheral: id.clone(),
            })
            .unwrap();
            self.apply(RadioEvent::AttributesDiscovered {
                token,
                peripheral: id.clone(),
                characteristics: vec![SERIAL_CHARACTERISTIC],
            })
            .unwrap();
            assert_eq!(self.session.state(), ConnectionState::Ready);
        }
    }

    #[test]
    fn test_connect_requires_scanning() {
        let mut fx = Fixture::new();
        let (session, ctx) = fx.split();
        let err = session.connect(&PeripheralId::new("P1"), ctx).unwrap_err();
        assert!(matches!(err, Error::NotScanning));
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_scan_issues_request_with_service() {
        let mut fx = Fixture::new();
        let (session, ctx) = fx.split();
        session.start_scan(ctx).unwrap();
        let token = session.token();
        assert_eq!(
            fx.radio.calls(),
            vec![RadioCall::Scan {
                token,
                service: SERIAL_SERVICE
            }]
        );
    }

    #[test]
    fn test_stop_scan_keeps_scanning_state() {
        let mut fx = Fixture::new();
        let (session, ctx) = fx.split();
        session.start_scan(ctx).unwrap();
        let scan_token = session.token();
        session.stop_scan(ctx).unwrap();
        assert_eq!(session.state(), ConnectionState::Scanning);
        assert!(!session.is_scan_active());

        let late = fx.apply(RadioEvent::Discovered {
            token: scan_token,
            peripheral: PeripheralId::new("late"),
            rssi: Some(-50),
            already_connected: false,
        });
        assert!(matches!(late, Err(Error::StaleEvent)));

        let (session, ctx) = fx.split();
        session.connect(&PeripheralId::new("P1"), ctx).unwrap();
        assert_eq!(session.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_channel_only_in_ready() {
        let mut fx = Fixture::new();
        let id = PeripheralId::new("P1");
        fx.ready(&id);
        assert_eq!(fx.session.channel(), Some(SERIAL_CHARACTERISTIC));

        let (session, ctx) = fx.split();
        session.disconnect(ctx);
        assert_eq!(session.channel(), None);
        assert_eq!(session.target(), None);
    }

    #[test]
    fn test_value_for_other_characteristic_dropped() {
        let mut fx = Fixture::new();
        let id = PeripheralId::new("P1");
        fx.ready(&id);

        let other = fx.apply(RadioEvent::ValueUpdated {
            peripheral: id.clone(),
            characteristic: SERIAL_SERVICE,
            data: Bytes::from_static(b"x"),
        });
        assert!(matches!(other, Err(Error::StaleEvent)));

        let stranger = fx.apply(RadioEvent::ValueUpdated {
            peripheral: PeripheralId::new("P2"),
            characteristic: SERIAL_CHARACTERISTIC,
            data: Bytes::from_static(b"x"),
        });
        assert!(matches!(stranger, Err(Error::StaleEvent)));
    }

    #[test]
    fn test_rejected_connect_request_fails_session() {
        let mut fx = Fixture::new();
        fx.radio.fail_next_connect("adapter busy");
        let (session, ctx) = fx.split();
        session.start_scan(ctx).unwrap();
        assert!(session.connect(&PeripheralId::new("P1"), ctx).is_err());
        assert_eq!(session.state(), ConnectionState::Failed);
        assert_eq!(session.target(), None);
    }

    #[test]
    fn test_late_teardown_of_previous_link_is_stale() {
        let mut fx = Fixture::new();
        let id = PeripheralId::new("P1");
        fx.ready(&id);
        let first_link = fx.session.token();

        let (session, ctx) = fx.split();
        session.disconnect(ctx);
        assert!(fx.radio.calls().contains(&RadioCall::Disconnect {
            token: first_link,
            peripheral: id.clone(),
        }));

        fx.ready(&id);
        let late = fx.apply(RadioEvent::Disconnected {
            token: first_link,
            peripheral: id.clone(),
            reason: DisconnectReason::UserRequested,
        });
        assert!(matches!(late, Err(Error::StaleEvent)));
        assert!(fx.session.is_ready());
        assert!(fx.registry.snapshot().iter().all(|p| p.connected));
    }

    #[test]
    fn test_radio_unavailable_blocks_scan() {
        let mut fx = Fixture::new();
        fx.apply(RadioEvent::StateChanged(RadioState::Unauthorized))
            .unwrap();
        let (session, ctx) = fx.split();
        let err = session.start_scan(ctx).unwrap_err();
        assert!(matches!(err, Error::RadioUnavailable(RadioState::Unauthorized)));
    }
}
