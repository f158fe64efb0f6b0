//! Dial-up modem: connection state machine over the link facade.
//!
//! All entry points run on the application context and return without
//! blocking. Inputs raised while a transition is executing (link events,
//! automatic redials) are queued and processed in order before the entry
//! point returns, so no transition ever observes a half-updated state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use super::config::{DialerConfig, RedialPolicy};
use super::observer::{DialEvent, ObserverId, ObserverRegistry};
use super::state::{Action, ConnectionState, Input, next};
use crate::core::{
    DeferredWork, DialObserver, DialerError, DialerResult, MAX_SEED_BYTES, ProtocolEngine,
    SerialPort,
};
use crate::link::{LinkFacade, LinkStatus};

/// Connection lifecycle manager for a dial-up modem.
///
/// # Example
///
/// ```ignore
/// use pppos_dialer::prelude::*;
///
/// let mut modem = DialUpModem::new(engine, uart, DialerConfig::default(), wake)?;
/// modem.attach(Box::new(my_observer));
///
/// // "CONNECT" seen on the AT channel, possibly with LCP bytes behind it
/// modem.dial_with_seed(&after_connect, Instant::now())?;
///
/// // from the deferred-work callback
/// modem.process_received(Instant::now());
///
/// // whenever `next_deadline()` passes
/// modem.poll_timers(Instant::now());
/// ```
pub struct DialUpModem<E: ProtocolEngine, S: SerialPort> {
    state: ConnectionState,
    link: LinkFacade<E, S>,
    observers: ObserverRegistry,
    redial: RedialPolicy,
    /// Consecutive error-triggered redials.
    redials: u32,
    /// Seed bytes for the next session.
    seed: Vec<u8>,
    inputs: VecDeque<Input>,
}

impl<E: ProtocolEngine, S: SerialPort> DialUpModem<E, S> {
    /// Create a modem in `Idle`.
    ///
    /// `work` is scheduled from the serial receive interrupt; it must lead to
    /// a call of [`process_received`](Self::process_received).
    pub fn new(
        engine: E,
        port: S,
        config: DialerConfig,
        work: Arc<dyn DeferredWork>,
    ) -> DialerResult<Self> {
        config.validate()?;

        Ok(Self {
            state: ConnectionState::Idle,
            link: LinkFacade::new(engine, port, &config, work),
            observers: ObserverRegistry::new(),
            redial: config.redial,
            redials: 0,
            seed: Vec::new(),
            inputs: VecDeque::new(),
        })
    }

    /// Current lifecycle state. Never a transient state between calls.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Register a lifecycle observer.
    pub fn attach(&mut self, observer: Box<dyn DialObserver>) -> ObserverId {
        self.observers.attach(observer)
    }

    /// Remove a lifecycle observer.
    pub fn detach(&mut self, id: ObserverId) -> Option<Box<dyn DialObserver>> {
        self.observers.detach(id)
    }

    /// Start a session. No effect unless `Idle`.
    ///
    /// Fails only if the engine cannot set a session up; the modem then
    /// stays `Idle`. An accepted dial restarts the redial budget.
    pub fn dial(&mut self, now: Instant) -> DialerResult<()> {
        if self.state == ConnectionState::Idle {
            self.redials = 0;
        }
        self.dispatch(Input::Dial, now)
    }

    /// Start a session, feeding `seed` to the engine as it is created.
    ///
    /// Use when the modem's dial confirmation arrived bundled with the first
    /// protocol bytes. No effect unless `Idle`.
    pub fn dial_with_seed(&mut self, seed: &[u8], now: Instant) -> DialerResult<()> {
        if seed.len() > MAX_SEED_BYTES {
            return Err(DialerError::SeedTooLarge {
                len: seed.len(),
                max: MAX_SEED_BYTES,
            });
        }

        if self.state == ConnectionState::Idle {
            self.seed.clear();
            self.seed.extend_from_slice(seed);
        }
        self.dial(now)
    }

    /// Hang up. No effect unless `Connected`.
    pub fn disconnect(&mut self, now: Instant) {
        if let Err(err) = self.dispatch(Input::Disconnect, now) {
            error!(%err, "disconnect failed");
        }
    }

    /// Drain received bytes into the link. Called as the deferred work.
    pub fn process_received(&mut self, now: Instant) {
        self.link.process_received(now);
        self.run_logged(now);
    }

    /// Fire due timers.
    pub fn poll_timers(&mut self, now: Instant) {
        self.link.poll_timers(now);
        self.run_logged(now);
    }

    /// Feed a link status reported by the engine outside of a byte feed.
    pub fn on_link_status(&mut self, status: LinkStatus, now: Instant) {
        self.link.on_link_status(status, now);
        self.run_logged(now);
    }

    /// The serial port finished a transfer.
    pub fn on_send_done(&mut self) {
        self.link.on_send_done();
    }

    /// Earliest instant at which [`poll_timers`](Self::poll_timers) has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.link.next_deadline()
    }

    /// The link facade.
    pub fn link(&self) -> &LinkFacade<E, S> {
        &self.link
    }

    /// Number of live link sessions (zero or one).
    pub fn live_sessions(&self) -> usize {
        self.link.live_sessions()
    }

    fn dispatch(&mut self, input: Input, now: Instant) -> DialerResult<()> {
        self.inputs.push_back(input);
        self.run(now)
    }

    fn run_logged(&mut self, now: Instant) {
        if let Err(err) = self.run(now) {
            error!(%err, "state machine step failed");
        }
    }

    /// Process queued inputs, then link events, until both are exhausted.
    ///
    /// Returns the first error; later inputs are still processed.
    fn run(&mut self, now: Instant) -> DialerResult<()> {
        let mut result = Ok(());

        while let Some(input) = self
            .inputs
            .pop_front()
            .or_else(|| self.link.poll_event().map(Input::Link))
        {
            if let Err(err) = self.apply(input, now)
                && result.is_ok()
            {
                result = Err(err);
            }
        }

        result
    }

    fn apply(&mut self, input: Input, now: Instant) -> DialerResult<()> {
        let from = self.state;
        let Some(transition) = next(from, input) else {
            trace!(state = %from, ?input, "input ignored");
            return Ok(());
        };

        self.state = transition.to;
        debug!(from = %from, to = %self.state, ?input, "state transition");

        match transition.action {
            Some(Action::StartSession) => {
                let seed = std::mem::take(&mut self.seed);
                let seed = (!seed.is_empty()).then_some(seed.as_slice());
                if let Err(err) = self.link.connect(seed, now) {
                    warn!(%err, "dial failed, staying idle");
                    self.state = from;
                    return Err(err.into());
                }
            }
            Some(Action::StopSession) => self.link.disconnect(now),
            Some(Action::NotifyConnected) => {
                info!("dial-up connection established");
                self.redials = 0;
                self.observers.notify(DialEvent::Connected);
            }
            None => {}
        }

        self.enter_transient(now);
        Ok(())
    }

    /// Leave `Disconnected` and `Error` immediately on entry.
    fn enter_transient(&mut self, now: Instant) {
        match self.state {
            ConnectionState::Disconnected => {
                info!("dial-up connection closed");
                self.observers.notify(DialEvent::Disconnected);
                self.link.destroy_session();
                self.state = ConnectionState::Idle;
            }
            ConnectionState::Error(kind) => {
                warn!(%kind, "dial-up connection failed");
                self.observers.notify(DialEvent::Error(kind));
                self.link.destroy_session();
                self.state = ConnectionState::Idle;
                self.redial_after_error(now);
            }
            _ => {}
        }
    }

    fn redial_after_error(&mut self, now: Instant) {
        if !self.redial.allows(self.redials) {
            warn!(attempts = self.redials, policy = ?self.redial, "redial limit reached, staying idle");
            return;
        }

        self.redials += 1;
        debug!(attempt = self.redials, "redialing");
        if let Err(err) = self.apply(Input::Dial, now) {
            error!(%err, "redial failed");
        }
    }
}

impl<E: ProtocolEngine, S: SerialPort> std::fmt::Debug for DialUpModem<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialUpModem")
            .field("state", &self.state)
            .field("redials", &self.redials)
            .field("observers", &self.observers)
            .finish()
    }
}
