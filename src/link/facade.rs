//! Link facade over one protocol engine session at a time.
//!
//! Turns the raw byte stream and the engine's link-status codes into three
//! events: [`LinkEvent::Connected`], [`LinkEvent::Disconnected`] and
//! [`LinkEvent::Error`].
//!
//! # Teardown
//!
//! Closing is asynchronous. The engine acknowledges a close with a
//! user-interrupt status; from then on the facade waits for the modem to
//! print `\r\n` (it is back in command mode). Whichever comes first decides:
//!
//! - sentinel seen: wait a short settle window, then raise `Disconnected`
//! - no sentinel within the teardown timeout: raise `Disconnected`
//!
//! ```text
//!  close() ──► USER ack ──► [await sentinel, 5 s] ──► Disconnected
//!                                │
//!                             "\r\n"
//!                                ▼
//!                          [settle, 200 ms] ──────► Disconnected
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use super::queue::ReceiveQueue;
use super::status::{InterfaceStatus, LinkStatus, Translation, translate};
use super::timer::SingleShotTimer;
use super::writer::SerialWriter;
use crate::core::{
    COMMAND_MODE_SENTINEL, DeferredWork, EngineError, EngineHooks, ErrorKind, ProtocolEngine,
    SerialPort,
};
use crate::modem::{DialerConfig, SessionSettings};

/// Lifecycle events raised by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Negotiation finished with a usable address.
    Connected,
    /// Teardown finished.
    Disconnected,
    /// The session failed.
    Error(ErrorKind),
}

/// Reason the teardown timer is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownTimer {
    /// Close acknowledged, waiting for the sentinel.
    AwaitSentinel,
    /// Sentinel seen, absorbing trailing frames.
    Settle,
}

/// One attempt at running an engine session.
#[derive(Debug)]
pub struct LinkSession<H> {
    id: u64,
    /// Engine handle; released as soon as the engine is finished with it.
    handle: Option<H>,
    /// Scratch space for draining the receive queue.
    scratch: Vec<u8>,
    timer: SingleShotTimer<TeardownTimer>,
}

impl<H> LinkSession<H> {
    fn new(id: u64, handle: H, scratch_capacity: usize) -> Self {
        Self {
            id,
            handle: Some(handle),
            scratch: Vec::with_capacity(scratch_capacity),
            timer: SingleShotTimer::new(),
        }
    }

    /// Session identifier, unique per facade.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if the engine handle is still held.
    pub fn engine_active(&self) -> bool {
        self.handle.is_some()
    }
}

/// Position of the command-mode sentinel anywhere in `data`.
pub fn find_sentinel(data: &[u8]) -> Option<usize> {
    data.windows(COMMAND_MODE_SENTINEL.len())
        .position(|window| window == COMMAND_MODE_SENTINEL)
}

/// Hooks handed to the engine for the duration of one call.
struct Hooks<'a, S: SerialPort> {
    writer: &'a mut SerialWriter,
    port: &'a mut S,
    statuses: &'a mut Vec<LinkStatus>,
}

impl<S: SerialPort> EngineHooks for Hooks<'_, S> {
    fn write(&mut self, data: &[u8]) -> usize {
        self.writer.write(data, self.port)
    }

    fn link_status(&mut self, status: LinkStatus) {
        self.statuses.push(status);
    }
}

/// Facade owning the receive queue, the transmit path, and at most one
/// [`LinkSession`].
pub struct LinkFacade<E: ProtocolEngine, S: SerialPort> {
    engine: E,
    port: S,
    settings: SessionSettings,
    settle_delay: Duration,
    teardown_timeout: Duration,
    queue: ReceiveQueue,
    writer: SerialWriter,
    session: Option<LinkSession<E::Session>>,
    events: VecDeque<LinkEvent>,
    sessions_created: u64,
}

impl<E: ProtocolEngine, S: SerialPort> LinkFacade<E, S> {
    /// Create a facade and register its receive handler with `port`.
    ///
    /// `work` is scheduled from interrupt context whenever bytes arrive; it
    /// must eventually call [`process_received`](Self::process_received) on
    /// the application context.
    pub fn new(engine: E, mut port: S, config: &DialerConfig, work: Arc<dyn DeferredWork>) -> Self {
        let (mut producer, queue) = ReceiveQueue::new(config.receive_capacity, work);
        port.receive_data(Box::new(move |data: &[u8]| {
            producer.push(data);
        }));

        Self {
            engine,
            port,
            settings: config.session.clone(),
            settle_delay: config.settle_delay,
            teardown_timeout: config.teardown_timeout,
            queue,
            writer: SerialWriter::new(config.transmit_capacity),
            session: None,
            events: VecDeque::new(),
            sessions_created: 0,
        }
    }

    /// Create a session and start listening.
    ///
    /// `seed` bytes are fed to the engine before this returns. Some modems
    /// deliver the first LCP request in the same chunk as their dial
    /// confirmation, and nothing else will arrive to trigger a feed.
    ///
    /// No effect if a session already exists.
    pub fn connect(&mut self, seed: Option<&[u8]>, now: Instant) -> Result<(), EngineError> {
        if let Some(session) = &self.session {
            warn!(session = session.id, "connect ignored, session already exists");
            return Ok(());
        }

        let handle = self.engine.create_session(&self.settings)?;
        self.sessions_created += 1;
        let id = self.sessions_created;
        self.session = Some(LinkSession::new(id, handle, self.queue.capacity()));
        debug!(session = id, "link session created");

        if let Some(Err(err)) = self.run_engine(now, |engine, handle, hooks| {
            engine.listen(handle, hooks)
        }) {
            error!(session = id, %err, "engine refused to listen");
            self.destroy_session();
            return Err(err);
        }

        if let Some(seed) = seed.filter(|seed| !seed.is_empty()) {
            trace!(session = id, seed = %hex::encode(seed), "feeding seed bytes");
            self.run_engine(now, |engine, handle, hooks| engine.feed(handle, seed, hooks));
        }

        Ok(())
    }

    /// Ask the engine to terminate the session.
    ///
    /// Returns immediately; `Disconnected` follows once teardown completes.
    pub fn disconnect(&mut self, now: Instant) {
        let closing = self.run_engine(now, |engine, handle, hooks| engine.close(handle, hooks));
        if closing.is_none() {
            debug!("disconnect ignored, no engine session");
        }
    }

    /// Handle one drained chunk of received bytes.
    pub fn on_received_bytes(&mut self, data: &[u8], now: Instant) {
        if find_sentinel(data).is_some() {
            trace!(rx = %hex::encode(data), "command-mode sentinel received");

            if let Some(session) = self.session.as_mut()
                && session.timer.armed()
            {
                session
                    .timer
                    .start(now, self.settle_delay, TeardownTimer::Settle);
                debug!(session = session.id, "modem back in command mode, settling");
                return;
            }
        }

        let fed = self.run_engine(now, |engine, handle, hooks| engine.feed(handle, data, hooks));
        if fed.is_none() {
            trace!(len = data.len(), "no engine session, received bytes discarded");
        }
    }

    /// Drain the receive queue. This is the deferred work scheduled by the
    /// receive handler.
    pub fn process_received(&mut self, now: Instant) {
        self.queue.begin_drain();

        let dropped = self.queue.take_dropped();
        if dropped > 0 {
            warn!(dropped, "receive queue overflow, bytes dropped");
        }

        loop {
            let Some(session) = self.session.as_mut() else {
                let discarded = self.queue.discard();
                if discarded > 0 {
                    trace!(discarded, "no link session, received bytes discarded");
                }
                return;
            };

            let mut chunk = std::mem::take(&mut session.scratch);
            if self.queue.read_contiguous(&mut chunk) == 0 {
                session.scratch = chunk;
                return;
            }

            self.on_received_bytes(&chunk, now);

            if let Some(session) = self.session.as_mut() {
                session.scratch = chunk;
            }
        }
    }

    /// Handle a link-status report.
    ///
    /// Engines that report outside of a feed (from their own timers) call
    /// this directly.
    pub fn on_link_status(&mut self, status: LinkStatus, now: Instant) {
        let Some(id) = self.session.as_ref().map(LinkSession::id) else {
            warn!(code = %status.code, "link status without session ignored");
            return;
        };

        if status.code.is_engine_misuse() {
            error!(session = id, code = %status.code, "engine reported misuse");
        }

        match translate(&status) {
            Translation::Connected => {
                log_interface(id, &status.interface);
                self.events.push_back(LinkEvent::Connected);
            }
            Translation::Pending => {
                debug!(
                    session = id,
                    up = status.interface.up,
                    local = %status.interface.local,
                    "negotiation success without usable address"
                );
            }
            Translation::CloseAcknowledged => {
                debug!(session = id, "close acknowledged, waiting for command mode");
                self.release_engine();
                if let Some(session) = self.session.as_mut() {
                    session.timer.start(
                        now,
                        self.teardown_timeout,
                        TeardownTimer::AwaitSentinel,
                    );
                }
            }
            Translation::Failed {
                kind,
                release_engine,
            } => {
                warn!(session = id, code = %status.code, %kind, "link failed");
                if release_engine {
                    self.release_engine();
                }
                self.events.push_back(LinkEvent::Error(kind));
            }
        }
    }

    /// Fire the teardown timer if due.
    pub fn poll_timers(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.timer.poll(now) {
            Some(TeardownTimer::Settle) => {
                info!(session = session.id, "teardown complete");
                self.events.push_back(LinkEvent::Disconnected);
            }
            Some(TeardownTimer::AwaitSentinel) => {
                info!(
                    session = session.id,
                    "no command-mode sentinel before timeout, teardown assumed complete"
                );
                self.events.push_back(LinkEvent::Disconnected);
            }
            None => {}
        }
    }

    /// The serial port finished the transfer in flight.
    pub fn on_send_done(&mut self) {
        self.writer.on_send_done(&mut self.port);
    }

    /// Destroy the current session, cancelling its timer and discarding
    /// everything it left behind.
    pub fn destroy_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.timer.cancel();
        if let Some(handle) = session.handle.take() {
            self.engine.destroy_session(handle);
        }
        self.writer.clear_pending();
        self.events.clear();
        self.queue.discard();

        debug!(session = session.id, "link session destroyed");
    }

    /// Next pending event.
    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.events.pop_front()
    }

    /// Earliest instant at which [`poll_timers`](Self::poll_timers) has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session
            .as_ref()
            .and_then(|session| session.timer.deadline())
    }

    /// Current session, if any.
    pub fn session(&self) -> Option<&LinkSession<E::Session>> {
        self.session.as_ref()
    }

    /// Number of live sessions (zero or one).
    pub fn live_sessions(&self) -> usize {
        usize::from(self.session.is_some())
    }

    /// Total sessions created over the facade's lifetime.
    pub fn sessions_created(&self) -> u64 {
        self.sessions_created
    }

    /// Purpose of the armed teardown timer.
    pub fn teardown_timer(&self) -> Option<TeardownTimer> {
        self.session
            .as_ref()
            .and_then(|session| session.timer.purpose().copied())
    }

    /// The engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The serial port.
    pub fn port(&self) -> &S {
        &self.port
    }

    /// Run an engine call against the live handle, then translate whatever
    /// statuses it reported. Returns `None` when there is no handle.
    fn run_engine<R>(
        &mut self,
        now: Instant,
        call: impl FnOnce(&mut E, &mut E::Session, &mut dyn EngineHooks) -> R,
    ) -> Option<R> {
        let handle = self.session.as_mut()?.handle.as_mut()?;

        let mut statuses = Vec::new();
        let mut hooks = Hooks {
            writer: &mut self.writer,
            port: &mut self.port,
            statuses: &mut statuses,
        };
        let result = call(&mut self.engine, handle, &mut hooks);

        let dropped = self.writer.take_dropped();
        if dropped > 0 {
            warn!(dropped, "transmit buffer overflow, bytes dropped");
        }

        for status in statuses {
            self.on_link_status(status, now);
        }

        Some(result)
    }

    fn release_engine(&mut self) {
        if let Some(session) = self.session.as_mut()
            && let Some(handle) = session.handle.take()
        {
            self.engine.destroy_session(handle);
            trace!(session = session.id, "engine session released");
        }
    }
}

impl<E: ProtocolEngine, S: SerialPort> Drop for LinkFacade<E, S> {
    fn drop(&mut self) {
        self.destroy_session();
    }
}

fn log_interface(session: u64, interface: &InterfaceStatus) {
    info!(
        session,
        local = %interface.local,
        gateway = %interface.gateway,
        netmask = %interface.netmask,
        dns1 = ?interface.dns[0],
        dns2 = ?interface.dns[1],
        "link up"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkStatusCode;
    use crate::testing::{CountingWork, EngineCall, MockEngine, MockSerial, ready_status};

    struct Fixture {
        engine: MockEngine,
        serial: MockSerial,
        facade: LinkFacade<MockEngine, MockSerial>,
        t0: Instant,
    }

    fn fixture() -> Fixture {
        let engine = MockEngine::new();
        let serial = MockSerial::new();
        let facade = LinkFacade::new(
            engine.clone(),
            serial.clone(),
            &DialerConfig::default(),
            Arc::new(CountingWork::default()),
        );
        Fixture {
            engine,
            serial,
            facade,
            t0: Instant::now(),
        }
    }

    fn events(facade: &mut LinkFacade<MockEngine, MockSerial>) -> Vec<LinkEvent> {
        std::iter::from_fn(|| facade.poll_event()).collect()
    }

    fn close_acknowledged(fx: &mut Fixture) {
        fx.facade.connect(None, fx.t0).unwrap();
        fx.facade
            .on_link_status(LinkStatus::new(LinkStatusCode::USER), fx.t0);
    }

    #[test]
    fn test_find_sentinel() {
        assert_eq!(find_sentinel(b"AB\r\n"), Some(2));
        assert_eq!(find_sentinel(b"\r\nOK\r\n"), Some(0));
        assert_eq!(find_sentinel(b"\r"), None);
        assert_eq!(find_sentinel(b"\n\r"), None);
        assert_eq!(find_sentinel(b""), None);
    }

    #[test]
    fn test_connect_creates_one_session_and_listens() {
        let mut fx = fixture();

        fx.facade.connect(None, fx.t0).unwrap();
        fx.facade.connect(None, fx.t0).unwrap();

        assert_eq!(fx.facade.live_sessions(), 1);
        assert_eq!(fx.facade.sessions_created(), 1);
        assert_eq!(fx.engine.calls(), vec![EngineCall::Create(1), EngineCall::Listen(1)]);
    }

    #[test]
    fn test_seed_fed_during_connect_before_later_bytes() {
        let mut fx = fixture();

        fx.facade.connect(Some(b"seed"), fx.t0).unwrap();
        assert_eq!(fx.engine.fed(), vec![b"seed".to_vec()]);

        fx.facade.on_received_bytes(b"later", fx.t0);
        assert_eq!(fx.engine.fed(), vec![b"seed".to_vec(), b"later".to_vec()]);
    }

    #[test]
    fn test_empty_seed_not_fed() {
        let mut fx = fixture();
        fx.facade.connect(Some(&[]), fx.t0).unwrap();
        assert!(fx.engine.fed().is_empty());
    }

    #[test]
    fn test_create_failure_leaves_no_session() {
        let mut fx = fixture();
        fx.engine.script().fail_create = true;

        assert_eq!(
            fx.facade.connect(None, fx.t0),
            Err(EngineError::SessionAllocation)
        );
        assert_eq!(fx.facade.live_sessions(), 0);
    }

    #[test]
    fn test_listen_failure_destroys_session() {
        let mut fx = fixture();
        fx.engine.script().fail_listen = true;

        assert!(fx.facade.connect(None, fx.t0).is_err());
        assert_eq!(fx.facade.live_sessions(), 0);
        assert_eq!(fx.engine.script().live, 0);
    }

    #[test]
    fn test_engine_output_reaches_serial() {
        let mut fx = fixture();
        fx.engine.script().listen_output = b"~LCP~".to_vec();

        fx.facade.connect(None, fx.t0).unwrap();
        assert_eq!(fx.serial.sent(), vec![b"~LCP~".to_vec()]);
    }

    #[test]
    fn test_connected_requires_address() {
        let mut fx = fixture();
        fx.facade.connect(None, fx.t0).unwrap();

        fx.facade.on_link_status(
            LinkStatus::success(InterfaceStatus {
                up: true,
                ..InterfaceStatus::down()
            }),
            fx.t0,
        );
        assert!(events(&mut fx.facade).is_empty());

        fx.facade.on_link_status(ready_status(), fx.t0);
        assert_eq!(events(&mut fx.facade), vec![LinkEvent::Connected]);
    }

    #[test]
    fn test_statuses_reported_during_feed_are_translated() {
        let mut fx = fixture();
        fx.facade.connect(None, fx.t0).unwrap();
        fx.engine
            .script()
            .on_feed
            .push_back(LinkStatus::new(LinkStatusCode::AUTHFAIL));

        fx.facade.on_received_bytes(b"~frame~", fx.t0);
        assert_eq!(
            events(&mut fx.facade),
            vec![LinkEvent::Error(ErrorKind::AuthenticationFailure)]
        );
    }

    #[test]
    fn test_unknown_code_yields_one_unknown_error() {
        let mut fx = fixture();
        fx.facade.connect(None, fx.t0).unwrap();

        fx.facade
            .on_link_status(LinkStatus::new(LinkStatusCode(77)), fx.t0);
        assert_eq!(
            events(&mut fx.facade),
            vec![LinkEvent::Error(ErrorKind::Unknown)]
        );
    }

    #[test]
    fn test_marker_without_timer_is_informational() {
        let mut fx = fixture();
        fx.facade.connect(None, fx.t0).unwrap();

        fx.facade.on_received_bytes(&[0x41, 0x42, 0x0d, 0x0a], fx.t0);

        assert!(events(&mut fx.facade).is_empty());
        assert_eq!(fx.facade.teardown_timer(), None);
        assert_eq!(fx.engine.fed(), vec![vec![0x41, 0x42, 0x0d, 0x0a]]);
    }

    #[test]
    fn test_close_ack_releases_engine_and_arms_fallback() {
        let mut fx = fixture();
        close_acknowledged(&mut fx);

        let session = fx.facade.session().unwrap();
        assert!(!session.engine_active());
        assert_eq!(fx.engine.script().live, 0);
        assert_eq!(
            fx.facade.teardown_timer(),
            Some(TeardownTimer::AwaitSentinel)
        );
        assert_eq!(
            fx.facade.next_deadline(),
            Some(fx.t0 + Duration::from_secs(5))
        );
    }

    #[test]
    fn test_marker_with_timer_switches_to_settle() {
        let mut fx = fixture();
        close_acknowledged(&mut fx);

        let marker_at = fx.t0 + Duration::from_secs(1);
        fx.facade.on_received_bytes(&[0x41, 0x42, 0x0d, 0x0a], marker_at);

        assert!(events(&mut fx.facade).is_empty());
        assert_eq!(fx.facade.teardown_timer(), Some(TeardownTimer::Settle));

        fx.facade
            .poll_timers(marker_at + Duration::from_millis(199));
        assert!(events(&mut fx.facade).is_empty());

        fx.facade
            .poll_timers(marker_at + Duration::from_millis(200));
        assert_eq!(events(&mut fx.facade), vec![LinkEvent::Disconnected]);

        fx.facade.poll_timers(fx.t0 + Duration::from_secs(5));
        assert!(events(&mut fx.facade).is_empty());
    }

    #[test]
    fn test_fallback_fires_at_teardown_timeout() {
        let mut fx = fixture();
        close_acknowledged(&mut fx);

        fx.facade
            .poll_timers(fx.t0 + Duration::from_millis(4999));
        assert!(events(&mut fx.facade).is_empty());

        fx.facade.poll_timers(fx.t0 + Duration::from_secs(5));
        assert_eq!(events(&mut fx.facade), vec![LinkEvent::Disconnected]);
    }

    #[test]
    fn test_bytes_after_release_are_not_fed() {
        let mut fx = fixture();
        close_acknowledged(&mut fx);

        fx.facade.on_received_bytes(b"~straggler~", fx.t0);
        assert!(fx.engine.fed().is_empty());
    }

    #[test]
    fn test_peer_termination_releases_engine() {
        let mut fx = fixture();
        fx.facade.connect(None, fx.t0).unwrap();

        fx.facade
            .on_link_status(LinkStatus::new(LinkStatusCode::CONNECT), fx.t0);

        assert_eq!(
            events(&mut fx.facade),
            vec![LinkEvent::Error(ErrorKind::PeerDisconnected)]
        );
        assert!(!fx.facade.session().unwrap().engine_active());
    }

    #[test]
    fn test_process_received_drains_in_order() {
        let mut fx = fixture();
        fx.facade.connect(None, fx.t0).unwrap();

        fx.serial.inject(b"abc");
        fx.serial.inject(b"def");
        fx.facade.process_received(fx.t0);

        assert_eq!(fx.engine.fed(), vec![b"abcdef".to_vec()]);
    }

    #[test]
    fn test_process_received_without_session_discards() {
        let mut fx = fixture();

        fx.serial.inject(b"NO CARRIER\r\n");
        fx.facade.process_received(fx.t0);
        fx.facade.connect(None, fx.t0).unwrap();
        fx.facade.process_received(fx.t0);

        assert!(fx.engine.fed().is_empty());
    }

    #[test]
    fn test_destroy_session_cancels_timer_and_events() {
        let mut fx = fixture();
        close_acknowledged(&mut fx);
        fx.facade
            .on_link_status(LinkStatus::new(LinkStatusCode::PROTOCOL), fx.t0);

        fx.facade.destroy_session();

        assert_eq!(fx.facade.live_sessions(), 0);
        assert_eq!(fx.facade.next_deadline(), None);
        assert!(events(&mut fx.facade).is_empty());
        assert_eq!(fx.engine.script().destroyed, 1);
    }

    #[test]
    fn test_status_without_session_is_ignored() {
        let mut fx = fixture();
        fx.facade.on_link_status(ready_status(), fx.t0);
        assert!(events(&mut fx.facade).is_empty());
    }
}
