//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{
    DeferredWork, DialObserver, EngineError, EngineHooks, ErrorKind, ProtocolEngine,
    ReceiveHandler, SerialPort,
};
use crate::link::{InterfaceStatus, LinkStatus, LinkStatusCode};
use crate::modem::{DialEvent, SessionSettings};

/// Install a test subscriber once. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Negotiation finished with 10.0.0.2 via 10.0.0.1.
pub fn ready_status() -> LinkStatus {
    LinkStatus::success(InterfaceStatus::up(
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(10, 0, 0, 1),
    ))
}

/// Engine call recorded by [`MockEngine`], tagged with the session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create(u32),
    Listen(u32),
    Feed(u32, Vec<u8>),
    Close(u32),
    Destroy(u32),
}

/// Behaviour and bookkeeping of a [`MockEngine`].
#[derive(Debug, Default)]
pub struct EngineScript {
    pub calls: Vec<EngineCall>,
    pub created: u32,
    pub live: usize,
    pub max_live: usize,
    pub destroyed: usize,
    pub fail_create: bool,
    pub fail_listen: bool,
    /// Written through the hooks on listen.
    pub listen_output: Vec<u8>,
    /// Written through the hooks on every feed.
    pub feed_output: Vec<u8>,
    /// Reported, all at once, during the next feed.
    pub on_feed: VecDeque<LinkStatus>,
    /// Report a user-close acknowledgement from within `close`.
    pub ack_close: bool,
}

#[derive(Debug)]
pub struct MockSession(u32);

/// Protocol engine driven by an [`EngineScript`].
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<EngineScript>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> MutexGuard<'_, EngineScript> {
        self.inner.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.script().calls.clone()
    }

    /// Every chunk fed, in order.
    pub fn fed(&self) -> Vec<Vec<u8>> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Feed(_, data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProtocolEngine for MockEngine {
    type Session = MockSession;

    fn create_session(&mut self, _settings: &SessionSettings) -> Result<MockSession, EngineError> {
        let mut script = self.script();
        if script.fail_create {
            return Err(EngineError::SessionAllocation);
        }

        script.created += 1;
        let id = script.created;
        script.live += 1;
        script.max_live = script.max_live.max(script.live);
        script.calls.push(EngineCall::Create(id));
        Ok(MockSession(id))
    }

    fn listen(
        &mut self,
        session: &mut MockSession,
        hooks: &mut dyn EngineHooks,
    ) -> Result<(), EngineError> {
        let output = {
            let mut script = self.script();
            if script.fail_listen {
                return Err(EngineError::Listen("scripted failure".into()));
            }
            script.calls.push(EngineCall::Listen(session.0));
            script.listen_output.clone()
        };

        if !output.is_empty() {
            hooks.write(&output);
        }
        Ok(())
    }

    fn feed(&mut self, session: &mut MockSession, data: &[u8], hooks: &mut dyn EngineHooks) {
        let (output, statuses) = {
            let mut script = self.script();
            script.calls.push(EngineCall::Feed(session.0, data.to_vec()));
            let statuses: Vec<_> = script.on_feed.drain(..).collect();
            (script.feed_output.clone(), statuses)
        };

        if !output.is_empty() {
            hooks.write(&output);
        }
        for status in statuses {
            hooks.link_status(status);
        }
    }

    fn close(&mut self, session: &mut MockSession, hooks: &mut dyn EngineHooks) {
        let ack = {
            let mut script = self.script();
            script.calls.push(EngineCall::Close(session.0));
            script.ack_close
        };

        if ack {
            hooks.link_status(LinkStatus::new(LinkStatusCode::USER));
        }
    }

    fn destroy_session(&mut self, session: MockSession) {
        let mut script = self.script();
        script.calls.push(EngineCall::Destroy(session.0));
        script.live -= 1;
        script.destroyed += 1;
    }
}

#[derive(Default)]
struct SerialState {
    sent: Vec<Vec<u8>>,
    handler: Option<ReceiveHandler>,
}

/// Serial port recording transmissions and replaying injected receptions.
#[derive(Clone, Default)]
pub struct MockSerial {
    inner: Arc<Mutex<SerialState>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transfer started, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Deliver `data` to the registered receive handler, as the driver would
    /// from its interrupt.
    pub fn inject(&self, data: &[u8]) {
        let mut state = self.inner.lock().unwrap();
        if let Some(handler) = state.handler.as_mut() {
            handler(data);
        }
    }
}

impl SerialPort for MockSerial {
    fn send_data(&mut self, data: &[u8]) {
        self.inner.lock().unwrap().sent.push(data.to_vec());
    }

    fn receive_data(&mut self, handler: ReceiveHandler) {
        self.inner.lock().unwrap().handler = Some(handler);
    }
}

impl std::fmt::Debug for MockSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerial").finish_non_exhaustive()
    }
}

/// Deferred work that only counts how often it was scheduled.
#[derive(Debug, Default)]
pub struct CountingWork(AtomicUsize);

impl CountingWork {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl DeferredWork for CountingWork {
    fn schedule(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer recording every notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<DialEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DialEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DialObserver for RecordingObserver {
    fn connected(&mut self) {
        self.events.lock().unwrap().push(DialEvent::Connected);
    }

    fn disconnected(&mut self) {
        self.events.lock().unwrap().push(DialEvent::Disconnected);
    }

    fn error(&mut self, kind: ErrorKind) {
        self.events.lock().unwrap().push(DialEvent::Error(kind));
    }
}
