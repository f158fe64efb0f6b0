//! Tokio driver for [`DialUpModem`].
//!
//! The modem itself is sans-IO: it never sleeps and never spawns. This module
//! owns one in a task and drives it from three sources:
//!
//! - commands sent through a [`DialerHandle`], including link statuses the
//!   engine raises from its own timers
//! - the receive wake-up scheduled by the serial interrupt
//! - the modem's next teardown deadline
//!
//! # Example
//!
//! ```ignore
//! use pppos_dialer::runtime::{DialerRuntime, EventForwarder};
//!
//! let (mut runtime, handle) = DialerRuntime::new(engine, uart, DialerConfig::default())?;
//! let (forwarder, mut events) = EventForwarder::channel();
//! runtime.attach(Box::new(forwarder));
//! tokio::spawn(runtime.run());
//!
//! handle.dial_with_seed(after_connect).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Notify, mpsc, watch};
use tracing::{debug, warn};

use crate::core::{
    DeferredWork, DialObserver, DialerError, DialerResult, ErrorKind, MAX_SEED_BYTES,
    ProtocolEngine, SerialPort,
};
use crate::link::LinkStatus;
use crate::modem::{ConnectionState, DialEvent, DialUpModem, DialerConfig, ObserverId};

/// Queued commands between a handle and its runtime.
pub const COMMAND_CHANNEL_CAPACITY: usize = 32;

impl DeferredWork for Notify {
    fn schedule(&self) {
        self.notify_one();
    }
}

/// Requests accepted by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a session.
    Dial,
    /// Start a session with seed bytes.
    DialWithSeed(Vec<u8>),
    /// Hang up.
    Disconnect,
    /// The serial port finished a transfer.
    SendDone,
    /// Status reported by the engine outside of a byte feed, such as a
    /// peer-dead or idle timeout.
    LinkStatus(LinkStatus),
}

/// Cloneable handle to a running [`DialerRuntime`].
#[derive(Debug, Clone)]
pub struct DialerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl DialerHandle {
    /// Request a dial.
    pub async fn dial(&self) -> DialerResult<()> {
        self.send(Command::Dial).await
    }

    /// Request a dial with seed bytes.
    pub async fn dial_with_seed(&self, seed: impl Into<Vec<u8>>) -> DialerResult<()> {
        let seed = seed.into();
        if seed.len() > MAX_SEED_BYTES {
            return Err(DialerError::SeedTooLarge {
                len: seed.len(),
                max: MAX_SEED_BYTES,
            });
        }
        self.send(Command::DialWithSeed(seed)).await
    }

    /// Request a hang-up.
    pub async fn disconnect(&self) -> DialerResult<()> {
        self.send(Command::Disconnect).await
    }

    /// Report a finished serial transfer.
    pub async fn send_done(&self) -> DialerResult<()> {
        self.send(Command::SendDone).await
    }

    /// Deliver a status the engine reported on its own, for instance from
    /// its LCP echo or idle timers.
    pub async fn link_status(&self, status: LinkStatus) -> DialerResult<()> {
        self.send(Command::LinkStatus(status)).await
    }

    /// State after the runtime's last step.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    async fn send(&self, command: Command) -> DialerResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DialerError::RuntimeClosed)
    }
}

/// Observer forwarding notifications into a channel.
#[derive(Debug)]
pub struct EventForwarder {
    tx: mpsc::UnboundedSender<DialEvent>,
}

impl EventForwarder {
    /// Create a forwarder and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DialEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: DialEvent) {
        if self.tx.send(event).is_err() {
            debug!(?event, "event receiver dropped");
        }
    }
}

impl DialObserver for EventForwarder {
    fn connected(&mut self) {
        self.forward(DialEvent::Connected);
    }

    fn disconnected(&mut self) {
        self.forward(DialEvent::Disconnected);
    }

    fn error(&mut self, kind: ErrorKind) {
        self.forward(DialEvent::Error(kind));
    }
}

/// Task body owning a [`DialUpModem`].
pub struct DialerRuntime<E: ProtocolEngine, S: SerialPort> {
    modem: DialUpModem<E, S>,
    wake: Arc<Notify>,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<ConnectionState>,
}

impl<E: ProtocolEngine, S: SerialPort> DialerRuntime<E, S> {
    /// Build a modem wired to a tokio wake-up, and a handle to drive it.
    pub fn new(engine: E, port: S, config: DialerConfig) -> DialerResult<(Self, DialerHandle)> {
        let wake = Arc::new(Notify::new());
        let modem = DialUpModem::new(engine, port, config, wake.clone())?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(modem.state());

        let runtime = Self {
            modem,
            wake,
            commands: command_rx,
            state: state_tx,
        };
        let handle = DialerHandle {
            commands: command_tx,
            state: state_rx,
        };
        Ok((runtime, handle))
    }

    /// Register a lifecycle observer before the runtime starts.
    pub fn attach(&mut self, observer: Box<dyn DialObserver>) -> ObserverId {
        self.modem.attach(observer)
    }

    /// Drive the modem until every handle is dropped, then return it.
    pub async fn run(mut self) -> DialUpModem<E, S> {
        loop {
            let deadline = self.modem.next_deadline();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command),
                    None => break,
                },
                () = self.wake.notified() => self.modem.process_received(now()),
                () = sleep_until(deadline) => self.modem.poll_timers(now()),
            }

            let current = self.modem.state();
            self.state.send_if_modified(|state| {
                let changed = *state != current;
                *state = current;
                changed
            });
        }

        debug!("all dialer handles dropped, runtime stopping");
        self.modem
    }

    fn execute(&mut self, command: Command) {
        let now = now();
        let result = match command {
            Command::Dial => self.modem.dial(now),
            Command::DialWithSeed(seed) => self.modem.dial_with_seed(&seed, now),
            Command::Disconnect => {
                self.modem.disconnect(now);
                Ok(())
            }
            Command::SendDone => {
                self.modem.on_send_done();
                Ok(())
            }
            Command::LinkStatus(status) => {
                self.modem.on_link_status(status, now);
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!(%err, "dial request failed");
        }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
