//! Collaborator traits for the dial-up link.
//!
//! The link never talks to hardware or to a PPP implementation directly;
//! these traits are the seams where a serial driver and a protocol engine
//! plug in.

use super::error::{EngineError, ErrorKind};
use crate::link::LinkStatus;
use crate::modem::SessionSettings;

/// Callbacks an engine invokes while it runs on behalf of the link.
///
/// A hooks value is only valid for the duration of one engine call.
pub trait EngineHooks {
    /// Hand encoded protocol bytes to the serial transport.
    ///
    /// Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Report a link-status change.
    fn link_status(&mut self, status: LinkStatus);
}

/// A point-to-point protocol engine negotiating a session over a byte stream.
///
/// The engine owns LCP/authentication/IPCP negotiation. The link only feeds
/// bytes in and reacts to the statuses it reports.
///
/// # Example
///
/// ```ignore
/// struct LwipPpp { /* ... */ }
///
/// impl ProtocolEngine for LwipPpp {
///     type Session = PppPcb;
///
///     fn create_session(&mut self, settings: &SessionSettings) -> Result<PppPcb, EngineError> {
///         pppos_create(settings).ok_or(EngineError::SessionAllocation)
///     }
///     // ...
/// }
/// ```
pub trait ProtocolEngine {
    /// Engine-side handle for one session.
    type Session;

    /// Allocate a session configured with `settings`.
    fn create_session(&mut self, settings: &SessionSettings)
    -> Result<Self::Session, EngineError>;

    /// Enter passive mode, waiting for the peer to open negotiation.
    fn listen(
        &mut self,
        session: &mut Self::Session,
        hooks: &mut dyn EngineHooks,
    ) -> Result<(), EngineError>;

    /// Feed bytes received from the peer.
    fn feed(&mut self, session: &mut Self::Session, data: &[u8], hooks: &mut dyn EngineHooks);

    /// Request graceful termination.
    ///
    /// Completion is reported later as a user-close acknowledgement.
    fn close(&mut self, session: &mut Self::Session, hooks: &mut dyn EngineHooks);

    /// Release the session.
    fn destroy_session(&mut self, session: Self::Session);
}

/// Handler invoked from interrupt context with freshly received bytes.
pub type ReceiveHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Serial transport towards the modem.
pub trait SerialPort {
    /// Start transmitting `data`.
    ///
    /// Completion is signalled by routing the driver's done callback to
    /// [`DialUpModem::on_send_done`](crate::modem::DialUpModem::on_send_done).
    fn send_data(&mut self, data: &[u8]);

    /// Register the receive handler. It is called from interrupt context.
    fn receive_data(&mut self, handler: ReceiveHandler);
}

/// Scheduling primitive used to move work from interrupt context to the
/// application context.
pub trait DeferredWork: Send + Sync {
    /// Request one run of the deferred work.
    fn schedule(&self);
}

impl<F> DeferredWork for F
where
    F: Fn() + Send + Sync,
{
    fn schedule(&self) {
        self()
    }
}

/// Listener for connection lifecycle notifications.
pub trait DialObserver: Send {
    /// The link is up and has a negotiated address.
    fn connected(&mut self);

    /// The link has been torn down.
    fn disconnected(&mut self);

    /// The link failed. A redial may follow.
    fn error(&mut self, kind: ErrorKind);
}
