//! Connection lifecycle states and the transition table.
//!
//! The table is a pure function so it can be checked exhaustively without a
//! link. Entry behaviour of the transient states (`Disconnected`, `Error`) is
//! carried out by the dialer.

use std::fmt;

use crate::core::ErrorKind;
use crate::link::LinkEvent;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session; waiting for `dial`.
    #[default]
    Idle,
    /// Session created, negotiation in progress.
    Connecting,
    /// Link up.
    Connected,
    /// Close requested, waiting for teardown.
    Disconnecting,
    /// Teardown finished. Transient.
    Disconnected,
    /// Session failed. Transient.
    Error(ErrorKind),
}

impl ConnectionState {
    /// Check if a link session exists in this state.
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Disconnecting
        )
    }

    /// Check if this state is left on entry without an external event.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Error(_)
        )
    }

    /// Lowercase name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error(_) => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Error(kind) => write!(f, "error({kind})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Application asks to dial.
    Dial,
    /// Application asks to hang up.
    Disconnect,
    /// Event raised by the link facade.
    Link(LinkEvent),
}

/// Side effect attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create a link session and connect.
    StartSession,
    /// Ask the link to terminate.
    StopSession,
    /// Notify observers of `Connected`.
    NotifyConnected,
}

/// Result of a table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Next state.
    pub to: ConnectionState,
    /// Side effect, run after the state changes.
    pub action: Option<Action>,
}

impl Transition {
    fn to(to: ConnectionState) -> Self {
        Self { to, action: None }
    }

    fn with(to: ConnectionState, action: Action) -> Self {
        Self {
            to,
            action: Some(action),
        }
    }
}

/// Look up the transition for `input` in `state`.
///
/// Returns `None` for every pair absent from the table; such inputs are
/// no-ops.
pub fn next(state: ConnectionState, input: Input) -> Option<Transition> {
    use ConnectionState as S;
    use LinkEvent as L;

    let transition = match (state, input) {
        (S::Idle, Input::Dial) => Transition::with(S::Connecting, Action::StartSession),

        (S::Connecting, Input::Link(L::Connected)) => {
            Transition::with(S::Connected, Action::NotifyConnected)
        }
        (S::Connecting, Input::Link(L::Disconnected)) => Transition::to(S::Disconnected),
        (S::Connecting, Input::Link(L::Error(kind))) => Transition::to(S::Error(kind)),

        (S::Connected, Input::Disconnect) => {
            Transition::with(S::Disconnecting, Action::StopSession)
        }
        (S::Connected, Input::Link(L::Error(kind))) => Transition::to(S::Error(kind)),

        (S::Disconnecting, Input::Link(L::Disconnected)) => Transition::to(S::Disconnected),

        _ => return None,
    };

    Some(transition)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [ErrorKind; 5] = [
        ErrorKind::Unknown,
        ErrorKind::ConnectionTimeout,
        ErrorKind::PeerDisconnected,
        ErrorKind::AuthenticationFailure,
        ErrorKind::ProtocolFailure,
    ];

    fn all_states() -> Vec<ConnectionState> {
        let mut states = vec![
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        ];
        states.extend(KINDS.iter().map(|kind| ConnectionState::Error(*kind)));
        states
    }

    fn all_inputs() -> Vec<Input> {
        let mut inputs = vec![
            Input::Dial,
            Input::Disconnect,
            Input::Link(LinkEvent::Connected),
            Input::Link(LinkEvent::Disconnected),
        ];
        inputs.extend(KINDS.iter().map(|kind| Input::Link(LinkEvent::Error(*kind))));
        inputs
    }

    fn listed(state: ConnectionState, input: Input) -> bool {
        use ConnectionState as S;
        matches!(
            (state, input),
            (S::Idle, Input::Dial)
                | (S::Connecting, Input::Link(_))
                | (S::Connected, Input::Disconnect)
                | (S::Connected, Input::Link(LinkEvent::Error(_)))
                | (S::Disconnecting, Input::Link(LinkEvent::Disconnected))
        )
    }

    #[test]
    fn test_table_is_complete() {
        for state in all_states() {
            for input in all_inputs() {
                assert_eq!(
                    next(state, input).is_some(),
                    listed(state, input),
                    "{state} on {input:?}"
                );
            }
        }
    }

    #[test]
    fn test_dial_only_from_idle() {
        assert_eq!(
            next(ConnectionState::Idle, Input::Dial),
            Some(Transition::with(
                ConnectionState::Connecting,
                Action::StartSession
            ))
        );
        for state in all_states()
            .into_iter()
            .filter(|state| *state != ConnectionState::Idle)
        {
            assert_eq!(next(state, Input::Dial), None, "{state}");
        }
    }

    #[test]
    fn test_connected_error_bypasses_disconnecting() {
        let transition = next(
            ConnectionState::Connected,
            Input::Link(LinkEvent::Error(ErrorKind::PeerDisconnected)),
        );
        assert_eq!(
            transition.map(|t| t.to),
            Some(ConnectionState::Error(ErrorKind::PeerDisconnected))
        );
    }

    #[test]
    fn test_disconnecting_ignores_errors() {
        assert_eq!(
            next(
                ConnectionState::Disconnecting,
                Input::Link(LinkEvent::Error(ErrorKind::ProtocolFailure))
            ),
            None
        );
    }

    #[test]
    fn test_session_invariant_states() {
        assert!(!ConnectionState::Idle.has_session());
        assert!(ConnectionState::Connecting.has_session());
        assert!(ConnectionState::Connected.has_session());
        assert!(ConnectionState::Disconnecting.has_session());
        assert!(ConnectionState::Disconnected.is_transient());
        assert!(ConnectionState::Error(ErrorKind::Unknown).is_transient());
        assert!(!ConnectionState::Connected.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(
            ConnectionState::Error(ErrorKind::ConnectionTimeout).to_string(),
            "error(connection timeout)"
        );
    }
}
