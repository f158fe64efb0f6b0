//! Engine link-status codes and their translation to lifecycle events.
//!
//! Codes follow the lwIP PPP numbering. The translation table is the only
//! place raw codes are interpreted; nothing past the link facade sees them.

use std::fmt;
use std::net::Ipv4Addr;

use crate::core::ErrorKind;

/// Raw link-status code reported by a protocol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkStatusCode(pub i32);

impl LinkStatusCode {
    /// No error.
    pub const NONE: Self = Self(0);
    /// Invalid parameter.
    pub const PARAM: Self = Self(1);
    /// Unable to open session.
    pub const OPEN: Self = Self(2);
    /// Invalid I/O device.
    pub const DEVICE: Self = Self(3);
    /// Unable to allocate resources.
    pub const ALLOC: Self = Self(4);
    /// User interrupt; acknowledges a requested close.
    pub const USER: Self = Self(5);
    /// Connection lost (peer hung up, rebooted, or sent terminate).
    pub const CONNECT: Self = Self(6);
    /// Failed authentication challenge.
    pub const AUTHFAIL: Self = Self(7);
    /// Failed to meet protocol.
    pub const PROTOCOL: Self = Self(8);
    /// Connection timeout.
    pub const PEERDEAD: Self = Self(9);
    /// Idle timeout.
    pub const IDLETIMEOUT: Self = Self(10);
    /// Max connect time reached.
    pub const CONNECTTIME: Self = Self(11);
    /// Loopback detected.
    pub const LOOPBACK: Self = Self(12);

    /// Symbolic name, if the code is known.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::NONE => "NONE",
            Self::PARAM => "PARAM",
            Self::OPEN => "OPEN",
            Self::DEVICE => "DEVICE",
            Self::ALLOC => "ALLOC",
            Self::USER => "USER",
            Self::CONNECT => "CONNECT",
            Self::AUTHFAIL => "AUTHFAIL",
            Self::PROTOCOL => "PROTOCOL",
            Self::PEERDEAD => "PEERDEAD",
            Self::IDLETIMEOUT => "IDLETIMEOUT",
            Self::CONNECTTIME => "CONNECTTIME",
            Self::LOOPBACK => "LOOPBACK",
            _ => return None,
        };
        Some(name)
    }

    /// Codes that indicate the engine was misused rather than a link event.
    pub fn is_engine_misuse(&self) -> bool {
        matches!(*self, Self::PARAM | Self::OPEN | Self::DEVICE | Self::ALLOC)
    }
}

impl fmt::Display for LinkStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "PPPERR_{name}"),
            None => write!(f, "unknown({})", self.0),
        }
    }
}

/// Network interface state attached to a link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceStatus {
    /// Interface administratively up.
    pub up: bool,
    /// Negotiated local address.
    pub local: Ipv4Addr,
    /// Peer address.
    pub gateway: Ipv4Addr,
    /// Netmask.
    pub netmask: Ipv4Addr,
    /// Name servers learned from the peer.
    pub dns: [Option<Ipv4Addr>; 2],
}

impl Default for InterfaceStatus {
    fn default() -> Self {
        Self::down()
    }
}

impl InterfaceStatus {
    /// Interface down, no addresses.
    pub fn down() -> Self {
        Self {
            up: false,
            local: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            dns: [None, None],
        }
    }

    /// Interface up with the given local and peer addresses.
    pub fn up(local: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        Self {
            up: true,
            local,
            gateway,
            netmask: Ipv4Addr::BROADCAST,
            dns: [None, None],
        }
    }

    /// Up and holding a non-zero negotiated address.
    pub fn is_usable(&self) -> bool {
        self.up && !self.local.is_unspecified()
    }
}

/// One link-status report from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    /// Raw code.
    pub code: LinkStatusCode,
    /// Interface state at the time of the report.
    pub interface: InterfaceStatus,
}

impl LinkStatus {
    /// Status with a down interface.
    pub fn new(code: LinkStatusCode) -> Self {
        Self {
            code,
            interface: InterfaceStatus::down(),
        }
    }

    /// Successful negotiation with the given interface state.
    pub fn success(interface: InterfaceStatus) -> Self {
        Self {
            code: LinkStatusCode::NONE,
            interface,
        }
    }
}

/// What the facade must do in response to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// Raise `Connected`.
    Connected,
    /// Success without a usable address yet; wait for a later status.
    Pending,
    /// The engine acknowledged our close; start waiting for the sentinel.
    CloseAcknowledged,
    /// Raise `Error(kind)`.
    Failed {
        /// Reported kind.
        kind: ErrorKind,
        /// The engine session is finished and must be released now.
        release_engine: bool,
    },
}

/// Map a status onto the lifecycle vocabulary.
///
/// Every code maps to something; unlisted codes become `Unknown`.
pub fn translate(status: &LinkStatus) -> Translation {
    let failed = |kind| Translation::Failed {
        kind,
        release_engine: false,
    };

    match status.code {
        LinkStatusCode::NONE if status.interface.is_usable() => Translation::Connected,
        LinkStatusCode::NONE => Translation::Pending,
        LinkStatusCode::USER => Translation::CloseAcknowledged,
        LinkStatusCode::CONNECT => Translation::Failed {
            kind: ErrorKind::PeerDisconnected,
            release_engine: true,
        },
        LinkStatusCode::AUTHFAIL => failed(ErrorKind::AuthenticationFailure),
        LinkStatusCode::PROTOCOL => failed(ErrorKind::ProtocolFailure),
        LinkStatusCode::PEERDEAD
        | LinkStatusCode::IDLETIMEOUT
        | LinkStatusCode::CONNECTTIME
        | LinkStatusCode::LOOPBACK => failed(ErrorKind::ConnectionTimeout),
        _ => failed(ErrorKind::Unknown),
    }
}
