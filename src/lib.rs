//! # pppos-dialer
//!
//! Connection lifecycle manager for dial-up PPP over a serial modem.
//!
//! Once the modem has answered a dial command with `CONNECT`, the serial line
//! carries PPP frames. This crate owns everything between that moment and the
//! modem printing `\r\n` again after hang-up:
//!
//! - **Receive path**: an interrupt-safe queue handing bytes to the
//!   application context
//! - **Link facade**: one protocol engine session at a time, with engine
//!   statuses collapsed onto three lifecycle events
//! - **Teardown**: detection of the modem's return to command mode, with a
//!   timeout fallback
//! - **State machine**: `Idle → Connecting → Connected → Disconnecting`,
//!   with automatic redial after errors
//! - **Observers**: connected, disconnected and error notifications
//!
//! The PPP negotiation itself is delegated to a [`ProtocolEngine`](core::ProtocolEngine)
//! and the hardware to a [`SerialPort`](core::SerialPort).
//!
//! ## Feature Flags
//!
//! - `runtime` (default): tokio task driving the modem from commands,
//!   receive wake-ups and timers
//!
//! ## Modules
//!
//! - [`core`]: Collaborator traits, constants, and error types
//! - [`link`]: Receive queue, transmit path, status translation, link facade
//! - [`modem`]: Connection state machine, observers, configuration
//! - [`runtime`]: Tokio driver (requires `runtime` feature)
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use pppos_dialer::prelude::*;
//!
//! let config = DialerConfigBuilder::new()
//!     .credentials("internet", "internet")
//!     .redial(RedialPolicy::Limited { max_attempts: 5 })
//!     .build()?;
//!
//! let mut modem = DialUpModem::new(lwip_ppp, uart, config, Arc::new(|| wake_app_task()))?;
//! modem.attach(Box::new(StatusLed::default()));
//! modem.dial(Instant::now())?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Byte stream and engine plumbing
pub mod link;

// Connection lifecycle
pub mod modem;

// Tokio driver (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::link::{InterfaceStatus, LinkEvent, LinkStatus, LinkStatusCode};

    pub use crate::modem::{
        AuthType, ConnectionState, DialEvent, DialUpModem, DialerConfig, DialerConfigBuilder,
        ObserverId, RedialPolicy, SessionSettings,
    };

    #[cfg(feature = "runtime")]
    pub use crate::runtime::{DialerHandle, DialerRuntime, EventForwarder};
}

// Re-export commonly used items at crate root
pub use crate::core::{DialerError, DialerResult, ErrorKind};

pub use modem::{ConnectionState, DialUpModem, DialerConfig};

#[cfg(feature = "runtime")]
pub use runtime::{DialerHandle, DialerRuntime};
