//! Dial-up modem - connection lifecycle on top of the link.
//!
//! - **State machine**: [`ConnectionState`] and the pure transition table [`next`]
//! - **Dialer**: [`DialUpModem`] executing transitions against a [`LinkFacade`](crate::link::LinkFacade)
//! - **Observers**: [`ObserverRegistry`] fan-out of [`DialEvent`]s
//! - **Configuration**: [`DialerConfig`] and its builder

mod config;
mod dialer;
mod observer;
mod state;

pub use config::{AuthType, DialerConfig, DialerConfigBuilder, RedialPolicy, SessionSettings};
pub use dialer::DialUpModem;
pub use observer::{DialEvent, ObserverId, ObserverRegistry};
pub use state::{Action, ConnectionState, Input, Transition, next};
