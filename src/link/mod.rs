//! Dial-up link - byte stream and protocol engine plumbing.
//!
//! This module sits between the serial driver and the connection state
//! machine. It provides:
//!
//! - **Receive queue**: [`ReceiveQueue`] bridging interrupt context to the
//!   application context
//! - **Transmit path**: [`SerialWriter`] chaining serial transfers
//! - **Status translation**: [`translate`] from engine codes to lifecycle events
//! - **Teardown timing**: [`SingleShotTimer`] driven by an explicit clock
//! - **Facade**: [`LinkFacade`] owning one engine session at a time
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Connection state machine          │
//! ├─────────────────────────────────────────┤
//! │            Link facade                  │  ← This module
//! │  queue, sentinel, timers, translation   │
//! ├──────────────────────┬──────────────────┤
//! │   Protocol engine    │   Serial port    │
//! └──────────────────────┴──────────────────┘
//! ```

mod facade;
mod queue;
mod status;
mod timer;
mod writer;

pub use facade::{LinkEvent, LinkFacade, LinkSession, TeardownTimer, find_sentinel};
pub use queue::{ReceiveProducer, ReceiveQueue};
pub use status::{InterfaceStatus, LinkStatus, LinkStatusCode, Translation, translate};
pub use timer::SingleShotTimer;
pub use writer::SerialWriter;
