//! Dial-up link - core traits, types, and constants.
//!
//! Collaborator seams (engine, serial port, deferred work, observers), the
//! error taxonomy, and the fixed link constants. Everything else builds on
//! this module.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
