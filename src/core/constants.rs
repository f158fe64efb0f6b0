//! Link constants for the dial-up PPP lifecycle.
//!
//! Wire-level values are fixed by modem behaviour and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// TEARDOWN DETECTION
// =============================================================================

/// Sequence a modem emits when it drops back to command mode (`\r\n`).
pub const COMMAND_MODE_SENTINEL: [u8; 2] = [0x0d, 0x0a];

/// Settle window after the sentinel before teardown is declared complete.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Upper bound on waiting for the sentinel after a close acknowledgement.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// BUFFER SIZES
// =============================================================================

/// Receive ring capacity between the serial interrupt and the application.
pub const RECEIVE_QUEUE_CAPACITY: usize = 4096;

/// Transmit buffer capacity for engine output awaiting the serial port.
pub const TRANSMIT_BUFFER_CAPACITY: usize = 4096;

/// Maximum seed bytes accepted with a dial request.
pub const MAX_SEED_BYTES: usize = 256;

// =============================================================================
// ENGINE SESSION DEFAULTS
// =============================================================================

/// Time the engine waits in listen mode before sending its first request.
pub const DEFAULT_LISTEN_TIME: Duration = Duration::from_millis(100);

/// Default PAP user name presented to the network.
pub const DEFAULT_AUTH_USER: &str = "PAPUSER";
