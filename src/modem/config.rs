//! Dialer configuration.

use std::time::Duration;

use crate::core::{
    DEFAULT_AUTH_USER, DEFAULT_LISTEN_TIME, DialerError, DialerResult, RECEIVE_QUEUE_CAPACITY,
    SETTLE_DELAY, TEARDOWN_TIMEOUT, TRANSMIT_BUFFER_CAPACITY,
};

/// Authentication methods the engine may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// No authentication.
    None,
    /// PAP only.
    Pap,
    /// CHAP only.
    Chap,
    /// Whatever the peer asks for.
    #[default]
    Any,
}

/// Per-session engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Accepted authentication methods.
    pub auth: AuthType,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Require the peer to authenticate itself.
    pub auth_required: bool,
    /// Ask the peer for name servers.
    pub use_peer_dns: bool,
    /// Listen delay before the engine sends its first request.
    pub listen_time: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auth: AuthType::Any,
            user: DEFAULT_AUTH_USER.to_string(),
            password: String::new(),
            auth_required: false,
            use_peer_dns: true,
            listen_time: DEFAULT_LISTEN_TIME,
        }
    }
}

/// What to do after a connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedialPolicy {
    /// Redial immediately, forever.
    ///
    /// An engine that reports a failure status from within every `listen`
    /// keeps the redial loop inside a single call, holding the application
    /// context until the engine recovers.
    #[default]
    Unbounded,
    /// Redial immediately, at most `max_attempts` times in a row.
    Limited {
        /// Consecutive redials allowed before giving up.
        max_attempts: u32,
    },
    /// Stay idle after an error.
    Disabled,
}

impl RedialPolicy {
    /// Check if another redial is allowed after `attempts` consecutive ones.
    pub fn allows(&self, attempts: u32) -> bool {
        match *self {
            RedialPolicy::Unbounded => true,
            RedialPolicy::Limited { max_attempts } => attempts < max_attempts,
            RedialPolicy::Disabled => false,
        }
    }
}

/// Dialer configuration.
#[derive(Debug, Clone)]
pub struct DialerConfig {
    /// Wait after the command-mode sentinel before declaring teardown done.
    pub settle_delay: Duration,

    /// Wait for the sentinel after a close acknowledgement.
    pub teardown_timeout: Duration,

    /// Receive queue capacity in bytes.
    pub receive_capacity: usize,

    /// Transmit buffer capacity in bytes.
    pub transmit_capacity: usize,

    /// Engine session settings.
    pub session: SessionSettings,

    /// Behaviour after a connection error.
    pub redial: RedialPolicy,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            teardown_timeout: TEARDOWN_TIMEOUT,
            receive_capacity: RECEIVE_QUEUE_CAPACITY,
            transmit_capacity: TRANSMIT_BUFFER_CAPACITY,
            session: SessionSettings::default(),
            redial: RedialPolicy::default(),
        }
    }
}

impl DialerConfig {
    /// Check the configuration for values the link cannot run with.
    pub fn validate(&self) -> DialerResult<()> {
        if self.receive_capacity == 0 {
            return Err(DialerError::Config("receive capacity must be non-zero".into()));
        }
        if self.transmit_capacity == 0 {
            return Err(DialerError::Config(
                "transmit capacity must be non-zero".into(),
            ));
        }
        if self.settle_delay >= self.teardown_timeout {
            return Err(DialerError::Config(format!(
                "settle delay {:?} must be shorter than teardown timeout {:?}",
                self.settle_delay, self.teardown_timeout
            )));
        }
        Ok(())
    }
}

/// Builder for [`DialerConfig`].
#[derive(Debug)]
pub struct DialerConfigBuilder {
    config: DialerConfig,
}

impl DialerConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self {
            config: DialerConfig::default(),
        }
    }

    /// Set the settle delay.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set the teardown timeout.
    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.config.teardown_timeout = timeout;
        self
    }

    /// Set the receive queue capacity.
    pub fn receive_capacity(mut self, bytes: usize) -> Self {
        self.config.receive_capacity = bytes;
        self
    }

    /// Set the transmit buffer capacity.
    pub fn transmit_capacity(mut self, bytes: usize) -> Self {
        self.config.transmit_capacity = bytes;
        self
    }

    /// Set the engine session settings.
    pub fn session(mut self, session: SessionSettings) -> Self {
        self.config.session = session;
        self
    }

    /// Set the credentials presented to the network.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.session.user = user.into();
        self.config.session.password = password.into();
        self
    }

    /// Set the redial policy.
    pub fn redial(mut self, policy: RedialPolicy) -> Self {
        self.config.redial = policy;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> DialerResult<DialerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for DialerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
