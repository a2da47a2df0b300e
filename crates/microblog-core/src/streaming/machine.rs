use std::time::Duration;

use crate::config::ClientConfig;
use crate::constants::{DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_INTERVAL_MS};
use crate::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    /// `terminal` means no reconnect is scheduled
    Closed { terminal: bool },
}

/// Fixed-delay reconnect with a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            interval: config.reconnect_interval(),
            max_attempts: config.reconnect_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Reconnect { after: Duration, attempt: u32 },
    Stop,
}

/// Connection lifecycle without any I/O.
///
/// The driver reports what happened on the wire and asks the machine what
/// to do after a close.
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    attempts: u32,
    disconnected: bool,
    last_error: Option<ChannelError>,
    policy: ReconnectPolicy,
}

impl ChannelMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ChannelState::Idle,
            attempts: 0,
            disconnected: false,
            last_error: None,
            policy,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Reconnects scheduled since the last successful open
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&ChannelError> {
        self.last_error.as_ref()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn begin_connect(&mut self) {
        self.state = ChannelState::Connecting;
    }

    pub fn on_open(&mut self) {
        self.state = ChannelState::Open;
        self.attempts = 0;
        self.last_error = None;
    }

    /// Errors are recorded only. A close, if any, is reported separately.
    pub fn on_error(&mut self, error: ChannelError) {
        self.last_error = Some(error);
    }

    pub fn on_close(&mut self) -> CloseDecision {
        if self.disconnected || self.attempts >= self.policy.max_attempts {
            self.state = ChannelState::Closed { terminal: true };
            return CloseDecision::Stop;
        }
        self.attempts += 1;
        self.state = ChannelState::Closed { terminal: false };
        CloseDecision::Reconnect {
            after: self.policy.interval,
            attempt: self.attempts,
        }
    }

    /// Intentional close. Suppresses every later automatic reconnect until
    /// [`ChannelMachine::rearm`].
    pub fn disconnect(&mut self) {
        self.disconnected = true;
        self.state = ChannelState::Closed { terminal: true };
    }

    /// Allow connecting again after a disconnect or an exhausted budget.
    pub fn rearm(&mut self) {
        self.disconnected = false;
        self.attempts = 0;
    }
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
