//! Two-speed reconnection policy
//!
//! Fast mode retries every second so a backend restart is picked up quickly.
//! After a run of fast failures the backend is assumed to be absent and the
//! client drops to the slow cadence until a disconnect is observed again.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffMode {
    Fast,
    Normal,
}

/// Retry cadence
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub fast_delay: Duration,
    pub normal_delay: Duration,
    pub fast_failure_threshold: u32,
}

impl BackoffPolicy {
    pub fn delay(&self, mode: BackoffMode) -> Duration {
        match mode {
            BackoffMode::Fast => self.fast_delay,
            BackoffMode::Normal => self.normal_delay,
        }
    }
}

/// Connection bookkeeping owned by the transport
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub connected: bool,
    pub backoff_mode: BackoffMode,
    pub consecutive_failures: u32,
    pub last_attempt: Option<Instant>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            connected: false,
            backoff_mode: BackoffMode::Fast,
            consecutive_failures: 0,
            last_attempt: None,
        }
    }
}

impl ConnectionState {
    /// Whether the minimum gap since the last attempt has elapsed
    pub fn ready_to_attempt(&self, now: Instant, policy: &BackoffPolicy) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= policy.delay(self.backoff_mode),
        }
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    pub fn record_success(&mut self) {
        self.connected = true;
        self.consecutive_failures = 0;
        self.backoff_mode = BackoffMode::Normal;
    }

    /// Count a failed attempt. Returns true when this failure demoted the
    /// policy from fast to normal.
    pub fn record_failure(&mut self, policy: &BackoffPolicy) -> bool {
        self.connected = false;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.backoff_mode == BackoffMode::Fast
            && self.consecutive_failures >= policy.fast_failure_threshold
        {
            self.backoff_mode = BackoffMode::Normal;
            return true;
        }
        false
    }

    /// A live connection was lost: go back to fast retries
    pub fn record_disconnect(&mut self) {
        self.connected = false;
        self.consecutive_failures = 0;
        self.backoff_mode = BackoffMode::Fast;
    }
}
