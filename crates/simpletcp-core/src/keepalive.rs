//! Keepalive timing shared by client and server.

use std::time::Duration;

/// Interval between keepalive probes.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);

/// How long a probe may go unanswered.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing of the ping / reply cycle.
///
/// A peer that shows no traffic for `interval + timeout` after a probe is
/// considered dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Sleep before each probe.
    pub interval: Duration,
    /// Window in which any traffic counts as a reply.
    pub timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PING_INTERVAL,
            timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

impl KeepaliveConfig {
    /// Creates a keepalive configuration.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = KeepaliveConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
