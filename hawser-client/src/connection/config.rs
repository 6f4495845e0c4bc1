//! Connection tuning knobs.

use std::time::Duration;

/// Tuning for transport establishment and the service loops.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Timeout for a single transport establishment attempt.
    pub connect_timeout: Duration,

    /// Interval between keepalive pings on plain socket transports.
    ///
    /// Ignored on HTTP transports and media/CDN connections, which never
    /// run the ping loop.
    pub ping_interval: Duration,

    /// How long the read side may stay silent before the check loop
    /// treats the connection as stale.
    pub stale_read_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(10),
            stale_read_timeout: Duration::from_secs(35),
        }
    }
}

impl ConnectionConfig {
    /// Configuration for bulk media transfers.
    ///
    /// Media sockets go quiet for long stretches while the peer seeks, so
    /// staleness detection is relaxed.
    pub fn media() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            stale_read_timeout: Duration::from_secs(120),
            ..Self::default()
        }
    }

    /// Override the transport establishment timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the keepalive ping interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Override the stale-read window.
    pub fn with_stale_read_timeout(mut self, timeout: Duration) -> Self {
        self.stale_read_timeout = timeout;
        self
    }
}
