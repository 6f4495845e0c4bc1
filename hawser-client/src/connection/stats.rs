//! Per-connection counters and timing bookkeeping.

use std::time::Duration;

/// Counters and timestamps tracked per connection.
///
/// The HTTP pair counts long-poll requests in flight on HTTP transports
/// and is reset on every connect; everything else accumulates for the
/// life of the connection object.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// HTTP requests written this transport session.
    pub http_requests_sent: u64,

    /// HTTP responses received this transport session.
    pub http_responses_received: u64,

    /// Total payload bytes received.
    pub bytes_received: u64,

    /// When the last payload chunk arrived, if any chunk has.
    pub last_chunk: Option<Duration>,

    /// Successful transport establishments.
    pub connects: u64,
}

impl ConnectionStats {
    /// Fresh, all-zero stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful transport establishment.
    pub fn record_connect(&mut self) {
        self.connects += 1;
    }

    /// Zero the HTTP in-flight counters for a fresh transport session.
    pub fn reset_http(&mut self) {
        self.http_requests_sent = 0;
        self.http_responses_received = 0;
    }

    /// Record an HTTP request going out.
    pub fn record_http_request(&mut self) {
        self.http_requests_sent += 1;
    }

    /// Record an HTTP response coming in.
    pub fn record_http_response(&mut self) {
        self.http_responses_received += 1;
    }

    /// HTTP requests still awaiting a response.
    pub fn pending_http(&self) -> u64 {
        self.http_requests_sent
            .saturating_sub(self.http_responses_received)
    }

    /// Record a received payload chunk.
    pub fn record_chunk(&mut self, now: Duration, bytes: usize) {
        self.last_chunk = Some(now);
        self.bytes_received += bytes as u64;
    }

    /// How long the read side has been silent.
    pub fn time_since_last_chunk(&self, now: Duration) -> Option<Duration> {
        self.last_chunk.map(|at| now.saturating_sub(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_counters_reset_but_chunks_accumulate() {
        let mut stats = ConnectionStats::new();
        stats.record_connect();
        stats.record_http_request();
        stats.record_http_request();
        stats.record_http_response();
        assert_eq!(stats.pending_http(), 1);

        stats.record_chunk(Duration::from_secs(3), 128);
        stats.record_connect();
        stats.reset_http();

        assert_eq!(stats.pending_http(), 0);
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.bytes_received, 128);
        assert_eq!(stats.last_chunk, Some(Duration::from_secs(3)));
    }

    #[test]
    fn read_silence_is_measured_from_last_chunk() {
        let mut stats = ConnectionStats::new();
        assert_eq!(stats.time_since_last_chunk(Duration::from_secs(9)), None);

        stats.record_chunk(Duration::from_secs(4), 1);
        assert_eq!(
            stats.time_since_last_chunk(Duration::from_secs(9)),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn pending_http_never_underflows() {
        let mut stats = ConnectionStats::new();
        stats.record_http_response();
        assert_eq!(stats.pending_http(), 0);
    }
}
