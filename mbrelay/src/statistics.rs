//! Relay statistics collection

use std::fmt;

/// Relay counters
///
/// Updated by the bridge after every cycle. Only the single relay control
/// flow touches them, so plain integers are enough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStatistics {
    /// Cycles started
    pub cycles: u64,
    /// Cycles skipped because a link was down
    pub deferred_cycles: u64,
    /// Requests fully written to the source link
    pub requests_sent: u64,
    /// Responses fully written to the target link
    pub responses_forwarded: u64,
    /// Exception responses consumed without forwarding
    pub exceptions_suppressed: u64,
    /// Send failures and short writes on either link
    pub transport_failures: u64,
    /// Responses not completed within the read attempt budget
    pub protocol_failures: u64,
    /// Fresh connections established
    pub reconnects: u64,
    /// Stale bytes flushed right after connecting
    pub stale_bytes_discarded: u64,
}

impl RelayStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_cycles(&mut self) {
        self.cycles += 1;
    }

    pub fn increment_deferred_cycles(&mut self) {
        self.deferred_cycles += 1;
    }

    pub fn increment_requests_sent(&mut self) {
        self.requests_sent += 1;
    }

    pub fn increment_responses_forwarded(&mut self) {
        self.responses_forwarded += 1;
    }

    pub fn increment_exceptions_suppressed(&mut self) {
        self.exceptions_suppressed += 1;
    }

    pub fn increment_transport_failures(&mut self) {
        self.transport_failures += 1;
    }

    pub fn increment_protocol_failures(&mut self) {
        self.protocol_failures += 1;
    }

    /// Record a fresh connection and the stale bytes it flushed
    pub fn record_reconnect(&mut self, discarded: usize) {
        self.reconnects += 1;
        self.stale_bytes_discarded += discarded as u64;
    }

    /// Share of sent requests that ended in a forwarded response, in percent
    ///
    /// Returns 0.0 if no request has been sent.
    pub fn forward_rate(&self) -> f64 {
        if self.requests_sent == 0 {
            0.0
        } else {
            (self.responses_forwarded as f64 / self.requests_sent as f64) * 100.0
        }
    }
}

impl fmt::Display for RelayStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycles={} deferred={} sent={} forwarded={} exceptions={} transport_failures={} \
             protocol_failures={} reconnects={} stale_bytes={}",
            self.cycles,
            self.deferred_cycles,
            self.requests_sent,
            self.responses_forwarded,
            self.exceptions_suppressed,
            self.transport_failures,
            self.protocol_failures,
            self.reconnects,
            self.stale_bytes_discarded,
        )
    }
}
