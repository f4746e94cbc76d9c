//! Incremental response collection
//!
//! A response is read with a fixed budget of receive attempts. Every attempt
//! is one non-blocking receive; an attempt that yields nothing is followed by
//! one bounded readiness wait. A 9-byte exception response is recognised as
//! soon as its ninth byte arrives, so the reader never waits for a normal
//! length reply that will not come.
//!
//! With the default budget (10 attempts, 500 ms each) a silent peer stalls a
//! cycle for about five seconds at most.

use bytes::{Bytes, BytesMut};
use mbrelay_core::exception_code;
use mbrelay_transport::{RecvStatus, StreamAccessor};
use std::time::Duration;

/// Result of collecting one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Full-length normal response
    Complete(Bytes),
    /// Short exception response, complete as it is
    ExceptionShort(Bytes),
    /// Attempt budget used up; `received` bytes were collected
    Exhausted { received: usize },
}

/// Bounded response reader
#[derive(Debug, Clone)]
pub struct FrameReader {
    max_attempts: u32,
    poll_interval: Duration,
}

impl FrameReader {
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_attempts,
            poll_interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Collect a response of at most `expected_length` bytes
    ///
    /// Receive errors and graceful closes count as empty attempts; a dead
    /// link therefore ends as `Exhausted` and is reset by the caller.
    pub async fn collect_response<S: StreamAccessor + ?Sized>(
        &self,
        stream: &mut S,
        expected_length: usize,
        function_code: u8,
    ) -> FrameOutcome {
        let mut buffer = BytesMut::zeroed(expected_length);
        let mut total = 0;

        for attempt in 1..=self.max_attempts {
            let received = match stream.try_read(&mut buffer[total..]) {
                Ok(RecvStatus::Data(n)) => n,
                Ok(RecvStatus::Pending) => 0,
                Ok(RecvStatus::Closed) => {
                    log::debug!("Peer closed during response (attempt {})", attempt);
                    0
                }
                Err(e) => {
                    log::debug!("Receive failed on attempt {}: {}", attempt, e);
                    0
                }
            };

            if received == 0 {
                if let Err(e) = stream.wait_readable(self.poll_interval).await {
                    log::debug!("Readiness wait failed on attempt {}: {}", attempt, e);
                }
                continue;
            }

            total += received;
            log::trace!(
                "Received {} bytes ({}/{}) on attempt {}",
                received,
                total,
                expected_length,
                attempt
            );

            if let Some(code) = exception_code(&buffer[..total], function_code) {
                log::trace!("Exception response 0x{:02X} after {} bytes", code, total);
                buffer.truncate(total);
                return FrameOutcome::ExceptionShort(buffer.freeze());
            }

            if total == expected_length {
                return FrameOutcome::Complete(buffer.freeze());
            }
        }

        FrameOutcome::Exhausted { received: total }
    }
}
