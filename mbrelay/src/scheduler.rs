//! Fixed-interval relay loop
//!
//! Each iteration waits one tick, then runs one bridge cycle. A cycle that
//! finds a link down is followed by an extra backoff wait. Cancellation is
//! observed before and during the waits; a running cycle, including its
//! read attempts, is always allowed to finish.

use crate::bridge::{CycleStatus, ProtocolBridge};
use crate::config::RelayTiming;
use crate::statistics::RelayStatistics;
use mbrelay_transport::TransportLayer;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drives [`ProtocolBridge`] cycles until cancelled
pub struct Scheduler<S: TransportLayer, T: TransportLayer> {
    bridge: ProtocolBridge<S, T>,
    tick_interval: Duration,
    reconnect_backoff: Duration,
    shutdown: CancellationToken,
}

impl<S: TransportLayer, T: TransportLayer> Scheduler<S, T> {
    pub fn new(bridge: ProtocolBridge<S, T>, timing: &RelayTiming, shutdown: CancellationToken) -> Self {
        Self {
            bridge,
            tick_interval: timing.tick_interval,
            reconnect_backoff: timing.reconnect_backoff,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled
    ///
    /// Both links are closed before returning.
    ///
    /// # Returns
    /// Final relay statistics
    pub async fn run(mut self) -> RelayStatistics {
        log::info!(
            "Relaying {} -> {} every {:?}",
            self.bridge.source().remote_address(),
            self.bridge.target().remote_address(),
            self.tick_interval
        );
        log::debug!(
            "Response budget: {} attempts, {:?} readiness wait",
            self.bridge.reader().max_attempts(),
            self.bridge.reader().poll_interval()
        );

        while !self.shutdown.is_cancelled() {
            if !self.pause(self.tick_interval).await {
                break;
            }

            let status = self.bridge.run_cycle().await;
            if status.is_success() {
                log::trace!("Cycle finished: {:?}", status);
            } else {
                log::debug!(
                    "Cycle did not complete: {:?} (last transaction {:?})",
                    status,
                    self.bridge.last_transaction_id()
                );
            }

            if status == CycleStatus::LinkDown && !self.pause(self.reconnect_backoff).await {
                break;
            }
        }

        self.bridge.shutdown().await;
        let statistics = self.bridge.statistics().clone();
        log::info!(
            "Relay stopped: {} ({:.1}% of requests forwarded)",
            statistics,
            statistics.forward_rate()
        );
        statistics
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// # Returns
    /// `false` if the wait was cut short by cancellation
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.cancelled() => false,
        }
    }
}
