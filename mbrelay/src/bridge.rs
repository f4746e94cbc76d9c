//! Request/response relay cycle
//!
//! One cycle:
//! 1. Make sure both endpoints are connected; give up quietly if either is down.
//! 2. Settle briefly if a connection was just made.
//! 3. Advance the transaction id and send the 12-byte request to the source.
//! 4. Collect the response from the source.
//! 5. Forward a complete response verbatim to the target; drop an exception response.
//!
//! A failure resets only the endpoint it happened on. At most one request is
//! ever outstanding: the transaction id advances only after both links are up
//! and the next cycle cannot start before this one returns.
//!
//! The response is relayed as received. Its transaction id, unit id and
//! function code are not compared with the request; ordering on a single
//! connection with one outstanding request is relied upon instead.

use crate::config::{RelayConfig, RelayTiming};
use crate::endpoint::{Endpoint, LinkRole, LinkStatus};
use crate::frame_reader::{FrameOutcome, FrameReader};
use crate::statistics::RelayStatistics;
use mbrelay_core::constants::EXCEPTION_CODE_OFFSET;
use mbrelay_core::{
    ExceptionCode, ReadRequest, RequestAdu, TransactionCounter, TransactionId,
};
use mbrelay_transport::{TcpTransport, TransportLayer};
use std::time::Duration;

/// What a cycle came to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// Complete response relayed to the target
    Forwarded,
    /// Source answered with an exception; nothing relayed
    ExceptionSuppressed,
    /// Send failed or was short on the given link, which was reset
    TransportFailure(LinkRole),
    /// No complete response within the attempt budget; source was reset
    ProtocolFailure,
    /// A link could not be brought up; nothing was sent
    LinkDown,
}

impl CycleStatus {
    /// Whether the cycle ended without resetting a link or deferring
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CycleStatus::Forwarded | CycleStatus::ExceptionSuppressed
        )
    }
}

/// Relays one Modbus request/response per cycle from source to target
#[derive(Debug)]
pub struct ProtocolBridge<S: TransportLayer, T: TransportLayer> {
    source: Endpoint<S>,
    target: Endpoint<T>,
    request: ReadRequest,
    transactions: TransactionCounter,
    reader: FrameReader,
    settle_delay: Duration,
    statistics: RelayStatistics,
}

impl ProtocolBridge<TcpTransport, TcpTransport> {
    /// Bridge between the configured TCP endpoints
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.source_transport(),
            config.target_transport(),
            *config.request(),
            config.timing(),
        )
    }
}

impl<S: TransportLayer, T: TransportLayer> ProtocolBridge<S, T> {
    pub fn new(source: S, target: T, request: ReadRequest, timing: &RelayTiming) -> Self {
        Self {
            source: Endpoint::new(LinkRole::Source, source),
            target: Endpoint::new(LinkRole::Target, target),
            request,
            transactions: TransactionCounter::new(),
            reader: FrameReader::new(timing.read_attempts, timing.poll_interval),
            settle_delay: timing.settle_delay,
            statistics: RelayStatistics::new(),
        }
    }

    pub fn source(&self) -> &Endpoint<S> {
        &self.source
    }

    pub fn target(&self) -> &Endpoint<T> {
        &self.target
    }

    pub fn reader(&self) -> &FrameReader {
        &self.reader
    }

    pub fn statistics(&self) -> &RelayStatistics {
        &self.statistics
    }

    /// Transaction id of the most recent request
    pub fn last_transaction_id(&self) -> Option<TransactionId> {
        self.transactions.last()
    }

    /// Run one cycle
    pub async fn run_cycle(&mut self) -> CycleStatus {
        self.statistics.increment_cycles();

        let target_link = self.target.ensure_connected().await;
        let source_link = self.source.ensure_connected().await;
        self.record_link(target_link);
        self.record_link(source_link);

        if !target_link.is_up() || !source_link.is_up() {
            self.statistics.increment_deferred_cycles();
            return CycleStatus::LinkDown;
        }

        if target_link.is_fresh() || source_link.is_fresh() {
            log::debug!("Waiting {:?} for new connections to settle", self.settle_delay);
            tokio::time::sleep(self.settle_delay).await;
        }

        self.exchange().await
    }

    /// Close both links
    pub async fn shutdown(&mut self) {
        self.source.reset().await;
        self.target.reset().await;
    }

    fn record_link(&mut self, status: LinkStatus) {
        if let LinkStatus::Established { discarded } = status {
            self.statistics.record_reconnect(discarded);
        }
    }

    async fn exchange(&mut self) -> CycleStatus {
        let transaction_id = self.transactions.next_id();
        let request = RequestAdu::new(transaction_id, self.request).encode();

        if let Err(e) = self.source.send_frame(&request).await {
            log::warn!(
                "Failed to send request {} to source {}: {}",
                transaction_id,
                self.source.remote_address(),
                e
            );
            return self.fail_transport(LinkRole::Source).await;
        }
        self.statistics.increment_requests_sent();

        let expected_length = self.request.expected_response_length();
        let outcome = match self
            .source
            .receive_frame(&self.reader, expected_length, self.request.function_code())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!(
                    "Failed to receive response {} from source {}: {}",
                    transaction_id,
                    self.source.remote_address(),
                    e
                );
                return self.fail_transport(LinkRole::Source).await;
            }
        };

        match outcome {
            FrameOutcome::Exhausted { received } => {
                log::warn!(
                    "No complete response {} from source {} ({} of {} bytes)",
                    transaction_id,
                    self.source.remote_address(),
                    received,
                    expected_length
                );
                self.source.reset().await;
                self.statistics.increment_protocol_failures();
                CycleStatus::ProtocolFailure
            }
            FrameOutcome::ExceptionShort(frame) => {
                let code = frame.get(EXCEPTION_CODE_OFFSET).copied().unwrap_or_default();
                log::warn!(
                    "Source {} answered request {} with {}, not forwarding",
                    self.source.remote_address(),
                    transaction_id,
                    ExceptionCode::describe(code)
                );
                self.statistics.increment_exceptions_suppressed();
                CycleStatus::ExceptionSuppressed
            }
            FrameOutcome::Complete(frame) => {
                if let Err(e) = self.target.send_frame(&frame).await {
                    log::warn!(
                        "Failed to forward response {} to target {}: {}",
                        transaction_id,
                        self.target.remote_address(),
                        e
                    );
                    return self.fail_transport(LinkRole::Target).await;
                }
                log::trace!("Forwarded response {} ({} bytes)", transaction_id, frame.len());
                self.statistics.increment_responses_forwarded();
                CycleStatus::Forwarded
            }
        }
    }

    async fn fail_transport(&mut self, role: LinkRole) -> CycleStatus {
        match role {
            LinkRole::Source => self.source.reset().await,
            LinkRole::Target => self.target.reset().await,
        }
        self.statistics.increment_transport_failures();
        CycleStatus::TransportFailure(role)
    }
}
