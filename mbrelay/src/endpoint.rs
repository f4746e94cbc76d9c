//! Endpoint connection management
//!
//! An [`Endpoint`] owns exactly one transport and is the only place that
//! transport is closed. It is created disconnected, becomes connected once a
//! non-blocking connect has been issued, and falls back to disconnected on any
//! transport or protocol failure reported by the bridge.

use crate::frame_reader::{FrameOutcome, FrameReader};
use mbrelay_core::{RelayError, RelayResult};
use mbrelay_transport::TransportLayer;
use std::fmt;
use std::net::SocketAddr;

/// Which side of the relay an endpoint serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Polled device whose response is relayed
    Source,
    /// Device the response is relayed to
    Target,
}

impl LinkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRole::Source => "source",
            LinkRole::Target => "target",
        }
    }
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointState {
    /// No socket (initial state)
    #[default]
    Disconnected,
    /// A single live socket
    Connected,
}

/// Result of [`Endpoint::ensure_connected`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Was already connected, nothing done
    Ready,
    /// Connected during this call; `discarded` stale bytes were flushed
    Established { discarded: usize },
    /// Connect failed, still disconnected
    Down,
}

impl LinkStatus {
    /// Whether the endpoint is usable after the call
    pub fn is_up(&self) -> bool {
        !matches!(self, LinkStatus::Down)
    }

    /// Whether the connection was made during the call
    pub fn is_fresh(&self) -> bool {
        matches!(self, LinkStatus::Established { .. })
    }
}

/// One logical Modbus TCP link
#[derive(Debug)]
pub struct Endpoint<T: TransportLayer> {
    role: LinkRole,
    transport: T,
    state: EndpointState,
}

impl<T: TransportLayer> Endpoint<T> {
    /// Create a disconnected endpoint around `transport`
    pub fn new(role: LinkRole, transport: T) -> Self {
        Self {
            role,
            transport,
            state: EndpointState::Disconnected,
        }
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == EndpointState::Connected
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.transport.remote_address()
    }

    /// Connect lazily
    ///
    /// No-op when already connected. Otherwise issues a non-blocking connect;
    /// an in-progress connect counts as connected. Right after connecting,
    /// anything already buffered on the socket is read and dropped so it
    /// cannot be taken for the first response.
    ///
    /// Failures are not returned: the endpoint just stays disconnected and the
    /// next cycle tries again.
    pub async fn ensure_connected(&mut self) -> LinkStatus {
        if self.is_connected() {
            return LinkStatus::Ready;
        }

        if let Err(e) = self.transport.open().await {
            log::warn!(
                "Failed to connect to {} {}: {}",
                self.role,
                self.remote_address(),
                e
            );
            return LinkStatus::Down;
        }

        self.state = EndpointState::Connected;
        log::info!("Connected to {} {}", self.role, self.remote_address());

        let discarded = self.transport.discard_pending();
        if discarded > 0 {
            log::info!(
                "Flushed {} stale bytes from {} {}",
                discarded,
                self.role,
                self.remote_address()
            );
        }

        LinkStatus::Established { discarded }
    }

    /// Send a whole frame in one attempt
    ///
    /// # Errors
    /// `RelayError::NotConnected` when disconnected, `RelayError::ShortWrite`
    /// if the transport accepted fewer bytes than the frame holds, or the
    /// transport's own error.
    pub async fn send_frame(&mut self, frame: &[u8]) -> RelayResult<()> {
        if !self.is_connected() {
            return Err(RelayError::NotConnected);
        }
        self.transport.write_frame(frame).await
    }

    /// Collect one response with `reader`
    ///
    /// # Errors
    /// `RelayError::NotConnected` when disconnected.
    pub async fn receive_frame(
        &mut self,
        reader: &FrameReader,
        expected_length: usize,
        function_code: u8,
    ) -> RelayResult<FrameOutcome> {
        if !self.is_connected() {
            return Err(RelayError::NotConnected);
        }
        Ok(reader
            .collect_response(&mut self.transport, expected_length, function_code)
            .await)
    }

    /// Close the socket and mark the endpoint disconnected
    pub async fn reset(&mut self) {
        if let Err(e) = self.transport.close().await {
            log::debug!("Error closing {} {}: {}", self.role, self.remote_address(), e);
        }
        if self.is_connected() {
            log::info!("Disconnected from {} {}", self.role, self.remote_address());
        }
        self.state = EndpointState::Disconnected;
    }
}
