//! Stream accessor traits for the transport layer

use crate::{RelayError, RelayResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

/// Scratch buffer size used when discarding stale bytes
const DISCARD_CHUNK: usize = 1024;

/// Result of a single non-blocking receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    /// `n` bytes were copied into the buffer
    Data(usize),
    /// The peer closed the connection
    Closed,
    /// Nothing available right now
    Pending,
}

/// Stream accessor interface to a remote Modbus device
///
/// All receive and send operations are single, non-blocking attempts. The
/// only suspension point is [`StreamAccessor::wait_readable`], which is
/// bounded by its timeout.
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Try to receive into `buf` without blocking
    ///
    /// # Returns
    ///
    /// `RecvStatus::Pending` when no data is buffered, `RecvStatus::Closed`
    /// on graceful close.
    fn try_read(&mut self, buf: &mut [u8]) -> RelayResult<RecvStatus>;

    /// Wait until the stream becomes readable
    ///
    /// # Returns
    ///
    /// `true` if the stream became readable before `timeout` elapsed.
    async fn wait_readable(&mut self, timeout: Duration) -> RelayResult<bool>;

    /// Send `buf` in a single attempt
    ///
    /// # Returns
    ///
    /// Number of bytes accepted by the transport, which may be short.
    async fn write(&mut self, buf: &[u8]) -> RelayResult<usize>;

    /// Send a whole frame in one attempt
    ///
    /// A short write is reported as `RelayError::ShortWrite`; the remainder is
    /// never retried.
    async fn write_frame(&mut self, frame: &[u8]) -> RelayResult<()> {
        let written = self.write(frame).await?;
        if written != frame.len() {
            return Err(RelayError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }

    /// Read and drop everything currently buffered
    ///
    /// Stops at the first receive that yields no data, reports a close, or
    /// fails.
    ///
    /// # Returns
    ///
    /// Number of bytes discarded
    fn discard_pending(&mut self) -> usize {
        let mut scratch = [0u8; DISCARD_CHUNK];
        let mut total = 0;
        while let Ok(RecvStatus::Data(n)) = self.try_read(&mut scratch) {
            total += n;
        }
        total
    }

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> RelayResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Start a non-blocking connect to the remote address
    ///
    /// A connect that is still in progress counts as success; completion is
    /// not awaited.
    async fn open(&mut self) -> RelayResult<()>;

    /// Configured remote address
    fn remote_address(&self) -> SocketAddr;
}
