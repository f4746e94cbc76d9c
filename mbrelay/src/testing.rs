//! Scripted in-memory link for unit tests

use async_trait::async_trait;
use mbrelay_core::{RelayError, RelayResult};
use mbrelay_transport::{RecvStatus, StreamAccessor, TransportLayer};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Behaviour and observations of a [`ScriptedLink`]
#[derive(Debug, Default)]
pub(crate) struct LinkScript {
    /// Number of upcoming `open` calls that are refused
    pub connect_failures: usize,
    /// Bytes waiting on the socket before the first use
    pub stale: Vec<u8>,
    /// Chunks handed out by `try_read`; an empty chunk reads as a close
    pub inbound: VecDeque<Vec<u8>>,
    /// Reply queued on `inbound` after every write
    pub reply: Option<Vec<u8>>,
    /// Cap on bytes accepted per write
    pub write_limit: Option<usize>,
    pub written: Vec<Vec<u8>>,
    pub opens: usize,
    pub closes: usize,
    pub reads: usize,
    pub readiness_waits: usize,
}

/// Shared view on a link's script
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkHandle(Arc<Mutex<LinkScript>>);

impl LinkHandle {
    pub fn lock(&self) -> MutexGuard<'_, LinkScript> {
        self.0.lock().unwrap()
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedLink {
    handle: LinkHandle,
    open: bool,
}

impl ScriptedLink {
    pub fn new() -> (Self, LinkHandle) {
        let handle = LinkHandle::default();
        (
            Self {
                handle: handle.clone(),
                open: false,
            },
            handle,
        )
    }

    fn ensure_open(&self) -> RelayResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(RelayError::NotConnected)
        }
    }
}

#[async_trait]
impl StreamAccessor for ScriptedLink {
    fn try_read(&mut self, buf: &mut [u8]) -> RelayResult<RecvStatus> {
        self.ensure_open()?;
        let mut script = self.handle.lock();
        script.reads += 1;

        let Some(mut chunk) = script.inbound.pop_front() else {
            return Ok(RecvStatus::Pending);
        };
        if chunk.is_empty() {
            return Ok(RecvStatus::Closed);
        }

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            script.inbound.push_front(chunk.split_off(n));
        }
        Ok(RecvStatus::Data(n))
    }

    /// Sleeps for the full `timeout` when nothing is queued
    async fn wait_readable(&mut self, timeout: Duration) -> RelayResult<bool> {
        self.ensure_open()?;
        let ready = {
            let mut script = self.handle.lock();
            script.readiness_waits += 1;
            !script.inbound.is_empty()
        };
        if !ready {
            tokio::time::sleep(timeout).await;
        }
        Ok(ready)
    }

    async fn write(&mut self, buf: &[u8]) -> RelayResult<usize> {
        self.ensure_open()?;
        let mut script = self.handle.lock();
        let n = script.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        script.written.push(buf[..n].to_vec());
        if let Some(reply) = script.reply.clone() {
            script.inbound.push_back(reply);
        }
        Ok(n)
    }

    fn discard_pending(&mut self) -> usize {
        let mut script = self.handle.lock();
        let stale = script.stale.len();
        script.stale.clear();
        stale
    }

    fn is_closed(&self) -> bool {
        !self.open
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.handle.lock().closes += 1;
        self.open = false;
        Ok(())
    }
}

#[async_trait]
impl TransportLayer for ScriptedLink {
    async fn open(&mut self) -> RelayResult<()> {
        let mut script = self.handle.lock();
        script.opens += 1;
        if script.connect_failures > 0 {
            script.connect_failures -= 1;
            return Err(RelayError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )));
        }
        self.open = true;
        Ok(())
    }

    fn remote_address(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 502))
    }
}

/// A complete 49-byte FC04 response for 20 registers
pub(crate) fn normal_response(transaction_id: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(49);
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 43, 0x0a, 0x04, 40]);
    frame.extend((0..40u8).map(|i| i.wrapping_mul(7)));
    frame
}

/// A 9-byte FC04 exception response
pub(crate) fn exception_response(transaction_id: u16, code: u8) -> Vec<u8> {
    let mut frame = Vec::with_capacity(9);
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x03, 0x0a, 0x84, code]);
    frame
}
