//! TCP transport implementation

use crate::stream::{RecvStatus, StreamAccessor, TransportLayer};
use crate::{RelayError, RelayResult};
use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    /// Upper bound on waiting for send buffer space before the single send attempt
    pub write_timeout: Duration,
    pub nodelay: bool,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            write_timeout: Duration::from_millis(500),
            nodelay: true,
        }
    }

    /// Create TCP settings with a write timeout
    pub fn with_write_timeout(address: SocketAddr, write_timeout: Duration) -> Self {
        Self {
            address,
            write_timeout,
            nodelay: true,
        }
    }
}

/// TCP transport layer implementation
///
/// `stream` is `None` while disconnected; dropping or taking it is the only
/// way the socket gets closed.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
        }
    }

    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    fn stream_mut(&mut self) -> RelayResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(RelayError::NotConnected)
    }

    /// Create a non-blocking socket and issue the connect without waiting
    fn start_connect(&self) -> io::Result<std::net::TcpStream> {
        let address = self.settings.address;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        if self.settings.nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                log::debug!("Failed to set TCP_NODELAY for {}: {}", address, e);
            }
        }

        match socket.connect(&SockAddr::from(address)) {
            Ok(()) => {}
            Err(e) if connect_in_progress(&e) => {
                log::trace!("Connect to {} in progress", address);
            }
            Err(e) => return Err(e),
        }

        Ok(socket.into())
    }
}

/// Whether a connect error only means the handshake has not finished yet
fn connect_in_progress(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(unix)]
    {
        if err.raw_os_error() == Some(libc::EINPROGRESS) {
            return true;
        }
    }
    false
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> RelayResult<()> {
        if self.stream.is_some() {
            return Err(RelayError::Connection(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Connection has already been opened",
            )));
        }

        let std_stream = self.start_connect()?;
        self.stream = Some(TcpStream::from_std(std_stream)?);
        Ok(())
    }

    fn remote_address(&self) -> SocketAddr {
        self.settings.address
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> RelayResult<RecvStatus> {
        let stream = self.stream_mut()?;
        match stream.try_read(buf) {
            Ok(0) => Ok(RecvStatus::Closed),
            Ok(n) => Ok(RecvStatus::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(RecvStatus::Pending),
            Err(e) => Err(RelayError::Connection(e)),
        }
    }

    async fn wait_readable(&mut self, timeout: Duration) -> RelayResult<bool> {
        let stream = self.stream_mut()?;
        match tokio::time::timeout(timeout, stream.readable()).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(RelayError::Connection(e)),
            Err(_) => Ok(false),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> RelayResult<usize> {
        let write_timeout = self.settings.write_timeout;
        let stream = self.stream_mut()?;

        tokio::time::timeout(write_timeout, stream.writable())
            .await
            .map_err(|_| RelayError::Timeout)??;

        match stream.try_write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(RelayError::Connection(e)),
        }
    }

    // tokio only issues a receive once it has seen a readiness event, so a
    // freshly registered socket is drained with raw receives instead.
    fn discard_pending(&mut self) -> usize {
        let Some(stream) = self.stream.as_ref() else {
            return 0;
        };
        let socket = SockRef::from(stream);
        let mut reader: &Socket = &socket;
        let mut scratch = [0u8; 1024];
        let mut total = 0;
        while let Ok(n) = reader.read(&mut scratch) {
            if n == 0 {
                break;
            }
            total += n;
        }
        total
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    async fn close(&mut self) -> RelayResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }
}
