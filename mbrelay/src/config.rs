//! Relay configuration
//!
//! Endpoint addresses, request parameters and the timing of the relay loop.
//! Values come from the caller (the binary maps its command line onto
//! [`RelayConfigBuilder`]); nothing here reads files or the environment.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use mbrelay::RelayConfig;
//!
//! let config = RelayConfig::builder()
//!     .source("192.168.1.37:502".parse()?)
//!     .target("192.168.1.36:502".parse()?)
//!     .register_count(20)
//!     .build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use mbrelay_core::constants::{
    DEFAULT_REGISTER_COUNT, DEFAULT_START_REGISTER, DEFAULT_UNIT_ID, MODBUS_TCP_PORT,
};
use mbrelay_core::{ReadRequest, RelayError, RelayResult};
use mbrelay_transport::{TcpSettings, TcpTransport};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default response-source device
pub const DEFAULT_SOURCE: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 37)), MODBUS_TCP_PORT);

/// Default forward-target device
pub const DEFAULT_TARGET: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 36)), MODBUS_TCP_PORT);

/// Timing of the relay loop
///
/// Worst case for one cycle is `settle_delay + read_attempts * poll_interval`
/// plus two write timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTiming {
    /// Wait before every cycle
    pub tick_interval: Duration,
    /// Extra wait after a cycle that found a link down
    pub reconnect_backoff: Duration,
    /// Wait after a fresh connection before the first request
    pub settle_delay: Duration,
    /// Number of receive attempts per response
    pub read_attempts: u32,
    /// Readiness wait per empty receive attempt
    pub poll_interval: Duration,
    /// Upper bound on waiting for send buffer space
    pub write_timeout: Duration,
}

impl Default for RelayTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            reconnect_backoff: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(500),
            read_attempts: 10,
            poll_interval: Duration::from_millis(500),
            write_timeout: Duration::from_millis(500),
        }
    }
}

/// Validated relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    source: SocketAddr,
    target: SocketAddr,
    request: ReadRequest,
    timing: RelayTiming,
}

impl RelayConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::new()
    }

    /// Device that is polled and whose response is relayed
    pub fn source(&self) -> SocketAddr {
        self.source
    }

    /// Device that receives the relayed response
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn request(&self) -> &ReadRequest {
        &self.request
    }

    pub fn timing(&self) -> &RelayTiming {
        &self.timing
    }

    /// TCP transport for the source link
    pub fn source_transport(&self) -> TcpTransport {
        TcpTransport::new(TcpSettings::with_write_timeout(
            self.source,
            self.timing.write_timeout,
        ))
    }

    /// TCP transport for the target link
    pub fn target_transport(&self) -> TcpTransport {
        TcpTransport::new(TcpSettings::with_write_timeout(
            self.target,
            self.timing.write_timeout,
        ))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE,
            target: DEFAULT_TARGET,
            request: ReadRequest::default(),
            timing: RelayTiming::default(),
        }
    }
}

/// Builder for [`RelayConfig`]
///
/// Unset values keep their defaults: source `192.168.1.37:502`, target
/// `192.168.1.36:502`, unit 10, registers 0..20, one second tick.
#[derive(Debug, Clone)]
pub struct RelayConfigBuilder {
    source: SocketAddr,
    target: SocketAddr,
    unit_id: u8,
    start_register: u16,
    register_count: u16,
    timing: RelayTiming,
}

impl RelayConfigBuilder {
    pub fn new() -> Self {
        Self {
            source: DEFAULT_SOURCE,
            target: DEFAULT_TARGET,
            unit_id: DEFAULT_UNIT_ID,
            start_register: DEFAULT_START_REGISTER,
            register_count: DEFAULT_REGISTER_COUNT,
            timing: RelayTiming::default(),
        }
    }

    pub fn source(mut self, address: SocketAddr) -> Self {
        self.source = address;
        self
    }

    pub fn target(mut self, address: SocketAddr) -> Self {
        self.target = address;
        self
    }

    pub fn unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn start_register(mut self, start_register: u16) -> Self {
        self.start_register = start_register;
        self
    }

    pub fn register_count(mut self, register_count: u16) -> Self {
        self.register_count = register_count;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.timing.tick_interval = interval;
        self
    }

    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.timing.reconnect_backoff = backoff;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.timing.settle_delay = delay;
        self
    }

    pub fn read_attempts(mut self, attempts: u32) -> Self {
        self.timing.read_attempts = attempts;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.timing.poll_interval = interval;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.timing.write_timeout = timeout;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    /// Returns `RelayError::Config` if both endpoints are the same address,
    /// the register window is invalid, or the tick interval or read attempt
    /// budget is zero.
    pub fn build(self) -> RelayResult<RelayConfig> {
        if self.source == self.target {
            return Err(RelayError::Config(format!(
                "Source and target must differ, both are {}",
                self.source
            )));
        }
        if self.timing.tick_interval.is_zero() {
            return Err(RelayError::Config(
                "Tick interval must be greater than zero".to_string(),
            ));
        }
        if self.timing.read_attempts == 0 {
            return Err(RelayError::Config(
                "Read attempts must be greater than zero".to_string(),
            ));
        }

        let request = ReadRequest::new(self.unit_id, self.start_register, self.register_count)
            .map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(RelayConfig {
            source: self.source,
            target: self.target,
            request,
            timing: self.timing,
        })
    }
}

impl Default for RelayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
