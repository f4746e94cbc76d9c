//! Transport layer module for the Modbus TCP relay
//!
//! This crate provides the transport capability the relay core depends on
//! (non-blocking connect, receive, send, readiness wait, close) and its TCP
//! implementation.

pub mod stream;
pub mod tcp;

pub use mbrelay_core::{RelayError, RelayResult};
pub use stream::{RecvStatus, StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
