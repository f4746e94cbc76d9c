//! Core types and utilities for the Modbus TCP relay
//!
//! This crate provides the error taxonomy, the Modbus TCP ADU model and the
//! protocol constants shared by the transport and bridge crates.

pub mod adu;
pub mod constants;
pub mod error;
pub mod exception;

pub use adu::{ReadRequest, RequestAdu, TransactionCounter, TransactionId, exception_code};
pub use error::{RelayError, RelayResult};
pub use exception::ExceptionCode;
