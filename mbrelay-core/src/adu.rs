//! Modbus TCP application data units used by the relay
//!
//! The relay only ever issues one request shape: Read Input Registers (FC04)
//! against a fixed unit, register window and count. The only field that
//! changes between cycles is the transaction identifier.
//!
//! # Request layout
//! ```text
//! [txid_hi, txid_lo, 0x00, 0x00, 0x00, 0x06, unit, 0x04, addr_hi, addr_lo, count_hi, count_lo]
//! ```
//!
//! Responses are never decoded beyond their function code: a normal reply is
//! relayed verbatim and an exception reply is recognised and dropped.

use crate::constants::{
    DEFAULT_REGISTER_COUNT, DEFAULT_START_REGISTER, DEFAULT_UNIT_ID, EXCEPTION_CODE_OFFSET,
    EXCEPTION_FLAG, EXCEPTION_RESPONSE_LENGTH, FC_READ_INPUT_REGISTERS, FUNCTION_CODE_OFFSET,
    MAX_READ_REGISTERS, MODBUS_PROTOCOL_ID, READ_REQUEST_LENGTH, READ_REQUEST_LENGTH_FIELD,
    READ_RESPONSE_OVERHEAD,
};
use crate::error::{RelayError, RelayResult};
use std::fmt;

/// Modbus TCP transaction identifier
///
/// Zero is never issued by [`TransactionCounter`]; it is kept as an
/// "unused" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u16);

impl TransactionId {
    /// Wrap a raw identifier
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Raw identifier value
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Big-endian wire encoding
    pub fn to_be_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Process-wide transaction counter
///
/// Starts at zero and advances before every request, so the first issued
/// identifier is 1. On overflow it wraps to 1, never 0.
#[derive(Debug, Clone, Default)]
pub struct TransactionCounter {
    last: u16,
}

impl TransactionCounter {
    /// Create a counter whose first issued identifier is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance and return the next identifier
    pub fn next_id(&mut self) -> TransactionId {
        self.last = self.last.wrapping_add(1);
        if self.last == 0 {
            self.last = 1;
        }
        TransactionId(self.last)
    }

    /// Last identifier issued, if any
    pub fn last(&self) -> Option<TransactionId> {
        (self.last != 0).then_some(TransactionId(self.last))
    }
}

/// Read Input Registers request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    unit_id: u8,
    start_register: u16,
    register_count: u16,
}

impl ReadRequest {
    /// Create validated request parameters
    ///
    /// # Errors
    /// Returns `RelayError::InvalidData` if `register_count` is outside `1..=125`
    /// or the register window runs past address 0xFFFF.
    pub fn new(unit_id: u8, start_register: u16, register_count: u16) -> RelayResult<Self> {
        if register_count == 0 || register_count > MAX_READ_REGISTERS {
            return Err(RelayError::InvalidData(format!(
                "Register count must be 1-{}, got {}",
                MAX_READ_REGISTERS, register_count
            )));
        }
        if start_register.checked_add(register_count - 1).is_none() {
            return Err(RelayError::InvalidData(format!(
                "Register window {}+{} exceeds address space",
                start_register, register_count
            )));
        }
        Ok(Self {
            unit_id,
            start_register,
            register_count,
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn start_register(&self) -> u16 {
        self.start_register
    }

    pub fn register_count(&self) -> u16 {
        self.register_count
    }

    /// Function code carried by the request
    pub fn function_code(&self) -> u8 {
        FC_READ_INPUT_REGISTERS
    }

    /// Length of a complete normal response ADU
    ///
    /// MBAP (7) + function (1) + byte count (1) + 2 bytes per register.
    pub fn expected_response_length(&self) -> usize {
        READ_RESPONSE_OVERHEAD + 2 * self.register_count as usize
    }
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            unit_id: DEFAULT_UNIT_ID,
            start_register: DEFAULT_START_REGISTER,
            register_count: DEFAULT_REGISTER_COUNT,
        }
    }
}

/// Request ADU: MBAP header plus a Read Input Registers PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAdu {
    transaction_id: TransactionId,
    request: ReadRequest,
}

impl RequestAdu {
    pub fn new(transaction_id: TransactionId, request: ReadRequest) -> Self {
        Self {
            transaction_id,
            request,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn request(&self) -> &ReadRequest {
        &self.request
    }

    /// Encode to the 12-byte wire form
    ///
    /// The MBAP length field is always 6, independent of the transaction id.
    pub fn encode(&self) -> [u8; READ_REQUEST_LENGTH] {
        let mut frame = [0u8; READ_REQUEST_LENGTH];
        frame[0..2].copy_from_slice(&self.transaction_id.to_be_bytes());
        frame[2..4].copy_from_slice(&MODBUS_PROTOCOL_ID.to_be_bytes());
        frame[4..6].copy_from_slice(&READ_REQUEST_LENGTH_FIELD.to_be_bytes());
        frame[6] = self.request.unit_id;
        frame[7] = self.request.function_code();
        frame[8..10].copy_from_slice(&self.request.start_register.to_be_bytes());
        frame[10..12].copy_from_slice(&self.request.register_count.to_be_bytes());
        frame
    }

    /// Decode a request ADU
    ///
    /// Used by device simulators; the relay itself never receives requests.
    ///
    /// # Errors
    /// Returns `RelayError::InvalidData` for a truncated or malformed frame
    /// and `RelayError::Protocol` for a foreign protocol id or function code.
    pub fn decode(data: &[u8]) -> RelayResult<Self> {
        if data.len() < READ_REQUEST_LENGTH {
            return Err(RelayError::InvalidData(format!(
                "Request ADU too short: expected {}, got {}",
                READ_REQUEST_LENGTH,
                data.len()
            )));
        }

        let protocol_id = u16::from_be_bytes([data[2], data[3]]);
        if protocol_id != MODBUS_PROTOCOL_ID {
            return Err(RelayError::Protocol(format!(
                "Unexpected protocol id 0x{:04X}",
                protocol_id
            )));
        }
        let length = u16::from_be_bytes([data[4], data[5]]);
        if length != READ_REQUEST_LENGTH_FIELD {
            return Err(RelayError::InvalidData(format!(
                "Unexpected MBAP length {}, expected {}",
                length, READ_REQUEST_LENGTH_FIELD
            )));
        }
        if data[FUNCTION_CODE_OFFSET] != FC_READ_INPUT_REGISTERS {
            return Err(RelayError::Protocol(format!(
                "Unsupported function code 0x{:02X}",
                data[7]
            )));
        }

        let request = ReadRequest::new(
            data[6],
            u16::from_be_bytes([data[8], data[9]]),
            u16::from_be_bytes([data[10], data[11]]),
        )?;

        Ok(Self {
            transaction_id: TransactionId(u16::from_be_bytes([data[0], data[1]])),
            request,
        })
    }
}

/// Exception code of a complete exception response
///
/// Yields `Some(code)` only for a frame of exactly
/// [`EXCEPTION_RESPONSE_LENGTH`] bytes whose function code is
/// `function_code | 0x80`. A shorter frame may still become one; anything
/// else is not an exception response.
pub fn exception_code(frame: &[u8], function_code: u8) -> Option<u8> {
    if frame.len() != EXCEPTION_RESPONSE_LENGTH {
        return None;
    }
    if frame[FUNCTION_CODE_OFFSET] != function_code | EXCEPTION_FLAG {
        return None;
    }
    Some(frame[EXCEPTION_CODE_OFFSET])
}
