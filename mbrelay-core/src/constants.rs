//! Modbus TCP protocol constants
//!
//! Frame layout used by the relay:
//!
//! ```text
//! | txid (2) | protocol id (2) | length (2) | unit id (1) | function (1) | data ... |
//! |<------------------ MBAP header (7) ------------------>|<------ PDU ------->|
//! ```

/// MBAP header length: transaction id, protocol id, length, unit id
pub const MBAP_HEADER_LENGTH: usize = 7;

/// Protocol identifier for Modbus
pub const MODBUS_PROTOCOL_ID: u16 = 0x0000;

/// Function code: Read Input Registers
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// High bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Request ADU length for a register read: MBAP (7) + function (1) + address (2) + count (2)
pub const READ_REQUEST_LENGTH: usize = 12;

/// Value of the MBAP length field for a register read request: unit id (1) + PDU (5)
pub const READ_REQUEST_LENGTH_FIELD: u16 = 6;

/// Exception response length: MBAP (7) + function (1) + exception code (1)
pub const EXCEPTION_RESPONSE_LENGTH: usize = 9;

/// Offset of the function code within a response ADU
pub const FUNCTION_CODE_OFFSET: usize = MBAP_HEADER_LENGTH;

/// Offset of the exception code within an exception response ADU
pub const EXCEPTION_CODE_OFFSET: usize = MBAP_HEADER_LENGTH + 1;

/// Overhead of a register read response: MBAP (7) + function (1) + byte count (1)
pub const READ_RESPONSE_OVERHEAD: usize = MBAP_HEADER_LENGTH + 2;

/// Maximum number of registers for FC04
///
/// Response PDU: function (1) + byte count (1) + N * 2 <= 253, so N <= 125.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Default unit identifier addressed by the relay
pub const DEFAULT_UNIT_ID: u8 = 0x0a;

/// Default first input register
pub const DEFAULT_START_REGISTER: u16 = 0;

/// Default number of input registers
pub const DEFAULT_REGISTER_COUNT: u16 = 20;

/// Default Modbus TCP port
pub const MODBUS_TCP_PORT: u16 = 502;
