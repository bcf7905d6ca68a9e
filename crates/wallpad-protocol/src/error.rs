//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with wallpad bus packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame hex string has the wrong length.
    #[error("frame length invalid: expected {expected} hex chars, got {actual}")]
    InvalidFrameLength {
        /// Expected number of hex characters.
        expected: usize,
        /// Actual number of hex characters received.
        actual: usize,
    },

    /// Frame contains characters that are not hex digits.
    #[error("invalid hex in frame: {0}")]
    InvalidHex(String),

    /// Device type name is not present in the loaded schema set.
    #[error("unknown device type: {0}")]
    UnknownDevice(String),

    /// A device schema is missing the packet kind needed for an operation.
    #[error("device {device} has no {kind} packet schema")]
    MissingPacketSchema {
        /// Device type name.
        device: String,
        /// Packet kind (`command`, `state`, ...).
        kind: &'static str,
    },

    /// A named field is not defined in the packet schema.
    #[error("field '{field}' not defined in {device} {kind} schema")]
    MissingField {
        /// Device type name.
        device: String,
        /// Packet kind.
        kind: &'static str,
        /// Field name looked up.
        field: String,
    },

    /// A symbolic value is not defined for a field.
    #[error("value '{symbol}' not defined for field at position {position}")]
    MissingSymbol {
        /// Byte position of the field.
        position: usize,
        /// Symbolic value name looked up.
        symbol: String,
    },

    /// The requested action does not apply to the device kind.
    #[error("unsupported command for device: {0}")]
    UnknownCommandType(String),

    /// A byte that should carry two decimal digits does not.
    #[error("byte 0x{0:02X} is not a decimal-digit pair")]
    NonDecimalByte(u8),

    /// Schema document could not be parsed.
    #[error("schema document error: {0}")]
    Schema(String),
}
