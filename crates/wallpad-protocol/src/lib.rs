//! Wallpad RS485 Packet Protocol
//!
//! This crate provides the schema-driven packet engine for a proprietary
//! RS485 wall-panel bus. The bus carries fixed-length 8-byte frames whose
//! layout differs per device type; the layout is not hard-coded but read
//! from a declarative vendor document at startup.
//!
//! # Protocol Overview
//!
//! Every frame is 8 bytes, conventionally written as a 16-character
//! uppercase hex string. The last byte is a checksum over the preceding
//! seven; a frame is valid iff re-applying the checksum yields the frame
//! unchanged. Frames are either:
//!
//! - **Commands** (controller → device): start with the device type's
//!   `command` header byte
//! - **State reports** (device → controller): start with the `state`
//!   header byte, broadcast periodically and after state changes
//!
//! The bus carries no acknowledgements. Confirmation of a command is
//! inferred by predicting which state-report bytes the command must cause
//! ([`predict_state`]) and counting matching reports on the wire.
//!
//! # Example
//!
//! ```rust,ignore
//! use wallpad_protocol::{SchemaSet, CommandRequest, encode_command, predict_state};
//!
//! let schemas = SchemaSet::from_yaml_str(&yaml)?;
//! let frame = encode_command(&schemas, &request)?;
//! let expected = predict_state(&schemas, &frame);
//! ```

mod codec;
mod device;
mod error;
mod frame;
mod predict;
mod schema;
mod types;

pub use codec::*;
pub use device::*;
pub use error::*;
pub use frame::*;
pub use predict::*;
pub use schema::*;
pub use types::*;
