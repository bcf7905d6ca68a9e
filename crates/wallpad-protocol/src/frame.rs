//! Fixed-length bus frames and checksum normalization.
//!
//! Every message on the wallpad bus is exactly 8 bytes. The trailing byte
//! is a checksum: the sum of the first seven bytes modulo 256. A frame is
//! *valid* iff normalizing it (recomputing the trailing byte) yields the
//! frame unchanged, which makes validation and correction the same
//! operation.

use crate::error::ProtocolError;

/// Number of bytes in a bus frame.
pub const FRAME_LEN: usize = 8;

/// Number of payload bytes preceding the checksum.
pub const PAYLOAD_LEN: usize = FRAME_LEN - 1;

/// Number of hex characters in a frame's canonical text form.
pub const FRAME_HEX_LEN: usize = FRAME_LEN * 2;

/// One 8-byte bus frame.
///
/// The canonical text representation is a 16-character uppercase hex
/// string, which is also how frames travel over the message bus.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Wrap raw frame bytes without touching the checksum.
    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Frame(bytes)
    }

    /// Build a frame from a 7-byte payload, appending the checksum.
    pub fn with_checksum(payload: [u8; PAYLOAD_LEN]) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[..PAYLOAD_LEN].copy_from_slice(&payload);
        bytes[PAYLOAD_LEN] = checksum(&payload);
        Frame(bytes)
    }

    /// Parse a frame from its hex text form.
    ///
    /// Accepts either case; does not check the checksum.
    pub fn from_hex(hex_str: &str) -> Result<Self, ProtocolError> {
        if hex_str.len() != FRAME_HEX_LEN {
            return Err(ProtocolError::InvalidFrameLength {
                expected: FRAME_HEX_LEN,
                actual: hex_str.len(),
            });
        }
        let decoded = hex::decode(hex_str)
            .map_err(|_| ProtocolError::InvalidHex(hex_str.to_string()))?;
        let mut bytes = [0u8; FRAME_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Frame(bytes))
    }

    /// The raw frame bytes.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// The byte at `position`, if within the frame.
    pub fn byte(&self, position: usize) -> Option<u8> {
        self.0.get(position).copied()
    }

    /// Canonical uppercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// A copy of this frame with the checksum recomputed.
    pub fn normalized(&self) -> Frame {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&self.0[..PAYLOAD_LEN]);
        Frame::with_checksum(payload)
    }

    /// Whether the trailing checksum byte matches the payload.
    pub fn is_valid(&self) -> bool {
        self.0[PAYLOAD_LEN] == checksum(&self.0[..PAYLOAD_LEN])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({})", self.to_hex())
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Checksum over a byte slice: sum modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Two-character uppercase hex form of one byte.
///
/// This is the representation used for symbolic value comparisons against
/// the schema document.
pub fn hex_byte(byte: u8) -> String {
    format!("{:02X}", byte)
}

/// Split a concatenated hex payload into frame-sized chunks.
///
/// The serial gateway often delivers several back-to-back frames in one
/// message. A trailing partial chunk is dropped; it can never validate.
pub fn split_hex_frames(raw: &str) -> impl Iterator<Item = &str> {
    raw.as_bytes()
        .chunks_exact(FRAME_HEX_LEN)
        // Chunks come from a str sliced at fixed offsets; hex payloads are ASCII.
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_sum_mod_256() {
        assert_eq!(checksum(&[0x31, 0x02, 0x01, 0, 0, 0, 0]), 0x34);
        assert_eq!(checksum(&[0xFF, 0xFF, 0, 0, 0, 0, 0]), 0xFE);
    }

    #[test]
    fn test_with_checksum_round_trip() {
        let frame = Frame::with_checksum([0x31, 0x02, 0x01, 0, 0, 0, 0]);
        assert_eq!(frame.to_hex(), "3102010000000034");
        assert!(frame.is_valid());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let frame = Frame::from_hex("B00201000000FFAA").unwrap();
        assert!(!frame.is_valid());
        let normalized = frame.normalized();
        assert!(normalized.is_valid());
        assert_eq!(normalized, normalized.normalized());
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        let err = Frame::from_hex("B002").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidFrameLength {
                expected: 16,
                actual: 4
            }
        );
    }

    #[test]
    fn test_from_hex_rejects_non_hex() {
        assert!(matches!(
            Frame::from_hex("ZZ02010000000034"),
            Err(ProtocolError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_from_hex_accepts_lowercase() {
        let frame = Frame::from_hex("b002010000000034").unwrap();
        assert_eq!(frame.to_hex(), "B002010000000034");
    }

    #[test]
    fn test_split_hex_frames_chunks_and_drops_tail() {
        let raw = "31020100000000343102010000000034AB";
        let frames: Vec<&str> = split_hex_frames(raw).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], "3102010000000034");
        assert_eq!(frames[1], "3102010000000034");
    }

    #[test]
    fn test_hex_byte_format() {
        assert_eq!(hex_byte(0x0A), "0A");
        assert_eq!(hex_byte(0xFF), "FF");
    }
}
