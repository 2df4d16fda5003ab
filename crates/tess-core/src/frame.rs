//! Transport frame layout.
//!
//! ```text
//! [Session ID (4B, BE)][IV (12B)]
//! \_______ cleartext header _____/
//! AEAD( [Seq (4B, BE)][Timestamp (8B, BE)][Payload] ) [Tag (16B)]
//! ```
//!
//! The cleartext header is the associated data. Sequence number and timestamp
//! travel inside the ciphertext so an observer learns neither.

use crate::WireError;

pub const SESSION_ID_LEN: usize = 4;
pub const IV_LEN: usize = 12;
pub const AUTH_TAG_LEN: usize = 16;

/// Cleartext header: session id + IV.
pub const FRAME_HEADER_LEN: usize = SESSION_ID_LEN + IV_LEN;

/// Encrypted prefix ahead of the payload: sequence number + timestamp.
pub const SEALED_PREFIX_LEN: usize = 4 + 8;

/// Bytes a frame adds on top of its payload.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_LEN + SEALED_PREFIX_LEN + AUTH_TAG_LEN;

/// Size of the frame carrying `payload_len` bytes.
pub fn wrapped_len(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD
}

/// Payload size carried by a frame of `frame_len` bytes, if it is long enough.
pub fn unwrapped_len(frame_len: usize) -> Option<usize> {
    frame_len.checked_sub(FRAME_OVERHEAD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub session_id: u32,
    pub iv: [u8; IV_LEN],
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut out = [0u8; FRAME_HEADER_LEN];
        out[..SESSION_ID_LEN].copy_from_slice(&self.session_id.to_be_bytes());
        out[SESSION_ID_LEN..].copy_from_slice(&self.iv);
        out
    }

    /// Split a frame into its header and the sealed remainder.
    ///
    /// Rejects frames too short to hold even an empty payload.
    pub fn decode(frame: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(WireError::TooShort(frame.len()));
        }

        let session_id = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&frame[SESSION_ID_LEN..FRAME_HEADER_LEN]);

        Ok((Self { session_id, iv }, &frame[FRAME_HEADER_LEN..]))
    }
}

/// Sequence number and send time, sealed together with the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealedPrefix {
    pub seq: u32,
    pub timestamp: u64,
}

impl SealedPrefix {
    pub fn encode(&self) -> [u8; SEALED_PREFIX_LEN] {
        let mut out = [0u8; SEALED_PREFIX_LEN];
        out[..4].copy_from_slice(&self.seq.to_be_bytes());
        out[4..].copy_from_slice(&self.timestamp.to_be_bytes());
        out
    }

    /// Split decrypted plaintext into prefix and payload.
    pub fn decode(plaintext: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if plaintext.len() < SEALED_PREFIX_LEN {
            return Err(WireError::TooShort(plaintext.len()));
        }

        let seq = u32::from_be_bytes([plaintext[0], plaintext[1], plaintext[2], plaintext[3]]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&plaintext[4..SEALED_PREFIX_LEN]);

        Ok((
            Self {
                seq,
                timestamp: u64::from_be_bytes(ts),
            },
            &plaintext[SEALED_PREFIX_LEN..],
        ))
    }
}
