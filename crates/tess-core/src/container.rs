//! Tagged, length-prefixed, checksummed container.
//!
//! ```text
//! [Tag (4B)][Payload length (4B, BE)][CRC16 (2B, BE)][Payload]
//! ```
//!
//! The checksum (CRC-16/KERMIT) covers the tag, the length and the payload.
//! It detects accidental corruption only; authenticity comes from the
//! signatures and AEAD layered on top.

use bytes::{BufMut, Bytes, BytesMut};

use crate::WireError;

pub type Tag = [u8; 4];

pub const CONTAINER_HEADER_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    tag: Tag,
    payload: Bytes,
}

impl Container {
    pub fn new(tag: Tag, payload: impl Into<Bytes>) -> Result<Self, WireError> {
        let payload = payload.into();
        if u32::try_from(payload.len()).is_err() {
            return Err(WireError::TooLarge(payload.len()));
        }
        Ok(Self { tag, payload })
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Total encoded size of a container carrying `payload_len` bytes.
    pub const fn encoded_len(payload_len: usize) -> usize {
        CONTAINER_HEADER_LEN + payload_len
    }

    pub fn encode(&self) -> Bytes {
        // Bounded by `new`
        let len = self.payload.len() as u32;
        let mut buf = BytesMut::with_capacity(Self::encoded_len(self.payload.len()));
        buf.put_slice(&self.tag);
        buf.put_u32(len);
        buf.put_u16(checksum(&self.tag, len, &self.payload));
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Encode straight into `out`, returning the bytes written.
    ///
    /// Used for secret payloads that must not linger in shared buffers.
    pub fn encode_into(tag: Tag, payload: &[u8], out: &mut [u8]) -> Result<usize, WireError> {
        let len = u32::try_from(payload.len()).map_err(|_| WireError::TooLarge(payload.len()))?;
        let total = Self::encoded_len(payload.len());
        if out.len() < total {
            return Err(WireError::TooShort(out.len()));
        }

        let mut buf = &mut out[..total];
        buf.put_slice(&tag);
        buf.put_u32(len);
        buf.put_u16(checksum(&tag, len, payload));
        buf.put_slice(payload);
        Ok(total)
    }

    /// Decode a container that must span `bytes` exactly.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let (tag, payload) = split(bytes)?;
        Ok(Self {
            tag,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Decode and require a specific tag.
    pub fn decode_tagged(bytes: &[u8], expected: Tag) -> Result<Bytes, WireError> {
        Self::open(bytes, expected).map(Bytes::copy_from_slice)
    }

    /// Validate a container tagged `expected` and borrow its payload.
    pub fn open(bytes: &[u8], expected: Tag) -> Result<&[u8], WireError> {
        if bytes.len() >= 4 && bytes[0..4] != expected {
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&bytes[0..4]);
            return Err(WireError::InvalidTag(tag));
        }
        split(bytes).map(|(_, payload)| payload)
    }
}

fn split(bytes: &[u8]) -> Result<(Tag, &[u8]), WireError> {
    if bytes.len() < CONTAINER_HEADER_LEN {
        return Err(WireError::TooShort(bytes.len()));
    }

    let mut tag = [0u8; 4];
    tag.copy_from_slice(&bytes[0..4]);
    let len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let csum = u16::from_be_bytes([bytes[8], bytes[9]]);

    let payload = &bytes[CONTAINER_HEADER_LEN..];
    if payload.len() != len as usize {
        return Err(WireError::LengthMismatch {
            declared: len as usize,
            actual: payload.len(),
        });
    }

    if checksum(&tag, len, payload) != csum {
        return Err(WireError::ChecksumMismatch);
    }
    Ok((tag, payload))
}

fn checksum(tag: &Tag, len: u32, payload: &[u8]) -> u16 {
    let mut state = crc16::State::<crc16::KERMIT>::new();
    state.update(tag);
    state.update(&len.to_be_bytes());
    state.update(payload);
    state.get()
}
