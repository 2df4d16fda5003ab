//! Handshake message codec.
//!
//! Both handshake messages share one shape, carried in a `TSPM` container:
//!
//! ```text
//! [Id length (2B, BE)][Id][Ephemeral X25519 public key (32B)][Ed25519 signature (64B)]
//! ```

use bytes::{BufMut, BytesMut};

use crate::container::Container;
use crate::{WireError, EPHEMERAL_KEY_LEN, HANDSHAKE_TAG, MAX_ID_LEN, SIGNATURE_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    pub id: Vec<u8>,
    pub ephemeral_public: [u8; EPHEMERAL_KEY_LEN],
    pub signature: [u8; SIGNATURE_LEN],
}

impl HandshakeMessage {
    /// Bytes covered by the sender's own part of the signature: `id || ephemeral_public`.
    pub fn signed_prefix(id: &[u8], ephemeral_public: &[u8; EPHEMERAL_KEY_LEN]) -> Vec<u8> {
        let mut data = Vec::with_capacity(id.len() + EPHEMERAL_KEY_LEN);
        data.extend_from_slice(id);
        data.extend_from_slice(ephemeral_public);
        data
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        if self.id.is_empty() {
            return Err(WireError::Malformed("empty id"));
        }
        if self.id.len() > MAX_ID_LEN {
            return Err(WireError::TooLarge(self.id.len()));
        }

        let mut payload =
            BytesMut::with_capacity(2 + self.id.len() + EPHEMERAL_KEY_LEN + SIGNATURE_LEN);
        payload.put_u16(self.id.len() as u16);
        payload.put_slice(&self.id);
        payload.put_slice(&self.ephemeral_public);
        payload.put_slice(&self.signature);

        let container = Container::new(HANDSHAKE_TAG, payload.freeze())?;
        Ok(container.encode().to_vec())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let payload = Container::decode_tagged(bytes, HANDSHAKE_TAG)?;

        if payload.len() < 2 {
            return Err(WireError::TooShort(payload.len()));
        }
        let id_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        if id_len == 0 {
            return Err(WireError::Malformed("empty id"));
        }

        let expected = 2 + id_len + EPHEMERAL_KEY_LEN + SIGNATURE_LEN;
        if payload.len() != expected {
            return Err(WireError::LengthMismatch {
                declared: expected,
                actual: payload.len(),
            });
        }

        let id = payload[2..2 + id_len].to_vec();

        let key_start = 2 + id_len;
        let mut ephemeral_public = [0u8; EPHEMERAL_KEY_LEN];
        ephemeral_public.copy_from_slice(&payload[key_start..key_start + EPHEMERAL_KEY_LEN]);

        let sig_start = key_start + EPHEMERAL_KEY_LEN;
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&payload[sig_start..sig_start + SIGNATURE_LEN]);

        Ok(Self {
            id,
            ephemeral_public,
            signature,
        })
    }
}
