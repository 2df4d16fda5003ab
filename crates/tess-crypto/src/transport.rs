//! Established-session framing: AEAD sealing plus replay checks.
//!
//! Each direction has its own key, so a frame can never be reflected back at
//! its sender. A fresh random IV is drawn for every frame; the sequence number
//! and timestamp are sealed with the payload and checked after authentication.

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use tess_core::frame::{self, AUTH_TAG_LEN, FRAME_HEADER_LEN, IV_LEN, SEALED_PREFIX_LEN};
use tess_core::{FrameHeader, SealedPrefix};
use tracing::warn;
use zeroize::Zeroizing;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::key_schedule::{self, DerivedKeys, DirectionalKeys, MasterSecret, Role};
use crate::seq_window::SequenceWindow;

/// Everything an established session needs to move frames.
#[derive(Debug)]
pub(crate) struct TransportState {
    session_id: u32,
    role: Role,
    master: MasterSecret,
    keys: DirectionalKeys,
    out_seq: u32,
    in_seq: u32,
    window: SequenceWindow,
    config: SessionConfig,
}

/// Serializable part of a [`TransportState`]; keys are re-derived on restore.
#[derive(Debug)]
pub(crate) struct TransportSnapshot {
    pub session_id: u32,
    pub role: Role,
    pub master: MasterSecret,
    pub out_seq: u32,
    pub in_seq: u32,
    pub window: SequenceWindow,
}

impl TransportState {
    /// Fresh state right after a handshake.
    pub fn new(derived: DerivedKeys, role: Role, config: SessionConfig) -> Self {
        let DerivedKeys {
            session_id,
            master_secret,
            message_keys,
        } = derived;

        Self {
            session_id,
            role,
            master: master_secret,
            keys: message_keys.keys,
            out_seq: message_keys.initial_out_seq,
            in_seq: message_keys.initial_in_seq,
            window: SequenceWindow::new(),
            config,
        }
    }

    /// State for `role` re-derived from the master secret alone.
    pub fn from_master(
        session_id: u32,
        role: Role,
        master_secret: MasterSecret,
        config: SessionConfig,
    ) -> Result<Self> {
        let message_keys = key_schedule::derive_message_keys(&master_secret, session_id, role)?;
        let derived = DerivedKeys {
            session_id,
            master_secret,
            message_keys,
        };
        Ok(Self::new(derived, role, config))
    }

    /// Rebuild from a snapshot: derive keys first, then restore counters.
    pub fn restore(snapshot: TransportSnapshot, config: SessionConfig) -> Result<Self> {
        let TransportSnapshot {
            session_id,
            role,
            master,
            out_seq,
            in_seq,
            window,
        } = snapshot;

        let mut state = Self::from_master(session_id, role, master, config)?;
        state.out_seq = out_seq;
        state.in_seq = in_seq;
        state.window = window;
        Ok(state)
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            session_id: self.session_id,
            role: self.role,
            master: self.master.clone(),
            out_seq: self.out_seq,
            in_seq: self.in_seq,
            window: self.window,
        }
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    #[cfg(test)]
    pub fn in_seq(&self) -> u32 {
        self.in_seq
    }

    #[cfg(test)]
    pub fn out_seq(&self) -> u32 {
        self.out_seq
    }

    pub fn wrap_at(&mut self, payload: &[u8], now: u64) -> Result<Vec<u8>> {
        let mut out = vec![0u8; frame::wrapped_len(payload.len())];
        self.wrap_into_at(payload, &mut out, now)?;
        Ok(out)
    }

    /// Seal `payload` into `out`, returning the frame length.
    pub fn wrap_into_at(&mut self, payload: &[u8], out: &mut [u8], now: u64) -> Result<usize> {
        let needed = frame::wrapped_len(payload.len());
        if out.len() < needed {
            return Err(SessionError::BufferTooSmall { needed });
        }

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let header = FrameHeader {
            session_id: self.session_id,
            iv,
        };
        let prefix = SealedPrefix {
            seq: self.out_seq,
            timestamp: now,
        };

        let (aad, rest) = out[..needed].split_at_mut(FRAME_HEADER_LEN);
        aad.copy_from_slice(&header.encode());
        let (body, tag_out) = rest.split_at_mut(rest.len() - AUTH_TAG_LEN);
        body[..SEALED_PREFIX_LEN].copy_from_slice(&prefix.encode());
        body[SEALED_PREFIX_LEN..].copy_from_slice(payload);

        let tag = self
            .cipher(&self.keys.outbound)
            .encrypt_in_place_detached(Nonce::from_slice(&iv), aad, body)
            .map_err(|_| SessionError::fail("frame encryption failed"))?;
        tag_out.copy_from_slice(&tag);

        self.out_seq = self.out_seq.wrapping_add(1);
        Ok(needed)
    }

    /// Authenticate, decrypt and replay-check a frame.
    ///
    /// State only changes when the frame is accepted.
    pub fn unwrap_at(&mut self, frame_bytes: &[u8], now: u64) -> Result<Vec<u8>> {
        let (header, sealed) = FrameHeader::decode(frame_bytes).map_err(SessionError::from_wire)?;
        if header.session_id != self.session_id {
            warn!(
                "frame for session {:08x} rejected by session {:08x}",
                header.session_id, self.session_id
            );
            return Err(SessionError::invalid("frame belongs to another session"));
        }

        let (ciphertext, tag) = sealed.split_at(sealed.len() - AUTH_TAG_LEN);
        let mut body = Zeroizing::new(ciphertext.to_vec());
        self.cipher(&self.keys.inbound)
            .decrypt_in_place_detached(
                Nonce::from_slice(&header.iv),
                &frame_bytes[..FRAME_HEADER_LEN],
                body.as_mut_slice(),
                Tag::from_slice(tag),
            )
            .map_err(|_| {
                warn!("frame failed authentication in session {:08x}", self.session_id);
                SessionError::Decryption
            })?;

        let (prefix, payload) = SealedPrefix::decode(&body).map_err(SessionError::from_wire)?;
        self.check_sequence(prefix.seq)?;
        self.check_timestamp(prefix.timestamp, now)?;

        self.window.check_and_update(prefix.seq);
        self.in_seq = prefix.seq;
        Ok(payload.to_vec())
    }

    fn check_sequence(&self, seq: u32) -> Result<()> {
        let drift = (seq.wrapping_sub(self.in_seq) as i32).unsigned_abs();
        if drift > self.config.seq_max_diff {
            warn!(
                "sequence {} too far from {} in session {:08x}",
                seq, self.in_seq, self.session_id
            );
            return Err(SessionError::invalid("sequence number outside window"));
        }
        if !self.window.check(seq) {
            warn!("replayed sequence {} in session {:08x}", seq, self.session_id);
            return Err(SessionError::invalid("replayed sequence number"));
        }
        Ok(())
    }

    fn check_timestamp(&self, timestamp: u64, now: u64) -> Result<()> {
        if timestamp.abs_diff(now) > self.config.ts_max_diff_secs {
            warn!(
                "timestamp {} too far from {} in session {:08x}",
                timestamp, now, self.session_id
            );
            return Err(SessionError::invalid("timestamp outside window"));
        }
        Ok(())
    }

    fn cipher(&self, key: &[u8; 32]) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(key))
    }
}
