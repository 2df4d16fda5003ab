//! Secure Session error types.

use std::fmt;

use tess_core::WireError;
use thiserror::Error;

/// Result type alias using the session error type.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors returned by Secure Session operations.
///
/// Cryptographic failures each have their own variant so callers can tell a
/// forged frame from a bad signature from a corrupted save file.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed input or a violated protocol precondition
    /// (wrong session id, stale sequence number or timestamp, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Caller-supplied buffer cannot hold the output.
    #[error("buffer too small: {needed} bytes needed")]
    BufferTooSmall { needed: usize },

    /// Handshake signature did not verify against the resolved peer key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Saved state failed container or checksum validation.
    #[error("data corrupt: {0}")]
    DataCorrupt(String),

    /// Frame failed AEAD authentication.
    #[error("decryption failed: frame not authentic")]
    Decryption,

    /// Cryptographic backend failure.
    #[error("crypto backend failure: {0}")]
    Fail(String),

    /// Operation needs an established session.
    #[error("key agreement not finished")]
    KaNotFinished,

    /// The `get_public_key_for_id` callback could not resolve the peer.
    #[error("no public key for peer id {0}")]
    GetPublicKeyForId(String),

    /// A transport callback failed (helper API only).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl SessionError {
    pub(crate) fn invalid(msg: impl fmt::Display) -> Self {
        Self::InvalidParameter(msg.to_string())
    }

    pub(crate) fn fail(msg: impl fmt::Display) -> Self {
        Self::Fail(msg.to_string())
    }

    pub(crate) fn unknown_peer(id: &[u8]) -> Self {
        Self::GetPublicKeyForId(hex::encode(id))
    }

    /// Map a wire decoding failure seen on an inbound message.
    pub(crate) fn from_wire(err: WireError) -> Self {
        Self::InvalidParameter(err.to_string())
    }

    /// Map a wire decoding failure seen while loading saved state.
    pub(crate) fn corrupt(err: WireError) -> Self {
        Self::DataCorrupt(err.to_string())
    }
}

/// Failure reported by, or detected around, a transport callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The callback is not implemented for this transport.
    #[error("operation not supported by transport")]
    Unsupported,

    /// The callback reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The callback accepted fewer bytes than it was given.
    #[error("short write: {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    /// The peer closed the transport.
    #[error("connection closed by peer")]
    Closed,
}

impl TransportError {
    pub fn new(msg: impl fmt::Display) -> Self {
        Self::Failed(msg.to_string())
    }
}
