//! Core Tess wire formats and constants.
//!
//! This crate provides:
//! - The checksummed, tagged container used for handshake messages, saved
//!   session state and exported keys
//! - The handshake message codec
//! - The transport frame header codec
//!
//! Nothing here performs cryptography; `tess-crypto` fills these structures
//! with keys, signatures and ciphertext.

#![forbid(unsafe_code)]

pub mod container;
pub mod frame;
pub mod handshake;

pub use container::{Container, Tag};
pub use frame::{FrameHeader, SealedPrefix};
pub use handshake::HandshakeMessage;

/// Container tag for handshake messages.
pub const HANDSHAKE_TAG: Tag = *b"TSPM";
/// Container tag for a saved session.
pub const SESSION_STATE_TAG: Tag = *b"TSSC";
/// Container tag for an exported Ed25519 public key.
pub const PUBLIC_KEY_TAG: Tag = *b"TSPK";
/// Container tag for an exported Ed25519 secret key.
pub const SECRET_KEY_TAG: Tag = *b"TSSK";

/// X25519 public key length.
pub const EPHEMERAL_KEY_LEN: usize = 32;
/// Ed25519 signature length.
pub const SIGNATURE_LEN: usize = 64;
/// Largest identity accepted on the wire.
pub const MAX_ID_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("input too short: {0} bytes")]
    TooShort(usize),
    #[error("unexpected tag: {0:?}")]
    InvalidTag(Tag),
    #[error("declared length {declared} does not match {actual} available bytes")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("payload too large: {0} bytes")]
    TooLarge(usize),
    #[error("malformed: {0}")]
    Malformed(&'static str),
}
