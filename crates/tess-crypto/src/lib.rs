//! Tess Secure Session.
//!
//! This crate provides:
//! - Ed25519 identity keys with container export/import
//! - A signed ephemeral X25519 handshake with caller-side key lookup
//! - An HKDF-SHA-256 key schedule with separate keys per direction
//! - ChaCha20-Poly1305 transport frames with sequence, timestamp and replay checks
//! - Save/load of established sessions
//! - Socket-style helpers over host transport callbacks, and a handle registry
//!
//! # Design
//!
//! The protocol core is synchronous and performs no I/O: callers move bytes
//! and feed every inbound buffer to [`Session::unwrap`]. The only outward
//! calls go through [`SessionCallbacks`], which the session owns.
//!
//! Random IVs are carried in every frame, so frames may arrive out of order
//! within the configured sequence window.

#![forbid(unsafe_code)]

pub mod callbacks;
pub mod config;
pub mod connection;
pub mod error;
mod handshake;
pub mod identity;
pub mod key_schedule;
pub mod peer;
pub mod registry;
pub mod seq_window;
mod serialize;
pub mod session;
mod transport;

pub use callbacks::{SessionCallbacks, SessionState, TrustStore};
pub use config::SessionConfig;
pub use error::{Result, SessionError, TransportError};
pub use identity::{IdentityKeypair, PublicIdentity};
pub use key_schedule::Role;
pub use peer::PeerIdentity;
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{Session, Unwrapped};
