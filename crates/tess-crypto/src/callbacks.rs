//! Host-supplied hooks: peer key lookup, optional transport, state events.

use std::collections::HashMap;

use crate::error::TransportError;
use crate::identity::PublicIdentity;

/// Externally visible session lifecycle.
///
/// Transitions only move forward: `Idle -> Negotiating -> Established`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Negotiating,
    Established,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Negotiating => "negotiating",
            SessionState::Established => "established",
        }
    }
}

/// Everything a session needs from its host.
///
/// Only [`get_public_key_for_id`](Self::get_public_key_for_id) is required.
/// The transport hooks back the convenience API in [`crate::connection`];
/// hosts that move bytes themselves and drive [`crate::Session::unwrap`]
/// directly can leave them unimplemented.
pub trait SessionCallbacks {
    /// Hand `data` to the transport. Returns how many bytes were taken.
    fn send_data(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let _ = data;
        Err(TransportError::Unsupported)
    }

    /// Fill `buf` with one inbound message. `Ok(0)` means the peer closed.
    fn receive_data(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let _ = buf;
        Err(TransportError::Unsupported)
    }

    /// Called on every lifecycle transition.
    fn state_changed(&mut self, state: SessionState) {
        let _ = state;
    }

    /// Resolve the signing key of the peer claiming `id`.
    ///
    /// Must be a deterministic local lookup. `None` aborts the handshake.
    fn get_public_key_for_id(&self, id: &[u8]) -> Option<PublicIdentity>;
}

/// In-memory id to key map; the simplest useful [`SessionCallbacks`].
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    keys: HashMap<Vec<u8>, PublicIdentity>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `key` for `id`, replacing any previous entry.
    pub fn insert(
        &mut self,
        id: impl Into<Vec<u8>>,
        key: PublicIdentity,
    ) -> Option<PublicIdentity> {
        self.keys.insert(id.into(), key)
    }

    pub fn remove(&mut self, id: &[u8]) -> Option<PublicIdentity> {
        self.keys.remove(id)
    }

    pub fn get(&self, id: &[u8]) -> Option<&PublicIdentity> {
        self.keys.get(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl SessionCallbacks for TrustStore {
    fn get_public_key_for_id(&self, id: &[u8]) -> Option<PublicIdentity> {
        self.keys.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityKeypair;

    #[test]
    fn test_trust_store_lookup() {
        let key = IdentityKeypair::generate().public_identity();
        let mut store = TrustStore::new();
        assert!(store.is_empty());

        store.insert("alice", key.clone());
        assert_eq!(store.get_public_key_for_id(b"alice"), Some(key));
        assert_eq!(store.get_public_key_for_id(b"bob"), None);
    }

    #[test]
    fn test_default_transport_unsupported() {
        let mut store = TrustStore::new();
        assert_eq!(store.send_data(b"x"), Err(TransportError::Unsupported));
        assert_eq!(
            store.receive_data(&mut [0u8; 4]),
            Err(TransportError::Unsupported)
        );
    }
}
