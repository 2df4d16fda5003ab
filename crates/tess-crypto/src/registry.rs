//! Owning table of sessions addressed by opaque handles.
//!
//! For hosts (FFI layers, language bindings) that cannot hold Rust
//! references across calls. Handles are never reused, so a stale handle
//! simply misses.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::callbacks::SessionCallbacks;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

pub struct SessionRegistry<C: SessionCallbacks> {
    sessions: HashMap<SessionHandle, Session<C>>,
    /// Next handle to hand out; 0 is never issued
    next: u64,
}

impl<C: SessionCallbacks> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SessionCallbacks> SessionRegistry<C> {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next: 1,
        }
    }

    /// Take ownership of `session` and return its handle.
    pub fn insert(&mut self, session: Session<C>) -> SessionHandle {
        let handle = SessionHandle(self.next);
        self.next += 1;
        self.sessions.insert(handle, session);
        debug!("registered {}", handle);
        handle
    }

    pub fn get(&self, handle: SessionHandle) -> Option<&Session<C>> {
        self.sessions.get(&handle)
    }

    pub fn get_mut(&mut self, handle: SessionHandle) -> Option<&mut Session<C>> {
        self.sessions.get_mut(&handle)
    }

    /// Release a session back to the caller, or drop it with `let _ =`.
    pub fn remove(&mut self, handle: SessionHandle) -> Option<Session<C>> {
        let session = self.sessions.remove(&handle);
        if session.is_some() {
            debug!("released {}", handle);
        }
        session
    }

    pub fn contains(&self, handle: SessionHandle) -> bool {
        self.sessions.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = SessionHandle> + '_ {
        self.sessions.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::TrustStore;
    use crate::identity::IdentityKeypair;

    fn session(id: &str) -> Session<TrustStore> {
        let keys = IdentityKeypair::generate();
        Session::new(id, keys.private_key_bytes().as_ref(), TrustStore::new()).unwrap()
    }

    #[test]
    fn test_insert_get_remove() {
        let mut registry = SessionRegistry::new();
        assert!(registry.is_empty());

        let alice = registry.insert(session("alice"));
        let bob = registry.insert(session("bob"));
        assert_ne!(alice, bob);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.get(alice).unwrap().local_id(), Some(&b"alice"[..]));
        registry
            .get_mut(bob)
            .unwrap()
            .generate_connect_request()
            .unwrap();

        let removed = registry.remove(alice).unwrap();
        assert_eq!(removed.local_id(), Some(&b"alice"[..]));
        assert!(!registry.contains(alice));
        assert!(registry.get(alice).is_none());
        assert!(registry.remove(alice).is_none());
    }

    #[test]
    fn test_handles_not_reused() {
        let mut registry = SessionRegistry::new();
        let first = registry.insert(session("a"));
        registry.remove(first);
        let second = registry.insert(session("b"));

        assert_ne!(first, second);
        assert_ne!(first.as_raw(), 0);
        assert_eq!(SessionHandle::from_raw(second.as_raw()), second);
    }
}
