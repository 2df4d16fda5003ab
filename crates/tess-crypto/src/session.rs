//! Secure Session state machine.
//!
//! A [`Session`] starts `Idle`. Calling
//! [`generate_connect_request`](Session::generate_connect_request) makes it the
//! client; feeding a connect request into [`unwrap`](Session::unwrap) makes it
//! the server. Either way every inbound buffer goes through `unwrap`, which
//! routes it to the handshake while negotiating and to the transport framer
//! once established.
//!
//! ```
//! use tess_crypto::{IdentityKeypair, Session, TrustStore, Unwrapped};
//!
//! let alice_keys = IdentityKeypair::generate();
//! let bob_keys = IdentityKeypair::generate();
//!
//! let mut alice_trust = TrustStore::new();
//! alice_trust.insert("bob", bob_keys.public_identity());
//! let mut bob_trust = TrustStore::new();
//! bob_trust.insert("alice", alice_keys.public_identity());
//!
//! let alice_secret = alice_keys.private_key_bytes();
//! let bob_secret = bob_keys.private_key_bytes();
//! let mut alice = Session::new("alice", alice_secret.as_ref(), alice_trust).unwrap();
//! let mut bob = Session::new("bob", bob_secret.as_ref(), bob_trust).unwrap();
//!
//! let request = alice.generate_connect_request().unwrap();
//! let Unwrapped::SendToPeer(reply) = bob.unwrap(&request).unwrap() else { panic!() };
//! assert_eq!(alice.unwrap(&reply).unwrap(), Unwrapped::HandshakeComplete);
//!
//! let frame = alice.wrap(b"hello").unwrap();
//! assert_eq!(bob.unwrap(&frame).unwrap(), Unwrapped::Message(b"hello".to_vec()));
//! ```

use std::fmt;
use std::mem;
use std::time::{SystemTime, UNIX_EPOCH};

use tess_core::frame;
use tracing::{debug, info, warn};

use crate::callbacks::{SessionCallbacks, SessionState};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::handshake::{self, Ephemeral, Negotiated};
use crate::identity::IdentityKeypair;
use crate::key_schedule::Role;
use crate::peer::{LocalIdentity, PeerIdentity};
use crate::transport::TransportState;

/// Outcome of [`Session::unwrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwrapped {
    /// Plaintext of an authenticated transport frame.
    Message(Vec<u8>),
    /// Handshake reply the caller must deliver to the peer.
    SendToPeer(Vec<u8>),
    /// The peer's handshake reply was accepted; nothing to send.
    HandshakeComplete,
}

enum Phase {
    /// Nothing sent or received yet.
    Idle(Ephemeral),
    /// Connect request sent.
    AwaitingReply(Ephemeral),
    Established(Box<TransportState>),
    /// A handshake step failed. The session must be discarded.
    Aborted,
}

/// One end of a Secure Session.
///
/// Not internally synchronized: `wrap` and `unwrap` take `&mut self`.
pub struct Session<C: SessionCallbacks> {
    local: Option<LocalIdentity>,
    peer: Option<PeerIdentity>,
    role: Option<Role>,
    phase: Phase,
    state: SessionState,
    config: SessionConfig,
    callbacks: C,
}

impl<C: SessionCallbacks> Session<C> {
    /// Create an idle session for `id`, signing with the 32-byte Ed25519
    /// secret `signing_key`.
    pub fn new(id: impl Into<Vec<u8>>, signing_key: &[u8], callbacks: C) -> Result<Self> {
        Self::with_config(id, signing_key, callbacks, SessionConfig::default())
    }

    pub fn with_config(
        id: impl Into<Vec<u8>>,
        signing_key: &[u8],
        callbacks: C,
        config: SessionConfig,
    ) -> Result<Self> {
        let keypair = IdentityKeypair::from_bytes(signing_key)?;
        Self::from_keypair(id, keypair, callbacks, config)
    }

    pub fn from_keypair(
        id: impl Into<Vec<u8>>,
        keypair: IdentityKeypair,
        callbacks: C,
        config: SessionConfig,
    ) -> Result<Self> {
        let local = LocalIdentity::new(id.into(), keypair)?;
        debug!("created session for {}", hex::encode(local.id()));

        Ok(Self {
            local: Some(local),
            peer: None,
            role: None,
            phase: Phase::Idle(Ephemeral::generate()),
            state: SessionState::Idle,
            config,
            callbacks,
        })
    }

    /// An established session rebuilt from saved state.
    pub(crate) fn restored(transport: TransportState, callbacks: C, config: SessionConfig) -> Self {
        Self {
            local: None,
            peer: None,
            role: Some(transport.role()),
            phase: Phase::Established(Box::new(transport)),
            state: SessionState::Established,
            config,
            callbacks,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        matches!(self.phase, Phase::Established(_))
    }

    /// `None` until the session has sent or answered a connect request.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn session_id(&self) -> Option<u32> {
        self.transport().map(TransportState::session_id)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Our own id. `None` for a session restored from saved state.
    pub fn local_id(&self) -> Option<&[u8]> {
        self.local.as_ref().map(LocalIdentity::id)
    }

    /// Id of the authenticated peer.
    pub fn get_remote_id(&self) -> Result<Vec<u8>> {
        match (&self.phase, &self.peer) {
            (Phase::Established(_), Some(peer)) => Ok(peer.id.clone()),
            _ => Err(SessionError::KaNotFinished),
        }
    }

    pub fn remote_identity(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Start the handshake as client. Only legal on an idle session.
    pub fn generate_connect_request(&mut self) -> Result<Vec<u8>> {
        let request = match (&self.phase, &self.local) {
            (Phase::Idle(ephemeral), Some(local)) => {
                debug!("connect request from {}", hex::encode(local.id()));
                handshake::connect_request(local, ephemeral)?
            }
            _ => {
                return Err(SessionError::invalid(
                    "connect request needs an idle session",
                ))
            }
        };

        self.phase = match mem::replace(&mut self.phase, Phase::Aborted) {
            Phase::Idle(ephemeral) => Phase::AwaitingReply(ephemeral),
            other => other,
        };
        self.role = Some(Role::Client);
        self.transition(SessionState::Negotiating);
        Ok(request)
    }

    /// Frame size for a message of `message_len` bytes.
    pub fn wrapped_len(message_len: usize) -> usize {
        frame::wrapped_len(message_len)
    }

    /// Encrypt `message` into a new transport frame.
    pub fn wrap(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        let now = unix_time()?;
        self.transport_mut()?.wrap_at(message, now)
    }

    /// Encrypt `message` into `out`, returning the frame length.
    ///
    /// Fails with [`SessionError::BufferTooSmall`] without consuming a
    /// sequence number when `out` is shorter than [`Self::wrapped_len`].
    pub fn wrap_into(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize> {
        let now = unix_time()?;
        self.transport_mut()?.wrap_into_at(message, out, now)
    }

    /// Process one inbound buffer: a handshake message or a transport frame.
    pub fn unwrap(&mut self, data: &[u8]) -> Result<Unwrapped> {
        match &mut self.phase {
            Phase::Established(transport) => {
                let now = unix_time()?;
                return transport.unwrap_at(data, now).map(Unwrapped::Message);
            }
            Phase::Aborted => {
                return Err(SessionError::invalid(
                    "handshake failed earlier; discard this session",
                ))
            }
            Phase::Idle(_) | Phase::AwaitingReply(_) => {}
        }

        // Any failure from here on leaves the phase `Aborted`
        match mem::replace(&mut self.phase, Phase::Aborted) {
            Phase::Idle(ephemeral) => self.answer_request(ephemeral, data),
            Phase::AwaitingReply(ephemeral) => self.accept_reply(ephemeral, data),
            other => {
                self.phase = other;
                Err(SessionError::invalid("session is not negotiating"))
            }
        }
    }

    fn answer_request(&mut self, ephemeral: Ephemeral, request: &[u8]) -> Result<Unwrapped> {
        self.role = Some(Role::Server);
        self.transition(SessionState::Negotiating);

        let local = self.local()?;
        let (reply, negotiated) = handshake::respond(local, ephemeral, request, &self.callbacks)
            .map_err(|e| abort(Role::Server, e))?;

        self.establish(negotiated, Role::Server);
        Ok(Unwrapped::SendToPeer(reply))
    }

    fn accept_reply(&mut self, ephemeral: Ephemeral, reply: &[u8]) -> Result<Unwrapped> {
        let local = self.local()?;
        let negotiated = handshake::finish(local, ephemeral, reply, &self.callbacks)
            .map_err(|e| abort(Role::Client, e))?;

        self.establish(negotiated, Role::Client);
        Ok(Unwrapped::HandshakeComplete)
    }

    fn establish(&mut self, negotiated: Negotiated, role: Role) {
        let Negotiated { peer, keys } = negotiated;
        let transport = TransportState::new(keys, role, self.config);

        info!(
            "session {:08x} established with {} as {:?}",
            transport.session_id(),
            hex::encode(&peer.id),
            role
        );
        self.peer = Some(peer);
        self.phase = Phase::Established(Box::new(transport));
        self.transition(SessionState::Established);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        info!("session state {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
        self.callbacks.state_changed(next);
    }

    fn local(&self) -> Result<&LocalIdentity> {
        self.local
            .as_ref()
            .ok_or_else(|| SessionError::fail("session has no local identity"))
    }

    pub(crate) fn transport(&self) -> Option<&TransportState> {
        match &self.phase {
            Phase::Established(transport) => Some(&**transport),
            _ => None,
        }
    }

    fn transport_mut(&mut self) -> Result<&mut TransportState> {
        match &mut self.phase {
            Phase::Established(transport) => Ok(transport.as_mut()),
            _ => Err(SessionError::KaNotFinished),
        }
    }
}

impl<C: SessionCallbacks> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("local_id", &self.local_id().map(hex::encode))
            .field("state", &self.state)
            .field("role", &self.role)
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}

fn abort(role: Role, err: SessionError) -> SessionError {
    warn!("handshake aborted as {:?}: {}", role, err);
    err
}

/// Seconds since the Unix epoch, as carried in frames.
pub(crate) fn unix_time() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| SessionError::fail(format!("system clock before unix epoch: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::TrustStore;
    use crate::identity::PublicIdentity;

    #[derive(Default)]
    struct Recorder {
        trust: TrustStore,
        states: Vec<SessionState>,
    }

    impl SessionCallbacks for Recorder {
        fn state_changed(&mut self, state: SessionState) {
            self.states.push(state);
        }

        fn get_public_key_for_id(&self, id: &[u8]) -> Option<PublicIdentity> {
            self.trust.get_public_key_for_id(id)
        }
    }

    fn pair() -> (Session<Recorder>, Session<Recorder>) {
        let client_keys = IdentityKeypair::generate();
        let server_keys = IdentityKeypair::generate();

        let mut client_cb = Recorder::default();
        client_cb.trust.insert("server", server_keys.public_identity());
        let mut server_cb = Recorder::default();
        server_cb.trust.insert("client", client_keys.public_identity());

        let client =
            Session::from_keypair("client", client_keys, client_cb, SessionConfig::default())
                .unwrap();
        let server =
            Session::from_keypair("server", server_keys, server_cb, SessionConfig::default())
                .unwrap();
        (client, server)
    }

    fn handshake(client: &mut Session<Recorder>, server: &mut Session<Recorder>) {
        let request = client.generate_connect_request().unwrap();
        let reply = match server.unwrap(&request).unwrap() {
            Unwrapped::SendToPeer(reply) => reply,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(client.unwrap(&reply).unwrap(), Unwrapped::HandshakeComplete);
    }

    #[test]
    fn test_new_session_is_idle() {
        let (client, _) = pair();
        assert_eq!(client.state(), SessionState::Idle);
        assert!(!client.is_established());
        assert_eq!(client.role(), None);
        assert_eq!(client.local_id(), Some(&b"client"[..]));
        assert!(matches!(client.get_remote_id(), Err(SessionError::KaNotFinished)));
    }

    #[test]
    fn test_invalid_construction() {
        let key = IdentityKeypair::generate().private_key_bytes();
        assert!(matches!(
            Session::new("", key.as_ref(), TrustStore::new()),
            Err(SessionError::InvalidParameter(_))
        ));
        assert!(matches!(
            Session::new("alice", &[], TrustStore::new()),
            Err(SessionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_state_events() {
        let (mut client, mut server) = pair();
        handshake(&mut client, &mut server);

        let expected = [SessionState::Negotiating, SessionState::Established];
        assert_eq!(client.callbacks().states, expected);
        assert_eq!(server.callbacks().states, expected);
        assert_eq!(client.role(), Some(Role::Client));
        assert_eq!(server.role(), Some(Role::Server));
        assert_eq!(client.session_id(), server.session_id());
        assert_eq!(client.get_remote_id().unwrap(), b"server");
        assert_eq!(server.get_remote_id().unwrap(), b"client");
    }

    #[test]
    fn test_connect_request_only_once() {
        let (mut client, _) = pair();
        client.generate_connect_request().unwrap();
        assert!(matches!(
            client.generate_connect_request(),
            Err(SessionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_connect_request_after_established_rejected() {
        let (mut client, mut server) = pair();
        handshake(&mut client, &mut server);
        assert!(matches!(
            server.generate_connect_request(),
            Err(SessionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_wrap_before_established() {
        let (mut client, _) = pair();
        assert!(matches!(client.wrap(b"early"), Err(SessionError::KaNotFinished)));
        client.generate_connect_request().unwrap();
        assert!(matches!(
            client.wrap_into(b"early", &mut [0u8; 128]),
            Err(SessionError::KaNotFinished)
        ));
    }

    #[test]
    fn test_failed_handshake_stays_negotiating() {
        let (mut client, _) = pair();
        client.generate_connect_request().unwrap();

        assert!(client.unwrap(b"garbage").is_err());
        assert_eq!(client.state(), SessionState::Negotiating);
        assert!(!client.is_established());

        // Aborted sessions refuse everything afterwards
        assert!(matches!(
            client.unwrap(b"garbage"),
            Err(SessionError::InvalidParameter(_))
        ));
        assert_eq!(client.callbacks().states, [SessionState::Negotiating]);
    }

    #[test]
    fn test_transport_after_handshake() {
        let (mut client, mut server) = pair();
        handshake(&mut client, &mut server);

        let frame = client.wrap(b"over the wire").unwrap();
        assert_eq!(frame.len(), Session::<Recorder>::wrapped_len(13));
        assert_eq!(
            server.unwrap(&frame).unwrap(),
            Unwrapped::Message(b"over the wire".to_vec())
        );

        let mut out = vec![0u8; Session::<Recorder>::wrapped_len(0)];
        let written = server.wrap_into(&[], &mut out).unwrap();
        assert_eq!(written, out.len());
        assert_eq!(client.unwrap(&out).unwrap(), Unwrapped::Message(Vec::new()));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let (client, _) = pair();
        let rendered = format!("{:?}", client);
        assert!(rendered.contains(&hex::encode("client")));
        assert!(rendered.contains("Idle"));
    }
}
