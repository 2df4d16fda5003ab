//! Shared helpers for the integration tests.

#![allow(dead_code)]

use tess_crypto::{
    IdentityKeypair, PublicIdentity, Session, SessionCallbacks, SessionConfig, SessionState,
    TrustStore, Unwrapped,
};

/// Install a subscriber once per test binary; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Lookup-only host that records state events.
#[derive(Default)]
pub struct Host {
    pub trust: TrustStore,
    pub states: Vec<SessionState>,
}

impl SessionCallbacks for Host {
    fn state_changed(&mut self, state: SessionState) {
        self.states.push(state);
    }

    fn get_public_key_for_id(&self, id: &[u8]) -> Option<PublicIdentity> {
        self.trust.get_public_key_for_id(id)
    }
}

pub struct Party {
    pub id: &'static str,
    pub keys: IdentityKeypair,
}

impl Party {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            keys: IdentityKeypair::generate(),
        }
    }

    pub fn public(&self) -> PublicIdentity {
        self.keys.public_identity()
    }

    /// Session for this party trusting each of `peers`.
    pub fn session(&self, peers: &[&Party], config: SessionConfig) -> Session<Host> {
        let mut host = Host::default();
        for peer in peers {
            host.trust.insert(peer.id, peer.public());
        }
        Session::with_config(self.id, self.keys.private_key_bytes().as_ref(), host, config)
            .unwrap()
    }
}

/// Two mutually trusting idle sessions: `(client, server)`.
pub fn pair() -> (Session<Host>, Session<Host>) {
    pair_with(SessionConfig::default())
}

pub fn pair_with(config: SessionConfig) -> (Session<Host>, Session<Host>) {
    let client = Party::new("client");
    let server = Party::new("server");
    (
        client.session(&[&server], config),
        server.session(&[&client], config),
    )
}

/// Run the two-message handshake to completion.
pub fn handshake(client: &mut Session<Host>, server: &mut Session<Host>) {
    let request = client.generate_connect_request().unwrap();
    let reply = match server.unwrap(&request).unwrap() {
        Unwrapped::SendToPeer(reply) => reply,
        other => panic!("expected a handshake reply, got {:?}", other),
    };
    assert_eq!(client.unwrap(&reply).unwrap(), Unwrapped::HandshakeComplete);
}

/// Established `(client, server)` pair.
pub fn established() -> (Session<Host>, Session<Host>) {
    let (mut client, mut server) = pair();
    handshake(&mut client, &mut server);
    (client, server)
}

pub fn message(unwrapped: Unwrapped) -> Vec<u8> {
    match unwrapped {
        Unwrapped::Message(message) => message,
        other => panic!("expected a message, got {:?}", other),
    }
}
