//! Signed ephemeral key exchange.
//!
//! # Flow
//!
//! ```text
//! Client                                           Server
//!   |  C.id, C.eph, sig_C(C.id || C.eph)              |
//!   |------------------------------------------------>|  resolve key(C.id), verify
//!   |                                                 |
//!   |  S.id, S.eph, sig_S(S.id || S.eph || C.id || C.eph)
//!   |<------------------------------------------------|  ECDH, derive keys
//!   |  resolve key(S.id), verify, ECDH, derive keys   |
//!   [              both sides established             ]
//! ```
//!
//! The server's signature covers the client's contribution, so a reply cannot
//! be replayed into a different handshake. Peer signing keys always come from
//! [`SessionCallbacks::get_public_key_for_id`]; the wire only carries ids.
//!
//! Ephemeral secrets are consumed by the Diffie-Hellman step and the raw
//! shared secret is zeroized once the key schedule has run.

use rand::rngs::OsRng;
use std::fmt;
use tess_core::{HandshakeMessage, EPHEMERAL_KEY_LEN};
use tracing::warn;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::callbacks::SessionCallbacks;
use crate::error::{Result, SessionError};
use crate::identity::PublicIdentity;
use crate::key_schedule::{self, DerivedKeys, HandshakeContext, Role};
use crate::peer::{LocalIdentity, PeerIdentity};

/// One-shot X25519 key for a single handshake.
pub(crate) struct Ephemeral {
    secret: EphemeralSecret,
    public: [u8; EPHEMERAL_KEY_LEN],
}

impl Ephemeral {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret).to_bytes();
        Self { secret, public }
    }

    pub fn public(&self) -> &[u8; EPHEMERAL_KEY_LEN] {
        &self.public
    }

    /// ECDH with the peer's ephemeral key, then the full key schedule.
    fn agree(
        self,
        peer_public: &[u8; EPHEMERAL_KEY_LEN],
        ctx: &HandshakeContext<'_>,
        role: Role,
    ) -> Result<DerivedKeys> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer_public));
        if !shared.was_contributory() {
            return Err(SessionError::invalid("peer ephemeral key is a low-order point"));
        }
        key_schedule::derive(shared.as_bytes(), ctx, role)
    }
}

impl fmt::Debug for Ephemeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ephemeral")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Result of a verified handshake.
#[derive(Debug)]
pub(crate) struct Negotiated {
    pub peer: PeerIdentity,
    pub keys: DerivedKeys,
}

/// Build the client's opening message.
pub(crate) fn connect_request(local: &LocalIdentity, ephemeral: &Ephemeral) -> Result<Vec<u8>> {
    let signed = HandshakeMessage::signed_prefix(local.id(), ephemeral.public());
    HandshakeMessage {
        id: local.id().to_vec(),
        ephemeral_public: *ephemeral.public(),
        signature: local.keypair().sign(&signed),
    }
    .encode()
    .map_err(SessionError::from_wire)
}

/// Server side: verify the client's request and produce the reply.
pub(crate) fn respond<C: SessionCallbacks + ?Sized>(
    local: &LocalIdentity,
    ephemeral: Ephemeral,
    request: &[u8],
    callbacks: &C,
) -> Result<(Vec<u8>, Negotiated)> {
    let request = HandshakeMessage::decode(request).map_err(SessionError::from_wire)?;
    let client_key = resolve(callbacks, &request.id)?;

    let client_part = HandshakeMessage::signed_prefix(&request.id, &request.ephemeral_public);
    if !client_key.verify(&client_part, &request.signature) {
        warn!("connect request signature rejected for peer {}", hex::encode(&request.id));
        return Err(SessionError::InvalidSignature);
    }

    let server_public = *ephemeral.public();
    let mut signed = HandshakeMessage::signed_prefix(local.id(), &server_public);
    signed.extend_from_slice(&client_part);
    let reply = HandshakeMessage {
        id: local.id().to_vec(),
        ephemeral_public: server_public,
        signature: local.keypair().sign(&signed),
    }
    .encode()
    .map_err(SessionError::from_wire)?;

    let ctx = HandshakeContext {
        client_ephemeral: &request.ephemeral_public,
        server_ephemeral: &server_public,
        client_id: &request.id,
        server_id: local.id(),
    };
    let keys = ephemeral.agree(&request.ephemeral_public, &ctx, Role::Server)?;

    let peer = PeerIdentity {
        id: request.id,
        ecdh_public: request.ephemeral_public,
        signing_key: client_key,
    };
    Ok((reply, Negotiated { peer, keys }))
}

/// Client side: verify the server's reply to our request.
pub(crate) fn finish<C: SessionCallbacks + ?Sized>(
    local: &LocalIdentity,
    ephemeral: Ephemeral,
    reply: &[u8],
    callbacks: &C,
) -> Result<Negotiated> {
    let reply = HandshakeMessage::decode(reply).map_err(SessionError::from_wire)?;
    let server_key = resolve(callbacks, &reply.id)?;

    let client_public = *ephemeral.public();
    let mut signed = HandshakeMessage::signed_prefix(&reply.id, &reply.ephemeral_public);
    signed.extend_from_slice(&HandshakeMessage::signed_prefix(local.id(), &client_public));
    if !server_key.verify(&signed, &reply.signature) {
        warn!("connect reply signature rejected for peer {}", hex::encode(&reply.id));
        return Err(SessionError::InvalidSignature);
    }

    let ctx = HandshakeContext {
        client_ephemeral: &client_public,
        server_ephemeral: &reply.ephemeral_public,
        client_id: local.id(),
        server_id: &reply.id,
    };
    let keys = ephemeral.agree(&reply.ephemeral_public, &ctx, Role::Client)?;

    let peer = PeerIdentity {
        id: reply.id,
        ecdh_public: reply.ephemeral_public,
        signing_key: server_key,
    };
    Ok(Negotiated { peer, keys })
}

fn resolve<C: SessionCallbacks + ?Sized>(callbacks: &C, id: &[u8]) -> Result<PublicIdentity> {
    callbacks.get_public_key_for_id(id).ok_or_else(|| {
        warn!("no public key for peer {}", hex::encode(id));
        SessionError::unknown_peer(id)
    })
}
