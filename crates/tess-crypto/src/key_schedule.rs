//! Key schedule: session id, master secret, directional message keys.
//!
//! Everything is HKDF-SHA-256 with a distinct public label per output. The
//! handshake context (both ephemeral keys and both ids, client first) is
//! mixed into the session id and master secret, so two handshakes between the
//! same identities never share keys.
//!
//! ```text
//! session_id    = HKDF(-, "tess session id", ctx)[..4]
//! master_secret = HKDF(ecdh, salt = session_id, "tess session master key", ctx)
//! client_key    = HKDF(master_secret, "tess client key", session_id)
//! server_key    = HKDF(master_secret, "tess server key", session_id)
//! client_seq0   = HKDF(master_secret, "tess client initial sequence number", session_id)[..4]
//! server_seq0   = HKDF(master_secret, "tess server initial sequence number", session_id)[..4]
//! ```
//!
//! Message keys depend only on `(master_secret, session_id, role)`, which is
//! exactly what a saved session carries.

use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, SessionError};

pub const MASTER_SECRET_LEN: usize = 32;
pub const MESSAGE_KEY_LEN: usize = 32;

const SESSION_ID_LABEL: &str = "tess session id";
const MASTER_KEY_LABEL: &str = "tess session master key";
const CLIENT_KEY_LABEL: &str = "tess client key";
const SERVER_KEY_LABEL: &str = "tess server key";
const CLIENT_SEQ_LABEL: &str = "tess client initial sequence number";
const SERVER_SEQ_LABEL: &str = "tess server initial sequence number";

/// Which end of the handshake we are. The initiator is the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn is_client(self) -> bool {
        matches!(self, Role::Client)
    }

    pub(crate) fn to_wire(self) -> u32 {
        match self {
            Role::Client => 1,
            Role::Server => 0,
        }
    }

    pub(crate) fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(Role::Client),
            0 => Some(Role::Server),
            _ => None,
        }
    }
}

/// The per-handshake secret every other key is derived from.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret([u8; MASTER_SECRET_LEN]);

impl MasterSecret {
    pub fn from_bytes(bytes: [u8; MASTER_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

/// Cipher keys for each direction, already oriented for the local role.
pub struct DirectionalKeys {
    pub outbound: Zeroizing<[u8; MESSAGE_KEY_LEN]>,
    pub inbound: Zeroizing<[u8; MESSAGE_KEY_LEN]>,
}

impl fmt::Debug for DirectionalKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DirectionalKeys(..)")
    }
}

/// Message keys plus the sequence numbers each direction starts from.
#[derive(Debug)]
pub struct MessageKeys {
    pub keys: DirectionalKeys,
    pub initial_out_seq: u32,
    pub initial_in_seq: u32,
}

/// Public values both peers saw during the handshake, in client/server order.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeContext<'a> {
    pub client_ephemeral: &'a [u8],
    pub server_ephemeral: &'a [u8],
    pub client_id: &'a [u8],
    pub server_id: &'a [u8],
}

impl<'a> HandshakeContext<'a> {
    fn parts(&self) -> [&'a [u8]; 4] {
        [
            self.client_ephemeral,
            self.server_ephemeral,
            self.client_id,
            self.server_id,
        ]
    }
}

/// Everything a completed handshake hands to the transport layer.
#[derive(Debug)]
pub struct DerivedKeys {
    pub session_id: u32,
    pub master_secret: MasterSecret,
    pub message_keys: MessageKeys,
}

/// Full schedule from the raw ECDH output.
pub fn derive(shared_secret: &[u8], ctx: &HandshakeContext<'_>, role: Role) -> Result<DerivedKeys> {
    let session_id = derive_session_id(ctx)?;
    let master_secret = derive_master_secret(shared_secret, session_id, ctx)?;
    let message_keys = derive_message_keys(&master_secret, session_id, role)?;

    Ok(DerivedKeys {
        session_id,
        master_secret,
        message_keys,
    })
}

pub fn derive_session_id(ctx: &HandshakeContext<'_>) -> Result<u32> {
    let mut out = [0u8; 4];
    kdf(&[], None, SESSION_ID_LABEL, &ctx.parts(), &mut out)?;
    Ok(u32::from_be_bytes(out))
}

pub fn derive_master_secret(
    shared_secret: &[u8],
    session_id: u32,
    ctx: &HandshakeContext<'_>,
) -> Result<MasterSecret> {
    let mut out = [0u8; MASTER_SECRET_LEN];
    kdf(
        shared_secret,
        Some(&session_id.to_be_bytes()),
        MASTER_KEY_LABEL,
        &ctx.parts(),
        &mut out,
    )?;
    let secret = MasterSecret(out);
    out.zeroize();
    Ok(secret)
}

/// Derive keys and initial sequence numbers for `role`.
///
/// The client's outbound key is the server's inbound key and vice versa.
pub fn derive_message_keys(
    master: &MasterSecret,
    session_id: u32,
    role: Role,
) -> Result<MessageKeys> {
    let context = session_id.to_be_bytes();
    let context = [&context[..]];

    let mut client_key = Zeroizing::new([0u8; MESSAGE_KEY_LEN]);
    let mut server_key = Zeroizing::new([0u8; MESSAGE_KEY_LEN]);
    kdf(master.as_bytes(), None, CLIENT_KEY_LABEL, &context, &mut client_key[..])?;
    kdf(master.as_bytes(), None, SERVER_KEY_LABEL, &context, &mut server_key[..])?;

    let mut client_seq = [0u8; 4];
    let mut server_seq = [0u8; 4];
    kdf(master.as_bytes(), None, CLIENT_SEQ_LABEL, &context, &mut client_seq)?;
    kdf(master.as_bytes(), None, SERVER_SEQ_LABEL, &context, &mut server_seq)?;
    let client_seq = u32::from_be_bytes(client_seq);
    let server_seq = u32::from_be_bytes(server_seq);

    let keys = match role {
        Role::Client => MessageKeys {
            keys: DirectionalKeys {
                outbound: client_key,
                inbound: server_key,
            },
            initial_out_seq: client_seq,
            initial_in_seq: server_seq,
        },
        Role::Server => MessageKeys {
            keys: DirectionalKeys {
                outbound: server_key,
                inbound: client_key,
            },
            initial_out_seq: server_seq,
            initial_in_seq: client_seq,
        },
    };
    Ok(keys)
}

/// HKDF-SHA-256 with `info = label || 0x00 || (len BE32 || part)*`.
fn kdf(
    key: &[u8],
    salt: Option<&[u8]>,
    label: &str,
    context: &[&[u8]],
    out: &mut [u8],
) -> Result<()> {
    let context_len: usize = context.iter().map(|c| c.len() + 4).sum();
    let mut info = Vec::with_capacity(label.len() + 1 + context_len);
    info.extend_from_slice(label.as_bytes());
    info.push(0);
    for part in context {
        info.extend_from_slice(&(part.len() as u32).to_be_bytes());
        info.extend_from_slice(part);
    }

    Hkdf::<Sha256>::new(salt, key)
        .expand(&info, out)
        .map_err(|e| SessionError::fail(format!("kdf: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(client_eph: &'a [u8], server_eph: &'a [u8]) -> HandshakeContext<'a> {
        HandshakeContext {
            client_ephemeral: client_eph,
            server_ephemeral: server_eph,
            client_id: b"client",
            server_id: b"server",
        }
    }

    #[test]
    fn test_directional_keys_mirror() {
        let ctx = context(&[1u8; 32], &[2u8; 32]);
        let client = derive(&[7u8; 32], &ctx, Role::Client).unwrap();
        let server = derive(&[7u8; 32], &ctx, Role::Server).unwrap();

        assert_eq!(client.session_id, server.session_id);
        assert_eq!(client.master_secret, server.master_secret);

        let c = &client.message_keys;
        let s = &server.message_keys;
        assert_eq!(*c.keys.outbound, *s.keys.inbound);
        assert_eq!(*c.keys.inbound, *s.keys.outbound);
        assert_ne!(*c.keys.outbound, *c.keys.inbound);
        assert_eq!(c.initial_out_seq, s.initial_in_seq);
        assert_eq!(c.initial_in_seq, s.initial_out_seq);
    }

    #[test]
    fn test_deterministic() {
        let ctx = context(&[1u8; 32], &[2u8; 32]);
        let a = derive(&[7u8; 32], &ctx, Role::Client).unwrap();
        let b = derive(&[7u8; 32], &ctx, Role::Client).unwrap();

        assert_eq!(a.session_id, b.session_id);
        assert_eq!(a.master_secret, b.master_secret);
        assert_eq!(*a.message_keys.keys.outbound, *b.message_keys.keys.outbound);
    }

    #[test]
    fn test_context_separates_sessions() {
        let a = derive(&[7u8; 32], &context(&[1u8; 32], &[2u8; 32]), Role::Client).unwrap();
        let b = derive(&[7u8; 32], &context(&[1u8; 32], &[3u8; 32]), Role::Client).unwrap();

        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.master_secret, b.master_secret);
        assert_ne!(*a.message_keys.keys.outbound, *b.message_keys.keys.outbound);
    }

    #[test]
    fn test_message_keys_rederivable_from_master() {
        let ctx = context(&[1u8; 32], &[2u8; 32]);
        let full = derive(&[7u8; 32], &ctx, Role::Server).unwrap();

        let again =
            derive_message_keys(&full.master_secret, full.session_id, Role::Server).unwrap();
        assert_eq!(*again.keys.outbound, *full.message_keys.keys.outbound);
        assert_eq!(again.initial_in_seq, full.message_keys.initial_in_seq);
    }

    #[test]
    fn test_role_wire_values() {
        assert_eq!(Role::from_wire(Role::Client.to_wire()), Some(Role::Client));
        assert_eq!(Role::from_wire(Role::Server.to_wire()), Some(Role::Server));
        assert_eq!(Role::from_wire(2), None);
    }
}
