//! Participant records: our own identity and what we learn about the peer.

use std::fmt;

use tess_core::{EPHEMERAL_KEY_LEN, MAX_ID_LEN};

use crate::error::{Result, SessionError};
use crate::identity::{IdentityKeypair, PublicIdentity};

/// Our side of the session: a stable id and the key that signs for it.
pub struct LocalIdentity {
    id: Vec<u8>,
    keypair: IdentityKeypair,
}

impl LocalIdentity {
    pub fn new(id: Vec<u8>, keypair: IdentityKeypair) -> Result<Self> {
        if id.is_empty() {
            return Err(SessionError::invalid("local id must not be empty"));
        }
        if id.len() > MAX_ID_LEN {
            return Err(SessionError::invalid(format!(
                "local id longer than {} bytes",
                MAX_ID_LEN
            )));
        }
        Ok(Self { id, keypair })
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn keypair(&self) -> &IdentityKeypair {
        &self.keypair
    }
}

impl fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("id", &hex::encode(&self.id))
            .finish_non_exhaustive()
    }
}

/// The remote participant, filled in once its handshake message verifies.
///
/// `signing_key` always comes from the local lookup callback, never from the
/// wire.
#[derive(Clone)]
pub struct PeerIdentity {
    pub id: Vec<u8>,
    pub ecdh_public: [u8; EPHEMERAL_KEY_LEN],
    pub signing_key: PublicIdentity,
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerIdentity")
            .field("id", &hex::encode(&self.id))
            .field("ecdh_public", &hex::encode(self.ecdh_public))
            .field("signing_key", &self.signing_key)
            .finish()
    }
}
