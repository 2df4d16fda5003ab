//! Ed25519 long-term identity keys.
//!
//! Every session participant signs its handshake contribution with an
//! [`IdentityKeypair`]. Peers verify with a [`PublicIdentity`] that they
//! resolve themselves (see [`crate::SessionCallbacks::get_public_key_for_id`]);
//! keys are never taken from the wire.
//!
//! Keys can be exported into the same tagged container used for saved
//! sessions:
//!
//! ```
//! use tess_crypto::identity::{IdentityKeypair, PublicIdentity};
//!
//! let keypair = IdentityKeypair::generate();
//! let exported = keypair.public_identity().export().unwrap();
//!
//! let imported = PublicIdentity::import(&exported).unwrap();
//! let signature = keypair.sign(b"challenge");
//! assert!(imported.verify(b"challenge", &signature));
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use tess_core::{Container, PUBLIC_KEY_TAG, SECRET_KEY_TAG};
use zeroize::Zeroizing;

use crate::error::{Result, SessionError};

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SECRET_KEY_LEN: usize = 32;

/// Ed25519 identity keypair.
///
/// The signing key is zeroized on drop by `ed25519-dalek`.
pub struct IdentityKeypair {
    signing_key: SigningKey,
}

impl IdentityKeypair {
    /// Generate a new random keypair using the OS CSPRNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create from raw 32-byte secret key material.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; SECRET_KEY_LEN] = bytes.try_into().map_err(|_| {
            SessionError::invalid(format!(
                "signing key must be {} bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(bytes),
        })
    }

    pub fn public_identity(&self) -> PublicIdentity {
        PublicIdentity {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        *self.signing_key.verifying_key().as_bytes()
    }

    /// Raw secret key bytes.
    ///
    /// # Security
    /// Handle with care! These bytes can recreate the identity.
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LEN]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        self.public_identity().verify(message, signature)
    }

    /// Export the secret key in a `TSSK` container.
    pub fn export(&self) -> Result<Zeroizing<Vec<u8>>> {
        let secret = self.private_key_bytes();
        let mut out = Zeroizing::new(vec![0u8; Container::encoded_len(SECRET_KEY_LEN)]);
        Container::encode_into(SECRET_KEY_TAG, &secret[..], &mut out)
            .map_err(|e| SessionError::fail(format!("exporting secret key: {}", e)))?;
        Ok(out)
    }

    /// Import a secret key from a `TSSK` container.
    pub fn import(data: &[u8]) -> Result<Self> {
        let payload = Container::open(data, SECRET_KEY_TAG).map_err(SessionError::corrupt)?;
        Self::from_bytes(payload)
    }
}

impl fmt::Debug for IdentityKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeypair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Public identity (verifying key only).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    verifying_key: VerifyingKey,
}

impl PublicIdentity {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            SessionError::invalid(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        let verifying_key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| SessionError::invalid(format!("invalid public key: {}", e)))?;
        Ok(Self { verifying_key })
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        *self.verifying_key.as_bytes()
    }

    /// Verify a signature, rejecting malleable encodings.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let sig = Signature::from_bytes(signature);
        self.verifying_key.verify_strict(message, &sig).is_ok()
    }

    /// Export in a `TSPK` container.
    pub fn export(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; Container::encoded_len(PUBLIC_KEY_LEN)];
        Container::encode_into(PUBLIC_KEY_TAG, self.verifying_key.as_bytes(), &mut out)
            .map_err(|e| SessionError::fail(format!("exporting public key: {}", e)))?;
        Ok(out)
    }

    /// Import from a `TSPK` container.
    pub fn import(data: &[u8]) -> Result<Self> {
        let payload = Container::open(data, PUBLIC_KEY_TAG).map_err(SessionError::corrupt)?;
        Self::from_bytes(payload)
    }
}

impl fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicIdentity({})", hex::encode(self.verifying_key.as_bytes()))
    }
}
