//! Node signing identities (secp256k1).
//!
//! Every node signs snapshot digests with a secp256k1 key; the node's
//! network identity is the SHA-256 hash of its compressed public key, so a
//! verifier can bind a signature to a declared participant by checking both
//! the signature and the key-to-identity hash.

use std::fmt;

use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::errors::CryptoError;

/// Compressed secp256k1 public key (33 bytes, 0x02/0x03 prefix).
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePublicKey(#[serde_as(as = "Hex")] [u8; 33]);

impl NodePublicKey {
    /// Create from compressed bytes, validating the curve point.
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// SHA-256 of the compressed key; the node's network identity.
    pub fn id_bytes(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.finalize().into()
    }

    /// Verify a signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &NodeSignature) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig =
            Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignature)?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pk#{}..", hex::encode(&self.0[..4]))
    }
}

/// ECDSA signature, 64 bytes in `r || s` form.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSignature(#[serde_as(as = "Hex")] [u8; 64]);

impl NodeSignature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for NodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sig#{}..", hex::encode(&self.0[..4]))
    }
}

/// A node's signing keypair.
pub struct NodeKeypair {
    signing_key: SigningKey,
}

impl NodeKeypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Restore from secret key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// The compressed public key.
    pub fn public_key(&self) -> NodePublicKey {
        let sec1_bytes = self.signing_key.verifying_key().to_sec1_bytes();
        // SEC1 compressed form is always exactly 33 bytes.
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1_bytes[..33]);
        NodePublicKey(bytes)
    }

    /// Network identity derived from the public key.
    pub fn node_id_bytes(&self) -> [u8; 32] {
        self.public_key().id_bytes()
    }

    /// Sign a message (deterministic, RFC 6979). Snapshot participants sign
    /// the 32-byte snapshot digest.
    pub fn sign(&self, message: &[u8]) -> NodeSignature {
        let sig: Signature = self.signing_key.sign(message);
        let bytes: [u8; 64] = sig.to_bytes().into();
        NodeSignature(bytes)
    }

    /// Secret key bytes, for serialization.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for NodeKeypair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

impl fmt::Debug for NodeKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material.
        write!(f, "NodeKeypair({:?})", self.public_key())
    }
}
