//! Crypto error types.

use thiserror::Error;

/// Failures from key handling and signature verification.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Bytes do not encode a valid compressed curve point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Bytes do not encode a valid secret scalar.
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Bytes do not encode a well-formed signature.
    #[error("malformed signature")]
    InvalidSignature,

    /// The signature does not verify against the key and message.
    #[error("signature verification failed")]
    VerificationFailed,
}
