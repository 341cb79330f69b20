//! # Shared Crypto
//!
//! Cryptographic primitives for the ledger network: secp256k1 signing
//! identities for nodes and SHA-256 digests for snapshots.
//!
//! ## Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Node identity is the SHA-256 hash of the compressed public key
//! - Secret key material is zeroized on drop

pub mod errors;
pub mod hashing;
pub mod keys;

pub use errors::CryptoError;
pub use hashing::{sha256, sha256_many, Sha256Hasher};
pub use keys::{NodeKeypair, NodePublicKey, NodeSignature};
