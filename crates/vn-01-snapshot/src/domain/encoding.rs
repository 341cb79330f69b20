//! Canonical snapshot encoding and digest.
//!
//! The digest covers `(wallet, token, height, balance, participants)` in
//! declared order; signatures are excluded so that signing cannot change
//! what is being signed. The settlement layer hashes the identical bytes
//! with its native SHA-256, so both sides of the custody boundary agree on
//! every digest.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! wallet        20 bytes
//! token         20 bytes
//! height         8 bytes
//! balance       32 bytes
//! participants   4 bytes count, then 32 bytes per node id
//! ```

use thiserror::Error;

use shared_crypto::Sha256Hasher;
use shared_types::{Address, Digest, NodeId, Snapshot, U256};

/// Malformed canonical encoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("encoding truncated: needed {needed} bytes, had {had}")]
    Truncated { needed: usize, had: usize },

    #[error("trailing bytes after {0} participants")]
    TrailingBytes(u32),
}

/// Encoded size for a quorum of `n` participants.
fn encoded_len(participants: usize) -> usize {
    20 + 20 + 8 + 32 + 4 + 32 * participants
}

/// Deterministic encoding of the digest-covered fields.
pub fn canonical_bytes(snapshot: &Snapshot) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(encoded_len(snapshot.participants.len()));

    bytes.extend_from_slice(snapshot.wallet.as_bytes());
    bytes.extend_from_slice(snapshot.token.as_bytes());
    bytes.extend_from_slice(&snapshot.height.to_be_bytes());

    let mut balance = [0u8; 32];
    snapshot.balance.to_big_endian(&mut balance);
    bytes.extend_from_slice(&balance);

    bytes.extend_from_slice(&(snapshot.participants.len() as u32).to_be_bytes());
    for participant in &snapshot.participants {
        bytes.extend_from_slice(participant.as_bytes());
    }

    bytes
}

/// The 32-byte digest every participant signs.
pub fn snapshot_digest(snapshot: &Snapshot) -> Digest {
    let mut hasher = Sha256Hasher::new();
    hasher.update(&canonical_bytes(snapshot));
    Digest::new(hasher.finalize())
}

/// Decode the canonical form back into its fields.
///
/// Signatures are not covered by the encoding, so they come back empty;
/// re-encoding the result yields the input bytes.
pub fn decode_canonical(bytes: &[u8]) -> Result<Snapshot, DecodeError> {
    let header = encoded_len(0);
    if bytes.len() < header {
        return Err(DecodeError::Truncated {
            needed: header,
            had: bytes.len(),
        });
    }

    let mut wallet = [0u8; 20];
    wallet.copy_from_slice(&bytes[..20]);
    let mut token = [0u8; 20];
    token.copy_from_slice(&bytes[20..40]);

    let mut height = [0u8; 8];
    height.copy_from_slice(&bytes[40..48]);
    let height = u64::from_be_bytes(height);

    let balance = U256::from_big_endian(&bytes[48..80]);

    let mut count = [0u8; 4];
    count.copy_from_slice(&bytes[80..84]);
    let count = u32::from_be_bytes(count);

    let expected = encoded_len(count as usize);
    if bytes.len() < expected {
        return Err(DecodeError::Truncated {
            needed: expected,
            had: bytes.len(),
        });
    }
    if bytes.len() > expected {
        return Err(DecodeError::TrailingBytes(count));
    }

    let participants = bytes[84..]
        .chunks_exact(32)
        .map(|chunk| {
            let mut id = [0u8; 32];
            id.copy_from_slice(chunk);
            NodeId::new(id)
        })
        .collect();

    Ok(Snapshot {
        wallet: Address(wallet),
        token: Address(token),
        height,
        balance,
        participants,
        signatures: Vec::new(),
    })
}
