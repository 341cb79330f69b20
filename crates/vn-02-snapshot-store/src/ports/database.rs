//! Snapshot persistence port.
//!
//! Two tables: `transactions`, one row per accepted snapshot with the
//! channel's balance movement, unique on `(address, token, height)` and
//! keyed by digest; and `signatures`, one row per participant signature for
//! provenance, keyed by `(hash, participant)`. List-valued columns are
//! stored as hex of the canonical byte encoding so rows are comparable
//! across backends.

use thiserror::Error;

use shared_crypto::NodeSignature;
use shared_types::{Address, ChannelId, Digest, NodeId, Timestamp, U256};

/// One accepted snapshot, as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Snapshot digest; primary key.
    pub hash: Digest,
    pub address: Address,
    pub token: Address,
    pub height: u64,
    /// Balance gained since the previous height (incoming transfers).
    pub credit: U256,
    /// Balance spent since the previous height (outgoing transfers).
    pub debit: U256,
    /// Balance at this height.
    pub balance: U256,
    /// Hex of the concatenated participant ids, canonical order.
    pub participants: String,
    /// Hex of the concatenated signatures, aligned with participants.
    pub signatures: String,
    pub created_at: Timestamp,
}

/// One participant signature, as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    pub hash: Digest,
    pub participant: NodeId,
    pub signature: NodeSignature,
    pub created_at: Timestamp,
}

/// Uniqueness violations reported by the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("transaction {0} already recorded")]
    DuplicateHash(Digest),

    #[error("height {height} already recorded for {address}/{token}")]
    DuplicateHeight {
        address: Address,
        token: Address,
        height: u64,
    },

    #[error("signature by {participant} already recorded for {hash}")]
    DuplicateSignature { hash: Digest, participant: NodeId },
}

/// Storage backend for accepted snapshots.
///
/// The in-memory adapter ships with this crate; durable backends are
/// external adapters behind the same trait.
pub trait SnapshotDatabase: Send + Sync {
    fn insert_transaction(&self, record: TransactionRecord) -> Result<(), DatabaseError>;

    fn insert_signature(&self, record: SignatureRecord) -> Result<(), DatabaseError>;

    fn transaction(&self, hash: &Digest) -> Option<TransactionRecord>;

    /// All rows for a channel, ascending height.
    fn transactions_for(&self, channel: &ChannelId) -> Vec<TransactionRecord>;

    fn signatures_for(&self, hash: &Digest) -> Vec<SignatureRecord>;
}
