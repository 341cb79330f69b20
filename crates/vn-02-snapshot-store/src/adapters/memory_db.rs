//! In-memory snapshot database.
//!
//! Backs tests and single-process deployments; enforces the same uniqueness
//! rules a durable backend would carry as constraints.

use std::collections::HashMap;

use parking_lot::RwLock;

use shared_types::{Address, ChannelId, Digest, NodeId};

use crate::ports::database::{
    DatabaseError, SignatureRecord, SnapshotDatabase, TransactionRecord,
};

#[derive(Default)]
struct Tables {
    transactions: HashMap<Digest, TransactionRecord>,
    /// Unique index on (address, token, height).
    heights: HashMap<(Address, Address, u64), Digest>,
    signatures: HashMap<(Digest, NodeId), SignatureRecord>,
}

/// Hash-map-backed implementation of [`SnapshotDatabase`].
#[derive(Default)]
pub struct InMemorySnapshotDatabase {
    tables: RwLock<Tables>,
}

impl InMemorySnapshotDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.read().transactions.len()
    }
}

impl SnapshotDatabase for InMemorySnapshotDatabase {
    fn insert_transaction(&self, record: TransactionRecord) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write();

        if tables.transactions.contains_key(&record.hash) {
            return Err(DatabaseError::DuplicateHash(record.hash));
        }
        let height_key = (record.address, record.token, record.height);
        if tables.heights.contains_key(&height_key) {
            return Err(DatabaseError::DuplicateHeight {
                address: record.address,
                token: record.token,
                height: record.height,
            });
        }

        tables.heights.insert(height_key, record.hash);
        tables.transactions.insert(record.hash, record);
        Ok(())
    }

    fn insert_signature(&self, record: SignatureRecord) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write();
        let key = (record.hash, record.participant);
        if tables.signatures.contains_key(&key) {
            return Err(DatabaseError::DuplicateSignature {
                hash: record.hash,
                participant: record.participant,
            });
        }
        tables.signatures.insert(key, record);
        Ok(())
    }

    fn transaction(&self, hash: &Digest) -> Option<TransactionRecord> {
        self.tables.read().transactions.get(hash).cloned()
    }

    fn transactions_for(&self, channel: &ChannelId) -> Vec<TransactionRecord> {
        let tables = self.tables.read();
        let mut rows: Vec<TransactionRecord> = tables
            .transactions
            .values()
            .filter(|r| r.address == channel.wallet && r.token == channel.token)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.height);
        rows
    }

    fn signatures_for(&self, hash: &Digest) -> Vec<SignatureRecord> {
        let tables = self.tables.read();
        let mut rows: Vec<SignatureRecord> = tables
            .signatures
            .values()
            .filter(|r| r.hash == *hash)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.participant);
        rows
    }
}
