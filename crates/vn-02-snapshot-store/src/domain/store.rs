//! The per-channel snapshot store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use shared_types::{AuthoritySet, ChannelId, Clock, Snapshot, ValidationError, U256};
use vn_01_snapshot::verify_snapshot;

use crate::ports::database::{SignatureRecord, SnapshotDatabase, TransactionRecord};

/// Result of a compare-and-swap application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot replaced the stored value (or filled an empty slot).
    Accepted,
    /// Height is not strictly greater than the stored height. Replays of an
    /// already-accepted snapshot land here, which makes acceptance
    /// idempotent; so do equal-height forks, where the first writer wins.
    Stale { stored_height: u64 },
    /// Failed model validation; nothing changed.
    Invalid(ValidationError),
}

/// Write-through persistence attached to a store.
struct Persistence {
    database: Arc<dyn SnapshotDatabase>,
    clock: Arc<dyn Clock>,
}

/// Local mapping `(wallet, token) → highest verified snapshot`.
///
/// Channel slots are individually locked so applications for different
/// channels proceed in parallel while a single channel serializes.
pub struct SnapshotStore {
    channels: RwLock<HashMap<ChannelId, Arc<Mutex<Option<Snapshot>>>>>,
    persistence: Option<Persistence>,
    min_quorum: usize,
}

impl SnapshotStore {
    pub fn new(min_quorum: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            persistence: None,
            min_quorum,
        }
    }

    /// A store that records every accepted snapshot in `database`.
    pub fn with_database(
        min_quorum: usize,
        database: Arc<dyn SnapshotDatabase>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            persistence: Some(Persistence { database, clock }),
            min_quorum,
        }
    }

    /// The highest accepted snapshot for a channel.
    pub fn get(&self, channel: &ChannelId) -> Option<Snapshot> {
        let slot = self.channels.read().get(channel).cloned()?;
        let guard = slot.lock();
        guard.clone()
    }

    /// Highest accepted height for a channel, 0 when none.
    pub fn height(&self, channel: &ChannelId) -> u64 {
        self.get(channel).map(|s| s.height).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Compare-and-swap application of a received snapshot.
    ///
    /// Validation runs against `authorities`, the membership copy the
    /// caller took at transaction start; the swap itself happens under the
    /// channel lock so concurrent applications serialize.
    pub fn try_apply(&self, snapshot: &Snapshot, authorities: &AuthoritySet) -> ApplyOutcome {
        if let Err(reason) = verify_snapshot(snapshot, authorities, self.min_quorum) {
            debug!(channel = ?snapshot.channel(), %reason, "snapshot rejected");
            return ApplyOutcome::Invalid(reason);
        }

        let channel = snapshot.channel();
        let slot = {
            let mut channels = self.channels.write();
            Arc::clone(channels.entry(channel).or_default())
        };

        let mut guard = slot.lock();
        let previous_balance = match guard.as_ref() {
            Some(stored) if snapshot.height <= stored.height => {
                return ApplyOutcome::Stale {
                    stored_height: stored.height,
                };
            }
            Some(stored) => Some(stored.balance),
            None => None,
        };

        debug!(
            channel = ?channel,
            height = snapshot.height,
            balance = %snapshot.balance,
            "snapshot accepted"
        );
        *guard = Some(snapshot.clone());
        drop(guard);

        if let Some(persistence) = &self.persistence {
            self.record(persistence, snapshot, previous_balance);
        }
        ApplyOutcome::Accepted
    }

    fn record(
        &self,
        persistence: &Persistence,
        snapshot: &Snapshot,
        previous_balance: Option<U256>,
    ) {
        let now = persistence.clock.now();
        let digest = vn_01_snapshot::snapshot_digest(snapshot);
        let (credit, debit) = balance_movement(previous_balance, snapshot.balance);

        let record = TransactionRecord {
            hash: digest,
            address: snapshot.wallet,
            token: snapshot.token,
            height: snapshot.height,
            credit,
            debit,
            balance: snapshot.balance,
            participants: hex_concat(snapshot.participants.iter().map(|p| p.as_bytes().as_slice())),
            signatures: hex_concat(snapshot.signatures.iter().map(|s| s.as_bytes().as_slice())),
            created_at: now,
        };
        if let Err(error) = persistence.database.insert_transaction(record) {
            warn!(%error, "snapshot accepted but not persisted");
            return;
        }

        for (participant, signature) in snapshot.participants.iter().zip(&snapshot.signatures) {
            let row = SignatureRecord {
                hash: digest,
                participant: *participant,
                signature: *signature,
                created_at: now,
            };
            if let Err(error) = persistence.database.insert_signature(row) {
                warn!(%error, "signature row not persisted");
            }
        }
    }
}

/// Credit/debit split between two consecutive balances.
fn balance_movement(previous: Option<U256>, current: U256) -> (U256, U256) {
    match previous {
        None => (current, U256::zero()),
        Some(prev) if current >= prev => (current - prev, U256::zero()),
        Some(prev) => (U256::zero(), prev - current),
    }
}

fn hex_concat<'a>(parts: impl Iterator<Item = &'a [u8]>) -> String {
    let mut out = String::new();
    for part in parts {
        out.push_str(&hex::encode(part));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_db::InMemorySnapshotDatabase;
    use primitive_types::U256;
    use shared_crypto::NodeKeypair;
    use shared_types::{Address, ManualClock, NodeEntry, NodeId};
    use vn_01_snapshot::{canonical_participants, snapshot_digest};

    struct Quorum {
        keypairs: Vec<NodeKeypair>,
        entries: Vec<NodeEntry>,
    }

    fn quorum(n: usize) -> Quorum {
        let keypairs: Vec<NodeKeypair> = (0..n).map(|_| NodeKeypair::generate()).collect();
        let entries = keypairs
            .iter()
            .map(|kp| NodeEntry {
                node_id: NodeId::from_public_key(&kp.public_key()),
                operator: Address::ZERO,
                endpoint: "localhost:9000".into(),
                public_key: kp.public_key(),
                stake: U256::from(250_000u64),
                registered_at: shared_types::Timestamp::new(0),
                unlock_at: shared_types::Timestamp::new(0),
            })
            .collect();
        Quorum { keypairs, entries }
    }

    fn snapshot(quorum: &Quorum, height: u64, balance: u64) -> Snapshot {
        let wallet = Address([0x0A; 20]);
        let token = Address([0x0B; 20]);
        let channel = ChannelId::new(wallet, token);
        let ids = quorum.entries.iter().map(|e| e.node_id).collect();

        let mut snapshot = Snapshot {
            wallet,
            token,
            height,
            balance: U256::from(balance),
            participants: canonical_participants(&channel, ids),
            signatures: Vec::new(),
        };
        let digest = snapshot_digest(&snapshot);
        snapshot.signatures = snapshot
            .participants
            .iter()
            .map(|id| {
                quorum
                    .keypairs
                    .iter()
                    .find(|kp| NodeId::from_public_key(&kp.public_key()) == *id)
                    .unwrap()
                    .sign(digest.as_bytes())
            })
            .collect();
        snapshot
    }

    #[test]
    fn test_apply_then_get() {
        let q = quorum(3);
        let authorities = AuthoritySet::from_entries(&q.entries);
        let store = SnapshotStore::new(3);
        let s = snapshot(&q, 1, 100);

        assert_eq!(store.try_apply(&s, &authorities), ApplyOutcome::Accepted);
        assert_eq!(store.get(&s.channel()), Some(s));
    }

    #[test]
    fn test_replay_is_idempotent() {
        let q = quorum(3);
        let authorities = AuthoritySet::from_entries(&q.entries);
        let store = SnapshotStore::new(3);
        let s = snapshot(&q, 2, 50);

        assert_eq!(store.try_apply(&s, &authorities), ApplyOutcome::Accepted);
        assert_eq!(
            store.try_apply(&s, &authorities),
            ApplyOutcome::Stale { stored_height: 2 }
        );
        assert_eq!(store.get(&s.channel()), Some(s));
    }

    #[test]
    fn test_heights_only_increase() {
        let q = quorum(3);
        let authorities = AuthoritySet::from_entries(&q.entries);
        let store = SnapshotStore::new(3);

        let s2 = snapshot(&q, 2, 50);
        let s1 = snapshot(&q, 1, 100);
        let s3 = snapshot(&q, 3, 10);

        assert_eq!(store.try_apply(&s2, &authorities), ApplyOutcome::Accepted);
        assert_eq!(
            store.try_apply(&s1, &authorities),
            ApplyOutcome::Stale { stored_height: 2 }
        );
        assert_eq!(store.try_apply(&s3, &authorities), ApplyOutcome::Accepted);
        assert_eq!(store.height(&s3.channel()), 3);
    }

    #[test]
    fn test_equal_height_fork_keeps_first_writer() {
        let q = quorum(3);
        let authorities = AuthoritySet::from_entries(&q.entries);
        let store = SnapshotStore::new(3);

        let first = snapshot(&q, 4, 60);
        let fork = snapshot(&q, 4, 55);
        assert_ne!(snapshot_digest(&first), snapshot_digest(&fork));

        assert_eq!(store.try_apply(&first, &authorities), ApplyOutcome::Accepted);
        assert_eq!(
            store.try_apply(&fork, &authorities),
            ApplyOutcome::Stale { stored_height: 4 }
        );
        assert_eq!(store.get(&first.channel()), Some(first));
    }

    #[test]
    fn test_invalid_snapshot_changes_nothing() {
        let q = quorum(3);
        let authorities = AuthoritySet::from_entries(&q.entries);
        let store = SnapshotStore::new(3);

        let mut bad = snapshot(&q, 1, 100);
        bad.signatures.pop();

        assert!(matches!(
            store.try_apply(&bad, &authorities),
            ApplyOutcome::Invalid(_)
        ));
        assert_eq!(store.get(&bad.channel()), None);
        assert_eq!(store.channel_count(), 0);
    }

    #[test]
    fn test_write_through_records_movement() {
        let q = quorum(3);
        let authorities = AuthoritySet::from_entries(&q.entries);
        let database = Arc::new(InMemorySnapshotDatabase::new());
        let clock = ManualClock::new(shared_types::Timestamp::new(1_000));
        let store = SnapshotStore::with_database(3, database.clone(), clock);

        let s1 = snapshot(&q, 1, 100);
        let s2 = snapshot(&q, 2, 20);
        store.try_apply(&s1, &authorities);
        store.try_apply(&s2, &authorities);

        let rows = database.transactions_for(&s1.channel());
        assert_eq!(rows.len(), 2);

        // Opening row credits the full balance.
        assert_eq!(rows[0].credit, U256::from(100u64));
        assert_eq!(rows[0].debit, U256::zero());
        // The move 100 → 20 debits 80.
        assert_eq!(rows[1].debit, U256::from(80u64));
        assert_eq!(rows[1].balance, U256::from(20u64));

        let sigs = database.signatures_for(&rows[1].hash);
        assert_eq!(sigs.len(), 3);
    }

    #[test]
    fn test_balance_movement_split() {
        assert_eq!(
            balance_movement(None, U256::from(5u64)),
            (U256::from(5u64), U256::zero())
        );
        assert_eq!(
            balance_movement(Some(U256::from(5u64)), U256::from(9u64)),
            (U256::from(4u64), U256::zero())
        );
        assert_eq!(
            balance_movement(Some(U256::from(9u64)), U256::from(5u64)),
            (U256::zero(), U256::from(4u64))
        );
    }
}
