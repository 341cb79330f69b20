//! In-memory registry adapter for tests and single-process networks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use shared_types::{Clock, NetworkManifest, NodeEntry, NodeId, ProtocolConfig, RegistryError, U256};

use crate::ports::{Registration, RegistryOperator, RegistryReader};

#[derive(Default)]
struct RegistryState {
    entries: HashMap<NodeId, NodeEntry>,
    /// Listing order; removal swaps the last element into the hole, so
    /// order is unstable across calls.
    order: Vec<NodeId>,
    /// Unregistered nodes waiting out the stake cooldown.
    departed: HashMap<NodeId, NodeEntry>,
}

/// Hash-map registry with swap-and-pop removal.
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
    manifest: NetworkManifest,
    min_stake: U256,
    cooldown_secs: u64,
    clock: Arc<dyn Clock>,
}

impl InMemoryRegistry {
    pub fn new(config: &ProtocolConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            manifest: NetworkManifest {
                version: 1,
                url: config.manifest_url.clone(),
                checksum: config.manifest_checksum,
            },
            min_stake: config.stake_amount,
            cooldown_secs: config.cooldown_period_secs,
            clock,
        }
    }

    pub fn node_count(&self) -> usize {
        self.state.read().entries.len()
    }
}

#[async_trait]
impl RegistryReader for InMemoryRegistry {
    async fn manifest(&self) -> Result<NetworkManifest, RegistryError> {
        Ok(self.manifest.clone())
    }

    async fn nodes(&self, offset: usize, limit: usize) -> Result<Vec<NodeEntry>, RegistryError> {
        let state = self.state.read();
        Ok(state
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| state.entries.get(id))
            .cloned()
            .collect())
    }

    async fn is_authorized(&self, node: &NodeId) -> Result<bool, RegistryError> {
        Ok(self.state.read().entries.contains_key(node))
    }
}

#[async_trait]
impl RegistryOperator for InMemoryRegistry {
    async fn register(&self, registration: Registration) -> Result<(), RegistryError> {
        if registration.stake < self.min_stake {
            return Err(RegistryError::InsufficientStake {
                required: self.min_stake,
                offered: registration.stake,
            });
        }

        let now = self.clock.now();
        let mut state = self.state.write();
        if state.entries.contains_key(&registration.node_id) {
            return Err(RegistryError::AlreadyRegistered(registration.node_id));
        }

        let entry = NodeEntry {
            node_id: registration.node_id,
            operator: registration.operator,
            endpoint: registration.endpoint,
            public_key: registration.public_key,
            stake: registration.stake,
            registered_at: now,
            unlock_at: now.add_secs(self.cooldown_secs),
        };
        info!(node = ?entry.node_id, endpoint = %entry.endpoint, "node registered");
        state.order.push(entry.node_id);
        state.entries.insert(entry.node_id, entry);
        Ok(())
    }

    async fn update_endpoint(
        &self,
        node: &NodeId,
        endpoint: String,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        let entry = state
            .entries
            .get_mut(node)
            .ok_or(RegistryError::UnknownNode(*node))?;
        entry.endpoint = endpoint;
        Ok(())
    }

    async fn unregister(&self, node: &NodeId) -> Result<(), RegistryError> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let mut entry = state
            .entries
            .remove(node)
            .ok_or(RegistryError::UnknownNode(*node))?;

        // Swap-and-pop keeps removal O(1) at the cost of listing order.
        if let Some(index) = state.order.iter().position(|id| id == node) {
            state.order.swap_remove(index);
        }

        entry.unlock_at = now.add_secs(self.cooldown_secs);
        info!(node = ?node, unlock_at = ?entry.unlock_at, "node unregistered");
        state.departed.insert(*node, entry);
        Ok(())
    }

    async fn withdraw_stake(&self, node: &NodeId) -> Result<U256, RegistryError> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let entry = state
            .departed
            .remove(node)
            .ok_or(RegistryError::UnknownNode(*node))?;

        if now < entry.unlock_at {
            let unlock_at = entry.unlock_at;
            state.departed.insert(*node, entry);
            return Err(RegistryError::StakeLocked { unlock_at });
        }
        info!(node = ?node, stake = %entry.stake, "stake withdrawn");
        Ok(entry.stake)
    }
}
