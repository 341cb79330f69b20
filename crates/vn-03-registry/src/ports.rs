//! Registry ports.

use async_trait::async_trait;

use shared_crypto::NodePublicKey;
use shared_types::{
    Address, AuthoritySet, NetworkManifest, NodeEntry, NodeId, RegistryError, U256,
};

/// Read surface consumed by the protocol core.
///
/// Reads may suspend (a native adapter talks to the settlement layer).
/// Callers that validate snapshots take an [`AuthoritySet`] copy at
/// transaction start instead of holding the registry across the
/// transaction.
#[async_trait]
pub trait RegistryReader: Send + Sync {
    async fn manifest(&self) -> Result<NetworkManifest, RegistryError>;

    /// Page through the registered set. Ordering is unstable across calls.
    async fn nodes(&self, offset: usize, limit: usize) -> Result<Vec<NodeEntry>, RegistryError>;

    async fn is_authorized(&self, node: &NodeId) -> Result<bool, RegistryError>;

    /// The full registered set.
    async fn all_nodes(&self) -> Result<Vec<NodeEntry>, RegistryError> {
        const PAGE: usize = 64;
        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.nodes(offset, PAGE).await?;
            let done = page.len() < PAGE;
            offset += page.len();
            entries.extend(page);
            if done {
                return Ok(entries);
            }
        }
    }

    /// Membership copy for one transaction.
    async fn authority_set(&self) -> Result<AuthoritySet, RegistryError> {
        Ok(AuthoritySet::from_entries(&self.all_nodes().await?))
    }
}

/// Parameters for registering a node.
#[derive(Debug, Clone)]
pub struct Registration {
    pub node_id: NodeId,
    pub operator: Address,
    pub endpoint: String,
    pub public_key: NodePublicKey,
    pub stake: U256,
}

/// Operator-facing write surface. Not on the protocol core path.
#[async_trait]
pub trait RegistryOperator: Send + Sync {
    /// Register a node, locking its stake. Fails below the minimum stake.
    async fn register(&self, registration: Registration) -> Result<(), RegistryError>;

    async fn update_endpoint(&self, node: &NodeId, endpoint: String)
        -> Result<(), RegistryError>;

    /// Remove the node from the authorized set and start the stake
    /// cooldown.
    async fn unregister(&self, node: &NodeId) -> Result<(), RegistryError>;

    /// Release the stake of an unregistered node once its cooldown expired.
    async fn withdraw_stake(&self, node: &NodeId) -> Result<U256, RegistryError>;
}
