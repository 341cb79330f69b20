//! In-process peer transport.
//!
//! A handler registry keyed by node id stands in for the wire: publishes
//! fan out asynchronously to the nodes closest to the channel, signature
//! requests dispatch straight into the target's handler, and best-effort
//! lookups ask the closest handlers for their stored head.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use shared_crypto::NodeSignature;
use shared_types::{ChannelId, NodeId, Snapshot, TransportError};
use vn_01_snapshot::{distance_ordering, PeerTransport, SnapshotHandler};

/// Handler registry simulating the peer network.
pub struct InProcTransport {
    handlers: RwLock<HashMap<NodeId, Arc<dyn SnapshotHandler>>>,
    /// How many closest nodes a publish reaches.
    fanout: usize,
}

impl InProcTransport {
    pub fn new(fanout: usize) -> Arc<Self> {
        Arc::new(Self {
            handlers: RwLock::new(HashMap::new()),
            fanout,
        })
    }

    pub fn node_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// The `fanout` registered handlers closest to the channel, canonical
    /// order. Handler references are cloned out so no lock is held while
    /// the caller awaits them.
    fn closest(&self, channel: &ChannelId) -> Vec<(NodeId, Arc<dyn SnapshotHandler>)> {
        let key = channel.routing_key();
        let handlers = self.handlers.read();
        let mut ids: Vec<NodeId> = handlers.keys().copied().collect();
        ids.sort_by(|a, b| distance_ordering(&key, a, b));
        ids.truncate(self.fanout);
        ids.into_iter()
            .filter_map(|id| handlers.get(&id).map(|h| (id, Arc::clone(h))))
            .collect()
    }
}

#[async_trait]
impl PeerTransport for InProcTransport {
    async fn publish(&self, snapshot: Snapshot) -> Result<(), TransportError> {
        let targets = self.closest(&snapshot.channel());
        debug!(
            channel = ?snapshot.channel(),
            height = snapshot.height,
            targets = targets.len(),
            "publishing snapshot"
        );
        for (_, handler) in targets {
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                handler.on_publish(snapshot).await;
            });
        }
        Ok(())
    }

    async fn get_latest(&self, channel: ChannelId) -> Result<Option<Snapshot>, TransportError> {
        let mut best: Option<Snapshot> = None;
        for (_, handler) in self.closest(&channel) {
            if let Some(found) = handler.on_get_latest(channel).await {
                let better = best.as_ref().map_or(true, |b| found.height > b.height);
                if better {
                    best = Some(found);
                }
            }
        }
        Ok(best)
    }

    async fn request_signature(
        &self,
        node: NodeId,
        snapshot: Snapshot,
    ) -> Result<NodeSignature, TransportError> {
        let handler = self
            .handlers
            .read()
            .get(&node)
            .cloned()
            .ok_or(TransportError::Unreachable(node))?;

        handler
            .on_sign_request(snapshot)
            .await
            .map_err(|refusal| TransportError::Refused {
                node,
                reason: refusal.to_string(),
            })
    }

    fn register(&self, node: NodeId, handler: Arc<dyn SnapshotHandler>) {
        debug!(node = ?node, "peer handler installed");
        self.handlers.write().insert(node, handler);
    }
}
