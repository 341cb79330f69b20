//! Watcher node service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shared_bus::{Subscription, VaultEvent};
use shared_crypto::{NodeKeypair, NodeSignature};
use shared_types::{
    Address, Challenger, ChannelId, NodeId, ProtocolConfig, RegistryError, SettlementError,
    Snapshot, U256,
};
use vn_01_snapshot::{snapshot_digest, PeerTransport, SignRefusal, SnapshotHandler};
use vn_02_snapshot_store::{ApplyOutcome, SnapshotStore};
use vn_03_registry::{Registration, RegistryOperator, RegistryReader};
use vn_04_custodian::SettlementGateway;

use crate::domain::policy::evaluate_sign_request;

/// Failures that stop a watcher.
#[derive(Debug, Clone, Error)]
pub enum WatcherError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// This node's own identity lost authorization; per protocol the
    /// watcher terminates rather than keep acting unauthorized.
    #[error("watcher identity is no longer authorized")]
    Deauthorized,
}

/// A watcher node wired to its three ports: settlement, peer transport and
/// registry.
///
/// None of the ports hold a reference back; the watcher is the only owner
/// of its state.
pub struct Watcher<S, P, RG, RO>
where
    S: SettlementGateway + 'static,
    P: PeerTransport + 'static,
    RG: RegistryReader + 'static,
    RO: RegistryOperator + 'static,
{
    node_id: NodeId,
    keypair: NodeKeypair,
    operator: Address,
    endpoint: String,
    store: Arc<SnapshotStore>,
    settlement: Arc<S>,
    transport: Arc<P>,
    registry: Arc<RG>,
    registry_writer: Arc<RO>,
    config: ProtocolConfig,
    /// On-chain custody observed per channel, fed by `Deposited` events.
    /// Bounds the opening balance this node will co-sign.
    custody_floor: RwLock<HashMap<ChannelId, U256>>,
    shutdown: watch::Sender<bool>,
}

impl<S, P, RG, RO> Watcher<S, P, RG, RO>
where
    S: SettlementGateway + 'static,
    P: PeerTransport + 'static,
    RG: RegistryReader + 'static,
    RO: RegistryOperator + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keypair: NodeKeypair,
        operator: Address,
        endpoint: String,
        store: Arc<SnapshotStore>,
        settlement: Arc<S>,
        transport: Arc<P>,
        registry: Arc<RG>,
        registry_writer: Arc<RO>,
        config: ProtocolConfig,
    ) -> Arc<Self> {
        let node_id = NodeId::new(keypair.node_id_bytes());
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            node_id,
            keypair,
            operator,
            endpoint,
            store,
            settlement,
            transport,
            registry,
            registry_writer,
            config,
            custody_floor: RwLock::new(HashMap::new()),
            shutdown,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Join the network: install peer handlers, register with the required
    /// stake, subscribe to custodian events and start the event loop.
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, WatcherError> {
        self.transport
            .register(self.node_id, Arc::clone(self) as Arc<dyn SnapshotHandler>);

        self.registry_writer
            .register(Registration {
                node_id: self.node_id,
                operator: self.operator,
                endpoint: self.endpoint.clone(),
                public_key: self.keypair.public_key(),
                stake: self.config.stake_amount,
            })
            .await?;

        let subscription = self.settlement.subscribe();
        let shutdown_rx = self.shutdown.subscribe();
        let watcher = Arc::clone(self);
        info!(node = ?self.node_id, endpoint = %self.endpoint, "watcher started");
        Ok(tokio::spawn(watcher.run(subscription, shutdown_rx)))
    }

    /// Stop the event loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn run(self: Arc<Self>, mut events: Subscription, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(node = ?self.node_id, "watcher shutting down");
                    break;
                }
                event = events.recv() => match event {
                    None => {
                        info!(node = ?self.node_id, "event bus closed; watcher stopping");
                        break;
                    }
                    Some(event) => {
                        if let Err(fatal) = self.handle_event(event).await {
                            error!(node = ?self.node_id, %fatal, "watcher terminating");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Process one custodian event. `Err` only for fatal conditions; all
    /// other failures are logged and the loop continues.
    async fn handle_event(&self, event: VaultEvent) -> Result<(), WatcherError> {
        match event {
            VaultEvent::Deposited {
                wallet,
                token,
                amount,
            } => {
                let channel = ChannelId::new(wallet, token);
                let mut floors = self.custody_floor.write();
                let floor = floors.entry(channel).or_insert_with(U256::zero);
                *floor = floor.saturating_add(amount);
                debug!(node = ?self.node_id, channel = ?channel, floor = %*floor, "custody floor raised");
            }

            VaultEvent::WithdrawalRequested { snapshot, .. } => {
                self.inspect_withdrawal(snapshot).await?;
            }

            VaultEvent::Challenged { snapshot, .. } => {
                // Someone proved a newer height; adopt it if we are behind.
                self.adopt(&snapshot).await;
            }

            VaultEvent::Rejected { wallet, token, .. } => {
                debug!(node = ?self.node_id, wallet = ?wallet, token = ?token, "request rejected");
            }

            VaultEvent::Withdrawn {
                wallet,
                token,
                amount,
            } => {
                let channel = ChannelId::new(wallet, token);
                let mut floors = self.custody_floor.write();
                if let Some(floor) = floors.get_mut(&channel) {
                    *floor = floor.saturating_sub(amount);
                }
            }
        }
        Ok(())
    }

    /// The fraud check: compare the candidate against local history.
    async fn inspect_withdrawal(&self, candidate: Snapshot) -> Result<(), WatcherError> {
        let channel = candidate.channel();
        let Some(local) = self.store.get(&channel) else {
            // Never witnessed this channel; cannot tell fraud from a
            // channel we simply missed.
            return Ok(());
        };

        if local.height > candidate.height {
            info!(
                node = ?self.node_id,
                channel = ?channel,
                local_height = local.height,
                candidate_height = candidate.height,
                "stale withdrawal request detected; challenging"
            );
            return self.submit_challenge(local).await;
        }

        if local.height == candidate.height {
            if snapshot_digest(&local) == snapshot_digest(&candidate) {
                debug!(node = ?self.node_id, channel = ?channel, "request matches local head");
            } else {
                // Uniqueness of the pending request means the custodian has
                // already arbitrated; a challenge would need a newer height
                // we do not have.
                warn!(
                    node = ?self.node_id,
                    channel = ?channel,
                    height = local.height,
                    "equal-height fork observed; not challenging"
                );
            }
            return Ok(());
        }

        // The candidate is ahead of us and carries a full quorum; adopt it.
        self.adopt(&candidate).await;
        Ok(())
    }

    async fn submit_challenge(&self, local: Snapshot) -> Result<(), WatcherError> {
        match self
            .settlement
            .challenge(Challenger::Node(self.node_id), local)
            .await
        {
            Ok(()) => Ok(()),
            // Losing our own authorization is the one unrecoverable error.
            Err(SettlementError::UnauthorizedChallenger) => Err(WatcherError::Deauthorized),
            Err(error) => {
                // Raced by another watcher, or the request was already
                // cleared; nothing to defend anymore.
                warn!(node = ?self.node_id, %error, "challenge not accepted");
                Ok(())
            }
        }
    }

    /// Validate and store a snapshot that is (or may be) newer than ours.
    async fn adopt(&self, snapshot: &Snapshot) {
        let authorities = match self.registry.authority_set().await {
            Ok(set) => set,
            Err(error) => {
                warn!(node = ?self.node_id, %error, "registry unavailable; snapshot not adopted");
                return;
            }
        };
        match self.store.try_apply(snapshot, &authorities) {
            ApplyOutcome::Accepted => {
                debug!(
                    node = ?self.node_id,
                    channel = ?snapshot.channel(),
                    height = snapshot.height,
                    "snapshot adopted"
                );
            }
            ApplyOutcome::Stale { .. } => {}
            ApplyOutcome::Invalid(reason) => {
                warn!(node = ?self.node_id, %reason, "published snapshot failed validation");
            }
        }
    }

    fn floor_for(&self, channel: &ChannelId) -> U256 {
        self.custody_floor
            .read()
            .get(channel)
            .copied()
            .unwrap_or_else(U256::zero)
    }
}

#[async_trait]
impl<S, P, RG, RO> SnapshotHandler for Watcher<S, P, RG, RO>
where
    S: SettlementGateway + 'static,
    P: PeerTransport + 'static,
    RG: RegistryReader + 'static,
    RO: RegistryOperator + 'static,
{
    async fn on_sign_request(&self, draft: Snapshot) -> Result<NodeSignature, SignRefusal> {
        let channel = draft.channel();

        // A node that never saw this channel reconciles through the
        // network before judging the draft.
        if self.store.get(&channel).is_none() {
            if let Ok(Some(latest)) = self.transport.get_latest(channel).await {
                self.adopt(&latest).await;
            }
        }

        let local = self.store.get(&channel);
        evaluate_sign_request(local.as_ref(), self.floor_for(&channel), &draft, &self.node_id)?;

        let digest = snapshot_digest(&draft);
        debug!(node = ?self.node_id, channel = ?channel, height = draft.height, "witnessing draft");
        Ok(self.keypair.sign(digest.as_bytes()))
    }

    async fn on_publish(&self, snapshot: Snapshot) {
        self.adopt(&snapshot).await;
    }

    async fn on_get_latest(&self, channel: ChannelId) -> Option<Snapshot> {
        self.store.get(&channel)
    }
}
