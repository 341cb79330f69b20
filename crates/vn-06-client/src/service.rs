//! Client flow implementation.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shared_bus::{Subscription, VaultEvent};
use shared_crypto::NodeSignature;
use shared_types::{
    Address, ChannelId, NodeId, ProtocolConfig, RegistryError, SettlementError, Snapshot,
    TransportError, U256,
};
use vn_01_snapshot::{k_closest, PeerTransport};
use vn_03_registry::RegistryReader;
use vn_04_custodian::SettlementGateway;

/// Client-side failures.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Fewer than the required signatures arrived in the deadline window.
    /// Nothing durable happened; the caller may retry.
    #[error("quorum shortfall: {got} of {need} signatures")]
    QuorumShortfall { got: usize, need: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No settlement outcome arrived within the polling deadline.
    #[error("no settlement outcome within the deadline")]
    OutcomeTimeout,

    /// Cooperative cancellation; no durable effect.
    #[error("operation cancelled")]
    Cancelled,
}

/// How the custodian resolved a withdrawal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Withdrawn { amount: U256 },
    Rejected,
}

/// Driver for one wallet.
pub struct Client<S, P, R>
where
    S: SettlementGateway,
    P: PeerTransport + 'static,
    R: RegistryReader,
{
    wallet: Address,
    settlement: Arc<S>,
    transport: Arc<P>,
    registry: Arc<R>,
    config: ProtocolConfig,
}

impl<S, P, R> Client<S, P, R>
where
    S: SettlementGateway,
    P: PeerTransport + 'static,
    R: RegistryReader,
{
    pub fn new(
        wallet: Address,
        settlement: Arc<S>,
        transport: Arc<P>,
        registry: Arc<R>,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            wallet,
            settlement,
            transport,
            registry,
            config,
        }
    }

    pub fn wallet(&self) -> Address {
        self.wallet
    }

    /// Move funds into custody.
    pub async fn deposit(&self, token: Address, amount: U256) -> Result<(), ClientError> {
        self.settlement.deposit(self.wallet, token, amount).await?;
        Ok(())
    }

    /// Subscribe to custodian events. Call before submitting a request so
    /// the outcome cannot be missed.
    pub fn subscribe(&self) -> Subscription {
        self.settlement.subscribe()
    }

    /// Produce the fully signed snapshot for `height`: select the quorum,
    /// collect every signature within `deadline`, and publish the result to
    /// the network.
    pub async fn create_snapshot(
        &self,
        token: Address,
        height: u64,
        balance: U256,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<Snapshot, ClientError> {
        let channel = ChannelId::new(self.wallet, token);

        let entries = self.registry.all_nodes().await?;
        let quorum = k_closest(&channel, &entries, self.config.min_quorum);
        if quorum.len() < self.config.min_quorum {
            return Err(ClientError::QuorumShortfall {
                got: quorum.len(),
                need: self.config.min_quorum,
            });
        }

        let draft = Snapshot {
            wallet: self.wallet,
            token,
            height,
            balance,
            participants: quorum.iter().map(|e| e.node_id).collect(),
            signatures: Vec::new(),
        };
        debug!(channel = ?channel, height, participants = draft.participants.len(), "collecting signatures");

        let signatures = tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = timeout(deadline, self.collect_signatures(&draft)) => match result {
                Err(_elapsed) => {
                    return Err(ClientError::QuorumShortfall {
                        got: 0,
                        need: draft.participants.len(),
                    })
                }
                Ok(signatures) => signatures?,
            },
        };

        let snapshot = Snapshot {
            signatures,
            ..draft
        };
        self.transport.publish(snapshot.clone()).await?;
        info!(channel = ?channel, height, "snapshot signed and published");
        Ok(snapshot)
    }

    /// One parallel signature request per participant; all must sign.
    async fn collect_signatures(&self, draft: &Snapshot) -> Result<Vec<NodeSignature>, ClientError> {
        let need = draft.participants.len();
        let mut requests: JoinSet<(usize, Result<NodeSignature, TransportError>)> = JoinSet::new();

        for (index, node) in draft.participants.iter().enumerate() {
            let transport = Arc::clone(&self.transport);
            let draft = draft.clone();
            let node: NodeId = *node;
            requests.spawn(async move { (index, transport.request_signature(node, draft).await) });
        }

        let mut slots: Vec<Option<NodeSignature>> = vec![None; need];
        let mut got = 0;
        while let Some(joined) = requests.join_next().await {
            match joined {
                Ok((index, Ok(signature))) => {
                    slots[index] = Some(signature);
                    got += 1;
                }
                Ok((_, Err(error))) => {
                    // All participants must sign; one refusal sinks the
                    // draft.
                    warn!(%error, "participant did not sign");
                    return Err(ClientError::QuorumShortfall { got, need });
                }
                Err(join_error) => {
                    warn!(%join_error, "signature task failed");
                    return Err(ClientError::QuorumShortfall { got, need });
                }
            }
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(ClientError::QuorumShortfall { got, need })
    }

    /// Submit a withdrawal request for `amount` against `snapshot`.
    pub async fn request_withdrawal(
        &self,
        snapshot: Snapshot,
        amount: U256,
    ) -> Result<(), ClientError> {
        self.settlement
            .request_withdrawal(self.wallet, snapshot, amount)
            .await?;
        Ok(())
    }

    /// Finalize a withdrawal after the challenge window.
    pub async fn withdraw(&self, snapshot: Snapshot) -> Result<(), ClientError> {
        self.settlement.withdraw(self.wallet, snapshot).await?;
        Ok(())
    }

    /// Poll `events` until this wallet's request resolves.
    pub async fn await_outcome(
        &self,
        events: &mut Subscription,
        token: Address,
        deadline: Duration,
    ) -> Result<SettlementOutcome, ClientError> {
        let wallet = self.wallet;
        let poll = async move {
            loop {
                match events.recv().await {
                    None => return Err(ClientError::OutcomeTimeout),
                    Some(VaultEvent::Withdrawn {
                        wallet: w,
                        token: t,
                        amount,
                    }) if w == wallet && t == token => {
                        return Ok(SettlementOutcome::Withdrawn { amount })
                    }
                    Some(VaultEvent::Rejected {
                        wallet: w,
                        token: t,
                        ..
                    }) if w == wallet && t == token => return Ok(SettlementOutcome::Rejected),
                    Some(_) => continue,
                }
            }
        };

        match timeout(deadline, poll).await {
            Err(_elapsed) => Err(ClientError::OutcomeTimeout),
            Ok(outcome) => outcome,
        }
    }
}
