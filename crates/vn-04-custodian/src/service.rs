//! The in-process vault engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use shared_bus::{EventFilter, InMemoryEventBus, Subscription, VaultEvent};
use shared_types::{
    Address, Challenger, ChannelId, Clock, PendingRequest, ProtocolConfig, SettlementError,
    Snapshot, U256,
};
use vn_01_snapshot::{snapshot_digest, verify_snapshot};
use vn_03_registry::RegistryReader;

use crate::domain::bank::TokenBank;
use crate::ports::api::SettlementGateway;

/// Settlement-layer account holding all custody.
pub const VAULT_ACCOUNT: Address = Address([0xFE; 20]);

#[derive(Default)]
struct ChannelState {
    custody: U256,
    pending: Option<PendingRequest>,
}

/// Simulated settlement custodian.
///
/// One lock per channel: operations on a single channel serialize, distinct
/// channels proceed in parallel. The authorized-node set is copied from the
/// registry at the start of each transaction, and events are emitted while
/// the channel lock is held so subscribers observe transitions in exactly
/// the order they were accepted.
pub struct VaultEngine<R: RegistryReader> {
    channels: RwLock<HashMap<ChannelId, Arc<Mutex<ChannelState>>>>,
    bank: Arc<TokenBank>,
    registry: Arc<R>,
    bus: InMemoryEventBus,
    clock: Arc<dyn Clock>,
    config: ProtocolConfig,
}

impl<R: RegistryReader> VaultEngine<R> {
    pub fn new(
        config: ProtocolConfig,
        registry: Arc<R>,
        bank: Arc<TokenBank>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            bank,
            registry,
            bus: InMemoryEventBus::new(),
            clock,
            config,
        }
    }

    fn channel_slot(&self, channel: ChannelId) -> Arc<Mutex<ChannelState>> {
        let mut channels = self.channels.write();
        Arc::clone(channels.entry(channel).or_default())
    }

    /// Custody currently held for `(account, token)`.
    pub fn custody(&self, account: Address, token: Address) -> U256 {
        let channel = ChannelId::new(account, token);
        let slot = self.channels.read().get(&channel).cloned();
        slot.map(|s| s.lock().custody).unwrap_or_else(U256::zero)
    }

    /// The pending withdrawal request for a channel, if any.
    pub fn pending(&self, channel: &ChannelId) -> Option<PendingRequest> {
        let slot = self.channels.read().get(channel).cloned()?;
        let guard = slot.lock();
        guard.pending.clone()
    }
}

#[async_trait]
impl<R: RegistryReader> SettlementGateway for VaultEngine<R> {
    async fn deposit(
        &self,
        account: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), SettlementError> {
        if amount.is_zero() {
            return Err(SettlementError::ZeroAmount);
        }

        let slot = self.channel_slot(ChannelId::new(account, token));
        let mut state = slot.lock();

        // The asset moves first; a rejected transfer leaves custody
        // untouched.
        self.bank
            .transfer(account, VAULT_ACCOUNT, token, amount)
            .map_err(|e| SettlementError::Transfer(e.to_string()))?;
        state.custody = state.custody.saturating_add(amount);

        info!(%account, %token, %amount, "deposit accepted");
        self.bus.publish_now(VaultEvent::Deposited {
            wallet: account,
            token,
            amount,
        });
        Ok(())
    }

    async fn request_withdrawal(
        &self,
        caller: Address,
        candidate: Snapshot,
        amount: U256,
    ) -> Result<(), SettlementError> {
        if caller != candidate.wallet {
            return Err(SettlementError::NotChannelWallet);
        }
        if amount > candidate.balance {
            return Err(SettlementError::InsufficientStateBalance {
                requested: amount,
                balance: candidate.balance,
            });
        }

        // Membership is copied before the channel lock; authorization is
        // judged at transaction time, not signing time.
        let authorities = self
            .registry
            .authority_set()
            .await
            .map_err(|e| SettlementError::RegistryUnavailable(e.to_string()))?;
        let digest = verify_snapshot(&candidate, &authorities, self.config.min_quorum)?;

        let channel = candidate.channel();
        let slot = self.channel_slot(channel);
        let mut state = slot.lock();

        if state.pending.is_some() {
            return Err(SettlementError::RequestAlreadyPending);
        }

        let opened_at = self.clock.now();
        let expires_at = opened_at.add_secs(self.config.challenge_period_secs);
        state.pending = Some(PendingRequest {
            height: candidate.height,
            amount,
            token: candidate.token,
            digest,
            opened_at,
            expires_at,
        });

        info!(
            channel = ?channel,
            height = candidate.height,
            %amount,
            ?expires_at,
            "withdrawal requested; challenge window open"
        );
        self.bus.publish_now(VaultEvent::WithdrawalRequested {
            snapshot: candidate,
            amount,
            expires_at,
        });
        Ok(())
    }

    async fn challenge(
        &self,
        challenger: Challenger,
        candidate: Snapshot,
    ) -> Result<(), SettlementError> {
        match challenger {
            Challenger::Node(node) => {
                let authorized = self
                    .registry
                    .is_authorized(&node)
                    .await
                    .map_err(|e| SettlementError::RegistryUnavailable(e.to_string()))?;
                if !authorized {
                    return Err(SettlementError::UnauthorizedChallenger);
                }
            }
            Challenger::Wallet(wallet) => {
                if wallet != candidate.wallet {
                    return Err(SettlementError::UnauthorizedChallenger);
                }
            }
        }

        let authorities = self
            .registry
            .authority_set()
            .await
            .map_err(|e| SettlementError::RegistryUnavailable(e.to_string()))?;
        verify_snapshot(&candidate, &authorities, self.config.min_quorum)?;

        let channel = candidate.channel();
        let slot = self.channel_slot(channel);
        let mut state = slot.lock();

        let defeated = state
            .pending
            .take()
            .ok_or(SettlementError::NoPendingRequest)?;
        if candidate.height <= defeated.height {
            let pending_height = defeated.height;
            state.pending = Some(defeated);
            return Err(SettlementError::CandidateNotNewer {
                candidate: candidate.height,
                pending: pending_height,
            });
        }

        info!(
            channel = ?channel,
            pending_height = defeated.height,
            challenge_height = candidate.height,
            "pending request defeated"
        );

        let wallet = candidate.wallet;
        let token = candidate.token;
        self.bus.publish_now(VaultEvent::Challenged {
            snapshot: candidate,
            challenger,
        });
        self.bus.publish_now(VaultEvent::Rejected {
            wallet,
            token,
            amount: defeated.amount,
        });
        Ok(())
    }

    async fn withdraw(&self, caller: Address, finalize: Snapshot) -> Result<(), SettlementError> {
        if caller != finalize.wallet {
            return Err(SettlementError::NotChannelWallet);
        }

        let channel = finalize.channel();
        let slot = self.channel_slot(channel);
        let mut state = slot.lock();

        // Transition: clear the request, debit custody, then transfer.
        // Any failure rolls all three back and the request survives for a
        // retry.
        let request = state
            .pending
            .take()
            .ok_or(SettlementError::NoPendingRequest)?;

        let now = self.clock.now();
        if now < request.expires_at {
            let expires_at = request.expires_at;
            state.pending = Some(request);
            return Err(SettlementError::ChallengeWindowOpen { expires_at });
        }
        if snapshot_digest(&finalize) != request.digest {
            state.pending = Some(request);
            return Err(SettlementError::FinalizeDigestMismatch);
        }

        let amount = request.amount;
        let token = request.token;

        if state.custody < amount {
            state.pending = Some(request);
            return Err(SettlementError::Transfer(
                "custody does not cover the pending amount".into(),
            ));
        }
        state.custody -= amount;

        if let Err(error) = self.bank.transfer(VAULT_ACCOUNT, caller, token, amount) {
            warn!(channel = ?channel, %error, "release transfer failed; reverting");
            state.custody = state.custody.saturating_add(amount);
            state.pending = Some(request);
            return Err(SettlementError::Transfer(error.to_string()));
        }

        info!(channel = ?channel, %amount, "withdrawal finalized");
        self.bus.publish_now(VaultEvent::Withdrawn {
            wallet: caller,
            token,
            amount,
        });
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.bus.subscribe(EventFilter::all())
    }
}
