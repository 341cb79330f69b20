//! Settlement port.
//!
//! The operation set every settlement variant serves, whether simulated
//! in-process or backed by a public chain. Clients and watchers only ever
//! see this trait.

use async_trait::async_trait;

use shared_bus::Subscription;
use shared_types::{Address, Challenger, SettlementError, Snapshot, U256};

/// Custodian operations callable by clients and watcher nodes.
///
/// Every operation either applies completely or reverts completely;
/// partial effects are never observable.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Move `amount` of `token` from `account` into custody.
    async fn deposit(
        &self,
        account: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), SettlementError>;

    /// Open a withdrawal: publish `candidate` as the claimed latest
    /// snapshot and start the challenge window. `caller` must be the
    /// channel wallet.
    async fn request_withdrawal(
        &self,
        caller: Address,
        candidate: Snapshot,
        amount: U256,
    ) -> Result<(), SettlementError>;

    /// Defeat the pending request with a strictly newer snapshot.
    async fn challenge(
        &self,
        challenger: Challenger,
        candidate: Snapshot,
    ) -> Result<(), SettlementError>;

    /// Finalize after the window: `finalize` must be bit-identical to the
    /// accepted candidate.
    async fn withdraw(&self, caller: Address, finalize: Snapshot) -> Result<(), SettlementError>;

    /// Event stream of accepted transitions, in submission order.
    fn subscribe(&self) -> Subscription;
}
