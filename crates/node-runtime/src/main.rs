//! Vaultnet demo runtime.
//!
//! Boots an in-process network of watcher nodes against the simulated
//! vault custodian, then drives two end-to-end flows: an honest deposit →
//! transfer → withdrawal, and a fraudulent withdrawal from a stale
//! snapshot that the watchers defeat.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use node_runtime::wiring::{bootstrap, Network};
use shared_types::{Address, ProtocolConfig, SystemClock, U256};
use vn_06_client::SettlementOutcome;

const NUM_NODES: usize = 10;
const USDT: Address = Address([0x05; 20]);
const SIGN_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Vaultnet demo network");
    info!("===========================================");

    let config = ProtocolConfig {
        challenge_period_secs: 2,
        min_quorum: 3,
        ..ProtocolConfig::default()
    };
    let network = bootstrap(NUM_NODES, config, Arc::new(SystemClock)).await?;

    run_happy_path(&network).await?;
    info!("--------------------------------------------------");
    run_fraud_path(&network).await?;

    network.shutdown().await;
    info!("demo complete");
    Ok(())
}

/// Deposit, transfer off-chain, withdraw the remainder unchallenged.
async fn run_happy_path(network: &Network) -> Result<()> {
    info!(">>> happy path <<<");
    let alice = Address([0xA1; 20]);
    let client = network.client(alice);
    let cancel = CancellationToken::new();

    network.bank.mint(alice, USDT, U256::from(100u64));
    client.deposit(USDT, U256::from(100u64)).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Opening snapshot, then an off-chain transfer of 80 leaves 20.
    client
        .create_snapshot(USDT, 1, U256::from(100u64), SIGN_DEADLINE, &cancel)
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let latest = client
        .create_snapshot(USDT, 2, U256::from(20u64), SIGN_DEADLINE, &cancel)
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut events = client.subscribe();
    client
        .request_withdrawal(latest.clone(), U256::from(20u64))
        .await?;

    info!("waiting out the challenge window");
    tokio::time::sleep(Duration::from_secs(3)).await;
    client.withdraw(latest).await?;

    let outcome = client
        .await_outcome(&mut events, USDT, Duration::from_secs(2))
        .await?;
    info!(?outcome, custody = %network.vault.custody(alice, USDT), "happy path settled");
    if outcome != (SettlementOutcome::Withdrawn { amount: U256::from(20u64) }) {
        anyhow::bail!("unexpected settlement outcome: {outcome:?}");
    }
    Ok(())
}

/// Attempt to withdraw from a stale snapshot; the watchers defeat it.
async fn run_fraud_path(network: &Network) -> Result<()> {
    info!(">>> fraud path <<<");
    let bob = Address([0xB0; 20]);
    let client = network.client(bob);
    let cancel = CancellationToken::new();

    network.bank.mint(bob, USDT, U256::from(100u64));
    client.deposit(USDT, U256::from(100u64)).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Bob's real history: opening 100, then a transfer leaving 50.
    let stale = client
        .create_snapshot(USDT, 1, U256::from(100u64), SIGN_DEADLINE, &cancel)
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    client
        .create_snapshot(USDT, 2, U256::from(50u64), SIGN_DEADLINE, &cancel)
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Bob tries to withdraw his full deposit against the stale opening.
    let mut events = client.subscribe();
    info!("submitting fraudulent withdrawal from the stale snapshot");
    client
        .request_withdrawal(stale.clone(), U256::from(100u64))
        .await?;

    let outcome = client
        .await_outcome(&mut events, USDT, Duration::from_secs(2))
        .await?;
    info!(?outcome, "custodian resolution");
    if outcome != SettlementOutcome::Rejected {
        anyhow::bail!("fraudulent request was not rejected: {outcome:?}");
    }

    // With the request gone, finalizing is impossible.
    tokio::time::sleep(Duration::from_secs(3)).await;
    match client.withdraw(stale).await {
        Ok(()) => anyhow::bail!("fraudulent withdrawal unexpectedly succeeded"),
        Err(err) => {
            info!(%err, custody = %network.vault.custody(bob, USDT), "fraudulent withdrawal blocked");
        }
    }
    Ok(())
}
