//! Protocol scenarios, driven end to end.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use node_runtime::wiring::{bootstrap, Network};
use primitive_types::U256;
use shared_crypto::NodeKeypair;
use shared_types::{
    Address, Challenger, ChannelId, ManualClock, NodeId, ProtocolConfig, SettlementError,
    Snapshot, Timestamp, ValidationError,
};
use vn_01_snapshot::{canonical_participants, snapshot_digest, PeerTransport};
use vn_03_registry::{Registration, RegistryOperator};
use vn_04_custodian::SettlementGateway;
use vn_06_client::{ClientError, SettlementOutcome};

const USDT: Address = Address([0x05; 20]);
const DEADLINE: Duration = Duration::from_secs(5);
const CHALLENGE_PERIOD: u64 = 2;

async fn testnet(nodes: usize) -> (Network, Arc<ManualClock>) {
    let config = ProtocolConfig {
        challenge_period_secs: CHALLENGE_PERIOD,
        min_quorum: 3,
        ..ProtocolConfig::default()
    };
    let clock = ManualClock::new(Timestamp::new(1_000));
    let network = bootstrap(nodes, config, clock.clone())
        .await
        .expect("network boots");
    (network, clock)
}

/// Let spawned event handling and publishes drain.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

fn amount(n: u64) -> U256 {
    U256::from(n)
}

/// Deposit, spend off-chain, withdraw the remainder unchallenged.
#[tokio::test]
async fn test_happy_path_withdrawal_after_quiet_window() {
    let (network, clock) = testnet(10).await;
    let alice = Address([0xA1; 20]);
    let client = network.client(alice);
    let cancel = CancellationToken::new();

    network.bank.mint(alice, USDT, amount(100));
    client.deposit(USDT, amount(100)).await.unwrap();
    settle().await;

    // Opening snapshot, then an off-chain transfer of 80 leaves 20.
    client
        .create_snapshot(USDT, 1, amount(100), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;
    let latest = client
        .create_snapshot(USDT, 2, amount(20), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;

    let mut events = client.subscribe();
    client
        .request_withdrawal(latest.clone(), amount(20))
        .await
        .unwrap();
    settle().await;

    // The boundary is inclusive: finalizing exactly at expiry succeeds.
    clock.advance_secs(CHALLENGE_PERIOD);
    client.withdraw(latest).await.unwrap();

    let outcome = client
        .await_outcome(&mut events, USDT, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(outcome, SettlementOutcome::Withdrawn { amount: amount(20) });
    assert_eq!(network.vault.custody(alice, USDT), amount(80));
    assert_eq!(network.bank.balance_of(alice, USDT), amount(20));

    network.shutdown().await;
}

/// A stale-snapshot withdrawal is detected and defeated by the watchers.
#[tokio::test]
async fn test_fraudulent_withdrawal_is_challenged() {
    let (network, clock) = testnet(10).await;
    let bob = Address([0xB0; 20]);
    let client = network.client(bob);
    let cancel = CancellationToken::new();

    network.bank.mint(bob, USDT, amount(100));
    client.deposit(USDT, amount(100)).await.unwrap();
    settle().await;

    let stale = client
        .create_snapshot(USDT, 1, amount(100), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;
    client
        .create_snapshot(USDT, 2, amount(50), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;

    // Bob claims his full deposit against the stale opening snapshot.
    let mut events = client.subscribe();
    client
        .request_withdrawal(stale.clone(), amount(100))
        .await
        .unwrap();

    let outcome = client
        .await_outcome(&mut events, USDT, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(outcome, SettlementOutcome::Rejected);

    // Even after the window, there is nothing left to finalize.
    clock.advance_secs(CHALLENGE_PERIOD + 1);
    let err = client.withdraw(stale).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Settlement(SettlementError::NoPendingRequest)
    ));
    assert_eq!(network.vault.custody(bob, USDT), amount(100));

    network.shutdown().await;
}

/// A valid mid-window challenge clears the pending request and a fresh
/// request can follow immediately.
#[tokio::test]
async fn test_contested_request_clears_and_allows_fresh_request() {
    let (network, _clock) = testnet(10).await;
    let carol = Address([0xC4; 20]);
    let client = network.client(carol);
    let cancel = CancellationToken::new();
    let channel = ChannelId::new(carol, USDT);

    network.bank.mint(carol, USDT, amount(100));
    client.deposit(USDT, amount(100)).await.unwrap();
    settle().await;

    let mut snapshots = Vec::new();
    for (height, balance) in [(1, 100), (2, 90), (3, 80), (4, 70), (5, 60)] {
        snapshots.push(
            client
                .create_snapshot(USDT, height, amount(balance), DEADLINE, &cancel)
                .await
                .unwrap(),
        );
        settle().await;
    }
    let fifth = snapshots[4].clone();

    let mut events = client.subscribe();
    client
        .request_withdrawal(fifth, amount(30))
        .await
        .unwrap();
    settle().await;
    assert!(network.vault.pending(&channel).is_some());

    // A newer snapshot appears mid-window and defeats the request.
    let sixth = client
        .create_snapshot(USDT, 6, amount(55), DEADLINE, &cancel)
        .await
        .unwrap();
    network
        .vault
        .challenge(Challenger::Wallet(carol), sixth.clone())
        .await
        .unwrap();

    let outcome = client
        .await_outcome(&mut events, USDT, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(outcome, SettlementOutcome::Rejected);
    assert!(network.vault.pending(&channel).is_none());

    // The channel is immediately free for a request citing the new head.
    client
        .request_withdrawal(sixth, amount(30))
        .await
        .unwrap();
    assert!(network.vault.pending(&channel).is_some());

    network.shutdown().await;
}

/// A rejected release transfer reverts the transition and the request
/// survives for a retry.
#[tokio::test]
async fn test_transfer_failure_keeps_request_for_retry() {
    let (network, clock) = testnet(10).await;
    let dave = Address([0xD0; 20]);
    let client = network.client(dave);
    let cancel = CancellationToken::new();
    let channel = ChannelId::new(dave, USDT);

    network.bank.mint(dave, USDT, amount(100));
    client.deposit(USDT, amount(100)).await.unwrap();
    settle().await;

    let snapshot = client
        .create_snapshot(USDT, 1, amount(100), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;

    client
        .request_withdrawal(snapshot.clone(), amount(100))
        .await
        .unwrap();
    clock.advance_secs(CHALLENGE_PERIOD);

    network.bank.set_fail_next("token contract paused");
    let err = client.withdraw(snapshot.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Settlement(SettlementError::Transfer(_))
    ));
    assert!(network.vault.pending(&channel).is_some());
    assert_eq!(network.vault.custody(dave, USDT), amount(100));

    // The external condition clears; the identical call now settles.
    client.withdraw(snapshot).await.unwrap();
    assert_eq!(network.vault.custody(dave, USDT), U256::zero());
    assert_eq!(network.bank.balance_of(dave, USDT), amount(100));

    network.shutdown().await;
}

/// De-authorization between signing and submission invalidates the
/// snapshot; re-gathering from the current closest nodes recovers.
#[tokio::test]
async fn test_deauthorized_signer_forces_regather() {
    let (network, clock) = testnet(10).await;
    let erin = Address([0xE0; 20]);
    let client = network.client(erin);
    let cancel = CancellationToken::new();

    network.bank.mint(erin, USDT, amount(100));
    client.deposit(USDT, amount(100)).await.unwrap();
    settle().await;

    let first = client
        .create_snapshot(USDT, 1, amount(100), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;

    // One of the signers leaves the registry before submission.
    let leaver = first.participants[0];
    network.registry.unregister(&leaver).await.unwrap();

    let err = client
        .request_withdrawal(first.clone(), amount(100))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Settlement(SettlementError::Validation(
            ValidationError::UnauthorizedParticipant(_)
        ))
    ));

    // Re-gather the same height from the current k closest and retry.
    let rewitnessed = client
        .create_snapshot(USDT, 1, amount(100), DEADLINE, &cancel)
        .await
        .unwrap();
    assert!(!rewitnessed.participants.contains(&leaver));
    settle().await;

    let mut events = client.subscribe();
    client
        .request_withdrawal(rewitnessed.clone(), amount(100))
        .await
        .unwrap();
    clock.advance_secs(CHALLENGE_PERIOD);
    client.withdraw(rewitnessed).await.unwrap();

    let outcome = client
        .await_outcome(&mut events, USDT, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SettlementOutcome::Withdrawn {
            amount: amount(100)
        }
    );

    network.shutdown().await;
}

/// Equal-height forks: the store keeps the first writer and watchers do
/// not challenge a same-height candidate.
#[tokio::test]
async fn test_equal_height_fork_is_logged_not_challenged() {
    let (network, _clock) = testnet(10).await;
    let frank = Address([0xF0; 20]);
    let client = network.client(frank);
    let cancel = CancellationToken::new();
    let channel = ChannelId::new(frank, USDT);

    network.bank.mint(frank, USDT, amount(100));
    client.deposit(USDT, amount(100)).await.unwrap();
    settle().await;

    client
        .create_snapshot(USDT, 1, amount(100), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;
    let genuine = client
        .create_snapshot(USDT, 2, amount(50), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;

    // A competing quorum signs a different balance at the same height.
    let mut forgers = Vec::new();
    for index in 0..3u8 {
        let keypair = NodeKeypair::generate();
        network
            .registry
            .register(Registration {
                node_id: NodeId::from_public_key(&keypair.public_key()),
                operator: Address([0x77; 20]),
                endpoint: format!("localhost:{}", 9_500 + u16::from(index)),
                public_key: keypair.public_key(),
                stake: network.config.stake_amount,
            })
            .await
            .unwrap();
        forgers.push(keypair);
    }
    let forger_ids = forgers
        .iter()
        .map(|kp| NodeId::from_public_key(&kp.public_key()))
        .collect();
    let mut fork = Snapshot {
        wallet: frank,
        token: USDT,
        height: 2,
        balance: amount(49),
        participants: canonical_participants(&channel, forger_ids),
        signatures: Vec::new(),
    };
    let digest = snapshot_digest(&fork);
    fork.signatures = fork
        .participants
        .iter()
        .map(|id| {
            forgers
                .iter()
                .find(|kp| NodeId::from_public_key(&kp.public_key()) == *id)
                .unwrap()
                .sign(digest.as_bytes())
        })
        .collect();
    assert_ne!(snapshot_digest(&genuine), digest);

    // Publishing the fork changes nothing: first writer wins per channel.
    network.transport.publish(fork.clone()).await.unwrap();
    settle().await;
    for watcher in &network.watchers {
        if let Some(local) = watcher.store().get(&channel) {
            assert_eq!(
                snapshot_digest(&local),
                snapshot_digest(&genuine),
                "stores must retain the first-accepted height-2 snapshot"
            );
        }
    }

    // Requesting against the fork draws no challenge: watchers hold the
    // same height, not a newer one.
    client
        .request_withdrawal(fork, amount(1))
        .await
        .unwrap();
    settle().await;
    assert!(
        network.vault.pending(&channel).is_some(),
        "equal-height fork must not be challenged"
    );

    network.shutdown().await;
}

/// Deposits during an open window accrue custody without touching the
/// pending request.
#[tokio::test]
async fn test_deposit_during_window_leaves_request_intact() {
    let (network, clock) = testnet(10).await;
    let grace = Address([0x6A; 20]);
    let client = network.client(grace);
    let cancel = CancellationToken::new();
    let channel = ChannelId::new(grace, USDT);

    network.bank.mint(grace, USDT, amount(150));
    client.deposit(USDT, amount(100)).await.unwrap();
    settle().await;

    let snapshot = client
        .create_snapshot(USDT, 1, amount(100), DEADLINE, &cancel)
        .await
        .unwrap();
    settle().await;
    client
        .request_withdrawal(snapshot.clone(), amount(40))
        .await
        .unwrap();

    client.deposit(USDT, amount(50)).await.unwrap();
    assert_eq!(network.vault.custody(grace, USDT), amount(150));
    assert!(network.vault.pending(&channel).is_some());

    clock.advance_secs(CHALLENGE_PERIOD);
    client.withdraw(snapshot).await.unwrap();
    assert_eq!(network.vault.custody(grace, USDT), amount(110));

    network.shutdown().await;
}
