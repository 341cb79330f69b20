//! Network wiring.
//!
//! Builds a complete in-process network: registry, token bank, vault
//! engine, peer transport, and a fleet of watcher nodes already registered
//! and listening.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::info;

use shared_crypto::NodeKeypair;
use shared_types::{Address, Clock, ProtocolConfig};
use vn_02_snapshot_store::{InMemorySnapshotDatabase, SnapshotStore};
use vn_03_registry::InMemoryRegistry;
use vn_04_custodian::{TokenBank, VaultEngine};
use vn_05_watcher::Watcher;
use vn_06_client::Client;

use crate::adapters::in_proc_p2p::InProcTransport;

/// The concrete watcher type this wiring produces.
pub type WatcherNode =
    Watcher<VaultEngine<InMemoryRegistry>, InProcTransport, InMemoryRegistry, InMemoryRegistry>;

/// The concrete client type this wiring produces.
pub type NetworkClient =
    Client<VaultEngine<InMemoryRegistry>, InProcTransport, InMemoryRegistry>;

/// A fully wired in-process network.
pub struct Network {
    pub config: ProtocolConfig,
    pub registry: Arc<InMemoryRegistry>,
    pub bank: Arc<TokenBank>,
    pub vault: Arc<VaultEngine<InMemoryRegistry>>,
    pub transport: Arc<InProcTransport>,
    pub watchers: Vec<Arc<WatcherNode>>,
    handles: Vec<JoinHandle<()>>,
}

impl Network {
    /// A client driving `wallet` against this network.
    pub fn client(&self, wallet: Address) -> NetworkClient {
        Client::new(
            wallet,
            Arc::clone(&self.vault),
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            self.config.clone(),
        )
    }

    /// Stop every watcher and wait for their loops to end.
    pub async fn shutdown(mut self) {
        for watcher in &self.watchers {
            watcher.shutdown();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

/// Boot a network of `nodes` watchers.
pub async fn bootstrap(
    nodes: usize,
    config: ProtocolConfig,
    clock: Arc<dyn Clock>,
) -> Result<Network> {
    let registry = Arc::new(InMemoryRegistry::new(&config, Arc::clone(&clock)));
    let bank = Arc::new(TokenBank::new());
    let vault = Arc::new(VaultEngine::new(
        config.clone(),
        Arc::clone(&registry),
        Arc::clone(&bank),
        Arc::clone(&clock),
    ));
    let transport = InProcTransport::new(config.min_quorum);

    let mut watchers = Vec::with_capacity(nodes);
    let mut handles = Vec::with_capacity(nodes);
    for index in 0..nodes {
        let keypair = NodeKeypair::generate();
        let database = Arc::new(InMemorySnapshotDatabase::new());
        let store = Arc::new(SnapshotStore::with_database(
            config.min_quorum,
            database,
            Arc::clone(&clock),
        ));

        let mut operator = [0u8; 20];
        operator[19] = index as u8;
        let watcher = Watcher::new(
            keypair,
            Address(operator),
            format!("localhost:{}", 9_000 + index),
            store,
            Arc::clone(&vault),
            Arc::clone(&transport),
            Arc::clone(&registry),
            Arc::clone(&registry),
            config.clone(),
        );
        handles.push(watcher.start().await?);
        watchers.push(watcher);
    }

    info!(nodes, min_quorum = config.min_quorum, "network bootstrapped");
    Ok(Network {
        config,
        registry,
        bank,
        vault,
        transport,
        watchers,
        handles,
    })
}
