//! Snapshot-exchange ports.
//!
//! `PeerTransport` is the outbound surface watchers and clients use to move
//! snapshots between nodes; `SnapshotHandler` is the inbound callback
//! surface a node installs when it joins. Wire-level transports are
//! adapters behind these traits.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use shared_crypto::NodeSignature;
use shared_types::{ChannelId, NodeId, Snapshot, TransportError};

/// Peer transport consumed by watchers and clients.
///
/// Every method may suspend and is cancel-safe: abandoning a call leaves no
/// durable state on the caller.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Fan the snapshot out to the nodes closest to its channel.
    async fn publish(&self, snapshot: Snapshot) -> Result<(), TransportError>;

    /// Best-effort lookup of the highest snapshot the network holds for a
    /// channel.
    async fn get_latest(&self, channel: ChannelId) -> Result<Option<Snapshot>, TransportError>;

    /// Ask one node to witness a draft snapshot.
    ///
    /// A policy refusal by the node surfaces as [`TransportError::Refused`].
    async fn request_signature(
        &self,
        node: NodeId,
        snapshot: Snapshot,
    ) -> Result<NodeSignature, TransportError>;

    /// Install the inbound handlers for a node identity.
    fn register(&self, node: NodeId, handler: Arc<dyn SnapshotHandler>);
}

/// Inbound callbacks a node serves to its peers.
#[async_trait]
pub trait SnapshotHandler: Send + Sync {
    /// Witness a draft snapshot: validate it against local state and sign
    /// its digest, or refuse.
    async fn on_sign_request(&self, snapshot: Snapshot) -> Result<NodeSignature, SignRefusal>;

    /// A fully signed snapshot was published; adopt it if it is newer and
    /// verifies.
    async fn on_publish(&self, snapshot: Snapshot);

    /// The highest locally stored snapshot for a channel, if any.
    async fn on_get_latest(&self, channel: ChannelId) -> Option<Snapshot>;
}

/// Why a node refused to witness a draft snapshot.
///
/// Refusals are policy decisions, not transport failures; the requester must
/// change the draft, not retry it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignRefusal {
    /// Drafts must extend the signer's local history by exactly one height.
    #[error("draft height {got} does not extend local history (expected {expected})")]
    NotNextHeight { expected: u64, got: u64 },

    /// Off-chain transfers only ever reduce the channel balance.
    #[error("draft balance exceeds the balance at the previous height")]
    BalanceIncreased,

    /// An opening balance must be covered by observed custody deposits.
    #[error("opening balance exceeds the observed custody deposits")]
    ExceedsCustody,

    /// Participants are not in canonical XOR order for the channel.
    #[error("participants are not in canonical order")]
    NonCanonicalOrder,

    /// The signer is not part of the draft's quorum.
    #[error("this node is not among the draft participants")]
    NotInQuorum,
}
