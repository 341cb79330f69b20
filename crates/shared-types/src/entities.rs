//! Core domain entities shared across subsystems.
//!
//! A channel is the ledger scoped to one `(wallet, token)` pair; its state
//! is carried by versioned [`Snapshot`]s witnessed by a quorum of registered
//! nodes. These types are plain data; encoding, hashing and validation rules
//! live in the snapshot subsystem.

use std::collections::BTreeMap;
use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest as _, Sha256};
use shared_crypto::{NodePublicKey, NodeSignature};

/// 20-byte account or asset identifier on the settlement layer.
///
/// The all-zero value designates the native asset when used as a token
/// address.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(#[serde_as(as = "Hex")] pub [u8; 20]);

impl Address {
    /// The all-zero address; as a token this is the native asset.
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this token address designates the native settlement asset.
    pub fn is_native(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs: 0x12345678..
        write!(f, "0x{}..", hex::encode(&self.0[..4]))
    }
}

/// 256-bit node identifier, the SHA-256 hash of the node's compressed
/// public key.
///
/// Node ids double as coordinates in the XOR metric used for participant
/// ordering and quorum selection.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(#[serde_as(as = "Hex")] pub [u8; 32]);

impl NodeId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the identifier for a public key.
    pub fn from_public_key(key: &NodePublicKey) -> Self {
        Self(key.id_bytes())
    }

    /// All-zero id, handy in tests.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n#{}..", hex::encode(&self.0[..4]))
    }
}

/// 32-byte snapshot digest.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(#[serde_as(as = "Hex")] pub [u8; 32]);

impl Digest {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d#{}..", hex::encode(&self.0[..4]))
    }
}

/// Identity of one ledger channel: the `(wallet, token)` pair.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub wallet: Address,
    pub token: Address,
}

impl ChannelId {
    pub fn new(wallet: Address, token: Address) -> Self {
        Self { wallet, token }
    }

    /// The channel's coordinate in the XOR metric: SHA-256 over
    /// `wallet || token`. Participant ordering and quorum selection measure
    /// distance from this key.
    pub fn routing_key(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.wallet.0);
        hasher.update(self.token.0);
        hasher.finalize().into()
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.wallet, self.token)
    }
}

/// Seconds since the Unix epoch, with saturating arithmetic.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A versioned, quorum-signed balance record for one channel.
///
/// `signatures[i]` is the signature produced by `participants[i]` over the
/// snapshot digest; the two sequences are always the same length.
/// Participants are in canonical order: ascending XOR distance from the
/// channel routing key, ties broken by node id.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub wallet: Address,
    pub token: Address,
    /// Monotonic per-channel version; strictly increases.
    pub height: u64,
    /// Remaining claimable balance after all off-chain transfers reflected
    /// up through this height.
    pub balance: U256,
    pub participants: Vec<NodeId>,
    pub signatures: Vec<NodeSignature>,
}

impl Snapshot {
    pub fn channel(&self) -> ChannelId {
        ChannelId::new(self.wallet, self.token)
    }
}

/// Withdrawal request held by the custodian; at most one per channel.
///
/// Created by `request`, deleted only by a successful `challenge` (rejected)
/// or `withdraw` (finalized). It must outlive `expires_at` until one of the
/// two clears it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PendingRequest {
    pub height: u64,
    pub amount: U256,
    pub token: Address,
    pub digest: Digest,
    pub opened_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Who submitted a challenge: an authorized node, or the channel wallet
/// itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Challenger {
    Node(NodeId),
    Wallet(Address),
}

/// One registered node as seen through the registry read surface.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct NodeEntry {
    pub node_id: NodeId,
    /// Settlement-layer account of the operator.
    pub operator: Address,
    /// Reachable endpoint, `host:port`.
    pub endpoint: String,
    /// Verification key for signatures declared under `node_id`.
    pub public_key: NodePublicKey,
    pub stake: U256,
    pub registered_at: Timestamp,
    /// Earliest time the stake may be withdrawn after unregistering.
    pub unlock_at: Timestamp,
}

/// Network manifest surfaced by the registry.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct NetworkManifest {
    pub version: u32,
    pub url: String,
    #[serde_as(as = "Hex")]
    pub checksum: [u8; 32],
}

/// Membership snapshot of the authorized-node set, copied at the start of a
/// transaction so validation never reads the registry mid-flight.
#[derive(Clone, Debug, Default)]
pub struct AuthoritySet {
    members: BTreeMap<NodeId, NodePublicKey>,
}

impl AuthoritySet {
    pub fn from_entries(entries: &[NodeEntry]) -> Self {
        Self {
            members: entries
                .iter()
                .map(|e| (e.node_id, e.public_key.clone()))
                .collect(),
        }
    }

    pub fn is_authorized(&self, node: &NodeId) -> bool {
        self.members.contains_key(node)
    }

    pub fn public_key(&self, node: &NodeId) -> Option<&NodePublicKey> {
        self.members.get(node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.members.keys()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
