//! # Shared Types
//!
//! Entities, configuration and the error taxonomy shared by every vaultnet
//! subsystem: channel identities, signed balance snapshots, registry
//! entries, pending withdrawal requests and protocol parameters.
//!
//! Subsystem crates keep their domain logic to themselves; anything that
//! crosses a crate boundary lives here.

pub mod clock;
pub mod config;
pub mod entities;
pub mod errors;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProtocolConfig;
pub use entities::{
    Address, AuthoritySet, Challenger, ChannelId, Digest, NetworkManifest, NodeEntry, NodeId,
    PendingRequest, Snapshot, Timestamp,
};
pub use errors::{RegistryError, SettlementError, TransportError, ValidationError};

pub use primitive_types::U256;
