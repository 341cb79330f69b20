//! # vn-01-snapshot
//!
//! The snapshot model shared by every participant: canonical encoding and
//! digests, the XOR participant-ordering rule, and full verification of a
//! received snapshot against the authorized-node set.
//!
//! ## Role in System
//!
//! - Single source of the digest both the settlement layer and the
//!   off-chain network compute for a snapshot
//! - Pure domain functions: no I/O, no suspension, deterministic
//! - Defines the snapshot-exchange port (`PeerTransport`) consumed by
//!   watchers and clients

pub mod domain;
pub mod ports;

pub use domain::encoding::{canonical_bytes, decode_canonical, snapshot_digest, DecodeError};
pub use domain::ordering::{
    canonical_participants, distance_ordering, is_canonical_order, k_closest, xor_distance,
};
pub use domain::validation::verify_snapshot;
pub use ports::{PeerTransport, SignRefusal, SnapshotHandler};
