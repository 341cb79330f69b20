//! # vn-02-snapshot-store
//!
//! A node's local mapping from channel identity to the highest verified
//! snapshot it has witnessed.
//!
//! ## Acceptance discipline
//!
//! `try_apply` is a compare-and-swap: a snapshot replaces the stored one
//! only if it passes full model validation *and* carries a strictly greater
//! height. Applications for the same channel serialize on a per-channel
//! lock; acceptance order is by height, never arrival time.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::memory_db::InMemorySnapshotDatabase;
pub use domain::store::{ApplyOutcome, SnapshotStore};
pub use ports::database::{DatabaseError, SignatureRecord, SnapshotDatabase, TransactionRecord};
