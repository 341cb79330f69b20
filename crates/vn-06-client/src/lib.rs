//! # vn-06-client
//!
//! The user-facing driver for off-chain transfers and withdrawals.
//!
//! For a transfer at height `h` the client selects the `min_quorum`
//! authorized nodes closest to the channel, collects one signature from
//! every participant in parallel under a deadline, and publishes the
//! assembled snapshot. For a withdrawal it also submits the snapshot to the
//! custodian and polls the event stream for the outcome.
//!
//! Signature collection that misses quorum leaves no durable state and is
//! safe to retry.

pub mod service;

pub use service::{Client, ClientError, SettlementOutcome};
