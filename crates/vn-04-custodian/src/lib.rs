//! # vn-04-custodian
//!
//! The custodian protocol engine: the authoritative settlement state
//! machine for deposits, withdrawal requests, challenges and releases.
//!
//! ## State machine (per channel)
//!
//! ```text
//! Idle     --request(valid)------------------>  Pending
//! Pending  --challenge(valid, newer)--------->  Idle      (funds stay)
//! Pending  --window elapsed, withdraw(valid)->  Idle      (funds released)
//! Pending  --transfer failure on withdraw---->  Pending   (retry allowed)
//! ```
//!
//! The same [`SettlementGateway`] contract is served whether the engine
//! runs in-process (the [`VaultEngine`] here) or against a public
//! settlement chain; only the adapter changes.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::bank::{BankError, TokenBank};
pub use ports::api::SettlementGateway;
pub use service::VaultEngine;
