//! # vn-05-watcher
//!
//! The watcher node: an event-driven agent that ingests custodian events,
//! maintains a local snapshot store, witnesses new snapshots for clients,
//! and defeats fraudulent withdrawal requests with challenges.
//!
//! ## Decision table for `WithdrawalRequested(candidate)`
//!
//! | local store                          | action                     |
//! |--------------------------------------|----------------------------|
//! | absent                               | none (never witnessed)     |
//! | `local.height > candidate.height`    | `challenge(local)`         |
//! | equal height, equal digest           | accept                     |
//! | equal height, different digest       | log fork, do not challenge |
//! | `local.height < candidate.height`    | adopt the candidate        |
//!
//! The watcher logs and continues on every error except losing its own
//! authorization, which terminates it.

pub mod domain;
pub mod service;

pub use domain::policy::evaluate_sign_request;
pub use service::{Watcher, WatcherError};
