//! # node-runtime
//!
//! Wires the subsystems into a runnable in-process network: the simulated
//! vault custodian, the in-memory registry, the in-process peer transport,
//! and a fleet of watcher nodes. The demo binary drives the happy path and
//! the fraud path end to end; the integration suite drives every protocol
//! scenario through the same wiring.

pub mod adapters;
pub mod wiring;

pub use adapters::in_proc_p2p::InProcTransport;
pub use wiring::{bootstrap, Network, WatcherNode};
