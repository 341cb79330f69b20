//! # vn-03-registry
//!
//! The authorized-node registry. The protocol core only reads it:
//! membership checks, quorum selection, the network manifest. The write
//! surface is operator-facing (registration with stake, endpoint updates,
//! unregistering, cooldown-gated stake withdrawal).
//!
//! Removal uses swap-and-pop, so pagination order is unstable across calls;
//! consumers must not assume a stable listing.

pub mod adapters;
pub mod ports;

pub use adapters::memory::InMemoryRegistry;
pub use ports::{Registration, RegistryOperator, RegistryReader};
