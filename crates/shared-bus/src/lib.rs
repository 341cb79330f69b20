//! # Shared Bus
//!
//! Multi-subscriber fan-out of custodian transition events.
//!
//! ## Delivery contract
//!
//! - Every subscriber sees events in custodian submission order.
//! - Each subscriber has a bounded buffer; when it overflows, events are
//!   dropped for that subscriber only (it reconciles by polling the store
//!   and registry on reconnect).
//! - Producers never block: a slow subscriber cannot stall the custodian or
//!   its peers.

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventKind, VaultEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events buffered per subscriber before overflow dropping begins.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
