//! Publishing side of the event bus.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{EventFilter, VaultEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Interface the custodian uses to emit transition events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to every live subscriber.
    ///
    /// Returns the number of subscribers the event reached. Never blocks on
    /// slow subscribers.
    async fn publish(&self, event: VaultEvent) -> usize;

    /// Total events published over the bus lifetime.
    fn events_published(&self) -> u64;
}

/// In-memory bus on `tokio::sync::broadcast`.
///
/// Broadcast gives each subscriber its own bounded view of one shared ring:
/// per-subscriber FIFO in submission order, and a lagging subscriber loses
/// its oldest events without ever blocking the producer.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<VaultEvent>,
    events_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Synchronous publish for producers that must emit while holding a
    /// state lock: delivery order then matches transition order exactly.
    /// Never blocks on subscribers.
    pub fn publish_now(&self, event: VaultEvent) -> usize {
        let kind = event.kind();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(?kind, receivers = receiver_count, "event published");
                receiver_count
            }
            Err(_) => {
                warn!(?kind, "event dropped (no subscribers)");
                0
            }
        }
    }

    /// Subscribe to events matching `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(kinds = ?filter.kinds, "new bus subscription");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Subscribe and wrap the subscription as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: VaultEvent) -> usize {
        self.publish_now(event)
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use primitive_types::U256;
    use shared_types::Address;

    fn deposit_event(n: u64) -> VaultEvent {
        VaultEvent::Deposited {
            wallet: Address([1u8; 20]),
            token: Address::ZERO,
            amount: U256::from(n),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_counts() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(deposit_event(1)).await, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = InMemoryEventBus::new();
        let _a = bus.subscribe(EventFilter::all());
        let _b = bus.subscribe(EventFilter::all());
        let _c = bus.subscribe(EventFilter::kinds(vec![EventKind::Withdrawn]));

        assert_eq!(bus.publish(deposit_event(1)).await, 3);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[tokio::test]
    async fn test_subscriber_sees_submission_order() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        for n in 0..5u64 {
            bus.publish(deposit_event(n)).await;
        }
        for n in 0..5u64 {
            let event = sub.recv().await.expect("event");
            match event {
                VaultEvent::Deposited { amount, .. } => assert_eq!(amount, U256::from(n)),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_without_blocking_producer() {
        let bus = InMemoryEventBus::with_capacity(4);
        let mut slow = bus.subscribe(EventFilter::all());

        // Overflow the subscriber buffer; publish must not block.
        for n in 0..32u64 {
            bus.publish(deposit_event(n)).await;
        }

        // The subscriber lost the oldest events but still receives the tail
        // in order.
        let mut last = None;
        while let Ok(Some(event)) = slow.try_recv() {
            if let VaultEvent::Deposited { amount, .. } = event {
                if let Some(prev) = last {
                    assert!(amount > prev, "delivery must stay in order");
                }
                last = Some(amount);
            }
        }
        assert_eq!(last, Some(U256::from(31u64)), "tail event must survive");
    }
}
