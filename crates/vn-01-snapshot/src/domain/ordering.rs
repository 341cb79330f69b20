//! Participant ordering in the XOR metric.
//!
//! The quorum for a channel is the set of nodes closest to the channel's
//! routing key by bitwise-XOR distance, listed in ascending distance with
//! ties broken by lexicographic node-id order. The proposing client computes
//! the order once per height; everyone else only checks it.
//!
//! All functions here are pure and deterministic.

use std::cmp::Ordering;

use shared_types::{ChannelId, NodeEntry, NodeId};

/// Full-width XOR distance between two 256-bit coordinates.
pub fn xor_distance(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}

/// Canonical ordering of two node ids relative to a routing key: ascending
/// XOR distance, then lexicographic node id.
pub fn distance_ordering(key: &[u8; 32], a: &NodeId, b: &NodeId) -> Ordering {
    xor_distance(key, a.as_bytes())
        .cmp(&xor_distance(key, b.as_bytes()))
        .then_with(|| a.cmp(b))
}

/// Sort node ids into the canonical participant order for a channel.
pub fn canonical_participants(channel: &ChannelId, mut ids: Vec<NodeId>) -> Vec<NodeId> {
    let key = channel.routing_key();
    ids.sort_by(|a, b| distance_ordering(&key, a, b));
    ids
}

/// Check a declared participant list against the canonical rule.
pub fn is_canonical_order(channel: &ChannelId, ids: &[NodeId]) -> bool {
    let key = channel.routing_key();
    ids.windows(2)
        .all(|pair| distance_ordering(&key, &pair[0], &pair[1]) != Ordering::Greater)
}

/// The `k` registry entries closest to the channel, in canonical order.
pub fn k_closest(channel: &ChannelId, entries: &[NodeEntry], k: usize) -> Vec<NodeEntry> {
    let key = channel.routing_key();
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| distance_ordering(&key, &a.node_id, &b.node_id));
    sorted.truncate(k);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;
    use shared_crypto::NodeKeypair;
    use shared_types::{Address, Timestamp};

    fn channel() -> ChannelId {
        ChannelId::new(Address([0x11; 20]), Address([0x22; 20]))
    }

    fn id(first: u8) -> NodeId {
        let mut bytes = [0u8; 32];
        bytes[0] = first;
        NodeId::new(bytes)
    }

    #[test]
    fn test_xor_distance_is_symmetric() {
        let a = [0b1010_0000u8; 32];
        let b = [0b0101_0000u8; 32];
        assert_eq!(xor_distance(&a, &b), xor_distance(&b, &a));
    }

    #[test]
    fn test_xor_distance_to_self_is_zero() {
        let a = [0x5Au8; 32];
        assert_eq!(xor_distance(&a, &a), [0u8; 32]);
    }

    #[test]
    fn test_ordering_prefers_smaller_distance() {
        // Against key 0x00.., distance equals the id itself, so the order
        // collapses to numeric id order.
        let mut key_zero_channel = [0u8; 32];
        key_zero_channel[0] = 0;
        let close = id(0x01);
        let far = id(0x80);

        assert_eq!(
            distance_ordering(&key_zero_channel, &close, &far),
            Ordering::Less
        );
    }

    #[test]
    fn test_ties_break_on_node_id() {
        let key = [0u8; 32];
        let a = id(0x01);
        assert_eq!(distance_ordering(&key, &a, &a), Ordering::Equal);
    }

    #[test]
    fn test_canonical_participants_sorts_and_checks() {
        let channel = channel();
        let ids = vec![id(0x10), id(0x02), id(0xF0), id(0x33)];

        let ordered = canonical_participants(&channel, ids.clone());
        assert!(is_canonical_order(&channel, &ordered));

        // Any non-trivial permutation must fail the check.
        let mut reversed = ordered.clone();
        reversed.reverse();
        assert!(!is_canonical_order(&channel, &reversed));
    }

    #[test]
    fn test_k_closest_returns_prefix_of_canonical_order() {
        let channel = channel();
        let entries: Vec<NodeEntry> = (0..8u8)
            .map(|i| {
                let keypair = NodeKeypair::generate();
                NodeEntry {
                    node_id: id(i * 16 + 1),
                    operator: Address::ZERO,
                    endpoint: format!("localhost:{}", 9000 + u16::from(i)),
                    public_key: keypair.public_key(),
                    stake: U256::from(250_000u64),
                    registered_at: Timestamp::new(0),
                    unlock_at: Timestamp::new(0),
                }
            })
            .collect();

        let quorum = k_closest(&channel, &entries, 3);
        assert_eq!(quorum.len(), 3);

        let quorum_ids: Vec<NodeId> = quorum.iter().map(|e| e.node_id).collect();
        assert!(is_canonical_order(&channel, &quorum_ids));

        // The selected prefix must be the same set the full sort would put
        // first.
        let all_sorted = k_closest(&channel, &entries, entries.len());
        assert_eq!(quorum_ids[..], all_sorted[..3].iter().map(|e| e.node_id).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn test_k_larger_than_set_returns_all() {
        let channel = channel();
        let entries: Vec<NodeEntry> = Vec::new();
        assert!(k_closest(&channel, &entries, 5).is_empty());
    }
}
