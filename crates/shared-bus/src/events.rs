//! Custodian transition events.
//!
//! One event per accepted settlement transition. `WithdrawalRequested`
//! carries the full candidate snapshot so watchers can compare it to their
//! local store without a follow-up read; a successful challenge emits
//! `Challenged` (who defeated it, with what) followed by `Rejected` (the
//! cleared request).

use serde::{Deserialize, Serialize};
use shared_types::{Address, Challenger, Snapshot, Timestamp, U256};

/// All events published by the custodian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// Funds entered custody.
    Deposited {
        wallet: Address,
        token: Address,
        amount: U256,
    },

    /// A withdrawal request was accepted and its challenge window opened.
    WithdrawalRequested {
        /// The candidate snapshot exactly as accepted.
        snapshot: Snapshot,
        /// Amount to release if the window elapses unchallenged.
        amount: U256,
        /// End of the challenge window.
        expires_at: Timestamp,
    },

    /// A pending request was defeated by a strictly newer snapshot.
    Challenged {
        /// The newer snapshot that won.
        snapshot: Snapshot,
        /// Authorized node (or the wallet itself) that submitted it.
        challenger: Challenger,
    },

    /// The pending request was cleared without release of funds.
    Rejected {
        wallet: Address,
        token: Address,
        amount: U256,
    },

    /// The challenge window elapsed and funds were released.
    Withdrawn {
        wallet: Address,
        token: Address,
        amount: U256,
    },
}

impl VaultEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            VaultEvent::Deposited { .. } => EventKind::Deposited,
            VaultEvent::WithdrawalRequested { .. } => EventKind::WithdrawalRequested,
            VaultEvent::Challenged { .. } => EventKind::Challenged,
            VaultEvent::Rejected { .. } => EventKind::Rejected,
            VaultEvent::Withdrawn { .. } => EventKind::Withdrawn,
        }
    }

    /// The wallet this event concerns.
    pub fn wallet(&self) -> Address {
        match self {
            VaultEvent::Deposited { wallet, .. }
            | VaultEvent::Rejected { wallet, .. }
            | VaultEvent::Withdrawn { wallet, .. } => *wallet,
            VaultEvent::WithdrawalRequested { snapshot, .. }
            | VaultEvent::Challenged { snapshot, .. } => snapshot.wallet,
        }
    }
}

/// Discriminant used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Deposited,
    WithdrawalRequested,
    Challenged,
    Rejected,
    Withdrawn,
}

/// Which event kinds a subscriber wants delivered.
///
/// An empty kind list matches everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kinds: Vec<EventKind>,
}

impl EventFilter {
    /// Match every event.
    pub fn all() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Match only the given kinds.
    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds }
    }

    pub fn matches(&self, event: &VaultEvent) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&event.kind())
    }
}
