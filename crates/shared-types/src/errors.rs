//! Error taxonomy shared across subsystems.
//!
//! Validation and authorization failures are reported to the caller and
//! never auto-retried; transfer failures revert the whole transition and
//! leave the pending request in place; transport and timeout failures carry
//! no durable effect.

use primitive_types::U256;
use thiserror::Error;

use crate::entities::{NodeId, Timestamp};

/// A snapshot failed verification.
///
/// Tagged by the stage that rejected it: structural, ordering,
/// authorization, signature or quorum. None of these are retried at the
/// model layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Quorum may never be empty.
    #[error("snapshot has no participants")]
    EmptyParticipants,

    /// `signatures` must align positionally with `participants`.
    #[error("signature count {signatures} does not match participant count {participants}")]
    SignatureCountMismatch {
        participants: usize,
        signatures: usize,
    },

    /// A node id appears twice in the quorum.
    #[error("duplicate participant {0}")]
    DuplicateParticipant(NodeId),

    /// Participants are not in ascending XOR distance from the channel key.
    #[error("participants are not in canonical order")]
    NonCanonicalOrder,

    /// A declared participant is not in the current authorized set.
    /// Authorization is time-of-transaction: de-authorization between
    /// signing and submission invalidates the signature.
    #[error("participant {0} is not an authorized node")]
    UnauthorizedParticipant(NodeId),

    /// A signature does not verify against the declared participant.
    #[error("signature by {0} does not verify against the snapshot digest")]
    BadSignature(NodeId),

    /// Fewer participants than the protocol minimum.
    #[error("quorum of {got} is below the required minimum of {need}")]
    QuorumNotMet { got: usize, need: usize },
}

/// Failures surfaced by the settlement layer (custodian engine).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// Candidate snapshot failed verification against the authorized set
    /// copied at transaction time.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Deposits must move a positive amount.
    #[error("deposit amount must be positive")]
    ZeroAmount,

    /// Only the channel wallet may open or finalize a withdrawal.
    #[error("caller is not the channel wallet")]
    NotChannelWallet,

    /// The challenger is neither an authorized node nor the channel wallet.
    #[error("challenger is not authorized")]
    UnauthorizedChallenger,

    /// A channel holds at most one pending request at a time.
    #[error("a withdrawal request is already pending for this channel")]
    RequestAlreadyPending,

    /// Challenge or withdrawal against a channel with nothing pending.
    #[error("no pending withdrawal request for this channel")]
    NoPendingRequest,

    /// Requested more than the candidate snapshot's balance.
    #[error("requested amount {requested} exceeds snapshot balance {balance}")]
    InsufficientStateBalance { requested: U256, balance: U256 },

    /// A challenge must cite a strictly newer snapshot.
    #[error("challenge height {candidate} is not newer than pending height {pending}")]
    CandidateNotNewer { candidate: u64, pending: u64 },

    /// Withdrawal attempted before the window elapsed.
    #[error("challenge window open until {expires_at:?}")]
    ChallengeWindowOpen { expires_at: Timestamp },

    /// The finalize snapshot is not bit-identical to the accepted candidate.
    #[error("finalize snapshot does not match the pending request digest")]
    FinalizeDigestMismatch,

    /// Asset transfer failed; the whole transition reverted and the pending
    /// request survives for retry.
    #[error("asset transfer failed: {0}")]
    Transfer(String),

    /// The registry could not be read; the transition did not start.
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),
}

/// Registry operation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node {0} is already registered")]
    AlreadyRegistered(NodeId),

    #[error("stake {offered} is below the required {required}")]
    InsufficientStake { required: U256, offered: U256 },

    #[error("node {0} is not registered")]
    UnknownNode(NodeId),

    #[error("stake is locked until {unlock_at:?}")]
    StakeLocked { unlock_at: Timestamp },
}

/// Peer transport and settlement-client reachability failures.
///
/// Surfaced to the caller with no durable state corrupted; callers may
/// retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("node {0} is unreachable")]
    Unreachable(NodeId),

    /// The peer processed the request and declined it.
    #[error("node {node} refused: {reason}")]
    Refused { node: NodeId, reason: String },

    /// Deadline elapsed before the operation completed.
    #[error("operation timed out")]
    Timeout,

    /// Cooperative cancellation; the operation has no durable effect.
    #[error("operation cancelled")]
    Cancelled,
}
