//! Full verification of a received snapshot.
//!
//! The pipeline runs structural → ordering → authorization → signatures →
//! quorum and reports the first failure with a tagged reason. Callers copy
//! the authorized set before calling, so verification itself never touches
//! the registry and never suspends.

use std::collections::HashSet;

use tracing::trace;

use shared_types::{AuthoritySet, Digest, Snapshot, ValidationError};

use super::encoding::snapshot_digest;
use super::ordering::is_canonical_order;

/// Verify `snapshot` against the authorized set copied at transaction
/// start. Returns the digest on success so callers do not hash twice.
pub fn verify_snapshot(
    snapshot: &Snapshot,
    authorities: &AuthoritySet,
    min_quorum: usize,
) -> Result<Digest, ValidationError> {
    // Structural.
    if snapshot.participants.is_empty() {
        return Err(ValidationError::EmptyParticipants);
    }
    if snapshot.signatures.len() != snapshot.participants.len() {
        return Err(ValidationError::SignatureCountMismatch {
            participants: snapshot.participants.len(),
            signatures: snapshot.signatures.len(),
        });
    }
    let mut seen = HashSet::with_capacity(snapshot.participants.len());
    for participant in &snapshot.participants {
        if !seen.insert(participant) {
            return Err(ValidationError::DuplicateParticipant(*participant));
        }
    }

    // Ordering.
    let channel = snapshot.channel();
    if !is_canonical_order(&channel, &snapshot.participants) {
        return Err(ValidationError::NonCanonicalOrder);
    }

    // Authorization, against the membership copy taken by the caller.
    for participant in &snapshot.participants {
        if !authorities.is_authorized(participant) {
            return Err(ValidationError::UnauthorizedParticipant(*participant));
        }
    }

    // Signatures, positionally aligned with participants.
    let digest = snapshot_digest(snapshot);
    for (participant, signature) in snapshot.participants.iter().zip(&snapshot.signatures) {
        let key = authorities
            .public_key(participant)
            .ok_or(ValidationError::UnauthorizedParticipant(*participant))?;
        if key.id_bytes() != *participant.as_bytes() {
            // Registry entry does not belong to the declared identity.
            return Err(ValidationError::BadSignature(*participant));
        }
        if key.verify(digest.as_bytes(), signature).is_err() {
            return Err(ValidationError::BadSignature(*participant));
        }
    }

    // Quorum.
    if snapshot.participants.len() < min_quorum {
        return Err(ValidationError::QuorumNotMet {
            got: snapshot.participants.len(),
            need: min_quorum,
        });
    }

    trace!(channel = ?channel, height = snapshot.height, %digest, "snapshot verified");
    Ok(digest)
}
