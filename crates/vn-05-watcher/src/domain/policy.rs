//! Signing policy.
//!
//! A watcher co-signs a draft snapshot only when the draft extends the
//! history it has itself witnessed: exactly the next height, a balance that
//! does not grow, a canonical participant list that includes this node.
//! Opening drafts (no local history) are bounded by the custody deposits
//! the watcher has observed on the settlement layer.

use shared_types::{NodeId, Snapshot, U256};
use vn_01_snapshot::{is_canonical_order, SignRefusal};

/// Decide whether to witness `draft`.
///
/// `local` is this node's highest stored snapshot for the channel and
/// `custody_floor` the deposits it has observed; both come from state the
/// node itself accumulated, never from the requester.
pub fn evaluate_sign_request(
    local: Option<&Snapshot>,
    custody_floor: U256,
    draft: &Snapshot,
    self_id: &NodeId,
) -> Result<(), SignRefusal> {
    if !draft.participants.contains(self_id) {
        return Err(SignRefusal::NotInQuorum);
    }
    if !is_canonical_order(&draft.channel(), &draft.participants) {
        return Err(SignRefusal::NonCanonicalOrder);
    }

    match local {
        Some(prev) => {
            // Re-witnessing the height we already hold is allowed when the
            // balance is unchanged: it lets a user rebuild a quorum after a
            // participant was de-authorized, and cannot move value.
            if draft.height == prev.height && draft.balance == prev.balance {
                return Ok(());
            }
            let expected = prev.height + 1;
            if draft.height != expected {
                return Err(SignRefusal::NotNextHeight {
                    expected,
                    got: draft.height,
                });
            }
            if draft.balance > prev.balance {
                return Err(SignRefusal::BalanceIncreased);
            }
        }
        None => {
            if draft.height != 1 {
                return Err(SignRefusal::NotNextHeight {
                    expected: 1,
                    got: draft.height,
                });
            }
            if draft.balance > custody_floor {
                return Err(SignRefusal::ExceedsCustody);
            }
        }
    }
    Ok(())
}
