//! Rotating leader selection.

use shared_types::{ValidatorId, ValidatorInfo};

/// Leader for `term` among validators ordered by `order_index`.
///
/// `leader = active[term mod active.len()]`. Every validator with the same
/// active set computes the same leader, so no voting round is needed.
pub fn compute_leader(active: &[ValidatorInfo], term: u64) -> Option<ValidatorId> {
    if active.is_empty() {
        return None;
    }
    let index = (term % active.len() as u64) as usize;
    active.get(index).map(|v| v.validator_id.clone())
}
