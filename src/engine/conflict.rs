//! Overlap detection over an active-set snapshot.

use crate::model::{Reservation, ResourceId, Slot};

/// Every active reservation on `resource` whose half-open range overlaps the
/// candidate. Touching boundaries do not conflict.
pub fn find_conflicts(
    candidate: &Slot,
    resource: ResourceId,
    active: &[Reservation],
) -> Vec<Reservation> {
    active
        .iter()
        .filter(|r| r.resource == resource && r.slot.overlaps(candidate))
        .cloned()
        .collect()
}

pub fn can_reserve(candidate: &Slot, resource: ResourceId, active: &[Reservation]) -> bool {
    find_conflicts(candidate, resource, active).is_empty()
}
