//! Alternative proposals for a conflicting request.
//!
//! Candidates keep the requested duration and stay on the requested day,
//! scanning the 10-minute grid across every resource of the same group. Each
//! one must pass the full validation pipeline and be conflict-free against
//! the snapshot. Advisory only; nothing here mutates the store.

use chrono::{Duration, NaiveDateTime};

use crate::calendar;
use crate::config::Config;
use crate::engine::conflict;
use crate::model::{Proposal, ProposalStrategy, Reservation, ResourceId, Slot};

pub const MAX_PROPOSALS: usize = 3;

/// Ranked by (distance from the requested start, resource index, candidate
/// start); the last key breaks the tie between the before/after slot at
/// equal distance in favor of the earlier one. At most three returned.
pub fn propose(
    cfg: &Config,
    requested_resource: ResourceId,
    requested: &Slot,
    now: NaiveDateTime,
    active: &[Reservation],
) -> Vec<Proposal> {
    let duration = Duration::minutes(requested.duration_minutes());
    let day = calendar::day_bounds(cfg, requested.start.date());
    let pool = cfg.pool(requested_resource.group);

    let mut ranked: Vec<(i64, u8, NaiveDateTime, Proposal)> = Vec::new();
    let step = Duration::minutes(calendar::GRID_MINUTES as i64);

    let mut start = day.start;
    while start + duration <= day.end {
        let candidate = Slot::new(start, start + duration);
        let offset = (start - requested.start).num_minutes();
        let distance = offset.abs();

        for resource in &pool {
            if *resource == requested_resource && offset == 0 {
                continue;
            }
            if calendar::normalize_and_validate(cfg, now, candidate.start, candidate.end).is_err()
            {
                continue;
            }
            if !conflict::can_reserve(&candidate, *resource, active) {
                continue;
            }

            let strategy = match (*resource == requested_resource, offset) {
                (true, o) if o < 0 => ProposalStrategy::TimeShiftBefore,
                (true, _) => ProposalStrategy::TimeShiftAfter,
                (false, 0) => ProposalStrategy::OtherResourceSameTime,
                (false, _) => ProposalStrategy::OtherResourceShifted,
            };
            ranked.push((
                distance,
                resource.index,
                candidate.start,
                Proposal {
                    strategy,
                    resource: *resource,
                    slot: candidate,
                },
            ));
        }
        start += step;
    }

    ranked.sort_by_key(|(distance, index, start, _)| (*distance, *index, *start));
    ranked
        .into_iter()
        .take(MAX_PROPOSALS)
        .map(|(_, _, _, proposal)| proposal)
        .collect()
}
