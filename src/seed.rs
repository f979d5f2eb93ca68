//! Deterministic test-data generators.
//!
//! Every generator derives its RNG from a string seed built out of the call
//! parameters, and stamps ids from that same RNG. Re-running a generator with
//! the parameters recorded in a `TEST_DATA_GENERATED*` event therefore
//! reproduces the exact records, which is what lets recovery replay seed
//! events instead of dropping them.

use std::collections::HashMap;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ulid::Ulid;

use crate::calendar;
use crate::config::Config;
use crate::model::{Reservation, ResourceGroup, ResourceId, Slot, Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    /// The target window contains no usable days.
    EmptyWindow,
    InvalidParameter(&'static str),
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::EmptyWindow => write!(f, "no usable days in the seeding window"),
            SeedError::InvalidParameter(what) => write!(f, "invalid seed parameter: {what}"),
        }
    }
}

impl std::error::Error for SeedError {}

/// FNV-1a over the seed string. Hand-rolled so the mapping is stable across
/// processes and toolchain versions; replay depends on that.
fn rng_for(seed: &str) -> StdRng {
    let mut acc: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in seed.bytes() {
        acc ^= byte as u64;
        acc = acc.wrapping_mul(0x0000_0100_0000_01b3);
    }
    StdRng::seed_from_u64(acc)
}

fn next_id(rng: &mut StdRng, now: NaiveDateTime) -> Ulid {
    let millis = now.and_utc().timestamp_millis().max(0) as u64;
    Ulid::from_parts(millis, rng.r#gen::<u128>())
}

fn record(
    rng: &mut StdRng,
    resource: ResourceId,
    slot: Slot,
    now: NaiveDateTime,
) -> Reservation {
    Reservation {
        id: next_id(rng, now),
        resource,
        slot,
        created_at: now,
        updated_at: now,
        owner: None,
        request_text: None,
        status: Status::Active,
    }
}

/// One reservation per pool resource, spread over the coming window with a
/// bias toward near-term days. Durations never cross the top of the hour.
pub fn generate_basic(
    cfg: &Config,
    start_date: NaiveDate,
    now: NaiveDateTime,
) -> Result<Vec<Reservation>, SeedError> {
    let window_end = start_date + Duration::days(cfg.window_days);
    let business_days = calendar::business_days_between(cfg, start_date, window_end);
    if business_days.is_empty() {
        return Err(SeedError::EmptyWindow);
    }

    let mut rng = rng_for(&format!("test:{start_date}"));
    let mut records = Vec::new();
    for resource in cfg.all_resources() {
        let day = pick_weighted_business_day(&mut rng, &business_days);
        let start_hour = rng.gen_range(cfg.open_hour..=cfg.close_hour.saturating_sub(2));
        let start_minute = 10 * rng.gen_range(0..6u32);
        let start = day
            .and_hms_opt(start_hour, start_minute, 0)
            .ok_or(SeedError::InvalidParameter("business hours"))?;
        let max_duration = 60 - start_minute;
        let choices: Vec<u32> = (1..=6).map(|k| k * 10).filter(|d| *d <= max_duration).collect();
        let duration = choices[rng.gen_range(0..choices.len())];
        let slot = Slot::new(start, start + Duration::minutes(duration as i64));
        records.push(record(&mut rng, resource, slot, now));
    }
    Ok(records)
}

/// Dense multi-day dataset. Per business day a target count scaled by the
/// near-term density ratio; start times weighted toward the reference
/// time-of-day with a repeat penalty; hotspot resources drawn more often.
/// Same-resource overlap is rejected during generation.
pub fn generate_large(
    cfg: &Config,
    start_date: NaiveDate,
    days: u32,
    slots_per_day: u32,
    now: NaiveDateTime,
) -> Result<Vec<Reservation>, SeedError> {
    if days == 0 {
        return Err(SeedError::InvalidParameter("days must be greater than zero"));
    }
    if slots_per_day == 0 {
        return Err(SeedError::InvalidParameter("slots_per_day must be greater than zero"));
    }
    if slots_per_day > 5 {
        return Err(SeedError::InvalidParameter(
            "slots_per_day is too large for the business-hours window",
        ));
    }

    let window_end = start_date + Duration::days(days as i64);
    let business_days = calendar::business_days_between(cfg, start_date, window_end);
    if business_days.is_empty() {
        return Err(SeedError::EmptyWindow);
    }

    let mut rng = rng_for(&format!("large:{start_date}:{days}:{slots_per_day}"));
    let weighted_pool = weighted_resource_pool(cfg);
    let preferred_minutes = now.time().hour() * 60 + (now.time().minute() / 10) * 10;

    let mut records = Vec::new();
    let total = business_days.len();
    for (day_index, day) in business_days.iter().enumerate() {
        let density = near_term_density_ratio(day_index, total);
        let slot_factor = (slots_per_day as f64 / 4.0).max(0.75);
        let daily_min = ((36.0 * density * slot_factor) as usize).max(20);
        let daily_max = ((70.0 * density * slot_factor) as usize).max(daily_min + 8);
        let daily_target = rng.gen_range(daily_min..=daily_max);

        let day_close = day
            .and_hms_opt(cfg.close_hour, 0, 0)
            .ok_or(SeedError::InvalidParameter("business hours"))?;
        let mut candidates: Vec<(NaiveDateTime, f64)> = Vec::new();
        for hour in cfg.open_hour..cfg.close_hour {
            for minute in (0..60u32).step_by(10) {
                let Some(start) = day.and_hms_opt(hour, minute, 0) else { continue };
                if start >= day_close {
                    continue;
                }
                let minute_of_day = hour * 60 + minute;
                let distance = minute_of_day.abs_diff(preferred_minutes);
                let mut weight = 1.2 / (1.0 + distance as f64 / 120.0);
                if *day == now.date() && minute_of_day >= preferred_minutes {
                    weight *= 1.4;
                }
                candidates.push((start, weight));
            }
        }

        let mut usage: HashMap<ResourceId, Vec<Slot>> = HashMap::new();
        let mut start_usage: HashMap<NaiveDateTime, u32> = HashMap::new();
        let mut placed = 0usize;
        let mut attempts = 0usize;
        while placed < daily_target && attempts < daily_target * 8 {
            attempts += 1;

            let resource = weighted_choice(&mut rng, &weighted_pool);

            let adjusted: Vec<(NaiveDateTime, f64)> = candidates
                .iter()
                .map(|&(start, weight)| {
                    let repeats = start_usage.get(&start).copied().unwrap_or(0);
                    (start, weight / (1.0 + repeats as f64 * 0.65))
                })
                .collect();
            let start = weighted_choice(&mut rng, &adjusted);

            let max_duration = (day_close - start).num_minutes();
            let choices: Vec<i64> = (1..=12).map(|k| k * 10).filter(|d| *d <= max_duration).collect();
            if choices.is_empty() {
                continue;
            }
            let duration = choices[rng.gen_range(0..choices.len())];
            let slot = Slot::new(start, start + Duration::minutes(duration));

            let taken = usage.entry(resource).or_default();
            if taken.iter().any(|existing| existing.overlaps(&slot)) {
                continue;
            }
            taken.push(slot);
            *start_usage.entry(start).or_insert(0) += 1;
            placed += 1;

            records.push(record(&mut rng, resource, slot, now));
        }
    }
    Ok(records)
}

/// Three fixed one-hour slots (09:00, 11:00, 15:00) on the first three
/// weekdays of the coming month, all on the one requested resource.
pub fn generate_specific(
    cfg: &Config,
    resource: ResourceId,
    now: NaiveDateTime,
) -> Result<Vec<Reservation>, SeedError> {
    let window_end = now.date() + Duration::days(cfg.window_days);
    let weekdays = calendar::weekdays_between(now.date(), window_end);
    if weekdays.len() < 3 {
        return Err(SeedError::EmptyWindow);
    }

    let mut rng = rng_for(&format!("specific:{resource}:{}", now.date()));
    let mut records = Vec::new();
    for (day, hour) in weekdays.iter().zip([9u32, 11, 15]) {
        let start = day
            .and_hms_opt(hour, 0, 0)
            .ok_or(SeedError::InvalidParameter("slot hour"))?;
        let slot = Slot::new(start, start + Duration::hours(1));
        records.push(record(&mut rng, resource, slot, now));
    }
    Ok(records)
}

/// Rooms 1–3 and devices 1–5 are the hotspots everybody fights over.
fn weighted_resource_pool(cfg: &Config) -> Vec<(ResourceId, f64)> {
    cfg.all_resources()
        .into_iter()
        .map(|resource| {
            let weight = match resource.group {
                ResourceGroup::MeetingRoom if resource.index <= 3 => 7.0,
                ResourceGroup::MeetingRoom => 1.0,
                ResourceGroup::TestDevice if resource.index <= 5 => 4.0,
                ResourceGroup::TestDevice => 2.0,
            };
            (resource, weight)
        })
        .collect()
}

/// 1.45 for the nearest day, decaying linearly, floored at 0.75.
fn near_term_density_ratio(index: usize, total: usize) -> f64 {
    if total <= 1 {
        return 1.0;
    }
    let progress = index as f64 / (total - 1) as f64;
    (1.45 - 0.65 * progress).max(0.75)
}

fn pick_weighted_business_day(rng: &mut StdRng, days: &[NaiveDate]) -> NaiveDate {
    if days.len() == 1 {
        return days[0];
    }
    let weighted: Vec<(NaiveDate, f64)> = days
        .iter()
        .enumerate()
        .map(|(index, day)| (*day, near_term_density_ratio(index, days.len())))
        .collect();
    weighted_choice(rng, &weighted)
}

fn weighted_choice<T: Copy>(rng: &mut StdRng, items: &[(T, f64)]) -> T {
    let total: f64 = items.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return items[rng.gen_range(0..items.len())].0;
    }
    let pick = rng.r#gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (item, weight) in items {
        cumulative += weight.max(0.0);
        if pick <= cumulative {
            return *item;
        }
    }
    items[items.len() - 1].0
}
