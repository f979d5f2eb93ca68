//! Read-side views: schedule occupancy and per-owner listings.

use chrono::{Duration, NaiveDateTime};

use crate::calendar;
use crate::config::Config;
use crate::engine::{Engine, EngineError};
use crate::model::{Reservation, ResourceGroup, ResourceId, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    fn days(self) -> i64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }
}

/// Occupancy of one resource within the view window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSchedule {
    pub resource: ResourceId,
    /// Active reservations overlapping the window, sorted by start.
    pub reservations: Vec<Reservation>,
    /// Reserved minutes clipped to the window.
    pub reserved_minutes: i64,
    /// Reserved share of the window's bookable minutes, 0 when none exist.
    pub occupancy_rate: f64,
    pub occupied_now: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleView {
    pub period: Period,
    pub window: Slot,
    /// Business-hours span of each weekend/holiday day inside the window.
    pub blocked: Vec<Slot>,
    /// Business-hour minutes actually bookable inside the window.
    pub bookable_minutes: i64,
    pub rooms: Vec<ResourceSchedule>,
    pub devices: Vec<ResourceSchedule>,
}

impl Engine {
    /// Occupancy view over a day, week, or month. Expired records are swept
    /// first so the view reflects only live claims.
    pub async fn schedule(
        &self,
        period: Period,
        now: NaiveDateTime,
    ) -> Result<ScheduleView, EngineError> {
        self.store().close_expired(now).await?;
        let active = self.store().snapshot().await;
        let cfg = self.config();

        let window = view_window(cfg, period, now);
        let blocked = blocked_intervals(cfg, &window);
        let bookable_minutes = bookable_minutes(cfg, &window);

        let rooms = build_rows(
            cfg,
            ResourceGroup::MeetingRoom,
            &active,
            &window,
            bookable_minutes,
            now,
        );
        let devices = build_rows(
            cfg,
            ResourceGroup::TestDevice,
            &active,
            &window,
            bookable_minutes,
            now,
        );

        Ok(ScheduleView {
            period,
            window,
            blocked,
            bookable_minutes,
            rooms,
            devices,
        })
    }

    /// The owner's active reservations, sorted by (start, resource).
    pub async fn my_reservations(
        &self,
        owner: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<Reservation>, EngineError> {
        self.store().close_expired(now).await?;
        let mut owned: Vec<Reservation> = self
            .store()
            .snapshot()
            .await
            .into_iter()
            .filter(|r| r.owner.as_deref() == Some(owner))
            .collect();
        owned.sort_by_key(|r| (r.slot.start, r.resource));
        Ok(owned)
    }
}

/// Day view tracks the clock: before open it shows the whole business day,
/// during it the remainder from the 10-minute floor of now, and after close
/// it rolls over to the next business day. Week/month views start at
/// today's open hour.
fn view_window(cfg: &Config, period: Period, now: NaiveDateTime) -> Slot {
    let open_today = now.date().and_time(calendar::open_time(cfg));
    let close_today = now.date().and_time(calendar::close_time(cfg));

    if period == Period::Day {
        if now >= close_today {
            let next = calendar::next_business_day(cfg, now.date());
            return calendar::day_bounds(cfg, next);
        }
        if now <= open_today {
            return Slot::new(open_today, close_today);
        }
        return Slot::new(calendar::floor_to_grid(now), close_today);
    }

    Slot::new(open_today, open_today + Duration::days(period.days()))
}

/// Business-hours span of every non-business day strictly inside the window.
fn blocked_intervals(cfg: &Config, window: &Slot) -> Vec<Slot> {
    let mut blocked = Vec::new();
    let mut cursor = window.start.date();
    while cursor < window.end.date() {
        if !calendar::is_business_day(cfg, cursor) {
            blocked.push(calendar::day_bounds(cfg, cursor));
        }
        cursor += Duration::days(1);
    }
    blocked
}

/// Sum of business-hour minutes the window actually covers.
fn bookable_minutes(cfg: &Config, window: &Slot) -> i64 {
    if window.end <= window.start {
        return 0;
    }

    let mut total = 0;
    let mut cursor = window.start.date();
    loop {
        let day = calendar::day_bounds(cfg, cursor);
        if calendar::is_business_day(cfg, cursor) {
            let segment_start = window.start.max(day.start);
            let segment_end = window.end.min(day.end);
            if segment_end > segment_start {
                total += (segment_end - segment_start).num_minutes();
            }
        }
        if day.end >= window.end {
            break;
        }
        cursor += Duration::days(1);
    }
    total
}

/// One row per pool resource, sorted by (reservation count, resource) so
/// the least-loaded resources list first.
fn build_rows(
    cfg: &Config,
    group: ResourceGroup,
    active: &[Reservation],
    window: &Slot,
    bookable_minutes: i64,
    now: NaiveDateTime,
) -> Vec<ResourceSchedule> {
    let mut rows: Vec<ResourceSchedule> = cfg
        .pool(group)
        .into_iter()
        .map(|resource| {
            let mine: Vec<&Reservation> =
                active.iter().filter(|r| r.resource == resource).collect();

            let mut reservations: Vec<Reservation> = mine
                .iter()
                .filter(|r| r.slot.overlaps(window))
                .map(|r| (*r).clone())
                .collect();
            reservations.sort_by_key(|r| r.slot.start);

            let reserved_minutes: i64 = reservations
                .iter()
                .map(|r| {
                    let clipped_start = r.slot.start.max(window.start);
                    let clipped_end = r.slot.end.min(window.end);
                    (clipped_end - clipped_start).num_minutes().max(0)
                })
                .sum();

            let occupancy_rate = if bookable_minutes > 0 {
                reserved_minutes as f64 / bookable_minutes as f64
            } else {
                0.0
            };
            let occupied_now = mine.iter().any(|r| r.slot.contains_instant(now));

            ResourceSchedule {
                resource,
                reservations,
                reserved_minutes,
                occupancy_rate,
                occupied_now,
            }
        })
        .collect();

    rows.sort_by_key(|row| (row.reservations.len(), row.resource));
    rows
}
