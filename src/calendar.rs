use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::config::Config;
use crate::model::Slot;

/// Reservations snap to this grid: starts floor to it, ends ceil to it.
pub const GRID_MINUTES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Start is not strictly before end after normalization.
    InvalidRange,
    /// Start lies in the past or at/after `now + window_days`.
    OutOfWindow,
    /// Outside the configured open/close hours, or spans more than one day.
    OutsideBusinessHours,
    /// Start date is a Saturday, Sunday, or configured holiday.
    WeekendOrHoliday,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidRange => {
                write!(f, "reservation start must be earlier than end")
            }
            ValidationError::OutOfWindow => {
                write!(f, "reservation start must lie within the booking window")
            }
            ValidationError::OutsideBusinessHours => {
                write!(f, "reservation must fit inside business hours of a single day")
            }
            ValidationError::WeekendOrHoliday => {
                write!(f, "reservation is not allowed on weekends or holidays")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Floor to the preceding grid mark; an aligned instant is unchanged.
pub fn floor_to_grid(value: NaiveDateTime) -> NaiveDateTime {
    let minute = value.minute() - value.minute() % GRID_MINUTES;
    value
        .date()
        .and_hms_opt(value.hour(), minute, 0)
        .expect("floored minute stays in range")
}

/// Ceil to the next grid mark; an aligned instant (no sub-minute residue)
/// is unchanged.
pub fn ceil_to_grid(value: NaiveDateTime) -> NaiveDateTime {
    let floored = floor_to_grid(value);
    if floored == value {
        value
    } else {
        floored + Duration::minutes(GRID_MINUTES as i64)
    }
}

/// Snap a raw range to the grid. Fails when flooring/ceiling collapses it.
pub fn normalize(start: NaiveDateTime, end: NaiveDateTime) -> Result<Slot, ValidationError> {
    let start = floor_to_grid(start);
    let end = ceil_to_grid(end);
    if start >= end {
        return Err(ValidationError::InvalidRange);
    }
    Ok(Slot { start, end })
}

/// Cap a same-day range that runs past the close hour at the close hour.
/// A range spanning days is left alone for the hours validator to reject.
pub fn clamp_same_day_end(cfg: &Config, slot: Slot) -> Slot {
    if slot.start.date() != slot.end.date() {
        return slot;
    }
    let cutoff = slot.start.date().and_time(close_time(cfg));
    if slot.end > cutoff {
        Slot {
            start: slot.start,
            end: cutoff,
        }
    } else {
        slot
    }
}

/// `now <= start < now + window_days`. Only the start is window-checked.
pub fn validate_window(
    cfg: &Config,
    now: NaiveDateTime,
    start: NaiveDateTime,
) -> Result<(), ValidationError> {
    if start < now || start >= now + Duration::days(cfg.window_days) {
        return Err(ValidationError::OutOfWindow);
    }
    Ok(())
}

/// Both instants inside `[open, close]` of their day, and on the same day.
pub fn validate_business_hours(cfg: &Config, slot: &Slot) -> Result<(), ValidationError> {
    if slot.start.date() != slot.end.date() {
        return Err(ValidationError::OutsideBusinessHours);
    }
    let open = cfg.open_hour * 60;
    let close = cfg.close_hour * 60;
    if minute_of_day(slot.start) < open || minute_of_day(slot.end) > close {
        return Err(ValidationError::OutsideBusinessHours);
    }
    Ok(())
}

pub fn validate_calendar_day(cfg: &Config, date: NaiveDate) -> Result<(), ValidationError> {
    if !is_business_day(cfg, date) {
        return Err(ValidationError::WeekendOrHoliday);
    }
    Ok(())
}

/// The full policy pipeline in its fixed order:
/// normalize -> clamp -> window -> hours -> calendar day.
/// The clamp must precede the hours check, otherwise an unclamped end past
/// the close hour would always fail it.
pub fn normalize_and_validate(
    cfg: &Config,
    now: NaiveDateTime,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Slot, ValidationError> {
    let slot = normalize(start, end)?;
    let slot = clamp_same_day_end(cfg, slot);
    if slot.start >= slot.end {
        return Err(ValidationError::InvalidRange);
    }
    validate_window(cfg, now, slot.start)?;
    validate_business_hours(cfg, &slot)?;
    validate_calendar_day(cfg, slot.start.date())?;
    Ok(slot)
}

pub fn is_business_day(cfg: &Config, date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !cfg.holidays.contains(&date)
}

/// Business days in `[from, to)`, in order.
pub fn business_days_between(cfg: &Config, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut cursor = from;
    while cursor < to {
        if is_business_day(cfg, cursor) {
            days.push(cursor);
        }
        cursor += Duration::days(1);
    }
    days
}

/// Weekdays (Mon-Fri, holidays included) in `[from, to)`.
pub fn weekdays_between(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut cursor = from;
    while cursor < to {
        if !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(cursor);
        }
        cursor += Duration::days(1);
    }
    days
}

/// First business day strictly after `base`, bounded to 90 days of lookahead.
pub fn next_business_day(cfg: &Config, base: NaiveDate) -> NaiveDate {
    let mut candidate = base + Duration::days(1);
    for _ in 0..90 {
        if is_business_day(cfg, candidate) {
            return candidate;
        }
        candidate += Duration::days(1);
    }
    candidate
}

/// `[open, close)` bounds of one calendar day.
pub fn day_bounds(cfg: &Config, date: NaiveDate) -> Slot {
    Slot {
        start: date.and_time(open_time(cfg)),
        end: date.and_time(close_time(cfg)),
    }
}

pub fn open_time(cfg: &Config) -> NaiveTime {
    NaiveTime::from_hms_opt(cfg.open_hour, 0, 0).expect("open_hour validated at config load")
}

pub fn close_time(cfg: &Config) -> NaiveTime {
    NaiveTime::from_hms_opt(cfg.close_hour, 0, 0).expect("close_hour validated at config load")
}

fn minute_of_day(value: NaiveDateTime) -> u32 {
    value.hour() * 60 + value.minute()
}
