use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::model::{ResourceGroup, ResourceId};

/// Bounded retry applied to the atomic file-replace step. A rename that keeps
/// failing (e.g. a transient lock held by a scanner on Windows) is retried
/// `max_attempts` times with a fixed delay, then surfaces as `LockTimeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(50),
        }
    }
}

/// All runtime policy in one explicit structure, loaded once at startup and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// First bookable hour of day (inclusive).
    pub open_hour: u32,
    /// Last bookable hour of day; reservations must end at or before it.
    pub close_hour: u32,
    /// Reservations must start within `[now, now + window_days)`.
    pub window_days: i64,
    pub holidays: BTreeSet<NaiveDate>,
    pub meeting_rooms: u8,
    pub test_devices: u8,
    pub retry: RetryPolicy,
    pub sweep_interval: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            open_hour: 8,
            close_hour: 19,
            window_days: 30,
            holidays: BTreeSet::new(),
            meeting_rooms: 10,
            test_devices: 20,
            retry: RetryPolicy::default(),
            sweep_interval: Duration::from_secs(60),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read overrides from `SLOTD_*` environment variables. Unset or
    /// unparseable values fall back to the defaults above.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(dir) = std::env::var("SLOTD_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(hour) = env_parse::<u32>("SLOTD_OPEN_HOUR") {
            cfg.open_hour = hour.min(23);
        }
        if let Some(hour) = env_parse::<u32>("SLOTD_CLOSE_HOUR") {
            cfg.close_hour = hour.min(23);
        }
        if let Some(days) = env_parse::<i64>("SLOTD_WINDOW_DAYS") {
            cfg.window_days = days.max(1);
        }
        if let Some(count) = env_parse::<u8>("SLOTD_ROOMS") {
            cfg.meeting_rooms = count;
        }
        if let Some(count) = env_parse::<u8>("SLOTD_DEVICES") {
            cfg.test_devices = count;
        }
        if let Ok(raw) = std::env::var("SLOTD_HOLIDAYS") {
            cfg.holidays = raw
                .split(',')
                .filter_map(|s| s.trim().parse::<NaiveDate>().ok())
                .collect();
        }
        if let Some(attempts) = env_parse::<u32>("SLOTD_LOCK_RETRIES") {
            cfg.retry.max_attempts = attempts.max(1);
        }
        if let Some(ms) = env_parse::<u64>("SLOTD_LOCK_RETRY_DELAY_MS") {
            cfg.retry.delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("SLOTD_SWEEP_SECS") {
            cfg.sweep_interval = Duration::from_secs(secs.max(1));
        }
        cfg.metrics_port = env_parse::<u16>("SLOTD_METRICS_PORT");
        cfg
    }

    pub fn pool_size(&self, group: ResourceGroup) -> u8 {
        match group {
            ResourceGroup::MeetingRoom => self.meeting_rooms,
            ResourceGroup::TestDevice => self.test_devices,
        }
    }

    /// All resources of one group, in pool order (index ascending).
    pub fn pool(&self, group: ResourceGroup) -> Vec<ResourceId> {
        (1..=self.pool_size(group))
            .map(|i| ResourceId::new(group, i))
            .collect()
    }

    /// Every configured resource, rooms first, then devices.
    pub fn all_resources(&self) -> Vec<ResourceId> {
        let mut all = self.pool(ResourceGroup::MeetingRoom);
        all.extend(self.pool(ResourceGroup::TestDevice));
        all
    }

    pub fn contains(&self, resource: &ResourceId) -> bool {
        resource.index >= 1 && resource.index <= self.pool_size(resource.group)
    }

    /// Resolve an untrusted free-text hint against the configured pools.
    pub fn resolve_hint(&self, hint: &str) -> Option<ResourceId> {
        let resource: ResourceId = hint.trim().to_lowercase().parse().ok()?;
        self.contains(&resource).then_some(resource)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_are_fixed_and_ordered() {
        let cfg = Config::default();
        let rooms = cfg.pool(ResourceGroup::MeetingRoom);
        assert_eq!(rooms.len(), 10);
        assert_eq!(rooms[0].to_string(), "room1");
        assert_eq!(rooms[9].to_string(), "room10");
        assert_eq!(cfg.pool(ResourceGroup::TestDevice).len(), 20);
        assert_eq!(cfg.all_resources().len(), 30);
    }

    #[test]
    fn contains_respects_pool_bounds() {
        let cfg = Config::default();
        assert!(cfg.contains(&"room10".parse().unwrap()));
        assert!(!cfg.contains(&"room11".parse().unwrap()));
        assert!(cfg.contains(&"device20".parse().unwrap()));
        assert!(!cfg.contains(&"device21".parse().unwrap()));
    }

    #[test]
    fn hint_resolution_trims_and_lowercases() {
        let cfg = Config::default();
        assert_eq!(cfg.resolve_hint(" Room3 "), Some("room3".parse().unwrap()));
        assert_eq!(cfg.resolve_hint("device7"), Some("device7".parse().unwrap()));
        assert_eq!(cfg.resolve_hint("room99"), None);
        assert_eq!(cfg.resolve_hint("whiteboard"), None);
        assert_eq!(cfg.resolve_hint(""), None);
    }
}
