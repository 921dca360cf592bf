//! Scheduler configuration.

use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use tracing::warn;

use studyvault_core::defaults::{
    SCHEDULE_CLEANUP_INTERVAL_SECS, SCHEDULE_DAILY_AT, SCHEDULE_MAX_BACKUPS, SCHEDULE_MONTHLY_AT,
    SCHEDULE_MONTHLY_DAY, SCHEDULE_WEEKLY_AT, SCHEDULE_WEEKLY_DAY,
};

const TIME_FORMAT: &str = "%H:%M";

/// When scheduled backups and cleanups run.
///
/// Times are wall-clock times in the scheduler's local time zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    pub daily_at: NaiveTime,
    pub weekly_on: Weekday,
    pub weekly_at: NaiveTime,
    /// Day of month, 1 to 28.
    pub monthly_day: u32,
    pub monthly_at: NaiveTime,
    /// Time between periodic cleanups.
    pub cleanup_interval: Duration,
    /// Snapshots kept by every scheduled cleanup.
    pub max_backups: usize,
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}

fn default_time(value: &str) -> NaiveTime {
    parse_time(value).unwrap_or(NaiveTime::MIN)
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_at: default_time(SCHEDULE_DAILY_AT),
            weekly_on: SCHEDULE_WEEKLY_DAY.parse().unwrap_or(Weekday::Sun),
            weekly_at: default_time(SCHEDULE_WEEKLY_AT),
            monthly_day: SCHEDULE_MONTHLY_DAY,
            monthly_at: default_time(SCHEDULE_MONTHLY_AT),
            cleanup_interval: Duration::from_secs(SCHEDULE_CLEANUP_INTERVAL_SECS),
            max_backups: SCHEDULE_MAX_BACKUPS,
        }
    }
}

/// Read `name` and parse it, falling back to `default` when unset or invalid.
fn env_or<T>(name: &str, default: T, parse: impl Fn(&str) -> Option<T>) -> T {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match parse(&raw) {
            Some(value) => value,
            None => {
                warn!(variable = name, value = %raw, "Invalid schedule setting, using default");
                default
            }
        },
        _ => default,
    }
}

impl ScheduleConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BACKUP_SCHEDULE_ENABLED` | `true` | Enable/disable scheduled backups |
    /// | `BACKUP_DAILY_AT` | `02:00` | Daily backup time |
    /// | `BACKUP_WEEKLY_DAY` | `Sun` | Weekly backup weekday |
    /// | `BACKUP_WEEKLY_AT` | `03:00` | Weekly backup time |
    /// | `BACKUP_MONTHLY_DAY` | `1` | Monthly backup day (1-28) |
    /// | `BACKUP_MONTHLY_AT` | `04:00` | Monthly backup time |
    /// | `BACKUP_CLEANUP_INTERVAL_SECS` | `21600` | Periodic cleanup interval |
    /// | `BACKUP_MAX_BACKUPS` | `50` | Snapshots kept by scheduled cleanup |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let enabled = std::env::var("BACKUP_SCHEDULE_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            enabled,
            daily_at: env_or("BACKUP_DAILY_AT", defaults.daily_at, parse_time),
            weekly_on: env_or("BACKUP_WEEKLY_DAY", defaults.weekly_on, |v| {
                v.trim().parse().ok()
            }),
            weekly_at: env_or("BACKUP_WEEKLY_AT", defaults.weekly_at, parse_time),
            monthly_day: env_or("BACKUP_MONTHLY_DAY", defaults.monthly_day, |v| {
                v.trim().parse::<u32>().ok().filter(|d| (1..=28).contains(d))
            }),
            monthly_at: env_or("BACKUP_MONTHLY_AT", defaults.monthly_at, parse_time),
            cleanup_interval: env_or(
                "BACKUP_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval,
                |v| {
                    v.trim()
                        .parse::<u64>()
                        .ok()
                        .filter(|s| *s > 0)
                        .map(Duration::from_secs)
                },
            ),
            max_backups: env_or("BACKUP_MAX_BACKUPS", defaults.max_backups, |v| {
                v.trim().parse().ok()
            }),
        }
    }

    /// Enable or disable the scheduler.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_backups(mut self, max: usize) -> Self {
        self.max_backups = max;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
