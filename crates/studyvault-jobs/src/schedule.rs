//! Next-fire-time arithmetic for the backup schedule.
//!
//! Every function returns the first matching instant strictly after `now`.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// A recurring scheduler task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledTask {
    DailyBackup,
    WeeklyBackup,
    MonthlyBackup,
    Cleanup,
}

impl ScheduledTask {
    pub const ALL: [ScheduledTask; 4] = [
        ScheduledTask::DailyBackup,
        ScheduledTask::WeeklyBackup,
        ScheduledTask::MonthlyBackup,
        ScheduledTask::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyBackup => "daily_backup",
            Self::WeeklyBackup => "weekly_backup",
            Self::MonthlyBackup => "monthly_backup",
            Self::Cleanup => "cleanup",
        }
    }

    pub fn creates_backup(&self) -> bool {
        !matches!(self, Self::Cleanup)
    }
}

impl std::fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn next_daily(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Days::new(1)
    }
}

pub fn next_weekly(now: NaiveDateTime, weekday: Weekday, at: NaiveTime) -> NaiveDateTime {
    let ahead = (7 + weekday.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        % 7;
    let candidate = (now.date() + Days::new(ahead as u64)).and_time(at);
    if candidate > now {
        candidate
    } else {
        candidate + Days::new(7)
    }
}

/// `day` is clamped to 1..=28 so every month has it.
pub fn next_monthly(now: NaiveDateTime, day: u32, at: NaiveTime) -> NaiveDateTime {
    let day = day.clamp(1, 28);
    let first = first_of_month(now.date());
    let candidate = first
        .with_day(day)
        .unwrap_or(first)
        .and_time(at);
    if candidate > now {
        return candidate;
    }
    let next_first = first + Months::new(1);
    next_first.with_day(day).unwrap_or(next_first).and_time(at)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_daily() {
        assert_eq!(next_daily(at(2026, 3, 10, 1, 0), time(2, 0)), at(2026, 3, 10, 2, 0));
        assert_eq!(next_daily(at(2026, 3, 10, 2, 0), time(2, 0)), at(2026, 3, 11, 2, 0));
        assert_eq!(next_daily(at(2026, 12, 31, 23, 0), time(2, 0)), at(2027, 1, 1, 2, 0));
    }

    #[test]
    fn test_next_weekly() {
        // 2026-03-10 is a Tuesday.
        assert_eq!(
            next_weekly(at(2026, 3, 10, 12, 0), Weekday::Sun, time(3, 0)),
            at(2026, 3, 15, 3, 0)
        );
        assert_eq!(
            next_weekly(at(2026, 3, 15, 2, 0), Weekday::Sun, time(3, 0)),
            at(2026, 3, 15, 3, 0)
        );
        assert_eq!(
            next_weekly(at(2026, 3, 15, 3, 0), Weekday::Sun, time(3, 0)),
            at(2026, 3, 22, 3, 0)
        );
        assert_eq!(
            next_weekly(at(2026, 3, 10, 1, 0), Weekday::Tue, time(3, 0)),
            at(2026, 3, 10, 3, 0)
        );
    }

    #[test]
    fn test_next_monthly() {
        assert_eq!(next_monthly(at(2026, 3, 1, 3, 0), 1, time(4, 0)), at(2026, 3, 1, 4, 0));
        assert_eq!(next_monthly(at(2026, 3, 1, 4, 0), 1, time(4, 0)), at(2026, 4, 1, 4, 0));
        assert_eq!(next_monthly(at(2026, 12, 20, 0, 0), 15, time(4, 0)), at(2027, 1, 15, 4, 0));
        assert_eq!(next_monthly(at(2026, 1, 30, 0, 0), 31, time(4, 0)), at(2026, 2, 28, 4, 0));
    }

    #[test]
    fn test_task_names() {
        assert_eq!(ScheduledTask::WeeklyBackup.to_string(), "weekly_backup");
        assert!(ScheduledTask::MonthlyBackup.creates_backup());
        assert!(!ScheduledTask::Cleanup.creates_backup());
    }
}
