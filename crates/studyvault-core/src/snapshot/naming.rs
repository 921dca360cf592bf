//! Snapshot file naming contract.
//!
//! `backup_<yyyy-MM-dd_HH-mm-ss>.<ext>` for full snapshots and
//! `user_backup_<userId>_<yyyy-MM-dd_HH-mm-ss>.<ext>` for single-user ones.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::defaults::{FULL_SNAPSHOT_PREFIX, SNAPSHOT_TIMESTAMP_FORMAT, USER_SNAPSHOT_PREFIX};

/// Which variant a snapshot file holds, as told by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum SnapshotKind {
    Full,
    User { user_id: i64 },
}

/// A parsed snapshot file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub kind: SnapshotKind,
    pub timestamp: NaiveDateTime,
}

impl SnapshotName {
    pub fn full(timestamp: NaiveDateTime) -> Self {
        Self {
            kind: SnapshotKind::Full,
            timestamp,
        }
    }

    pub fn user(user_id: i64, timestamp: NaiveDateTime) -> Self {
        Self {
            kind: SnapshotKind::User { user_id },
            timestamp,
        }
    }

    /// Render the file name with the given extension (no leading dot).
    pub fn file_name(&self, extension: &str) -> String {
        let ts = self.timestamp.format(SNAPSHOT_TIMESTAMP_FORMAT);
        match self.kind {
            SnapshotKind::Full => format!("{}{}.{}", FULL_SNAPSHOT_PREFIX, ts, extension),
            SnapshotKind::User { user_id } => {
                format!("{}{}_{}.{}", USER_SNAPSHOT_PREFIX, user_id, ts, extension)
            }
        }
    }

    /// Parse a file name. Returns `None` for names outside the contract.
    pub fn parse(file_name: &str, extension: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;

        if let Some(rest) = stem.strip_prefix(USER_SNAPSHOT_PREFIX) {
            let (id, ts) = rest.split_once('_')?;
            let user_id = id.parse::<i64>().ok()?;
            let timestamp = NaiveDateTime::parse_from_str(ts, SNAPSHOT_TIMESTAMP_FORMAT).ok()?;
            return Some(Self::user(user_id, timestamp));
        }

        let ts = stem.strip_prefix(FULL_SNAPSHOT_PREFIX)?;
        let timestamp = NaiveDateTime::parse_from_str(ts, SNAPSHOT_TIMESTAMP_FORMAT).ok()?;
        Some(Self::full(timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_full_name() {
        assert_eq!(
            SnapshotName::full(ts()).file_name("json"),
            "backup_2026-02-10_14-05-09.json"
        );
    }

    #[test]
    fn test_user_name() {
        assert_eq!(
            SnapshotName::user(42, ts()).file_name("json"),
            "user_backup_42_2026-02-10_14-05-09.json"
        );
    }

    #[test]
    fn test_parse_both_variants() {
        let full = SnapshotName::parse("backup_2026-02-10_14-05-09.json", "json").unwrap();
        assert_eq!(full, SnapshotName::full(ts()));

        let user = SnapshotName::parse("user_backup_42_2026-02-10_14-05-09.json", "json").unwrap();
        assert_eq!(user.kind, SnapshotKind::User { user_id: 42 });
        assert_eq!(user.timestamp, ts());
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        for name in [
            "notes.json",
            "backup_2026-02-10_14-05-09.txt",
            "backup_2026-02-10_14-05-09.json.tmp",
            "backup_yesterday.json",
            "user_backup_x_2026-02-10_14-05-09.json",
            ".backup_2026-02-10_14-05-09.json",
        ] {
            assert!(SnapshotName::parse(name, "json").is_none(), "{}", name);
        }
    }
}
