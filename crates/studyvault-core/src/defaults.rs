//! Centralized default constants for studyvault.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and binaries reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Snapshot format version written by the exporter.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// File extension for snapshot files (without the dot).
pub const SNAPSHOT_EXTENSION: &str = "json";

/// File name prefix for full-database snapshots.
pub const FULL_SNAPSHOT_PREFIX: &str = "backup_";

/// File name prefix for single-user snapshots.
pub const USER_SNAPSHOT_PREFIX: &str = "user_backup_";

/// `chrono` format of the timestamp embedded in snapshot file names.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

// =============================================================================
// BACKUP DIRECTORY & RETENTION
// =============================================================================

/// Default directory for snapshot files, relative to the working directory.
pub const BACKUP_DIR: &str = "backups";

/// Default number of snapshots kept by a manual cleanup.
pub const CLEANUP_KEEP_COUNT: usize = 10;

/// Default number of snapshots kept by scheduled cleanup.
pub const SCHEDULE_MAX_BACKUPS: usize = 50;

// =============================================================================
// SCHEDULE
// =============================================================================

/// Daily backup time (HH:MM, local to the scheduler clock).
pub const SCHEDULE_DAILY_AT: &str = "02:00";

/// Weekly backup weekday.
pub const SCHEDULE_WEEKLY_DAY: &str = "Sun";

/// Weekly backup time (HH:MM).
pub const SCHEDULE_WEEKLY_AT: &str = "03:00";

/// Day of month for the monthly backup.
pub const SCHEDULE_MONTHLY_DAY: u32 = 1;

/// Monthly backup time (HH:MM).
pub const SCHEDULE_MONTHLY_AT: &str = "04:00";

/// Interval between scheduled cleanups in seconds (6 hours).
pub const SCHEDULE_CLEANUP_INTERVAL_SECS: u64 = 6 * 60 * 60;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default wait for a pool connection in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 64;
