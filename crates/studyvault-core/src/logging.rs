//! Structured logging field name constants for studyvault.
//!
//! All crates use these constants so log aggregation can query by the same
//! field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (skipped row, identity fallback) |
//! | INFO  | Lifecycle events, backup/restore completions |
//! | DEBUG | Decision points, per-kind progress, config choices |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "backup", "db", "jobs", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "exporter", "importer", "retention", "pool", "scheduler"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "export", "restore", "validate", "cleanup"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Entity kind being processed (snapshot key, e.g. "quizQuestions").
pub const ENTITY_KIND: &str = "entity_kind";

/// Original (snapshot) identity of a row.
pub const ORIGINAL_ID: &str = "original_id";

/// Identity assigned in the target store.
pub const NEW_ID: &str = "new_id";

/// User the operation is scoped to.
pub const USER_ID: &str = "user_id";

/// Snapshot file path.
pub const FILE_PATH: &str = "file_path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows read, written or restored.
pub const ROW_COUNT: &str = "row_count";

/// Number of files affected.
pub const FILE_COUNT: &str = "file_count";

/// Number of row-level errors accumulated.
pub const ERROR_COUNT: &str = "error_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
