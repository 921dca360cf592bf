//! # studyvault-core
//!
//! Core types for the studyvault backup engine: entity models, the snapshot
//! document format, validation, and the storage traits every backend
//! implements.

pub mod defaults;
pub mod error;
pub mod kinds;
pub mod logging;
pub mod models;
pub mod snapshot;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use kinds::{EntityKind, Relation, Scope};
pub use models::*;
pub use snapshot::{
    check_snapshot_compatibility, validate_bytes, validate_snapshot, CompatibilityResult,
    DatabaseSnapshot, FieldMap, Snapshot, SnapshotKind, SnapshotName, SnapshotTables,
    UserSnapshot, ValidationReport, Version, CURRENT_SNAPSHOT_VERSION,
};
pub use traits::{BackupStore, StoreTransaction};
