//! Read-only structural validation of snapshot documents.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::compatibility::{check_snapshot_compatibility, CompatibilityResult};
use super::{FieldMap, Snapshot};
use crate::kinds::EntityKind;

/// Outcome of validating a snapshot.
///
/// `valid` is false exactly when `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub timestamp: Option<NaiveDateTime>,
    pub version: Option<String>,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_errors(
        timestamp: Option<NaiveDateTime>,
        version: Option<String>,
        errors: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            valid: errors.is_empty(),
            timestamp,
            version,
            errors,
            warnings,
        }
    }
}

/// Parse and validate raw snapshot bytes.
///
/// An unparseable document yields `valid = false` with a single parse error.
pub fn validate_bytes(bytes: &[u8]) -> ValidationReport {
    match Snapshot::from_slice(bytes) {
        Ok(snapshot) => validate_snapshot(&snapshot),
        Err(e) => ValidationReport::from_errors(
            None,
            None,
            vec![format!("Failed to parse snapshot: {}", e)],
            Vec::new(),
        ),
    }
}

/// Check version compatibility and required fields on every row.
///
/// Parent existence is not checked; missing parents are tolerated on restore.
pub fn validate_snapshot(snapshot: &Snapshot) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match check_snapshot_compatibility(snapshot.version()) {
        CompatibilityResult::Compatible => {}
        CompatibilityResult::NewerMinor { warnings: w } => warnings.extend(w),
        CompatibilityResult::Incompatible { reason } => errors.push(reason),
    }

    if let Snapshot::User(user_snapshot) = snapshot {
        match &user_snapshot.user {
            Some(user) => check_row(EntityKind::User, "user", user, &mut errors),
            None => errors.push("user: missing user record".to_string()),
        }
    }

    for kind in EntityKind::TOPOLOGICAL {
        if kind == EntityKind::User && snapshot.is_user_snapshot() {
            continue;
        }
        for (i, row) in snapshot.rows(kind).iter().enumerate() {
            let location = format!("{}[{}]", kind.snapshot_key(), i);
            check_row(kind, &location, row, &mut errors);
        }
    }

    ValidationReport::from_errors(
        Some(snapshot.backup_timestamp()),
        Some(snapshot.version().to_string()),
        errors,
        warnings,
    )
}

fn check_row(kind: EntityKind, location: &str, row: &FieldMap, errors: &mut Vec<String>) {
    for field in kind.required_fields() {
        if row.get(*field).map_or(true, |v| v.is_null()) {
            errors.push(format!("{}: missing required field `{}`", location, field));
        }
    }
}
