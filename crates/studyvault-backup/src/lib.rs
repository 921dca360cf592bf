//! # studyvault-backup
//!
//! The backup engine: export a store to snapshot documents, restore them with
//! foreign-key remapping, and keep the backup directory within its retention
//! limits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use studyvault_backup::{BackupConfig, BackupService};
//! use studyvault_db::PgBackupStore;
//!
//! let store = PgBackupStore::connect("postgres://localhost/studyvault").await?;
//! let service = BackupService::new(Arc::new(store), BackupConfig::from_env());
//! let path = service.create_backup().await?;
//! let report = service.validate_backup(&path).await?;
//! assert!(report.valid);
//! ```

pub mod config;
pub mod exporter;
pub mod files;
pub mod importer;
pub mod retention;
pub mod service;

pub use config::BackupConfig;
pub use exporter::export;
pub use importer::{restore, IdMapping, RecoveryResult, RestoreMode, RestorePhase};
pub use retention::{BackupFileInfo, BackupStats};
pub use service::BackupService;
