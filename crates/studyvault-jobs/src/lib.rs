//! # studyvault-jobs
//!
//! Scheduled backups for studyvault.
//!
//! This crate provides:
//! - Daily, weekly and monthly full backups at configurable wall-clock times
//! - Periodic retention cleanup
//! - Progress notifications via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use studyvault_jobs::{BackupScheduler, ScheduleConfig};
//!
//! let scheduler = BackupScheduler::new(service, ScheduleConfig::from_env());
//! let handle = scheduler.start();
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod config;
pub mod schedule;
pub mod scheduler;

pub use config::ScheduleConfig;
pub use schedule::{next_daily, next_monthly, next_weekly, ScheduledTask};
pub use scheduler::{BackupScheduler, ScheduleStatus, SchedulerEvent, SchedulerHandle};
