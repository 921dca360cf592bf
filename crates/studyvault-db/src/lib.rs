//! # studyvault-db
//!
//! Store backends for the studyvault backup engine.
//!
//! This crate provides:
//! - [`PoolConfig`], connection settings for the PostgreSQL pool
//! - [`PgBackupStore`], the PostgreSQL store with per-row savepoints
//! - [`MemoryStore`], an in-memory store with the same relational rules
//!
//! ## Example
//!
//! ```rust,ignore
//! use studyvault_db::{BackupStore, PgBackupStore, Scope, EntityKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PgBackupStore::connect("postgres://localhost/studyvault").await?;
//!     let mut tx = store.begin_read().await?;
//!     let users = tx.fetch_rows(EntityKind::User, Scope::All).await?;
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```
pub mod memory;
pub mod pg_store;
pub mod pool;
mod rows;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) and other crates can use them
pub mod test_fixtures;

pub use memory::{MemoryStore, MemoryTransaction};
pub use pg_store::{PgBackupStore, PgStoreTransaction};
pub use pool::PoolConfig;

// Re-export core types
pub use studyvault_core::*;
