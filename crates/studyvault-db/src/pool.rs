//! Connection settings for [`PgBackupStore`](crate::PgBackupStore).
//!
//! Export holds one connection for its read transaction and restore one for
//! its write transaction, so the pool stays small and keeps no idle floor.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use studyvault_core::defaults::{DB_CONNECT_TIMEOUT_SECS, DB_MAX_CONNECTIONS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long to wait for a free connection, including the first connect.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DB_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DB_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped to at least one connection.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n.max(1);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub(crate) fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(0)
            .acquire_timeout(self.acquire_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config_uses_shared_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, DB_MAX_CONNECTIONS);
        assert_eq!(
            config.acquire_timeout,
            Duration::from_secs(DB_CONNECT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_options_follow_config() {
        let options = PoolConfig::new()
            .max_connections(0)
            .acquire_timeout(Duration::from_secs(5))
            .options();

        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_min_connections(), 0);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
    }
}
