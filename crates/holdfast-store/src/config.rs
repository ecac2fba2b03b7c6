//! Configuration for the session store.

use chrono::Duration;

use holdfast_session::DEFAULT_MAX_INACTIVE_SECS;

use crate::error::{Result, StoreError};

/// Default name of the sessions table. The attributes table name is derived
/// by appending `_ATTRIBUTES`.
pub const DEFAULT_TABLE_NAME: &str = "HOLDFAST_SESSION";

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name of the sessions table; prefixes every generated statement.
    pub table_name: String,

    /// Max inactive interval applied to sessions created by the store.
    pub default_max_inactive_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            default_max_inactive_interval: Duration::seconds(DEFAULT_MAX_INACTIVE_SECS),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sessions table name.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into().trim().to_string();
        self
    }

    /// Set the max inactive interval for newly created sessions.
    pub fn with_default_max_inactive_interval(mut self, interval: Duration) -> Self {
        self.default_max_inactive_interval = interval;
        self
    }

    /// Validate the configuration. Called at store construction so bad
    /// values fail before first use.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "table name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
