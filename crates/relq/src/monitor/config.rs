use std::time::Duration;
use tracing::Level;

/// Configuration for [`InstrumentedDriver`](super::InstrumentedDriver).
///
/// Statement logging is always on; counters must be enabled explicitly.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Statement timeout. `None` means no timeout (default).
    pub query_timeout: Option<Duration>,
    /// Statements at or above this duration are logged as warnings.
    pub slow_query_threshold: Option<Duration>,
    /// Whether [`QueryStats`](super::QueryStats) counters are collected.
    pub monitoring_enabled: bool,
    /// Level of the per-statement event.
    pub level: Level,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            slow_query_threshold: None,
            monitoring_enabled: false,
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration with defaults (no timeout, no counters).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the statement timeout.
    ///
    /// A statement running longer is abandoned and returns `QbError::Timeout`.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Enable statistics collection.
    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        self.monitoring_enabled = false;
        self
    }

    /// Override the level of the per-statement event.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Log SQL untruncated.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", super::truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}
