//! Statement monitoring for any [`Driver`](crate::Driver).
//!
//! [`InstrumentedDriver`] wraps a driver and adds:
//! - `tracing` events on target `relq.sql` (statement, tag, parameter count)
//! - slow-statement warnings
//! - a per-statement timeout
//! - optional counters ([`QueryStats`])
//!
//! # Example
//!
//! ```rust,ignore
//! use relq::monitor::{InstrumentedDriver, MonitorConfig};
//! use std::time::Duration;
//!
//! let config = MonitorConfig::new()
//!     .with_query_timeout(Duration::from_secs(30))
//!     .with_slow_query_threshold(Duration::from_millis(200))
//!     .enable_monitoring();
//!
//! let driver = InstrumentedDriver::new(client).with_config(config);
//! let rows = select_from("persons")?.fetch_all(&driver).await?;
//! println!("{:?}", driver.stats());
//! ```

mod config;
mod instrumented;
mod stats;

pub use config::MonitorConfig;
pub use instrumented::InstrumentedDriver;
pub use stats::{QueryStats, StatsCollector};

/// Kind of statement, detected from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl QueryType {
    /// Detect the statement kind. For `WITH ...` the keyword after the CTE
    /// list decides.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start();
        if starts_with_keyword(trimmed, "WITH") {
            return Self::after_ctes(trimmed);
        }
        Self::from_keyword(trimmed).unwrap_or(QueryType::Other)
    }

    fn from_keyword(s: &str) -> Option<Self> {
        [
            ("SELECT", QueryType::Select),
            ("INSERT", QueryType::Insert),
            ("UPDATE", QueryType::Update),
            ("DELETE", QueryType::Delete),
        ]
        .into_iter()
        .find(|(kw, _)| starts_with_keyword(s, kw))
        .map(|(_, t)| t)
    }

    fn after_ctes(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut depth = 0i32;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    // `,` starts another CTE, `AS` follows a column list
                    if depth == 0 {
                        let rest = sql[i + 1..].trim_start();
                        if !rest.starts_with(',') && !starts_with_keyword(rest, "AS") {
                            return Self::from_keyword(rest).unwrap_or(QueryType::Select);
                        }
                    }
                }
                quote @ (b'\'' | b'"') => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote {
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        QueryType::Select
    }
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    s.len() >= keyword.len()
        && s.as_bytes()[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
        && s.as_bytes()
            .get(keyword.len())
            .is_none_or(|b| !b.is_ascii_alphanumeric() && *b != b'_')
}

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
