use super::config::MonitorConfig;
use super::stats::{QueryStats, StatsCollector};
use super::QueryType;
use crate::driver::Driver;
use crate::error::{QbError, QbResult};
use crate::value::{Record, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::Level;

/// A driver wrapper that logs, times out and counts every statement.
pub struct InstrumentedDriver<D> {
    driver: D,
    config: MonitorConfig,
    stats: Arc<StatsCollector>,
}

impl<D: Driver> InstrumentedDriver<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            config: MonitorConfig::default(),
            stats: Arc::new(StatsCollector::new()),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share counters with another instrumented driver.
    pub fn with_stats(mut self, stats: Arc<StatsCollector>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn inner(&self) -> &D {
        &self.driver
    }

    pub fn into_inner(self) -> D {
        self.driver
    }

    /// Snapshot of the counters. All zero unless monitoring is enabled.
    pub fn stats(&self) -> QueryStats {
        self.stats.snapshot()
    }

    pub fn stats_handle(&self) -> Arc<StatsCollector> {
        Arc::clone(&self.stats)
    }

    fn emit(&self, tag: &str, query_type: QueryType, sql: &str, param_count: usize) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.config.truncate_sql(sql);
        emit_at_level!(
            self.config.level,
            target: "relq.sql",
            query_type = ?query_type,
            tag,
            param_count,
            sql = %sql,
        );
    }

    async fn instrument<T, F>(&self, tag: &str, sql: &str, param_count: usize, fut: F) -> QbResult<T>
    where
        F: Future<Output = QbResult<T>> + Send,
    {
        let query_type = QueryType::from_sql(sql);
        self.emit(tag, query_type, sql, param_count);

        let start = Instant::now();
        let result = match self.config.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(QbError::Timeout(timeout)),
            },
            None => fut.await,
        };
        let elapsed = start.elapsed();

        let slow = self
            .config
            .slow_query_threshold
            .is_some_and(|threshold| elapsed >= threshold);
        if slow {
            tracing::warn!(
                target: "relq.sql",
                tag,
                elapsed_ms = elapsed.as_millis() as u64,
                sql = %self.config.truncate_sql(sql),
                "slow statement"
            );
        }
        if let Err(e) = &result {
            tracing::debug!(
                target: "relq.sql",
                tag,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "statement failed"
            );
        }
        if self.config.monitoring_enabled {
            self.stats
                .record(query_type, elapsed, result.is_ok(), slow, &self.config.truncate_sql(sql));
        }
        result
    }
}

impl<D: Driver> Driver for InstrumentedDriver<D> {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        self.instrument("-", sql, params.len(), self.driver.query(sql, params))
            .await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        self.instrument("-", sql, params.len(), self.driver.execute(sql, params))
            .await
    }

    async fn query_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        self.instrument(tag, sql, params.len(), self.driver.query_tagged(tag, sql, params))
            .await
    }
}
