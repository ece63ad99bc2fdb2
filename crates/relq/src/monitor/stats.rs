use super::QueryType;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of collected statement statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    pub total_queries: u64,
    pub failed_queries: u64,
    /// Statements at or above the slow threshold.
    pub slow_queries: u64,
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    pub max_duration: Duration,
    /// SQL of the slowest statement, as logged.
    pub slowest_query: Option<String>,
}

/// Lock-free statement counters shared by clones of an instrumented driver.
#[derive(Debug, Default)]
pub struct StatsCollector {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    slow_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, query_type: QueryType, duration: Duration, ok: bool, slow: bool, sql: &str) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }
        if slow {
            self.slow_queries.fetch_add(1, Ordering::Relaxed);
        }
        let prev = self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);
        if prev.checked_add(nanos).is_none() {
            self.total_duration_nanos.store(u64::MAX, Ordering::Relaxed);
        }

        let counter = match query_type {
            QueryType::Select => Some(&self.select_count),
            QueryType::Insert => Some(&self.insert_count),
            QueryType::Update => Some(&self.update_count),
            QueryType::Delete => Some(&self.delete_count),
            QueryType::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let prev_max = self.max_duration_nanos.fetch_max(nanos, Ordering::Relaxed);
        if nanos > prev_max {
            if let Ok(mut slowest) = self.slowest_query.lock() {
                *slowest = Some(sql.to_string());
            }
        }
    }

    pub fn snapshot(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            slow_queries: self.slow_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self.slowest_query.lock().ok().and_then(|s| s.clone()),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.failed_queries,
            &self.slow_queries,
            &self.total_duration_nanos,
            &self.select_count,
            &self.insert_count,
            &self.update_count,
            &self.delete_count,
            &self.max_duration_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut slowest) = self.slowest_query.lock() {
            *slowest = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_type_and_tracks_slowest() {
        let stats = StatsCollector::new();
        stats.record(QueryType::Select, Duration::from_millis(5), true, false, "SELECT 1");
        stats.record(QueryType::Insert, Duration::from_millis(50), false, true, "INSERT slow");
        stats.record(QueryType::Select, Duration::from_millis(10), true, false, "SELECT 2");

        let snap = stats.snapshot();
        assert_eq!(snap.total_queries, 3);
        assert_eq!(snap.failed_queries, 1);
        assert_eq!(snap.slow_queries, 1);
        assert_eq!(snap.select_count, 2);
        assert_eq!(snap.insert_count, 1);
        assert_eq!(snap.max_duration, Duration::from_millis(50));
        assert_eq!(snap.slowest_query.as_deref(), Some("INSERT slow"));
        assert_eq!(snap.total_duration, Duration::from_millis(65));

        stats.reset();
        assert_eq!(stats.snapshot(), QueryStats::default());
    }
}
