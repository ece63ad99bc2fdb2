//! In-memory driver for integration tests.
//!
//! INSERT statements echo their rows back with a generated `id`, every
//! other statement pops the next scripted response.
#![allow(dead_code)]

use relq::{Driver, QbError, QbResult, Record, RelationRegistry, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

pub const RELATIONS: &str = include_str!("../fixtures/relations.toml");

pub fn registry() -> RelationRegistry {
    RelationRegistry::from_toml_str(RELATIONS).expect("fixture registry")
}

#[derive(Debug, Clone)]
pub struct Issued {
    pub tag: String,
    pub sql: String,
    pub params: Vec<Value>,
}

pub struct MockDriver {
    issued: Mutex<Vec<Issued>>,
    responses: Mutex<VecDeque<Vec<Record>>>,
    next_id: AtomicI64,
    fail_table: Option<String>,
    delay: Option<Duration>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            issued: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            next_id: AtomicI64::new(1),
            fail_table: None,
            delay: None,
        }
    }

    /// Fail every INSERT into `table`.
    pub fn failing_on(mut self, table: &str) -> Self {
        self.fail_table = Some(table.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the rows returned by the next non-INSERT statement.
    pub fn respond(&self, rows: Vec<Record>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    pub fn issued(&self) -> Vec<Issued> {
        self.issued.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.issued().into_iter().map(|i| i.sql).collect()
    }

    pub fn tags(&self) -> Vec<String> {
        self.issued().into_iter().map(|i| i.tag).collect()
    }

    async fn run(&self, tag: &str, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        self.issued.lock().unwrap().push(Issued {
            tag: tag.to_string(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((table, rows)) = parse_insert(sql, params) {
            if self.fail_table.as_deref() == Some(table.as_str()) {
                return Err(QbError::decode(table, "injected failure"));
            }
            return Ok(rows
                .into_iter()
                .map(|mut record| {
                    if record.get("id").is_none() {
                        record.insert("id", self.next_id.fetch_add(1, Ordering::SeqCst));
                    }
                    record
                })
                .collect());
        }

        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }
}

impl Driver for MockDriver {
    async fn query(&self, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        self.run("-", sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QbResult<u64> {
        Ok(self.run("-", sql, params).await?.len() as u64)
    }

    async fn query_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> QbResult<Vec<Record>> {
        self.run(tag, sql, params).await
    }
}

/// Decode `INSERT INTO "t" ("a", "b") VALUES ($1, DEFAULT), ...` into the
/// records it would create. DEFAULT cells are left out.
fn parse_insert(sql: &str, params: &[Value]) -> Option<(String, Vec<Record>)> {
    let rest = sql.strip_prefix("INSERT INTO ")?;
    let (table, rest) = rest.split_once(' ')?;
    let table = table.trim_matches('"').to_string();
    let rest = rest.split(" RETURNING").next()?;
    let rest = rest.split(" ON CONFLICT").next()?;

    if rest.starts_with("DEFAULT VALUES") {
        return Some((table, vec![Record::new()]));
    }

    let (columns, values) = rest.split_once(") VALUES ")?;
    let columns: Vec<&str> = columns
        .trim_start_matches('(')
        .split(", ")
        .map(|c| c.trim_matches('"'))
        .collect();
    let values = values.trim_start_matches('(').trim_end_matches(')');

    let rows = values
        .split("), (")
        .map(|row| {
            let mut record = Record::new();
            for (column, cell) in columns.iter().zip(row.split(", ")) {
                if cell == "DEFAULT" {
                    continue;
                }
                let value = cell
                    .strip_prefix('$')
                    .and_then(|n| n.parse::<usize>().ok())
                    .and_then(|n| params.get(n - 1).cloned())
                    .unwrap_or(Value::Null);
                record.insert(*column, value);
            }
            record
        })
        .collect();
    Some((table, rows))
}

pub fn record<const N: usize>(pairs: [(&str, Value); N]) -> Record {
    pairs.into_iter().collect()
}
