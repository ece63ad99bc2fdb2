//! Running a [`GraphPlan`] against a [`Driver`].

use crate::driver::Driver;
use crate::error::{QbError, QbResult};
use crate::graph::node::GraphNode;
use crate::graph::plan::{Batch, GraphPlan, Slot, plan_graph};
use crate::query::{Cell, InsertQuery};
use crate::relation::RelationRegistry;
use crate::value::{Record, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Options for [`insert_graph`].
#[derive(Debug, Clone, Default)]
pub struct GraphInsertOptions {
    /// Per-batch timeout. `None` waits as long as the driver does.
    pub statement_timeout: Option<Duration>,
}

impl GraphInsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }
}

/// What one batch inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub table: String,
    pub wave: usize,
    pub rows: usize,
}

/// Result of a successful graph insert.
#[derive(Debug, Clone, Default)]
pub struct GraphInsertReport {
    pub batches: Vec<BatchReport>,
    /// Inserted record per node id (preorder over the input forest).
    pub nodes: Vec<Record>,
    refs: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl GraphInsertReport {
    pub fn node(&self, id: usize) -> Option<&Record> {
        self.nodes.get(id)
    }

    /// Record inserted for the node declaring `#id` = `ref_id`.
    pub fn by_ref(&self, ref_id: &str) -> Option<&Record> {
        self.refs.get(ref_id).and_then(|&id| self.nodes.get(id))
    }

    /// Records of the top-level nodes, in input order.
    pub fn roots(&self) -> impl Iterator<Item = &Record> {
        self.roots.iter().filter_map(|&id| self.nodes.get(id))
    }

    pub fn total_rows(&self) -> usize {
        self.batches.iter().map(|b| b.rows).sum()
    }
}

/// Plan and insert `forest` in dependency order.
///
/// Planning errors are returned before any statement is issued. Pass a
/// transaction as `driver` to make the whole graph atomic; on failure the
/// error lists the tables whose batches already ran.
pub async fn insert_graph<D: Driver>(
    driver: &D,
    registry: &RelationRegistry,
    forest: &[GraphNode],
    options: &GraphInsertOptions,
) -> QbResult<GraphInsertReport> {
    let plan = plan_graph(registry, forest)?;
    execute_plan(driver, &plan, options).await
}

/// Run an already computed plan.
pub async fn execute_plan<D: Driver>(
    driver: &D,
    plan: &GraphPlan,
    options: &GraphInsertOptions,
) -> QbResult<GraphInsertReport> {
    tracing::debug!(
        target: "relq.graph",
        nodes = plan.node_count(),
        rows = plan.rows().len(),
        batches = plan.batches().len(),
        waves = plan.wave_count(),
        "graph insert planned"
    );

    let mut inserted: Vec<Option<Record>> = vec![None; plan.node_count()];
    let mut committed: Vec<String> = Vec::new();
    let mut reports = Vec::with_capacity(plan.batches().len());

    for batch in plan.batches() {
        let table = batch.table.to_string();
        tracing::debug!(
            target: "relq.graph",
            wave = batch.wave,
            table = %table,
            rows = batch.rows.len(),
            "inserting batch"
        );

        let returned = match run_batch(driver, plan, batch, &inserted, options).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    target: "relq.graph",
                    wave = batch.wave,
                    table = %table,
                    committed = ?committed,
                    error = %e,
                    "graph insert batch failed"
                );
                return Err(QbError::GraphInsertFailed {
                    table,
                    committed,
                    source: Box::new(e),
                });
            }
        };

        for (&row_idx, record) in batch.rows.iter().zip(returned) {
            if let Some(node) = plan.rows()[row_idx].node {
                inserted[node] = Some(record);
            }
        }
        reports.push(BatchReport {
            table: table.clone(),
            wave: batch.wave,
            rows: batch.rows.len(),
        });
        if !committed.contains(&table) {
            committed.push(table);
        }
    }

    let nodes = inserted
        .into_iter()
        .enumerate()
        .map(|(id, record)| {
            record.ok_or_else(|| QbError::invalid_graph(format!("node {id} was never inserted")))
        })
        .collect::<QbResult<Vec<_>>>()?;

    tracing::info!(
        target: "relq.graph",
        batches = reports.len(),
        nodes = nodes.len(),
        "graph insert finished"
    );

    Ok(GraphInsertReport {
        batches: reports,
        nodes,
        refs: plan.refs.clone(),
        roots: plan.roots().to_vec(),
    })
}

async fn run_batch<D: Driver>(
    driver: &D,
    plan: &GraphPlan,
    batch: &Batch,
    inserted: &[Option<Record>],
    options: &GraphInsertOptions,
) -> QbResult<Vec<Record>> {
    let stmt = batch_statement(plan, batch, inserted)?.compile()?;
    let tag = format!("graph:{}", batch.table);
    let query = driver.query_tagged(&tag, &stmt.sql, &stmt.params);
    let rows = match options.statement_timeout {
        Some(timeout) => tokio::time::timeout(timeout, query)
            .await
            .map_err(|_| QbError::Timeout(timeout))??,
        None => query.await?,
    };

    if rows.len() != batch.rows.len() {
        return Err(QbError::invalid_graph(format!(
            "expected {} returned row(s) from '{}', got {}",
            batch.rows.len(),
            batch.table,
            rows.len()
        )));
    }
    Ok(rows)
}

/// Build the multi-row INSERT for `batch`, filling deferred keys from
/// the records of earlier batches.
fn batch_statement(
    plan: &GraphPlan,
    batch: &Batch,
    inserted: &[Option<Record>],
) -> QbResult<InsertQuery> {
    let mut insert = InsertQuery::new(&batch.table)?.returning_all();
    for &row_idx in &batch.rows {
        let row = &plan.rows()[row_idx];
        let mut cells: Vec<(&str, Cell)> = Vec::with_capacity(row.values.len() + 1);
        for (column, slot) in &row.values {
            let value = match slot {
                Slot::Value(v) => v.clone(),
                Slot::KeyOf { node, column: key } => resolve_key(plan, inserted, *node, key)?,
            };
            cells.push((column.as_str(), Cell::Value(value)));
        }
        if cells.is_empty() {
            if let Some(key) = &batch.key {
                cells.push((key.as_str(), Cell::Default));
            }
        }
        insert = insert.row(cells)?;
    }
    Ok(insert)
}

fn resolve_key(
    plan: &GraphPlan,
    inserted: &[Option<Record>],
    node: usize,
    column: &str,
) -> QbResult<Value> {
    let entity = plan.entity_of(node).unwrap_or("?");
    let record = inserted
        .get(node)
        .and_then(Option::as_ref)
        .ok_or_else(|| {
            QbError::invalid_graph(format!("{entity}#{node} is needed before it was inserted"))
        })?;
    match record.get(column) {
        Some(Value::Null) | None => Err(QbError::invalid_graph(format!(
            "{entity}#{node} returned no value for key column '{column}'"
        ))),
        Some(v) => Ok(v.clone()),
    }
}
