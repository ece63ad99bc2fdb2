//! Graph inserts: nested entities with local `#id` / `#ref` links inserted
//! in dependency order.
//!
//! ```ignore
//! let forest = GraphNode::from_json(&registry, "Person", &json)?;
//! let tx = client.transaction().await?;
//! let report = insert_graph(&tx, &registry, &forest, &GraphInsertOptions::new()).await?;
//! tx.commit().await?;
//! ```

mod exec;
mod node;
mod plan;

pub use exec::{BatchReport, GraphInsertOptions, GraphInsertReport, execute_plan, insert_graph};
pub use node::{GraphChild, GraphNode, ID_KEY, REF_KEY};
pub use plan::{Batch, GraphPlan, PlannedRow, Slot, plan_graph};
