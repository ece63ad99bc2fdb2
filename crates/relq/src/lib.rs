//! # relq
//!
//! A relational query-builder core for PostgreSQL.
//!
//! ## Features
//!
//! - **Safe SQL**: identifiers are validated and quoted, values are always bound
//!   as `$n` parameters
//! - **Predicate trees**: nested AND/OR/NOT groups with deterministic
//!   parenthesization
//! - **Drafts**: SELECT (joins, grouping, unions, CTEs), INSERT (multi-row,
//!   upsert, RETURNING), UPDATE and DELETE, compiled to `(sql, params)`
//! - **Graph inserts**: nested entities with `#id` / `#ref` links inserted
//!   in dependency order
//! - **Eager fetch**: load related rows with relation expressions like
//!   `[children.[pets, movies], parent]`
//! - **Monitoring**: `tracing` events, slow-statement warnings and timeouts
//!
//! ## Query builder
//!
//! ```ignore
//! use relq::prelude::*;
//!
//! let adults = relq::table("persons")?
//!     .where_op("age", ">=", 18)?
//!     .order_by("last_name", SortDir::Asc)?
//!     .limit(10)
//!     .fetch_all(&client)
//!     .await?;
//!
//! relq::update("persons")?
//!     .set("last_name", "Cooper")?
//!     .where_eq("id", 7)?
//!     .execute(&client)
//!     .await?;
//! ```
//!
//! ## Graph insert
//!
//! ```ignore
//! let registry = RelationRegistry::from_toml_str(&std::fs::read_to_string("relations.toml")?)?;
//! let forest = GraphNode::from_json(&registry, "Person", &json)?;
//! let tx = client.transaction().await?;
//! let report = insert_graph(&tx, &registry, &forest, &GraphInsertOptions::new()).await?;
//! tx.commit().await?;
//! ```

pub mod compile;
pub mod driver;
pub mod eager;
pub mod error;
pub mod expr;
pub mod graph;
pub mod ident;
pub mod monitor;
pub mod predicate;
pub mod prelude;
pub mod query;
pub mod relation;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub use compile::{Compile, CompiledStatement, Compiler, compile};
pub use driver::Driver;
pub use eager::{
    EagerPlan, FetchOptions, GraphRecord, Recursion, Related, RelationExpr, RelationNode,
    fetch_graph,
};
pub use error::{QbError, QbResult};
pub use expr::{
    AggregateFn, ColumnRef, CompareOp, Expr, IntoColumn, RawFragment, avg, count, count_all,
    count_distinct, max, min, sum,
};
pub use graph::{
    GraphChild, GraphInsertOptions, GraphInsertReport, GraphNode, GraphPlan, insert_graph,
    plan_graph,
};
pub use ident::{Ident, IntoIdent};
pub use monitor::{InstrumentedDriver, MonitorConfig, QueryStats, QueryType};
pub use predicate::{Combinator, Predicate};
pub use query::{
    Cell, Cte, CteBody, DeleteQuery, Filter, InsertQuery, JoinKind, NullsOrder, SelectQuery,
    SortDir, Statement, TableRef, UpdateQuery, delete_from, insert_into, select, select_from,
    table, update,
};
pub use relation::{EntityMeta, Relation, RelationKind, RelationRegistry, Through};
pub use value::{Key, Record, Value};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_tls};
