//! Convenient imports for typical `relq` usage.
//!
//! ```ignore
//! use relq::prelude::*;
//! ```

pub use crate::{Driver, Filter, QbError, QbResult, Record, Statement, Value};
pub use crate::{Ident, IntoIdent, JoinKind, Predicate, SortDir};
pub use crate::{delete_from, insert_into, select, select_from, table, update};

pub use crate::{
    FetchOptions, GraphInsertOptions, GraphNode, RelationExpr, RelationRegistry, fetch_graph,
    insert_graph,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
