//! Clause builders: SELECT / INSERT / UPDATE / DELETE drafts.
//!
//! # Example
//! ```ignore
//! use relq::prelude::*;
//!
//! let people = relq::table("persons")?
//!     .where_map([("first_name", "Test"), ("last_name", "User")])?
//!     .compile()?;
//!
//! let insert = relq::insert_into("persons")?
//!     .row([("first_name", "Jennifer"), ("last_name", "Lawrence")])?
//!     .returning_all()
//!     .compile()?;
//!
//! let wipe = relq::delete_from("books")?.all_rows().compile()?;
//! # Ok::<(), relq::QbError>(())
//! ```

mod clause;
mod cte;
mod delete;
mod filter;
mod insert;
mod select;
mod traits;
mod update;

pub use clause::{
    IntoTableRef, Join, JoinKind, NullsOrder, OrderItem, Projection, SetOp, SetOpKind, SortDir,
    TableRef,
};
pub use cte::{Cte, CteBody};
pub use delete::{DeleteQuery, delete_from};
pub use filter::Filter;
pub use insert::{Cell, ConflictAction, InsertQuery, OnConflict, insert_into};
pub use select::{SelectQuery, select, select_from, table};
pub use traits::Statement;
pub use update::{UpdateQuery, update};

#[cfg(test)]
mod tests;
