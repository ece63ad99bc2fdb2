//! DELETE draft.

use crate::compile::{CompiledStatement, compile};
use crate::error::QbResult;
use crate::ident::{Ident, IntoIdent};
use crate::predicate::Predicate;
use crate::query::clause::Projection;
use crate::query::filter::Filter;
use crate::query::traits::Statement;

/// A DELETE statement under construction.
///
/// Without a WHERE predicate the draft only compiles after [`DeleteQuery::all_rows`],
/// so an unfiltered delete is always spelled out.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct DeleteQuery {
    pub(crate) table: Ident,
    pub(crate) where_root: Option<Predicate>,
    pub(crate) all_rows: bool,
    pub(crate) returning: Vec<Projection>,
}

impl DeleteQuery {
    pub fn new(table: impl IntoIdent) -> QbResult<Self> {
        Ok(Self {
            table: table.into_ident()?,
            where_root: None,
            all_rows: false,
            returning: Vec::new(),
        })
    }

    /// Allow compiling without a WHERE predicate (`DELETE FROM t`).
    pub fn all_rows(mut self) -> Self {
        self.all_rows = true;
        self
    }

    pub fn returning<I>(mut self, columns: I) -> QbResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for column in columns {
            self.returning.push(Projection::parse(column.as_ref())?);
        }
        Ok(self)
    }

    pub fn returning_all(mut self) -> Self {
        self.returning = vec![Projection::Star];
        self
    }

    pub fn compile(&self) -> QbResult<CompiledStatement> {
        compile(self)
    }
}

impl Filter for DeleteQuery {
    fn where_root_mut(&mut self, _method: &'static str) -> QbResult<&mut Option<Predicate>> {
        Ok(&mut self.where_root)
    }
}

impl Statement for DeleteQuery {
    fn build(&self) -> QbResult<CompiledStatement> {
        compile(self)
    }
}

/// Start a DELETE from `table`.
pub fn delete_from(table: impl IntoIdent) -> QbResult<DeleteQuery> {
    DeleteQuery::new(table)
}
