//! UPDATE draft.

use crate::compile::{CompiledStatement, compile};
use crate::error::QbResult;
use crate::expr::{Expr, RawFragment};
use crate::ident::{Ident, IntoIdent};
use crate::predicate::Predicate;
use crate::query::clause::Projection;
use crate::query::filter::Filter;
use crate::query::traits::Statement;
use crate::value::Value;

/// An UPDATE statement under construction.
///
/// Compiling without any `set` call fails with `IncompleteStatement`.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct UpdateQuery {
    pub(crate) table: Ident,
    pub(crate) sets: Vec<(Ident, Expr)>,
    pub(crate) where_root: Option<Predicate>,
    pub(crate) returning: Vec<Projection>,
}

impl UpdateQuery {
    pub fn new(table: impl IntoIdent) -> QbResult<Self> {
        Ok(Self {
            table: table.into_ident()?,
            sets: Vec::new(),
            where_root: None,
            returning: Vec::new(),
        })
    }

    /// `SET column = $n`. Setting the same column again replaces the value.
    pub fn set(mut self, column: impl IntoIdent, value: impl Into<Value>) -> QbResult<Self> {
        self.push_set(column.into_ident()?, Expr::val(value));
        Ok(self)
    }

    /// `SET column = <raw sql>`, e.g. `set_raw("age", "age + ?", vec![1.into()])`.
    pub fn set_raw(
        mut self,
        column: impl IntoIdent,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> QbResult<Self> {
        self.push_set(column.into_ident()?, Expr::Raw(RawFragment::new(sql, params)));
        Ok(self)
    }

    fn push_set(&mut self, column: Ident, expr: Expr) {
        match self.sets.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = expr,
            None => self.sets.push((column, expr)),
        }
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

impl Filter for UpdateQuery {
    fn where_root_mut(&mut self, _method: &'static str) -> QbResult<&mut Option<Predicate>> {
        Ok(&mut self.where_root)
    }
}

impl Statement for UpdateQuery {
    fn build(&self) -> QbResult<CompiledStatement> {
        compile(self)
    }
}

/// Start an UPDATE of `table`.
pub fn update(table: impl IntoIdent) -> QbResult<UpdateQuery> {
    UpdateQuery::new(table)
}
