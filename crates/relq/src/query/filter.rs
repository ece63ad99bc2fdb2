//! The where-family shared by SELECT, UPDATE and DELETE drafts.

use crate::error::QbResult;
use crate::expr::IntoColumn;
use crate::predicate::Predicate;
use crate::query::SelectQuery;
use crate::value::Value;

/// Drafts that own a WHERE root.
///
/// `where_*` calls AND the new predicate into the existing root, `or_where*`
/// calls OR it. Every call fails with
/// [`QbError::NoActiveFilterTarget`](crate::QbError::NoActiveFilterTarget)
/// while the draft has no source table.
pub trait Filter: Sized {
    /// The WHERE root slot, or `NoActiveFilterTarget` naming `method`.
    #[doc(hidden)]
    fn where_root_mut(&mut self, method: &'static str) -> QbResult<&mut Option<Predicate>>;

    #[doc(hidden)]
    fn push_where(
        mut self,
        method: &'static str,
        predicate: impl FnOnce() -> QbResult<Predicate>,
        or: bool,
    ) -> QbResult<Self> {
        let slot = self.where_root_mut(method)?;
        let predicate = predicate()?;
        *slot = Some(match slot.take() {
            None => predicate,
            Some(existing) if or => existing.or_with(predicate),
            Some(existing) => existing.and_with(predicate),
        });
        Ok(self)
    }

    /// AND `predicate` into WHERE.
    fn where_(self, predicate: Predicate) -> QbResult<Self> {
        self.push_where("where_", || Ok(predicate), false)
    }

    /// OR `predicate` into WHERE.
    fn or_where(self, predicate: Predicate) -> QbResult<Self> {
        self.push_where("or_where", || Ok(predicate), true)
    }

    /// `column = value`
    fn where_eq(self, column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        self.push_where("where_eq", || Predicate::eq(column, value), false)
    }

    fn or_where_eq(self, column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        self.push_where("or_where_eq", || Predicate::eq(column, value), true)
    }

    /// `column <op> value`, e.g. `where_op("age", ">", 40)`.
    fn where_op(self, column: impl IntoColumn, op: &str, value: impl Into<Value>) -> QbResult<Self> {
        self.push_where("where_op", || Predicate::compare(column, op, value), false)
    }

    fn or_where_op(
        self,
        column: impl IntoColumn,
        op: &str,
        value: impl Into<Value>,
    ) -> QbResult<Self> {
        self.push_where("or_where_op", || Predicate::compare(column, op, value), true)
    }

    /// Object form: every pair becomes `column = value`, ANDed in pair order.
    fn where_map<C, V>(mut self, pairs: impl IntoIterator<Item = (C, V)>) -> QbResult<Self>
    where
        C: IntoColumn,
        V: Into<Value>,
    {
        self.where_root_mut("where_map")?;
        for (column, value) in pairs {
            self = self.push_where("where_map", || Predicate::eq(column, value), false)?;
        }
        Ok(self)
    }

    fn where_in<V: Into<Value>>(
        self,
        column: impl IntoColumn,
        values: impl IntoIterator<Item = V>,
    ) -> QbResult<Self> {
        self.push_where("where_in", || Predicate::in_list(column, values), false)
    }

    fn where_not_in<V: Into<Value>>(
        self,
        column: impl IntoColumn,
        values: impl IntoIterator<Item = V>,
    ) -> QbResult<Self> {
        self.push_where("where_not_in", || Predicate::not_in(column, values), false)
    }

    fn where_in_query(self, column: impl IntoColumn, query: SelectQuery) -> QbResult<Self> {
        self.push_where("where_in_query", || Predicate::in_query(column, query), false)
    }

    fn where_null(self, column: impl IntoColumn) -> QbResult<Self> {
        self.push_where("where_null", || Predicate::is_null(column), false)
    }

    fn where_not_null(self, column: impl IntoColumn) -> QbResult<Self> {
        self.push_where("where_not_null", || Predicate::is_not_null(column), false)
    }

    fn where_between(
        self,
        column: impl IntoColumn,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> QbResult<Self> {
        self.push_where(
            "where_between",
            || Predicate::between(column, low, high),
            false,
        )
    }

    fn where_exists(self, query: SelectQuery) -> QbResult<Self> {
        self.push_where("where_exists", || Ok(Predicate::exists(query)), false)
    }

    fn where_not_exists(self, query: SelectQuery) -> QbResult<Self> {
        self.push_where("where_not_exists", || Ok(Predicate::not_exists(query)), false)
    }

    /// Raw condition with `?` placeholders.
    fn where_raw(self, sql: impl Into<String>, params: Vec<Value>) -> QbResult<Self> {
        self.push_where("where_raw", || Ok(Predicate::raw(sql, params)), false)
    }

    fn or_where_raw(self, sql: impl Into<String>, params: Vec<Value>) -> QbResult<Self> {
        self.push_where("or_where_raw", || Ok(Predicate::raw(sql, params)), true)
    }
}
