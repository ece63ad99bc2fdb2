//! SELECT draft.

use crate::compile::{CompiledStatement, compile};
use crate::error::{QbError, QbResult};
use crate::expr::{Expr, IntoColumn, RawFragment};
use crate::ident::IntoIdent;
use crate::predicate::Predicate;
use crate::query::clause::{
    IntoTableRef, Join, JoinKind, NullsOrder, OrderItem, Projection, SetOp, SetOpKind, SortDir,
    TableRef,
};
use crate::query::cte::{Cte, CteBody};
use crate::query::filter::Filter;
use crate::query::traits::Statement;
use crate::value::Value;

/// A SELECT statement under construction.
///
/// Builder calls consume the draft and hand it back, so a chain owns exactly
/// one draft. Calls that can violate an invariant return `QbResult<Self>` and
/// fail right away.
///
/// ```ignore
/// use relq::prelude::*;
///
/// let q = relq::table("persons")?
///     .columns(["persons.first_name", "pets.name as pet"])?
///     .inner_join("animals as pets", Predicate::columns("pets.owner_id", "=", "persons.id")?)?
///     .where_eq("persons.last_name", "Lawrence")?
///     .order_by("pets.name", SortDir::Asc)?;
/// let stmt = q.compile()?;
/// # Ok::<(), relq::QbError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use]
pub struct SelectQuery {
    pub(crate) ctes: Vec<Cte>,
    pub(crate) distinct: bool,
    pub(crate) projections: Vec<Projection>,
    pub(crate) from: Option<TableRef>,
    pub(crate) joins: Vec<Join>,
    pub(crate) where_root: Option<Predicate>,
    pub(crate) group_by: Vec<Expr>,
    pub(crate) having_root: Option<Predicate>,
    pub(crate) set_ops: Vec<SetOp>,
    pub(crate) order_by: Vec<OrderItem>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl SelectQuery {
    /// An empty draft with no source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base source, e.g. `"persons"` or `"persons as p"`.
    pub fn from(mut self, source: impl IntoTableRef) -> QbResult<Self> {
        self.from = Some(source.into_table_ref()?);
        Ok(self)
    }

    /// Use an aliased subquery as the base source.
    pub fn from_subquery(mut self, query: SelectQuery, alias: impl IntoIdent) -> QbResult<Self> {
        self.from = Some(TableRef::subquery(query, alias)?);
        Ok(self)
    }

    pub fn has_source(&self) -> bool {
        self.from.is_some()
    }

    pub fn source(&self) -> Option<&TableRef> {
        self.from.as_ref()
    }

    /// Append projections parsed from strings (`"*"`, `"t.*"`, `"a as b"`).
    pub fn columns<I>(mut self, columns: I) -> QbResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for column in columns {
            self.projections.push(Projection::parse(column.as_ref())?);
        }
        Ok(self)
    }

    /// Append `column AS alias`.
    pub fn column_as(mut self, column: impl IntoColumn, alias: impl IntoIdent) -> QbResult<Self> {
        let column = column.into_column()?.alias(alias)?;
        self.projections.push(Projection::Column(column));
        Ok(self)
    }

    /// Append an arbitrary expression (aggregate, subquery, raw) with an alias.
    pub fn select_expr(mut self, expr: impl Into<Expr>, alias: impl IntoIdent) -> QbResult<Self> {
        self.projections.push(Projection::Expr {
            expr: expr.into(),
            alias: Some(alias.into_ident()?),
        });
        Ok(self)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a join. `on` must be present unless `kind` is [`JoinKind::Cross`],
    /// and it may only qualify columns with the base source, earlier join
    /// targets or this join's own target.
    pub fn join(
        mut self,
        kind: JoinKind,
        target: impl IntoTableRef,
        on: Option<Predicate>,
    ) -> QbResult<Self> {
        let target = target.into_table_ref()?;
        if self.from.is_none() {
            return Err(QbError::invalid_join(format!(
                "cannot join '{}' before a FROM source is set",
                target.binding_name()
            )));
        }
        match (kind, &on) {
            (JoinKind::Cross, Some(_)) => {
                return Err(QbError::invalid_join("CROSS JOIN does not take an ON predicate"));
            }
            (JoinKind::Cross, None) => {}
            (_, None) => {
                return Err(QbError::invalid_join(format!(
                    "{} '{}' requires an ON predicate",
                    kind.as_sql(),
                    target.binding_name()
                )));
            }
            (_, Some(predicate)) => self.check_join_refs(&target, predicate)?,
        }
        self.joins.push(Join { kind, target, on });
        Ok(self)
    }

    fn check_join_refs(&self, target: &TableRef, on: &Predicate) -> QbResult<()> {
        let mut refs = Vec::new();
        on.column_refs(&mut refs);
        for column in refs {
            let Some(qualifier) = column.table() else {
                continue;
            };
            let known = self
                .from
                .iter()
                .chain(self.joins.iter().map(|j| &j.target))
                .chain(std::iter::once(target))
                .any(|source| source.matches_qualifier(&qualifier));
            if !known {
                return Err(QbError::invalid_join(format!(
                    "ON predicate of '{}' references '{qualifier}', which is not joined yet",
                    target.binding_name()
                )));
            }
        }
        Ok(())
    }

    pub fn inner_join(self, target: impl IntoTableRef, on: Predicate) -> QbResult<Self> {
        self.join(JoinKind::Inner, target, Some(on))
    }

    pub fn left_join(self, target: impl IntoTableRef, on: Predicate) -> QbResult<Self> {
        self.join(JoinKind::Left, target, Some(on))
    }

    pub fn right_join(self, target: impl IntoTableRef, on: Predicate) -> QbResult<Self> {
        self.join(JoinKind::Right, target, Some(on))
    }

    pub fn full_join(self, target: impl IntoTableRef, on: Predicate) -> QbResult<Self> {
        self.join(JoinKind::Full, target, Some(on))
    }

    pub fn cross_join(self, target: impl IntoTableRef) -> QbResult<Self> {
        self.join(JoinKind::Cross, target, None)
    }

    /// Append GROUP BY columns.
    pub fn group_by<I>(mut self, columns: I) -> QbResult<Self>
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        for column in columns {
            self.group_by.push(Expr::col(column)?);
        }
        Ok(self)
    }

    fn push_having(mut self, predicate: Predicate, or: bool) -> QbResult<Self> {
        if self.group_by.is_empty() {
            return Err(QbError::HavingWithoutGroupBy);
        }
        self.having_root = Some(match self.having_root.take() {
            None => predicate,
            Some(existing) if or => existing.or_with(predicate),
            Some(existing) => existing.and_with(predicate),
        });
        Ok(self)
    }

    /// AND `predicate` into HAVING. Requires at least one GROUP BY column.
    pub fn having(self, predicate: Predicate) -> QbResult<Self> {
        self.push_having(predicate, false)
    }

    pub fn or_having(self, predicate: Predicate) -> QbResult<Self> {
        self.push_having(predicate, true)
    }

    pub fn having_raw(self, sql: impl Into<String>, params: Vec<Value>) -> QbResult<Self> {
        self.push_having(Predicate::raw(sql, params), false)
    }

    pub fn order_by(mut self, column: impl IntoColumn, dir: SortDir) -> QbResult<Self> {
        self.order_by.push(OrderItem::new(column, dir)?);
        Ok(self)
    }

    pub fn order_by_nulls(
        mut self,
        column: impl IntoColumn,
        dir: SortDir,
        nulls: NullsOrder,
    ) -> QbResult<Self> {
        self.order_by.push(OrderItem::Column {
            column: column.into_column()?,
            dir,
            nulls: Some(nulls),
        });
        Ok(self)
    }

    pub fn order_by_raw(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.order_by.push(OrderItem::Raw(RawFragment::new(sql, params)));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// `... UNION other`
    pub fn union(mut self, other: SelectQuery) -> Self {
        self.set_ops.push(SetOp {
            kind: SetOpKind::Union,
            query: Box::new(other),
        });
        self
    }

    /// `... UNION ALL other`
    pub fn union_all(mut self, other: SelectQuery) -> Self {
        self.set_ops.push(SetOp {
            kind: SetOpKind::UnionAll,
            query: Box::new(other),
        });
        self
    }

    /// Bind a CTE: `WITH alias AS (body)`.
    pub fn with(self, alias: impl IntoIdent, body: impl Into<CteBody>) -> QbResult<Self> {
        self.with_cte(Cte::new(alias, body)?)
    }

    /// Bind a recursive CTE. The body must reference `alias` at least once.
    pub fn with_recursive(self, alias: impl IntoIdent, body: impl Into<CteBody>) -> QbResult<Self> {
        self.with_cte(Cte::new(alias, body)?.recursive())
    }

    /// Bind a fully configured [`Cte`].
    pub fn with_cte(mut self, cte: Cte) -> QbResult<Self> {
        if self.ctes.iter().any(|c| c.alias == cte.alias) {
            return Err(QbError::DuplicateCte(cte.alias.to_string()));
        }
        if cte.recursive && !cte.body.references(cte.alias.name()) {
            return Err(QbError::InvalidRecursiveCte(cte.alias.to_string()));
        }
        self.ctes.push(cte);
        Ok(self)
    }

    pub fn where_predicate(&self) -> Option<&Predicate> {
        self.where_root.as_ref()
    }

    pub fn having_predicate(&self) -> Option<&Predicate> {
        self.having_root.as_ref()
    }

    /// Compile into SQL text and parameters.
    pub fn compile(&self) -> QbResult<CompiledStatement> {
        compile(self)
    }

    /// Whether this draft needs parentheses when used as a set operation member.
    pub(crate) fn needs_parens_in_set_op(&self) -> bool {
        !self.ctes.is_empty()
            || !self.set_ops.is_empty()
            || !self.order_by.is_empty()
            || self.limit.is_some()
            || self.offset.is_some()
    }

    /// Whether any source, subquery or raw fragment of this draft reads `relation`.
    pub(crate) fn references(&self, relation: &str) -> bool {
        let sources = self
            .from
            .iter()
            .chain(self.joins.iter().map(|j| &j.target))
            .any(|s| s.references(relation));
        let predicates = self
            .where_root
            .iter()
            .chain(self.having_root.iter())
            .chain(self.joins.iter().filter_map(|j| j.on.as_ref()))
            .any(|p| p.references(relation));
        sources
            || predicates
            || self.projections.iter().any(|p| p.references(relation))
            || self.set_ops.iter().any(|op| op.query.references(relation))
            || self.ctes.iter().any(|c| c.body.references(relation))
    }
}

impl Filter for SelectQuery {
    fn where_root_mut(&mut self, method: &'static str) -> QbResult<&mut Option<Predicate>> {
        if self.from.is_none() {
            return Err(QbError::NoActiveFilterTarget(method));
        }
        Ok(&mut self.where_root)
    }
}

impl Statement for SelectQuery {
    fn build(&self) -> QbResult<CompiledStatement> {
        compile(self)
    }
}

/// `SELECT * FROM table`.
pub fn table(name: impl IntoTableRef) -> QbResult<SelectQuery> {
    SelectQuery::new().from(name)
}

/// A draft with projections but no source yet; call [`SelectQuery::from`] next.
pub fn select<I>(columns: I) -> QbResult<SelectQuery>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    SelectQuery::new().columns(columns)
}

/// Same as [`table`].
pub fn select_from(name: impl IntoTableRef) -> QbResult<SelectQuery> {
    table(name)
}
