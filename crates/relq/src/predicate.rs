//! Predicate tree for WHERE / HAVING / JOIN ON conditions.
//!
//! Nodes are immutable values. Groups can only be built through
//! [`Predicate::and`] / [`Predicate::or`], which reject empty input, so a
//! [`Group`] always holds at least one child and compiles to exactly one
//! parenthesised unit.
//!
//! ```ignore
//! use relq::Predicate;
//!
//! let p = Predicate::or([
//!     Predicate::eq("first_name", "Jennifer")?,
//!     Predicate::gt("age", 40)?,
//! ])?;
//! # Ok::<(), relq::QbError>(())
//! ```

use crate::error::{QbError, QbResult};
use crate::expr::{ColumnRef, CompareOp, Expr, IntoColumn, RawFragment};
use crate::query::SelectQuery;
use crate::value::Value;

/// How the children of a [`Group`] are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

/// A non-empty AND / OR group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) children: Vec<Predicate>,
    pub(crate) combinator: Combinator,
}

impl Group {
    pub fn children(&self) -> &[Predicate] {
        &self.children
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }
}

/// Right-hand side of an IN predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum InSet {
    Values(Vec<Value>),
    Query(Box<SelectQuery>),
}

/// Boolean condition node.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison {
        left: Expr,
        op: CompareOp,
        right: Expr,
    },
    In {
        column: Expr,
        set: InSet,
        negated: bool,
    },
    Null {
        column: Expr,
        negated: bool,
    },
    Between {
        column: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },
    Exists {
        subquery: Box<SelectQuery>,
        negated: bool,
    },
    Group(Group),
    Not(Box<Predicate>),
    Raw(RawFragment),
}

impl Predicate {
    /// AND of all `nodes`. Fails on an empty list.
    pub fn and(nodes: impl IntoIterator<Item = Predicate>) -> QbResult<Self> {
        Self::group(nodes, Combinator::And)
    }

    /// OR of all `nodes`. Fails on an empty list.
    pub fn or(nodes: impl IntoIterator<Item = Predicate>) -> QbResult<Self> {
        Self::group(nodes, Combinator::Or)
    }

    fn group(nodes: impl IntoIterator<Item = Predicate>, combinator: Combinator) -> QbResult<Self> {
        let children: Vec<Predicate> = nodes.into_iter().collect();
        if children.is_empty() {
            return Err(QbError::InvalidPredicate(format!(
                "{} group needs at least one predicate",
                combinator.as_sql()
            )));
        }
        Ok(Predicate::Group(Group {
            children,
            combinator,
        }))
    }

    /// Wrap this node in `NOT (...)`.
    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// `column <op> value`, with `op` checked against the operator allow-list.
    pub fn compare(column: impl IntoColumn, op: &str, value: impl Into<Value>) -> QbResult<Self> {
        Ok(Predicate::Comparison {
            left: Expr::col(column)?,
            op: CompareOp::parse(op)?,
            right: Expr::val(value),
        })
    }

    /// Comparison between two arbitrary expressions.
    pub fn compare_expr(left: impl Into<Expr>, op: CompareOp, right: impl Into<Expr>) -> Self {
        Predicate::Comparison {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// Column-to-column comparison, the usual shape of a JOIN condition.
    pub fn columns(left: impl IntoColumn, op: &str, right: impl IntoColumn) -> QbResult<Self> {
        Ok(Predicate::Comparison {
            left: Expr::col(left)?,
            op: CompareOp::parse(op)?,
            right: Expr::col(right)?,
        })
    }

    fn typed(column: impl IntoColumn, op: CompareOp, value: impl Into<Value>) -> QbResult<Self> {
        Ok(Predicate::Comparison {
            left: Expr::col(column)?,
            op,
            right: Expr::val(value),
        })
    }

    pub fn eq(column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Ne, value)
    }

    pub fn gt(column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Gt, value)
    }

    pub fn gte(column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Gte, value)
    }

    pub fn lt(column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Lt, value)
    }

    pub fn lte(column: impl IntoColumn, value: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Lte, value)
    }

    pub fn like(column: impl IntoColumn, pattern: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Like, pattern)
    }

    pub fn ilike(column: impl IntoColumn, pattern: impl Into<Value>) -> QbResult<Self> {
        Self::typed(column, CompareOp::Ilike, pattern)
    }

    /// `column IN (...)`. An empty list compiles to `1=0`.
    pub fn in_list<V: Into<Value>>(
        column: impl IntoColumn,
        values: impl IntoIterator<Item = V>,
    ) -> QbResult<Self> {
        Ok(Predicate::In {
            column: Expr::col(column)?,
            set: InSet::Values(values.into_iter().map(Into::into).collect()),
            negated: false,
        })
    }

    /// `column NOT IN (...)`. An empty list compiles to `1=1`.
    pub fn not_in<V: Into<Value>>(
        column: impl IntoColumn,
        values: impl IntoIterator<Item = V>,
    ) -> QbResult<Self> {
        Ok(Predicate::In {
            column: Expr::col(column)?,
            set: InSet::Values(values.into_iter().map(Into::into).collect()),
            negated: true,
        })
    }

    /// `column IN (subquery)`
    pub fn in_query(column: impl IntoColumn, query: SelectQuery) -> QbResult<Self> {
        Ok(Predicate::In {
            column: Expr::col(column)?,
            set: InSet::Query(Box::new(query)),
            negated: false,
        })
    }

    /// `column NOT IN (subquery)`
    pub fn not_in_query(column: impl IntoColumn, query: SelectQuery) -> QbResult<Self> {
        Ok(Predicate::In {
            column: Expr::col(column)?,
            set: InSet::Query(Box::new(query)),
            negated: true,
        })
    }

    pub fn is_null(column: impl IntoColumn) -> QbResult<Self> {
        Ok(Predicate::Null {
            column: Expr::col(column)?,
            negated: false,
        })
    }

    pub fn is_not_null(column: impl IntoColumn) -> QbResult<Self> {
        Ok(Predicate::Null {
            column: Expr::col(column)?,
            negated: true,
        })
    }

    pub fn between(
        column: impl IntoColumn,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> QbResult<Self> {
        Ok(Predicate::Between {
            column: Expr::col(column)?,
            low: Expr::val(low),
            high: Expr::val(high),
            negated: false,
        })
    }

    pub fn not_between(
        column: impl IntoColumn,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> QbResult<Self> {
        Ok(Predicate::Between {
            column: Expr::col(column)?,
            low: Expr::val(low),
            high: Expr::val(high),
            negated: true,
        })
    }

    pub fn exists(query: SelectQuery) -> Self {
        Predicate::Exists {
            subquery: Box::new(query),
            negated: false,
        }
    }

    pub fn not_exists(query: SelectQuery) -> Self {
        Predicate::Exists {
            subquery: Box::new(query),
            negated: true,
        }
    }

    /// Raw SQL with `?` placeholders, e.g. `raw("age > ? OR age IS NULL", vec![18.into()])`.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Predicate::Raw(RawFragment::new(sql, params))
    }

    /// Equality on every `(column, value)` pair, ANDed in pair order.
    ///
    /// A single pair yields a plain comparison; more than one yields a group.
    pub fn all_eq<C, V>(pairs: impl IntoIterator<Item = (C, V)>) -> QbResult<Self>
    where
        C: IntoColumn,
        V: Into<Value>,
    {
        let mut nodes = pairs
            .into_iter()
            .map(|(c, v)| Self::eq(c, v))
            .collect::<QbResult<Vec<_>>>()?;
        match nodes.len() {
            0 => Err(QbError::InvalidPredicate(
                "equality map needs at least one column".to_string(),
            )),
            1 => Ok(nodes.remove(0)),
            _ => Self::and(nodes),
        }
    }

    /// Combine with AND, extending `self` in place when it already is an AND group.
    pub(crate) fn and_with(self, other: Predicate) -> Predicate {
        self.combine(other, Combinator::And)
    }

    /// Combine with OR, extending `self` in place when it already is an OR group.
    pub(crate) fn or_with(self, other: Predicate) -> Predicate {
        self.combine(other, Combinator::Or)
    }

    fn combine(self, other: Predicate, combinator: Combinator) -> Predicate {
        match self {
            Predicate::Group(mut g) if g.combinator == combinator => {
                g.children.push(other);
                Predicate::Group(g)
            }
            existing => Predicate::Group(Group {
                children: vec![existing, other],
                combinator,
            }),
        }
    }

    /// Column references reachable without entering subqueries.
    pub(crate) fn column_refs<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Predicate::Comparison { left, right, .. } => {
                left.column_refs(out);
                right.column_refs(out);
            }
            Predicate::In { column, .. } | Predicate::Null { column, .. } => column.column_refs(out),
            Predicate::Between {
                column, low, high, ..
            } => {
                column.column_refs(out);
                low.column_refs(out);
                high.column_refs(out);
            }
            Predicate::Group(g) => g.children.iter().for_each(|c| c.column_refs(out)),
            Predicate::Not(inner) => inner.column_refs(out),
            Predicate::Exists { .. } | Predicate::Raw(_) => {}
        }
    }

    /// Whether any part of this predicate reads from the relation `name`.
    pub(crate) fn references(&self, name: &str) -> bool {
        match self {
            Predicate::Comparison { left, right, .. } => {
                expr_references(left, name) || expr_references(right, name)
            }
            Predicate::In { column, set, .. } => {
                expr_references(column, name)
                    || matches!(set, InSet::Query(q) if q.references(name))
            }
            Predicate::Null { column, .. } => expr_references(column, name),
            Predicate::Between {
                column, low, high, ..
            } => [column, low, high].iter().any(|e| expr_references(e, name)),
            Predicate::Exists { subquery, .. } => subquery.references(name),
            Predicate::Group(g) => g.children.iter().any(|c| c.references(name)),
            Predicate::Not(inner) => inner.references(name),
            Predicate::Raw(raw) => raw.mentions(name),
        }
    }
}

pub(crate) fn expr_references(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Subquery(q) => q.references(name),
        Expr::Raw(raw) => raw.mentions(name),
        Expr::Aggregate { arg, .. } => expr_references(arg, name),
        Expr::Column(_) | Expr::Literal(_) | Expr::Star => false,
    }
}

/// Shorthand for [`Predicate::and`].
pub fn and(nodes: impl IntoIterator<Item = Predicate>) -> QbResult<Predicate> {
    Predicate::and(nodes)
}

/// Shorthand for [`Predicate::or`].
pub fn or(nodes: impl IntoIterator<Item = Predicate>) -> QbResult<Predicate> {
    Predicate::or(nodes)
}

/// Shorthand for [`Predicate::negate`].
pub fn negate(node: Predicate) -> Predicate {
    node.negate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_groups_are_rejected() {
        assert!(matches!(
            Predicate::and(Vec::new()),
            Err(QbError::InvalidPredicate(_))
        ));
        assert!(matches!(
            Predicate::or(Vec::new()),
            Err(QbError::InvalidPredicate(_))
        ));
    }

    #[test]
    fn compare_rejects_unknown_operator() {
        let err = Predicate::compare("age", "; DROP TABLE persons", 1).unwrap_err();
        assert!(matches!(err, QbError::InvalidOperator(_)));
    }

    #[test]
    fn negate_does_not_touch_inner_node() {
        let inner = Predicate::eq("id", 1).unwrap();
        let negated = inner.clone().negate();
        match negated {
            Predicate::Not(boxed) => assert_eq!(*boxed, inner),
            other => panic!("expected Not, got {other:?}"),
        }
    }

    #[test]
    fn combine_extends_same_combinator() {
        let a = Predicate::eq("a", 1).unwrap();
        let b = Predicate::eq("b", 2).unwrap();
        let c = Predicate::eq("c", 3).unwrap();
        let combined = a.and_with(b).and_with(c);
        match combined {
            Predicate::Group(g) => {
                assert_eq!(g.combinator(), Combinator::And);
                assert_eq!(g.children().len(), 3);
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn combine_nests_different_combinator() {
        let a = Predicate::eq("a", 1).unwrap();
        let b = Predicate::eq("b", 2).unwrap();
        let c = Predicate::eq("c", 3).unwrap();
        let combined = a.and_with(b).or_with(c);
        match combined {
            Predicate::Group(g) => {
                assert_eq!(g.combinator(), Combinator::Or);
                assert!(matches!(g.children()[0], Predicate::Group(_)));
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn all_eq_single_pair_is_plain_comparison() {
        let p = Predicate::all_eq([("first_name", "Test")]).unwrap();
        assert!(matches!(p, Predicate::Comparison { .. }));
        let empty: Vec<(&str, &str)> = Vec::new();
        assert!(Predicate::all_eq(empty).is_err());
    }

    #[test]
    fn column_refs_collects_both_sides() {
        let p = Predicate::columns("persons.id", "=", "animals.owner_id").unwrap();
        let mut refs = Vec::new();
        p.column_refs(&mut refs);
        let tables: Vec<String> = refs
            .iter()
            .filter_map(|c| c.table().map(|t| t.to_string()))
            .collect();
        assert_eq!(tables, vec!["persons", "animals"]);
    }
}
