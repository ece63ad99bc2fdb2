//! Expression AST: columns, literals, raw fragments, aggregates and operators.
//!
//! Nodes are immutable once constructed. Literals stay opaque [`Value`]s until
//! compilation turns them into `$n` placeholders.

use crate::error::{QbError, QbResult};
use crate::ident::{Ident, IntoIdent, split_alias};
use crate::query::SelectQuery;
use crate::value::Value;

/// A (possibly table-qualified) column reference with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    path: Ident,
    alias: Option<Ident>,
}

impl ColumnRef {
    /// Create a column reference from a validated path (`table.column` or `column`).
    pub fn new(path: impl IntoIdent) -> QbResult<Self> {
        Ok(Self {
            path: path.into_ident()?,
            alias: None,
        })
    }

    /// Parse column strings: `"first_name"`, `"persons.first_name"`,
    /// `"persons.first_name as name"`.
    pub fn parse(s: &str) -> QbResult<Self> {
        let (path, alias) = split_alias(s);
        Ok(Self {
            path: Ident::parse(path)?,
            alias: alias.map(Ident::parse).transpose()?,
        })
    }

    /// Return a copy carrying the given alias.
    pub fn alias(mut self, alias: impl IntoIdent) -> QbResult<Self> {
        self.alias = Some(alias.into_ident()?);
        Ok(self)
    }

    pub fn path(&self) -> &Ident {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// The table qualifier, if the column was written as `table.column`.
    pub fn table(&self) -> Option<Ident> {
        self.path.qualifier()
    }

    pub fn alias_ident(&self) -> Option<&Ident> {
        self.alias.as_ref()
    }
}

/// Conversion into a [`ColumnRef`] for builder ergonomics.
pub trait IntoColumn {
    fn into_column(self) -> QbResult<ColumnRef>;
}

impl IntoColumn for ColumnRef {
    fn into_column(self) -> QbResult<ColumnRef> {
        Ok(self)
    }
}

impl IntoColumn for &ColumnRef {
    fn into_column(self) -> QbResult<ColumnRef> {
        Ok(self.clone())
    }
}

impl IntoColumn for Ident {
    fn into_column(self) -> QbResult<ColumnRef> {
        ColumnRef::new(self)
    }
}

impl IntoColumn for &str {
    fn into_column(self) -> QbResult<ColumnRef> {
        ColumnRef::parse(self)
    }
}

impl IntoColumn for String {
    fn into_column(self) -> QbResult<ColumnRef> {
        ColumnRef::parse(&self)
    }
}

impl IntoColumn for &String {
    fn into_column(self) -> QbResult<ColumnRef> {
        ColumnRef::parse(self)
    }
}

/// Comparison operators accepted by [`crate::Predicate::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    Ilike,
}

impl CompareOp {
    /// Parse an operator from the allow-list `=, !=, <>, <, <=, >, >=, like, ilike`.
    pub fn parse(op: &str) -> QbResult<Self> {
        let op = op.trim();
        Ok(match op.to_ascii_lowercase().as_str() {
            "=" => CompareOp::Eq,
            "!=" | "<>" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Lte,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Gte,
            "like" => CompareOp::Like,
            "ilike" => CompareOp::Ilike,
            _ => return Err(QbError::InvalidOperator(op.to_string())),
        })
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::Ilike => "ILIKE",
        }
    }
}

/// Aggregate functions usable in projections and HAVING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

/// Pre-formatted SQL with `?` placeholders and its own parameters.
///
/// `\?` produces a literal question mark, and `?` inside single-quoted string
/// literals is left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment {
    sql: String,
    params: Vec<Value>,
}

impl RawFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A fragment without parameters.
    pub fn sql(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn text(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of `?` placeholders in the text.
    pub fn placeholder_count(&self) -> usize {
        split_placeholders(&self.sql).len() - 1
    }

    /// Whether the text mentions `name` as a bare or double-quoted identifier token.
    pub fn mentions(&self, name: &str) -> bool {
        mentions_identifier(&self.sql, name)
    }
}

/// Split raw SQL at its `?` placeholders.
///
/// Always returns `placeholders + 1` chunks.
pub(crate) fn split_placeholders(sql: &str) -> Vec<String> {
    let mut chunks = vec![String::new()];
    let mut in_string = false;
    let mut in_ident = false;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_ident => {
                in_string = !in_string;
                push_char(&mut chunks, c);
            }
            '"' if !in_string => {
                in_ident = !in_ident;
                push_char(&mut chunks, c);
            }
            _ if in_string || in_ident => push_char(&mut chunks, c),
            '\\' if chars.peek() == Some(&'?') => {
                chars.next();
                push_char(&mut chunks, '?');
            }
            '?' => chunks.push(String::new()),
            _ => push_char(&mut chunks, c),
        }
    }
    chunks
}

fn push_char(chunks: &mut [String], c: char) {
    if let Some(last) = chunks.last_mut() {
        last.push(c);
    }
}

fn mentions_identifier(sql: &str, name: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            if c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' => in_string = true,
            '"' => {
                let mut token = String::new();
                while let Some(c) = chars.next() {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            token.push('"');
                            continue;
                        }
                        break;
                    }
                    token.push(c);
                }
                if token == name {
                    return true;
                }
            }
            c if c == '_' || c.is_alphabetic() => {
                let mut token = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n == '_' || n == '$' || n.is_alphanumeric() {
                        token.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if token.eq_ignore_ascii_case(name) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    Raw(RawFragment),
    Aggregate {
        func: AggregateFn,
        arg: Box<Expr>,
        distinct: bool,
    },
    /// `*`, only meaningful as an aggregate argument (`COUNT(*)`).
    Star,
    Subquery(Box<SelectQuery>),
}

impl Expr {
    pub fn col(column: impl IntoColumn) -> QbResult<Self> {
        Ok(Expr::Column(column.into_column()?))
    }

    pub fn val(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Expr::Raw(RawFragment::new(sql, params))
    }

    pub fn subquery(query: SelectQuery) -> Self {
        Expr::Subquery(Box::new(query))
    }

    /// Collect every column reference reachable without entering subqueries.
    pub(crate) fn column_refs<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expr::Column(c) => out.push(c),
            Expr::Aggregate { arg, .. } => arg.column_refs(out),
            Expr::Literal(_) | Expr::Raw(_) | Expr::Star | Expr::Subquery(_) => {}
        }
    }
}

impl From<ColumnRef> for Expr {
    fn from(c: ColumnRef) -> Self {
        Expr::Column(c)
    }
}

impl From<RawFragment> for Expr {
    fn from(r: RawFragment) -> Self {
        Expr::Raw(r)
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

fn aggregate(func: AggregateFn, column: impl IntoColumn, distinct: bool) -> QbResult<Expr> {
    Ok(Expr::Aggregate {
        func,
        arg: Box::new(Expr::col(column)?),
        distinct,
    })
}

/// `COUNT(*)`
pub fn count_all() -> Expr {
    Expr::Aggregate {
        func: AggregateFn::Count,
        arg: Box::new(Expr::Star),
        distinct: false,
    }
}

/// `COUNT(column)`
pub fn count(column: impl IntoColumn) -> QbResult<Expr> {
    aggregate(AggregateFn::Count, column, false)
}

/// `COUNT(DISTINCT column)`
pub fn count_distinct(column: impl IntoColumn) -> QbResult<Expr> {
    aggregate(AggregateFn::Count, column, true)
}

pub fn sum(column: impl IntoColumn) -> QbResult<Expr> {
    aggregate(AggregateFn::Sum, column, false)
}

pub fn avg(column: impl IntoColumn) -> QbResult<Expr> {
    aggregate(AggregateFn::Avg, column, false)
}

pub fn min(column: impl IntoColumn) -> QbResult<Expr> {
    aggregate(AggregateFn::Min, column, false)
}

pub fn max(column: impl IntoColumn) -> QbResult<Expr> {
    aggregate(AggregateFn::Max, column, false)
}
