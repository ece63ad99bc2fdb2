//! Clause building blocks shared by the statement drafts.

use crate::error::{QbError, QbResult};
use crate::expr::{ColumnRef, Expr, IntoColumn, RawFragment};
use crate::ident::{Ident, IntoIdent, split_alias};
use crate::predicate::{Predicate, expr_references};
use crate::query::SelectQuery;

/// A FROM / JOIN source: a (possibly aliased) table or an aliased subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table { name: Ident, alias: Option<Ident> },
    Subquery { query: Box<SelectQuery>, alias: Ident },
}

impl TableRef {
    /// Parse `"persons"` / `"persons as p"` / `"public.persons as p"`.
    pub fn parse(s: &str) -> QbResult<Self> {
        let (name, alias) = split_alias(s);
        Ok(TableRef::Table {
            name: Ident::parse(name)?,
            alias: alias.map(Ident::parse).transpose()?,
        })
    }

    pub fn table(name: impl IntoIdent) -> QbResult<Self> {
        Ok(TableRef::Table {
            name: name.into_ident()?,
            alias: None,
        })
    }

    pub fn subquery(query: SelectQuery, alias: impl IntoIdent) -> QbResult<Self> {
        Ok(TableRef::Subquery {
            query: Box::new(query),
            alias: alias.into_ident()?,
        })
    }

    pub fn alias(&self) -> Option<&Ident> {
        match self {
            TableRef::Table { alias, .. } => alias.as_ref(),
            TableRef::Subquery { alias, .. } => Some(alias),
        }
    }

    /// The name column references use to qualify this source.
    pub fn binding_name(&self) -> &str {
        match self {
            TableRef::Table { name, alias } => alias.as_ref().unwrap_or(name).name(),
            TableRef::Subquery { alias, .. } => alias.name(),
        }
    }

    /// Whether `qualifier` (the table part of `qualifier.column`) names this source.
    pub(crate) fn matches_qualifier(&self, qualifier: &Ident) -> bool {
        match self {
            TableRef::Table {
                alias: Some(alias), ..
            }
            | TableRef::Subquery { alias, .. } => qualifier == alias,
            TableRef::Table { name, alias: None } => {
                qualifier == name || (qualifier.parts().len() == 1 && qualifier.name() == name.name())
            }
        }
    }

    pub(crate) fn references(&self, relation: &str) -> bool {
        match self {
            TableRef::Table { name, .. } => name.name() == relation,
            TableRef::Subquery { query, .. } => query.references(relation),
        }
    }
}

/// Conversion into a [`TableRef`] for builder ergonomics.
pub trait IntoTableRef {
    fn into_table_ref(self) -> QbResult<TableRef>;
}

impl IntoTableRef for TableRef {
    fn into_table_ref(self) -> QbResult<TableRef> {
        Ok(self)
    }
}

impl IntoTableRef for Ident {
    fn into_table_ref(self) -> QbResult<TableRef> {
        TableRef::table(self)
    }
}

impl IntoTableRef for &str {
    fn into_table_ref(self) -> QbResult<TableRef> {
        TableRef::parse(self)
    }
}

impl IntoTableRef for String {
    fn into_table_ref(self) -> QbResult<TableRef> {
        TableRef::parse(&self)
    }
}

impl IntoTableRef for &String {
    fn into_table_ref(self) -> QbResult<TableRef> {
        TableRef::parse(self)
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// One JOIN: kind, target and ON predicate (absent only for cross joins).
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) target: TableRef,
    pub(crate) on: Option<Predicate>,
}

impl Join {
    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn target(&self) -> &TableRef {
        &self.target
    }

    pub fn on(&self) -> Option<&Predicate> {
        self.on.as_ref()
    }
}

/// One entry of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `*`
    Star,
    /// `"persons".*`
    QualifiedStar(Ident),
    Column(ColumnRef),
    Expr { expr: Expr, alias: Option<Ident> },
}

impl Projection {
    /// Parse `"*"`, `"persons.*"`, `"first_name"` or `"persons.first_name as name"`.
    pub fn parse(s: &str) -> QbResult<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(Projection::Star);
        }
        if let Some(table) = s.strip_suffix(".*") {
            return Ok(Projection::QualifiedStar(Ident::parse(table)?));
        }
        Ok(Projection::Column(ColumnRef::parse(s)?))
    }

    pub(crate) fn references(&self, relation: &str) -> bool {
        match self {
            Projection::Expr { expr, .. } => expr_references(expr, relation),
            _ => false,
        }
    }
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    /// Parse `"asc"` / `"desc"` (case-insensitive).
    pub fn parse(s: &str) -> QbResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            other => Err(QbError::InvalidOperator(format!("sort direction '{other}'"))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// NULLS FIRST / NULLS LAST
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderItem {
    Column {
        column: ColumnRef,
        dir: SortDir,
        nulls: Option<NullsOrder>,
    },
    Raw(RawFragment),
}

impl OrderItem {
    pub fn new(column: impl IntoColumn, dir: SortDir) -> QbResult<Self> {
        Ok(OrderItem::Column {
            column: column.into_column()?,
            dir,
            nulls: None,
        })
    }
}

/// UNION / UNION ALL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOpKind {
    Union,
    UnionAll,
}

impl SetOpKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            SetOpKind::Union => "UNION",
            SetOpKind::UnionAll => "UNION ALL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOp {
    pub(crate) kind: SetOpKind,
    pub(crate) query: Box<SelectQuery>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ref_parses_alias() {
        let t = TableRef::parse("persons as p").unwrap();
        assert_eq!(t.binding_name(), "p");
        assert!(t.matches_qualifier(&Ident::parse("p").unwrap()));
        assert!(!t.matches_qualifier(&Ident::parse("persons").unwrap()));
    }

    #[test]
    fn unaliased_table_matches_short_and_full_name() {
        let t = TableRef::parse("public.persons").unwrap();
        assert!(t.matches_qualifier(&Ident::parse("persons").unwrap()));
        assert!(t.matches_qualifier(&Ident::parse("public.persons").unwrap()));
        assert!(!t.matches_qualifier(&Ident::parse("animals").unwrap()));
    }

    #[test]
    fn projection_forms() {
        assert_eq!(Projection::parse("*").unwrap(), Projection::Star);
        assert!(matches!(
            Projection::parse("persons.*").unwrap(),
            Projection::QualifiedStar(_)
        ));
        assert!(matches!(
            Projection::parse("persons.first_name as name").unwrap(),
            Projection::Column(_)
        ));
        assert!(Projection::parse("count(*)").is_err());
    }

    #[test]
    fn sort_dir_parse() {
        assert_eq!(SortDir::parse("DESC").unwrap(), SortDir::Desc);
        assert!(SortDir::parse("sideways").is_err());
    }
}
