//! CTE (WITH clause) bindings.

use crate::error::QbResult;
use crate::expr::RawFragment;
use crate::ident::{Ident, IntoIdent};
use crate::query::SelectQuery;

/// Body of a CTE: a nested draft or raw SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum CteBody {
    Query(Box<SelectQuery>),
    Raw(RawFragment),
}

impl CteBody {
    pub(crate) fn references(&self, relation: &str) -> bool {
        match self {
            CteBody::Query(q) => q.references(relation),
            CteBody::Raw(raw) => raw.mentions(relation),
        }
    }
}

impl From<SelectQuery> for CteBody {
    fn from(q: SelectQuery) -> Self {
        CteBody::Query(Box::new(q))
    }
}

impl From<RawFragment> for CteBody {
    fn from(raw: RawFragment) -> Self {
        CteBody::Raw(raw)
    }
}

/// A named CTE: `"alias"("col", ...) AS (body)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub(crate) alias: Ident,
    pub(crate) columns: Vec<Ident>,
    pub(crate) body: CteBody,
    pub(crate) recursive: bool,
}

impl Cte {
    pub fn new(alias: impl IntoIdent, body: impl Into<CteBody>) -> QbResult<Self> {
        Ok(Self {
            alias: alias.into_ident()?,
            columns: Vec::new(),
            body: body.into(),
            recursive: false,
        })
    }

    /// Explicit output column list.
    pub fn columns<I>(mut self, columns: I) -> QbResult<Self>
    where
        I: IntoIterator,
        I::Item: IntoIdent,
    {
        self.columns = columns
            .into_iter()
            .map(IntoIdent::into_ident)
            .collect::<QbResult<_>>()?;
        Ok(self)
    }

    /// Mark as recursive. Validated when the CTE is attached to a draft.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn alias(&self) -> &Ident {
        &self.alias
    }

    pub fn body(&self) -> &CteBody {
        &self.body
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
}
