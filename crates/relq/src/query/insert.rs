//! INSERT draft.

use crate::compile::{CompiledStatement, compile};
use crate::error::QbResult;
use crate::expr::RawFragment;
use crate::ident::{Ident, IntoIdent};
use crate::query::clause::Projection;
use crate::query::traits::Statement;
use crate::value::{Record, Value};

/// One VALUES cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    /// `DEFAULT`, used for columns a row does not set.
    Default,
    /// Raw SQL expression, e.g. `now()`.
    Raw(RawFragment),
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        Cell::Value(v)
    }
}

macro_rules! impl_cell_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Cell {
                fn from(v: $ty) -> Self {
                    Cell::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_cell_from!(
    bool,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    String,
    &str,
    &String,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
    uuid::Uuid,
    serde_json::Value,
);

impl<T: Into<Value>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        Cell::Value(v.into())
    }
}

/// ON CONFLICT action.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    /// DO NOTHING
    DoNothing,
    /// DO UPDATE SET col = EXCLUDED.col for each listed column
    Merge(Vec<Ident>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    pub(crate) target: Vec<Ident>,
    pub(crate) action: ConflictAction,
}

/// An INSERT statement under construction.
///
/// Rows may set different column subsets; the column list is the union in
/// first-appearance order and unset cells render as `DEFAULT`.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct InsertQuery {
    pub(crate) table: Ident,
    pub(crate) columns: Vec<Ident>,
    pub(crate) rows: Vec<Vec<Cell>>,
    pub(crate) on_conflict: Option<OnConflict>,
    pub(crate) returning: Vec<Projection>,
}

impl InsertQuery {
    pub fn new(table: impl IntoIdent) -> QbResult<Self> {
        Ok(Self {
            table: table.into_ident()?,
            columns: Vec::new(),
            rows: Vec::new(),
            on_conflict: None,
            returning: Vec::new(),
        })
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&mut self, column: Ident) -> usize {
        if let Some(i) = self.columns.iter().position(|c| *c == column) {
            return i;
        }
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(Cell::Default);
        }
        self.columns.len() - 1
    }

    /// Append one row from `(column, cell)` pairs.
    pub fn row<K, V>(mut self, cells: impl IntoIterator<Item = (K, V)>) -> QbResult<Self>
    where
        K: IntoIdent,
        V: Into<Cell>,
    {
        let mut row = vec![Cell::Default; self.columns.len()];
        for (column, cell) in cells {
            let idx = self.column_index(column.into_ident()?);
            if idx == row.len() {
                row.push(Cell::Default);
            }
            row[idx] = cell.into();
        }
        self.rows.push(row);
        Ok(self)
    }

    /// Append one row per record.
    pub fn records<'a>(mut self, records: impl IntoIterator<Item = &'a Record>) -> QbResult<Self> {
        for record in records {
            self = self.row(record.iter().map(|(k, v)| (k, v.clone())))?;
        }
        Ok(self)
    }

    /// Set `column` on the last row, starting a row if there is none.
    pub fn set(mut self, column: impl IntoIdent, value: impl Into<Cell>) -> QbResult<Self> {
        if self.rows.is_empty() {
            self.rows.push(vec![Cell::Default; self.columns.len()]);
        }
        let idx = self.column_index(column.into_ident()?);
        if let Some(last) = self.rows.last_mut() {
            last[idx] = value.into();
        }
        Ok(self)
    }

    /// Set a raw SQL expression on the last row, e.g. `set_raw("created_at", "now()")`.
    pub fn set_raw(self, column: impl IntoIdent, sql: impl Into<String>) -> QbResult<Self> {
        self.set(column, Cell::Raw(RawFragment::sql(sql)))
    }

    /// `ON CONFLICT (target) DO NOTHING`
    pub fn on_conflict_do_nothing<I>(mut self, target: I) -> QbResult<Self>
    where
        I: IntoIterator,
        I::Item: IntoIdent,
    {
        self.on_conflict = Some(OnConflict {
            target: collect_idents(target)?,
            action: ConflictAction::DoNothing,
        });
        Ok(self)
    }

    /// `ON CONFLICT (target) DO UPDATE SET c = EXCLUDED.c, ...`
    pub fn on_conflict_merge<I, J>(mut self, target: I, update: J) -> QbResult<Self>
    where
        I: IntoIterator,
        I::Item: IntoIdent,
        J: IntoIterator,
        J::Item: IntoIdent,
    {
        self.on_conflict = Some(OnConflict {
            target: collect_idents(target)?,
            action: ConflictAction::Merge(collect_idents(update)?),
        });
        Ok(self)
    }

    /// RETURNING the given columns.
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

    /// `RETURNING *`
    pub fn returning_all(mut self) -> Self {
        self.returning = vec![Projection::Star];
        self
    }

    pub fn compile(&self) -> QbResult<CompiledStatement> {
        compile(self)
    }
}

pub(crate) fn collect_idents<I>(items: I) -> QbResult<Vec<Ident>>
where
    I: IntoIterator,
    I::Item: IntoIdent,
{
    items.into_iter().map(IntoIdent::into_ident).collect()
}

impl Statement for InsertQuery {
    fn build(&self) -> QbResult<CompiledStatement> {
        compile(self)
    }
}

/// Start an INSERT into `table`.
pub fn insert_into(table: impl IntoIdent) -> QbResult<InsertQuery> {
    InsertQuery::new(table)
}
