//! Statement compiler: renders drafts into SQL text plus an ordered parameter list.
//!
//! Rendering is a single pass over the draft. Clause order is fixed (CTEs,
//! SELECT list, FROM/JOINs, WHERE, GROUP BY, HAVING, set operations, ORDER BY,
//! LIMIT/OFFSET) no matter in which order builder methods were called. Every
//! identifier is quoted and every literal becomes a `$n` placeholder; equal
//! literals are not deduplicated.

use crate::error::{QbError, QbResult};
use crate::expr::{ColumnRef, Expr, RawFragment, split_placeholders};
use crate::ident::Ident;
use crate::predicate::{InSet, Predicate};
use crate::query::{
    Cell, ConflictAction, Cte, CteBody, DeleteQuery, InsertQuery, Join, OrderItem, Projection,
    SelectQuery, TableRef, UpdateQuery,
};
use crate::value::Value;
use std::fmt::Write as _;

/// SQL text and the parameters its `$n` placeholders refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledStatement {
    /// Number of `$n` placeholders in the SQL text (outside quoted strings and identifiers).
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut chars = self.sql.chars().peekable();
        let mut quote: Option<char> = None;
        while let Some(c) = chars.next() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == '$' && chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                    while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                        chars.next();
                    }
                    count += 1;
                }
                None => {}
            }
        }
        count
    }
}

impl std::fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Output buffer threaded through a compile pass.
#[derive(Debug, Default)]
pub struct Compiler {
    sql: String,
    params: Vec<Value>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub fn push_ident(&mut self, ident: &Ident) {
        ident.write_sql(&mut self.sql);
    }

    /// Bind `value` and write its `$n` placeholder.
    pub fn push_param(&mut self, value: &Value) {
        self.params.push(value.clone());
        let _ = write!(self.sql, "${}", self.params.len());
    }

    /// Write a raw fragment, renumbering its `?` placeholders.
    pub fn push_raw(&mut self, raw: &RawFragment) -> QbResult<()> {
        let chunks = split_placeholders(raw.text());
        let placeholders = chunks.len() - 1;
        if placeholders != raw.params().len() {
            return Err(QbError::PlaceholderMismatch {
                placeholders,
                params: raw.params().len(),
            });
        }
        let mut params = raw.params().iter();
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                if let Some(value) = params.next() {
                    self.push_param(value);
                }
            }
            self.sql.push_str(chunk);
        }
        Ok(())
    }

    fn push_list<T>(
        &mut self,
        items: &[T],
        sep: &str,
        mut f: impl FnMut(&mut Self, &T) -> QbResult<()>,
    ) -> QbResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            f(self, item)?;
        }
        Ok(())
    }

    fn push_node(&mut self, node: &impl Compile) -> QbResult<()> {
        node.compile_into(self)
    }

    pub fn finish(self) -> CompiledStatement {
        CompiledStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// AST nodes that render into a [`Compiler`].
pub trait Compile {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()>;
}

/// Compile a node into a standalone statement.
pub fn compile<T: Compile + ?Sized>(node: &T) -> QbResult<CompiledStatement> {
    let mut c = Compiler::new();
    node.compile_into(&mut c)?;
    Ok(c.finish())
}

impl Compile for ColumnRef {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        c.push_ident(self.path());
        Ok(())
    }
}

impl Compile for Expr {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        match self {
            Expr::Column(col) => col.compile_into(c)?,
            Expr::Literal(v) => c.push_param(v),
            Expr::Raw(raw) => c.push_raw(raw)?,
            Expr::Aggregate {
                func,
                arg,
                distinct,
            } => {
                c.push_sql(func.as_sql());
                c.push_sql("(");
                if *distinct {
                    c.push_sql("DISTINCT ");
                }
                arg.compile_into(c)?;
                c.push_sql(")");
            }
            Expr::Star => c.push_sql("*"),
            Expr::Subquery(q) => {
                c.push_sql("(");
                q.compile_into(c)?;
                c.push_sql(")");
            }
        }
        Ok(())
    }
}

impl Compile for Predicate {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        match self {
            Predicate::Comparison { left, op, right } => {
                left.compile_into(c)?;
                c.push_sql(" ");
                c.push_sql(op.as_sql());
                c.push_sql(" ");
                right.compile_into(c)?;
            }
            Predicate::In {
                column,
                set,
                negated,
            } => match set {
                InSet::Values(values) if values.is_empty() => {
                    c.push_sql(if *negated { "1=1" } else { "1=0" });
                }
                InSet::Values(values) => {
                    column.compile_into(c)?;
                    c.push_sql(if *negated { " NOT IN (" } else { " IN (" });
                    c.push_list(values, ", ", |c, v| {
                        c.push_param(v);
                        Ok(())
                    })?;
                    c.push_sql(")");
                }
                InSet::Query(q) => {
                    column.compile_into(c)?;
                    c.push_sql(if *negated { " NOT IN (" } else { " IN (" });
                    q.compile_into(c)?;
                    c.push_sql(")");
                }
            },
            Predicate::Null { column, negated } => {
                column.compile_into(c)?;
                c.push_sql(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Between {
                column,
                low,
                high,
                negated,
            } => {
                column.compile_into(c)?;
                c.push_sql(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                low.compile_into(c)?;
                c.push_sql(" AND ");
                high.compile_into(c)?;
            }
            Predicate::Exists { subquery, negated } => {
                c.push_sql(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                subquery.compile_into(c)?;
                c.push_sql(")");
            }
            Predicate::Group(group) => {
                let sep = format!(" {} ", group.combinator().as_sql());
                c.push_sql("(");
                c.push_list(group.children(), &sep, |c, p| p.compile_into(c))?;
                c.push_sql(")");
            }
            Predicate::Not(inner) => {
                c.push_sql("NOT ");
                if matches!(**inner, Predicate::Group(_)) {
                    inner.compile_into(c)?;
                } else {
                    c.push_sql("(");
                    inner.compile_into(c)?;
                    c.push_sql(")");
                }
            }
            Predicate::Raw(raw) => {
                c.push_sql("(");
                c.push_raw(raw)?;
                c.push_sql(")");
            }
        }
        Ok(())
    }
}

impl Compile for TableRef {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        match self {
            TableRef::Table { name, alias } => {
                c.push_ident(name);
                if let Some(alias) = alias {
                    c.push_sql(" AS ");
                    c.push_ident(alias);
                }
            }
            TableRef::Subquery { query, alias } => {
                c.push_sql("(");
                query.compile_into(c)?;
                c.push_sql(") AS ");
                c.push_ident(alias);
            }
        }
        Ok(())
    }
}

impl Compile for Projection {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        match self {
            Projection::Star => c.push_sql("*"),
            Projection::QualifiedStar(table) => {
                c.push_ident(table);
                c.push_sql(".*");
            }
            Projection::Column(col) => {
                c.push_ident(col.path());
                if let Some(alias) = col.alias_ident() {
                    c.push_sql(" AS ");
                    c.push_ident(alias);
                }
            }
            Projection::Expr { expr, alias } => {
                expr.compile_into(c)?;
                if let Some(alias) = alias {
                    c.push_sql(" AS ");
                    c.push_ident(alias);
                }
            }
        }
        Ok(())
    }
}

impl Compile for Join {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        c.push_sql(" ");
        c.push_sql(self.kind().as_sql());
        c.push_sql(" ");
        self.target().compile_into(c)?;
        if let Some(on) = self.on() {
            c.push_sql(" ON ");
            on.compile_into(c)?;
        }
        Ok(())
    }
}

impl Compile for OrderItem {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        match self {
            OrderItem::Column { column, dir, nulls } => {
                c.push_ident(column.path());
                c.push_sql(" ");
                c.push_sql(dir.as_sql());
                if let Some(nulls) = nulls {
                    c.push_sql(" ");
                    c.push_sql(nulls.as_sql());
                }
            }
            OrderItem::Raw(raw) => c.push_raw(raw)?,
        }
        Ok(())
    }
}

impl Compile for Cte {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        c.push_ident(self.alias());
        if !self.columns.is_empty() {
            c.push_sql("(");
            c.push_list(&self.columns, ", ", |c, col| {
                c.push_ident(col);
                Ok(())
            })?;
            c.push_sql(")");
        }
        c.push_sql(" AS (");
        match self.body() {
            CteBody::Query(q) => q.compile_into(c)?,
            CteBody::Raw(raw) => c.push_raw(raw)?,
        }
        c.push_sql(")");
        Ok(())
    }
}

fn push_ctes(c: &mut Compiler, ctes: &[Cte]) -> QbResult<()> {
    if ctes.is_empty() {
        return Ok(());
    }
    c.push_sql("WITH ");
    if ctes.iter().any(Cte::is_recursive) {
        c.push_sql("RECURSIVE ");
    }
    c.push_list(ctes, ", ", |c, cte| c.push_node(cte))?;
    c.push_sql(" ");
    Ok(())
}

fn push_returning(c: &mut Compiler, returning: &[Projection]) -> QbResult<()> {
    if returning.is_empty() {
        return Ok(());
    }
    c.push_sql(" RETURNING ");
    c.push_list(returning, ", ", |c, p| c.push_node(p))
}

impl Compile for SelectQuery {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        let Some(from) = &self.from else {
            return Err(QbError::incomplete("SELECT has no source table"));
        };

        push_ctes(c, &self.ctes)?;

        c.push_sql("SELECT ");
        if self.distinct {
            c.push_sql("DISTINCT ");
        }
        if self.projections.is_empty() {
            c.push_sql("*");
        } else {
            c.push_list(&self.projections, ", ", |c, p| c.push_node(p))?;
        }

        c.push_sql(" FROM ");
        from.compile_into(c)?;
        for join in &self.joins {
            join.compile_into(c)?;
        }

        if let Some(root) = &self.where_root {
            c.push_sql(" WHERE ");
            root.compile_into(c)?;
        }

        if !self.group_by.is_empty() {
            c.push_sql(" GROUP BY ");
            c.push_list(&self.group_by, ", ", |c, e| c.push_node(e))?;
        }

        if let Some(root) = &self.having_root {
            c.push_sql(" HAVING ");
            root.compile_into(c)?;
        }

        for op in &self.set_ops {
            c.push_sql(" ");
            c.push_sql(op.kind.as_sql());
            c.push_sql(" ");
            if op.query.needs_parens_in_set_op() {
                c.push_sql("(");
                op.query.compile_into(c)?;
                c.push_sql(")");
            } else {
                op.query.compile_into(c)?;
            }
        }

        if !self.order_by.is_empty() {
            c.push_sql(" ORDER BY ");
            c.push_list(&self.order_by, ", ", |c, o| c.push_node(o))?;
        }

        if let Some(limit) = self.limit {
            c.push_sql(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            c.push_sql(&format!(" OFFSET {offset}"));
        }
        Ok(())
    }
}

impl Compile for InsertQuery {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        if self.rows.is_empty() {
            return Err(QbError::incomplete(format!(
                "INSERT into '{}' has no rows",
                self.table
            )));
        }

        c.push_sql("INSERT INTO ");
        c.push_ident(&self.table);

        if self.columns.is_empty() {
            if self.rows.len() > 1 {
                return Err(QbError::incomplete(format!(
                    "multi-row INSERT into '{}' needs at least one column",
                    self.table
                )));
            }
            c.push_sql(" DEFAULT VALUES");
        } else {
            c.push_sql(" (");
            c.push_list(&self.columns, ", ", |c, col| {
                c.push_ident(col);
                Ok(())
            })?;
            c.push_sql(") VALUES ");
            c.push_list(&self.rows, ", ", |c, row| {
                c.push_sql("(");
                c.push_list(row, ", ", |c, cell| {
                    match cell {
                        Cell::Value(v) => c.push_param(v),
                        Cell::Default => c.push_sql("DEFAULT"),
                        Cell::Raw(raw) => c.push_raw(raw)?,
                    }
                    Ok(())
                })?;
                c.push_sql(")");
                Ok(())
            })?;
        }

        if let Some(conflict) = &self.on_conflict {
            c.push_sql(" ON CONFLICT");
            if !conflict.target.is_empty() {
                c.push_sql(" (");
                c.push_list(&conflict.target, ", ", |c, col| {
                    c.push_ident(col);
                    Ok(())
                })?;
                c.push_sql(")");
            }
            match &conflict.action {
                ConflictAction::DoNothing => c.push_sql(" DO NOTHING"),
                ConflictAction::Merge(columns) => {
                    if conflict.target.is_empty() || columns.is_empty() {
                        return Err(QbError::incomplete(
                            "ON CONFLICT DO UPDATE needs a conflict target and update columns",
                        ));
                    }
                    c.push_sql(" DO UPDATE SET ");
                    c.push_list(columns, ", ", |c, col| {
                        c.push_ident(col);
                        c.push_sql(" = EXCLUDED.");
                        c.push_ident(col);
                        Ok(())
                    })?;
                }
            }
        }

        push_returning(c, &self.returning)
    }
}

impl Compile for UpdateQuery {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        if self.sets.is_empty() {
            return Err(QbError::incomplete(format!(
                "UPDATE of '{}' has no SET columns",
                self.table
            )));
        }
        c.push_sql("UPDATE ");
        c.push_ident(&self.table);
        c.push_sql(" SET ");
        c.push_list(&self.sets, ", ", |c, (col, expr)| {
            c.push_ident(col);
            c.push_sql(" = ");
            expr.compile_into(c)
        })?;
        if let Some(root) = &self.where_root {
            c.push_sql(" WHERE ");
            root.compile_into(c)?;
        }
        push_returning(c, &self.returning)
    }
}

impl Compile for DeleteQuery {
    fn compile_into(&self, c: &mut Compiler) -> QbResult<()> {
        if self.where_root.is_none() && !self.all_rows {
            return Err(QbError::incomplete(format!(
                "DELETE from '{}' has no WHERE predicate; call all_rows() to delete every row",
                self.table
            )));
        }
        c.push_sql("DELETE FROM ");
        c.push_ident(&self.table);
        if let Some(root) = &self.where_root {
            c.push_sql(" WHERE ");
            root.compile_into(c)?;
        }
        push_returning(c, &self.returning)
    }
}
