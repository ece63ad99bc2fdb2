//! Safe SQL identifier handling.
//!
//! [`Ident`] represents a SQL identifier (schema/table/column/alias), supporting
//! dotted notation and quoted parts.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL
//!
//! Every part is rendered double-quoted, so `persons.first_name` becomes
//! `"persons"."first_name"` and case is always preserved.
//!
//! # Example
//! ```ignore
//! use relq::Ident;
//!
//! let t = Ident::parse("public.persons")?;
//! assert_eq!(t.to_sql(), r#""public"."persons""#);
//! # Ok::<(), relq::QbError>(())
//! ```

use crate::error::{QbError, QbResult};

/// A SQL identifier (column, table, alias or schema-qualified name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Create a single-part identifier from an arbitrary name.
    ///
    /// Unlike [`Ident::parse`], dots are kept as part of the name.
    pub fn quoted(name: &str) -> QbResult<Self> {
        if name.is_empty() {
            return Err(QbError::invalid_identifier("Empty quoted identifier"));
        }
        if name.contains('\0') {
            return Err(QbError::invalid_identifier(
                "Identifier cannot contain NUL character",
            ));
        }
        Ok(Self {
            parts: vec![name.to_string()],
        })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table.column`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `public."UserTable".id`
    pub fn parse(s: &str) -> QbResult<Self> {
        if s.is_empty() {
            return Err(QbError::invalid_identifier("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(QbError::invalid_identifier(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(QbError::invalid_identifier("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(QbError::invalid_identifier(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            // "" is an escaped quote
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => {
                            return Err(QbError::invalid_identifier("Unclosed quoted identifier"));
                        }
                    }
                }
                if name.is_empty() {
                    return Err(QbError::invalid_identifier("Empty quoted identifier"));
                }
                parts.push(name);
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let valid = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !valid {
                    return Err(QbError::invalid_identifier(format!(
                        "Invalid character in identifier '{s}': '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(QbError::invalid_identifier("Empty identifier segment"));
            }
            parts.push(name);
        }

        if parts.is_empty() {
            return Err(QbError::invalid_identifier("Empty identifier"));
        }

        Ok(Self { parts })
    }

    /// The unquoted parts, outermost first.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The last part (column name for a column path, table name for a table).
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Everything before the last part, e.g. the table of `persons.id`.
    pub fn qualifier(&self) -> Option<Ident> {
        if self.parts.len() < 2 {
            return None;
        }
        Some(Ident {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    /// Append one part, e.g. `persons` + `id` -> `persons.id`.
    pub fn join(&self, part: &str) -> QbResult<Ident> {
        let tail = Ident::quoted(part)?;
        let mut parts = self.parts.clone();
        parts.extend(tail.parts);
        Ok(Ident { parts })
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.parts.iter().map(|p| p.len() + 3).sum());
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push('"');
            for ch in part.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
        }
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> QbResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> QbResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> QbResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> QbResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> QbResult<Ident> {
        Ident::parse(&self)
    }
}

impl IntoIdent for &String {
    fn into_ident(self) -> QbResult<Ident> {
        Ident::parse(self)
    }
}

/// Split `"name as alias"` into its parts (case-insensitive `as`).
pub(crate) fn split_alias(s: &str) -> (&str, Option<&str>) {
    let trimmed = s.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.rfind(" as ") {
        Some(pos) => {
            let alias = trimmed[pos + 4..].trim();
            (trimmed[..pos].trim(), (!alias.is_empty()).then_some(alias))
        }
        None => (trimmed, None),
    }
}
