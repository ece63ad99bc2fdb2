//! Error types for relq

use thiserror::Error;

/// Result type alias for relq operations
pub type QbResult<T> = Result<T, QbError>;

/// Error types for building, compiling and executing statements
#[derive(Debug, Error)]
pub enum QbError {
    /// Identifier failed validation
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Predicate could not be built (e.g. empty AND/OR group)
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    /// Operator outside the comparison allow-list
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(String),

    /// A filter was added before any FROM/table source was set
    #[error("No active filter target: call from()/table() before adding '{0}'")]
    NoActiveFilterTarget(&'static str),

    /// Join is missing its ON predicate or references a table not yet introduced
    #[error("Invalid join: {0}")]
    InvalidJoin(String),

    /// HAVING was added without a prior GROUP BY
    #[error("HAVING requires at least one GROUP BY column")]
    HavingWithoutGroupBy,

    /// Recursive CTE body never references its own alias
    #[error("Recursive CTE '{0}' does not reference itself")]
    InvalidRecursiveCte(String),

    /// CTE alias bound twice on the same draft
    #[error("CTE '{0}' is already defined")]
    DuplicateCte(String),

    /// Draft is missing a required part (source table, rows, SET list, ...)
    #[error("Incomplete statement: {0}")]
    IncompleteStatement(String),

    /// Raw fragment placeholder count differs from its parameter count
    #[error("Raw fragment has {placeholders} placeholder(s) but {params} parameter(s)")]
    PlaceholderMismatch { placeholders: usize, params: usize },

    /// `#ref` points at a local reference id that no node declares
    #[error("Unresolved graph reference: '{0}'")]
    UnresolvedGraphReference(String),

    /// Graph input is malformed (duplicate ids, cycles, wrong entity type, ...)
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// A graph insert batch failed; earlier batches were already issued
    #[error("Graph insert failed on table '{table}' (already inserted: {committed:?}): {source}")]
    GraphInsertFailed {
        table: String,
        committed: Vec<String>,
        #[source]
        source: Box<QbError>,
    },

    /// Relation name registered twice for the same entity
    #[error("Relation '{relation}' is already registered for entity '{entity}'")]
    DuplicateRelation { entity: String, relation: String },

    /// Relation name not registered for the entity
    #[error("Unknown relation '{relation}' on entity '{entity}'")]
    UnknownRelation { entity: String, relation: String },

    /// Entity type not registered
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    /// Eager fetch went past the caller-supplied depth limit
    #[error("Relation depth {depth} exceeds limit {limit}")]
    RelationDepthExceeded { depth: usize, limit: usize },

    /// Relation expression could not be parsed
    #[error("Invalid relation expression at offset {offset}: {message}")]
    InvalidRelationExpr { offset: usize, message: String },

    /// Relation metadata file could not be parsed
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// `fetch_one` returned no rows
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Statement timeout
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Error reported by the database driver
    #[error("Driver error: {0}")]
    Driver(#[from] tokio_postgres::Error),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl QbError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier(message.into())
    }

    pub fn invalid_join(message: impl Into<String>) -> Self {
        Self::InvalidJoin(message.into())
    }

    pub fn invalid_graph(message: impl Into<String>) -> Self {
        Self::InvalidGraph(message.into())
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::IncompleteStatement(message.into())
    }

    pub fn unknown_relation(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            entity: entity.into(),
            relation: relation.into(),
        }
    }

    /// SQLSTATE of a driver-reported database error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Driver(err) => err.as_db_error().map(|db| db.code().code()),
            Self::GraphInsertFailed { source, .. } => source.sqlstate(),
            _ => None,
        }
    }

    /// Check if this is a unique constraint violation (23505)
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate() == Some("23505")
    }

    /// Check if this is a foreign key violation (23503)
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate() == Some("23503")
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::GraphInsertFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for QbError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
