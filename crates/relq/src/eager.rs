//! Eager fetch of related rows.
//!
//! A [`RelationExpr`] such as `[children.[pets, movies], parent]` names the
//! relations to load. [`fetch_graph`] runs the root query, then one follow-up
//! query per relation and level, matching children to parents by key.
//!
//! Expression syntax:
//!
//! - `a.b`: load `b` on every `a`
//! - `[a, b]`: load both
//! - `a.^`: load `a` repeatedly until a level comes back empty
//! - `a.^3`: load `a` three levels deep

use crate::driver::Driver;
use crate::error::{QbError, QbResult};
use crate::ident::Ident;
use crate::predicate::Predicate;
use crate::query::{Filter, SelectQuery, SortDir, select_from};
use crate::relation::{Relation, RelationKind, RelationRegistry};
use crate::value::{Key, Record, Value};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Column alias carrying the owner key of a many-to-many child row.
const PARENT_KEY: &str = "__relq_parent_key";

/// How often a relation is applied along its own path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recursion {
    /// Load once.
    #[default]
    None,
    /// `^N`: load N levels.
    Levels(usize),
    /// `^`: load until a level is empty.
    Unbounded,
}

impl Recursion {
    fn merge(self, other: Recursion) -> Recursion {
        match (self, other) {
            (Recursion::Unbounded, _) | (_, Recursion::Unbounded) => Recursion::Unbounded,
            (Recursion::Levels(a), Recursion::Levels(b)) => Recursion::Levels(a.max(b)),
            (Recursion::Levels(n), Recursion::None) | (Recursion::None, Recursion::Levels(n)) => {
                Recursion::Levels(n)
            }
            (Recursion::None, Recursion::None) => Recursion::None,
        }
    }

    /// Remaining recursion after one level was loaded.
    fn next(self) -> Option<Recursion> {
        match self {
            Recursion::None | Recursion::Levels(0) | Recursion::Levels(1) => None,
            Recursion::Levels(n) => Some(Recursion::Levels(n - 1)),
            Recursion::Unbounded => Some(Recursion::Unbounded),
        }
    }

    /// Levels this recursion contributes to a static path.
    fn static_levels(self) -> usize {
        match self {
            Recursion::Levels(n) => n,
            Recursion::None | Recursion::Unbounded => 1,
        }
    }
}

/// One relation in a [`RelationExpr`] with what to load beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationNode {
    pub name: String,
    pub recursion: Recursion,
    pub children: Vec<RelationNode>,
    offset: usize,
}

impl RelationNode {
    /// Byte offset of the relation name in the parsed expression.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// A parsed relation expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationExpr {
    nodes: Vec<RelationNode>,
}

impl RelationExpr {
    /// Parse an expression. Repeated paths are merged, so `[a.b, a.c]`
    /// equals `a.[b, c]`. An empty string selects no relations.
    pub fn parse(src: &str) -> QbResult<Self> {
        let mut parser = Parser { src, pos: 0 };
        parser.skip_ws();
        let nodes = if parser.at_end() {
            Vec::new()
        } else {
            parser.branch()?
        };
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            nodes: merge_nodes(nodes),
        })
    }

    pub fn nodes(&self) -> &[RelationNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::str::FromStr for RelationExpr {
    type Err = QbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationExpr::parse(s)
    }
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[RelationNode]) -> fmt::Result {
    if let [single] = nodes {
        return write_node(f, single);
    }
    f.write_str("[")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_node(f, node)?;
    }
    f.write_str("]")
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &RelationNode) -> fmt::Result {
    f.write_str(&node.name)?;
    match node.recursion {
        Recursion::None => {}
        Recursion::Levels(n) => write!(f, ".^{n}")?,
        Recursion::Unbounded => f.write_str(".^")?,
    }
    if !node.children.is_empty() {
        f.write_str(".")?;
        write_nodes(f, &node.children)?;
    }
    Ok(())
}

impl fmt::Display for RelationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return f.write_str("[]");
        }
        write_nodes(f, &self.nodes)
    }
}

fn merge_nodes(nodes: Vec<RelationNode>) -> Vec<RelationNode> {
    let mut merged: Vec<RelationNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match merged.iter_mut().find(|m| m.name == node.name) {
            Some(existing) => {
                existing.recursion = existing.recursion.merge(node.recursion);
                let mut children = std::mem::take(&mut existing.children);
                children.extend(node.children);
                existing.children = merge_nodes(children);
            }
            None => {
                let mut node = node;
                node.children = merge_nodes(std::mem::take(&mut node.children));
                merged.push(node);
            }
        }
    }
    merged
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> QbError {
        QbError::InvalidRelationExpr {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// `[item, ...]` or a single item.
    fn branch(&mut self) -> QbResult<Vec<RelationNode>> {
        self.skip_ws();
        if !self.eat(b'[') {
            return Ok(vec![self.item()?]);
        }
        let mut nodes = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                return Err(self.error("expected a relation name"));
            }
            nodes.extend(self.branch()?);
            self.skip_ws();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b']') {
                return Ok(nodes);
            }
            return Err(self.error("expected ',' or ']'"));
        }
    }

    fn item(&mut self) -> QbResult<RelationNode> {
        let offset = self.pos;
        let name = self.name()?;
        let mut node = RelationNode {
            name,
            recursion: Recursion::None,
            children: Vec::new(),
            offset,
        };
        self.skip_ws();
        if self.eat(b'.') {
            self.skip_ws();
            if self.eat(b'^') {
                node.recursion = self.recursion()?;
            } else {
                node.children = self.branch()?;
            }
        }
        Ok(node)
    }

    fn name(&mut self) -> QbResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b == b'_' || b.is_ascii_alphabetic() => self.pos += 1,
            _ => return Err(self.error("expected a relation name")),
        }
        while self
            .peek()
            .is_some_and(|b| b == b'_' || b.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn recursion(&mut self) -> QbResult<Recursion> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(Recursion::Unbounded);
        }
        let digits = &self.src[start..self.pos];
        match digits.parse::<usize>() {
            Ok(0) => Err(QbError::InvalidRelationExpr {
                offset: start,
                message: "recursion depth must be at least 1".to_string(),
            }),
            Ok(n) => Ok(Recursion::Levels(n)),
            Err(e) => Err(QbError::InvalidRelationExpr {
                offset: start,
                message: format!("invalid recursion depth '{digits}': {e}"),
            }),
        }
    }
}

/// Options for [`fetch_graph`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Deepest relation level that may be loaded.
    pub max_depth: usize,
    /// Per-query timeout.
    pub statement_timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            statement_timeout: None,
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
struct EagerNode {
    relation: Relation,
    recursion: Recursion,
    children: Vec<EagerNode>,
}

impl EagerNode {
    fn static_depth(&self) -> usize {
        self.recursion.static_levels()
            + self
                .children
                .iter()
                .map(EagerNode::static_depth)
                .max()
                .unwrap_or(0)
    }
}

/// A relation expression checked against the registry.
#[derive(Debug, Clone)]
pub struct EagerPlan {
    entity: String,
    nodes: Vec<EagerNode>,
    depth: usize,
}

impl EagerPlan {
    /// Resolve every relation of `expr` starting at `entity`.
    ///
    /// Fails with `UnknownRelation` for a name the owning entity does not
    /// have, and with `RelationDepthExceeded` when a fixed path is deeper
    /// than `max_depth`. Recursive relations must point back at their owner.
    pub fn new(
        registry: &RelationRegistry,
        entity: &str,
        expr: &RelationExpr,
        max_depth: usize,
    ) -> QbResult<Self> {
        registry.entity(entity)?;
        let nodes = plan_nodes(registry, entity, &expr.nodes)?;
        let depth = nodes.iter().map(EagerNode::static_depth).max().unwrap_or(0);
        if depth > max_depth {
            return Err(QbError::RelationDepthExceeded {
                depth,
                limit: max_depth,
            });
        }
        Ok(Self {
            entity: entity.to_string(),
            nodes,
            depth,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Deepest level a fixed path reaches (`^` counts once).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

fn plan_nodes(
    registry: &RelationRegistry,
    entity: &str,
    nodes: &[RelationNode],
) -> QbResult<Vec<EagerNode>> {
    nodes
        .iter()
        .map(|node| {
            let relation = registry.resolve(entity, &node.name)?;
            if node.recursion != Recursion::None && relation.target != entity {
                return Err(QbError::InvalidRelationExpr {
                    offset: node.offset,
                    message: format!(
                        "recursive relation '{}' leads to '{}', not back to '{entity}'",
                        node.name, relation.target
                    ),
                });
            }
            Ok(EagerNode {
                relation: relation.clone(),
                recursion: node.recursion,
                children: plan_nodes(registry, &relation.target, &node.children)?,
            })
        })
        .collect()
}

/// Loaded value of one relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<GraphRecord>>),
    Many(Vec<GraphRecord>),
}

impl Related {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Related::One(None) => serde_json::Value::Null,
            Related::One(Some(record)) => record.to_json(),
            Related::Many(records) => {
                serde_json::Value::Array(records.iter().map(GraphRecord::to_json).collect())
            }
        }
    }
}

/// A row with its eagerly loaded relations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphRecord {
    pub columns: Record,
    pub relations: BTreeMap<String, Related>,
}

impl GraphRecord {
    pub fn new(columns: Record) -> Self {
        Self {
            columns,
            relations: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn related(&self, relation: &str) -> Option<&Related> {
        self.relations.get(relation)
    }

    /// The single record of a belongs-to-one relation.
    pub fn one(&self, relation: &str) -> Option<&GraphRecord> {
        match self.relations.get(relation) {
            Some(Related::One(Some(record))) => Some(record),
            _ => None,
        }
    }

    /// Records of a to-many relation; empty when not loaded.
    pub fn many(&self, relation: &str) -> &[GraphRecord] {
        match self.relations.get(relation) {
            Some(Related::Many(records)) => records,
            _ => &[],
        }
    }

    /// Columns plus relations as one JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let mut json = self.columns.to_json();
        if let serde_json::Value::Object(map) = &mut json {
            for (name, related) in &self.relations {
                map.insert(name.clone(), related.to_json());
            }
        }
        json
    }
}

impl Serialize for GraphRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Run `root` and load the relations of `expr` onto its rows.
pub async fn fetch_graph<D: Driver>(
    driver: &D,
    registry: &RelationRegistry,
    root: &SelectQuery,
    entity: &str,
    expr: &RelationExpr,
    options: &FetchOptions,
) -> QbResult<Vec<GraphRecord>> {
    let plan = EagerPlan::new(registry, entity, expr, options.max_depth)?;
    let stmt = root.compile()?;
    let rows = with_timeout(
        options.statement_timeout,
        driver.query_tagged("eager:root", &stmt.sql, &stmt.params),
    )
    .await?;
    let mut records: Vec<GraphRecord> = rows.into_iter().map(GraphRecord::new).collect();

    tracing::debug!(
        target: "relq.graph",
        entity = entity,
        relations = %expr,
        roots = records.len(),
        "eager fetch"
    );

    let fetcher = Fetcher {
        driver,
        registry,
        options,
    };
    load_nodes(&fetcher, &plan.nodes, &mut records, 1).await?;
    Ok(records)
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct Fetcher<'a, D> {
    driver: &'a D,
    registry: &'a RelationRegistry,
    options: &'a FetchOptions,
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = QbResult<T>>,
) -> QbResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| QbError::Timeout(limit))?,
        None => fut.await,
    }
}

fn load_nodes<'a, D: Driver>(
    f: &'a Fetcher<'a, D>,
    nodes: &'a [EagerNode],
    parents: &'a mut [GraphRecord],
    depth: usize,
) -> BoxFuture<'a, QbResult<()>> {
    Box::pin(async move {
        for node in nodes {
            load_relation(f, node, node.recursion, parents, depth).await?;
        }
        Ok(())
    })
}

/// Load one relation level onto `parents`, then its sub-relations and
/// further recursion levels onto the loaded children.
fn load_relation<'a, D: Driver>(
    f: &'a Fetcher<'a, D>,
    node: &'a EagerNode,
    recursion: Recursion,
    parents: &'a mut [GraphRecord],
    depth: usize,
) -> BoxFuture<'a, QbResult<()>> {
    Box::pin(async move {
        let relation = &node.relation;
        let keys = distinct_keys(parents, &relation.owner_column);

        let (parent_keys, mut children) = if keys.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            fetch_children(f, relation, keys).await?
        };

        // An empty level past the limit ends the tree; rows there exceed it.
        if depth > f.options.max_depth && !children.is_empty() {
            return Err(QbError::RelationDepthExceeded {
                depth,
                limit: f.options.max_depth,
            });
        }

        tracing::trace!(
            target: "relq.graph",
            relation = %relation.name,
            depth,
            parents = parents.len(),
            children = children.len(),
            "loaded relation level"
        );

        if !children.is_empty() {
            load_nodes(f, &node.children, &mut children, depth + 1).await?;
            if let Some(next) = recursion.next() {
                load_relation(f, node, next, &mut children, depth + 1).await?;
            }
        }

        attach(parents, relation, &parent_keys, &children);
        Ok(())
    })
}

fn distinct_keys(records: &[GraphRecord], column: &str) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    let mut keys = Vec::new();
    for record in records {
        if let Some(key) = record.get(column).and_then(Value::as_key) {
            if seen.insert(key.clone()) {
                keys.push(Value::from(key));
            }
        }
    }
    keys
}

async fn fetch_children<D: Driver>(
    f: &Fetcher<'_, D>,
    relation: &Relation,
    keys: Vec<Value>,
) -> QbResult<(Vec<Option<Key>>, Vec<GraphRecord>)> {
    let stmt = child_query(f.registry, relation, keys)?.compile()?;
    let tag = format!("eager:{}", relation.name);
    let rows = with_timeout(
        f.options.statement_timeout,
        f.driver.query_tagged(&tag, &stmt.sql, &stmt.params),
    )
    .await?;

    let mut parent_keys = Vec::with_capacity(rows.len());
    let mut children = Vec::with_capacity(rows.len());
    for mut row in rows {
        let key = match relation.kind {
            RelationKind::ManyToMany => row.remove(PARENT_KEY),
            RelationKind::BelongsToOne | RelationKind::HasMany => {
                row.get(&relation.target_column).cloned()
            }
        };
        parent_keys.push(key.as_ref().and_then(Value::as_key));
        children.push(GraphRecord::new(row));
    }
    Ok((parent_keys, children))
}

/// Follow-up query selecting the related rows of every key in `keys`.
pub(crate) fn child_query(
    registry: &RelationRegistry,
    relation: &Relation,
    keys: Vec<Value>,
) -> QbResult<SelectQuery> {
    let target = registry.entity(&relation.target)?;
    let table: &Ident = &target.table;
    let query = match (&relation.kind, &relation.through) {
        (RelationKind::ManyToMany, Some(through)) => {
            let mut query = select_from(table.clone())?.columns([format!("{table}.*")])?;
            for extra in &through.extra {
                query = query.column_as(through.table.join(extra)?, extra.as_str())?;
            }
            query
                .column_as(through.table.join(&through.from)?, PARENT_KEY)?
                .inner_join(
                    through.table.clone(),
                    Predicate::columns(
                        through.table.join(&through.to)?,
                        "=",
                        table.join(&relation.target_column)?,
                    )?,
                )?
                .where_in(through.table.join(&through.from)?, keys)?
        }
        (RelationKind::ManyToMany, None) => {
            return Err(QbError::Metadata(format!(
                "relation '{}' has no through table",
                relation.name
            )));
        }
        _ => select_from(table.clone())?.where_in(table.join(&relation.target_column)?, keys)?,
    };
    query.order_by(table.join(&target.key)?, SortDir::Asc)
}

fn attach(
    parents: &mut [GraphRecord],
    relation: &Relation,
    parent_keys: &[Option<Key>],
    children: &[GraphRecord],
) {
    let mut index: HashMap<&Key, Vec<usize>> = HashMap::new();
    for (i, key) in parent_keys.iter().enumerate() {
        if let Some(key) = key {
            index.entry(key).or_default().push(i);
        }
    }

    for parent in parents.iter_mut() {
        let matches: &[usize] = parent
            .get(&relation.owner_column)
            .and_then(Value::as_key)
            .and_then(|key| index.get(&key))
            .map_or(&[], Vec::as_slice);
        let related = if relation.is_single() {
            Related::One(matches.first().map(|&i| Box::new(children[i].clone())))
        } else {
            Related::Many(matches.iter().map(|&i| children[i].clone()).collect())
        };
        parent.relations.insert(relation.name.clone(), related);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::Through;

    fn registry() -> RelationRegistry {
        let mut r = RelationRegistry::new();
        r.register_entity("Person", "persons", "id").unwrap();
        r.register_entity("Animal", "animals", "id").unwrap();
        r.register_entity("Movie", "movies", "id").unwrap();
        r.register(
            "Person",
            [
                Relation::belongs_to_one("parent", "Person", "parent_id", "id"),
                Relation::has_many("children", "Person", "id", "parent_id"),
                Relation::has_many("pets", "Animal", "id", "owner_id"),
                Relation::many_to_many(
                    "movies",
                    "Movie",
                    "id",
                    Through::new("persons_movies", "person_id", "movie_id")
                        .unwrap()
                        .extra(["role"]),
                    "id",
                ),
            ],
        )
        .unwrap();
        r
    }

    #[test]
    fn parses_nested_lists() {
        let expr = RelationExpr::parse("[children.[pets, movies], parent]").unwrap();
        let names: Vec<&str> = expr.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["children", "parent"]);
        let nested: Vec<&str> = expr.nodes()[0]
            .children
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(nested, vec!["pets", "movies"]);
        assert_eq!(expr.to_string(), "[children.[pets, movies], parent]");
    }

    #[test]
    fn merges_repeated_paths() {
        let a = RelationExpr::parse("[children.pets, children.movies]").unwrap();
        let b = RelationExpr::parse("children.[pets, movies]").unwrap();
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.nodes().len(), 1);
    }

    #[test]
    fn parses_recursion() {
        let expr = RelationExpr::parse("[parent.^, children.^3]").unwrap();
        assert_eq!(expr.nodes()[0].recursion, Recursion::Unbounded);
        assert_eq!(expr.nodes()[1].recursion, Recursion::Levels(3));
        assert_eq!(expr.to_string(), "[parent.^, children.^3]");
    }

    #[test]
    fn reports_error_offsets() {
        let err = RelationExpr::parse("[children, ]").unwrap_err();
        assert!(matches!(err, QbError::InvalidRelationExpr { offset: 11, .. }));

        let err = RelationExpr::parse("children.^0").unwrap_err();
        assert!(matches!(err, QbError::InvalidRelationExpr { offset: 10, .. }));

        assert!(RelationExpr::parse("[children").is_err());
        assert!(RelationExpr::parse("children pets").is_err());
        assert!(RelationExpr::parse("1abc").is_err());
    }

    #[test]
    fn plan_rejects_unknown_relations_and_depth() {
        let reg = registry();
        let expr = RelationExpr::parse("children.toys").unwrap();
        assert!(matches!(
            EagerPlan::new(&reg, "Person", &expr, 10),
            Err(QbError::UnknownRelation { ref entity, ref relation })
                if entity == "Person" && relation == "toys"
        ));

        let deep = RelationExpr::parse("children.children.children").unwrap();
        assert!(matches!(
            EagerPlan::new(&reg, "Person", &deep, 2),
            Err(QbError::RelationDepthExceeded { depth: 3, limit: 2 })
        ));

        let levels = RelationExpr::parse("children.^4.pets").unwrap_err();
        assert!(matches!(levels, QbError::InvalidRelationExpr { .. }));

        let plan = EagerPlan::new(
            &reg,
            "Person",
            &RelationExpr::parse("[children.^3, pets]").unwrap(),
            3,
        )
        .unwrap();
        assert_eq!(plan.depth(), 3);
    }

    #[test]
    fn recursion_must_point_back() {
        let expr = RelationExpr::parse("pets.^").unwrap();
        assert!(matches!(
            EagerPlan::new(&registry(), "Person", &expr, 10),
            Err(QbError::InvalidRelationExpr { offset: 0, .. })
        ));
    }

    #[test]
    fn has_many_follow_up_query() {
        let reg = registry();
        let relation = reg.resolve("Person", "pets").unwrap();
        let stmt = child_query(&reg, relation, vec![Value::Int(1), Value::Int(2)])
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "animals" WHERE "animals"."owner_id" IN ($1, $2) ORDER BY "animals"."id" ASC"#
        );
        assert_eq!(stmt.params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn many_to_many_follow_up_query_projects_extras() {
        let reg = registry();
        let relation = reg.resolve("Person", "movies").unwrap();
        let stmt = child_query(&reg, relation, vec![Value::Int(7)])
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(
            stmt.sql,
            concat!(
                r#"SELECT "movies".*, "persons_movies"."role" AS "role", "#,
                r#""persons_movies"."person_id" AS "__relq_parent_key" FROM "movies" "#,
                r#"INNER JOIN "persons_movies" ON "persons_movies"."movie_id" = "movies"."id" "#,
                r#"WHERE "persons_movies"."person_id" IN ($1) ORDER BY "movies"."id" ASC"#
            )
        );
    }

    #[test]
    fn attach_distributes_by_key() {
        let reg = registry();
        let pets = reg.resolve("Person", "pets").unwrap();
        let mut parents = vec![
            GraphRecord::new(Record::new().with("id", 1)),
            GraphRecord::new(Record::new().with("id", 2)),
        ];
        let children = vec![
            GraphRecord::new(Record::new().with("id", 10).with("owner_id", 2)),
            GraphRecord::new(Record::new().with("id", 11).with("owner_id", 2)),
        ];
        let keys = vec![Some(Key::Int(2)), Some(Key::Int(2))];
        attach(&mut parents, pets, &keys, &children);
        assert!(parents[0].many("pets").is_empty());
        assert_eq!(parents[1].many("pets").len(), 2);

        let json = parents[1].to_json();
        assert_eq!(json["pets"][1]["id"], serde_json::json!(11));
    }
}
