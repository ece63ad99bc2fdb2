//! Graph input model and its JSON form.

use crate::error::{QbError, QbResult};
use crate::relation::{Relation, RelationKind, RelationRegistry};
use crate::value::{Record, Value};

/// Reserved key declaring a node's local reference id.
pub const ID_KEY: &str = "#id";
/// Reserved key pointing at another node's local reference id.
pub const REF_KEY: &str = "#ref";

/// One entity to insert, with its own columns and related children.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub entity: String,
    pub ref_id: Option<String>,
    pub columns: Record,
    /// Relation name -> children, in declaration order.
    pub relations: Vec<(String, Vec<GraphChild>)>,
}

/// A relation value: a nested node or a reference to a node declared elsewhere.
///
/// `extra` holds join-table columns of a many-to-many link.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChild {
    Node { node: GraphNode, extra: Record },
    Ref { ref_id: String, extra: Record },
}

impl GraphNode {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ref_id: None,
            columns: Record::new(),
            relations: Vec::new(),
        }
    }

    /// Declare the local reference id other nodes can point at.
    pub fn ref_id(mut self, id: impl Into<String>) -> Self {
        self.ref_id = Some(id.into());
        self
    }

    pub fn column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(name, value);
        self
    }

    fn push_child(mut self, relation: &str, child: GraphChild) -> Self {
        match self.relations.iter_mut().find(|(name, _)| name == relation) {
            Some((_, children)) => children.push(child),
            None => self.relations.push((relation.to_string(), vec![child])),
        }
        self
    }

    /// Nest `node` under `relation`.
    pub fn child(self, relation: &str, node: GraphNode) -> Self {
        self.push_child(
            relation,
            GraphChild::Node {
                node,
                extra: Record::new(),
            },
        )
    }

    /// Nest `node` under a many-to-many `relation` with join-table columns.
    pub fn child_with_extra(self, relation: &str, node: GraphNode, extra: Record) -> Self {
        self.push_child(relation, GraphChild::Node { node, extra })
    }

    /// Link `relation` to the node declaring `ref_id`.
    pub fn reference(self, relation: &str, ref_id: impl Into<String>) -> Self {
        self.push_child(
            relation,
            GraphChild::Ref {
                ref_id: ref_id.into(),
                extra: Record::new(),
            },
        )
    }

    pub fn reference_with_extra(
        self,
        relation: &str,
        ref_id: impl Into<String>,
        extra: Record,
    ) -> Self {
        self.push_child(
            relation,
            GraphChild::Ref {
                ref_id: ref_id.into(),
                extra,
            },
        )
    }

    /// Parse an object or array of objects for `entity`.
    ///
    /// Keys naming a registered relation become children, `#id` declares the
    /// node's reference id, and `{"#ref": "..."}` objects inside relations
    /// become references. For many-to-many children the relation's `extra`
    /// keys move onto the join row.
    pub fn from_json(
        registry: &RelationRegistry,
        entity: &str,
        json: &serde_json::Value,
    ) -> QbResult<Vec<GraphNode>> {
        match json {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| parse_node(registry, entity, item))
                .collect(),
            serde_json::Value::Object(_) => Ok(vec![parse_node(registry, entity, json)?]),
            other => Err(QbError::invalid_graph(format!(
                "expected an object or array for '{entity}', got {other}"
            ))),
        }
    }
}

fn ref_string(value: &serde_json::Value, key: &str) -> QbResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(QbError::invalid_graph(format!(
            "'{key}' must be a string or number, got {other}"
        ))),
    }
}

fn parse_node(
    registry: &RelationRegistry,
    entity: &str,
    json: &serde_json::Value,
) -> QbResult<GraphNode> {
    let meta = registry.entity(entity)?;
    let serde_json::Value::Object(map) = json else {
        return Err(QbError::invalid_graph(format!(
            "expected an object for '{entity}', got {json}"
        )));
    };
    if map.contains_key(REF_KEY) {
        return Err(QbError::invalid_graph(format!(
            "'{REF_KEY}' is only valid as a relation value (entity '{entity}')"
        )));
    }

    let mut node = GraphNode::new(entity);
    for (key, value) in map {
        if key == ID_KEY {
            node.ref_id = Some(ref_string(value, ID_KEY)?);
            continue;
        }
        match meta.relation(key) {
            Some(relation) => {
                let children = parse_children(registry, relation, value)?;
                if !children.is_empty() {
                    node.relations.push((key.clone(), children));
                }
            }
            None => node.columns.insert(key.clone(), Value::from_json(value)),
        }
    }
    Ok(node)
}

fn parse_children(
    registry: &RelationRegistry,
    relation: &Relation,
    value: &serde_json::Value,
) -> QbResult<Vec<GraphChild>> {
    let items: Vec<&serde_json::Value> = match value {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Object(_) => vec![value],
        other => {
            return Err(QbError::invalid_graph(format!(
                "relation '{}' expects an object or array, got {other}",
                relation.name
            )));
        }
    };
    if relation.kind == RelationKind::BelongsToOne && items.len() > 1 {
        return Err(QbError::invalid_graph(format!(
            "relation '{}' is belongs-to-one but got {} values",
            relation.name,
            items.len()
        )));
    }

    let mut children = Vec::with_capacity(items.len());
    for item in items {
        let serde_json::Value::Object(map) = item else {
            return Err(QbError::invalid_graph(format!(
                "relation '{}' expects objects, got {item}",
                relation.name
            )));
        };

        let mut extra = Record::new();
        let mut rest = map.clone();
        for column in relation.extras() {
            if let Some(v) = rest.remove(column) {
                extra.insert(column.clone(), Value::from_json(&v));
            }
        }

        if let Some(ref_value) = rest.remove(REF_KEY) {
            if let Some(key) = rest.keys().next() {
                return Err(QbError::invalid_graph(format!(
                    "reference in relation '{}' cannot carry column '{key}'",
                    relation.name
                )));
            }
            children.push(GraphChild::Ref {
                ref_id: ref_string(&ref_value, REF_KEY)?,
                extra,
            });
        } else {
            let node = parse_node(
                registry,
                &relation.target,
                &serde_json::Value::Object(rest),
            )?;
            children.push(GraphChild::Node { node, extra });
        }
    }
    Ok(children)
}
