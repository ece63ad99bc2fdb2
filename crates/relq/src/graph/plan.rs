//! Pure planning of a graph insert: node ids, reference resolution,
//! key dependencies, waves and per-table batches.

use crate::error::{QbError, QbResult};
use crate::graph::node::{GraphChild, GraphNode};
use crate::ident::Ident;
use crate::relation::{Relation, RelationKind, RelationRegistry};
use crate::value::{Record, Value};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// A column value of a planned row.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Value(Value),
    /// Filled from `column` of the row inserted for `node`, once it exists.
    KeyOf { node: usize, column: String },
}

/// One row to insert: an entity node or a many-to-many join row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRow {
    pub table: Ident,
    /// Entity node this row inserts; `None` for join rows.
    pub node: Option<usize>,
    pub values: Vec<(String, Slot)>,
    /// Nodes whose rows must exist before this row is inserted.
    pub depends_on: Vec<usize>,
    pub wave: usize,
}

impl PlannedRow {
    fn set(&mut self, column: &str, slot: Slot) -> QbResult<()> {
        match self.values.iter_mut().find(|(c, _)| c == column) {
            Some((_, Slot::KeyOf { .. })) => Err(QbError::invalid_graph(format!(
                "column '{}.{column}' is linked by more than one relation",
                self.table
            ))),
            Some((_, existing)) => {
                *existing = slot;
                Ok(())
            }
            None => {
                self.values.push((column.to_string(), slot));
                Ok(())
            }
        }
    }

    fn depend_on(&mut self, node: usize) {
        if !self.depends_on.contains(&node) {
            self.depends_on.push(node);
        }
    }
}

/// Rows of one table inserted by a single statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub wave: usize,
    pub table: Ident,
    /// Entity the rows belong to; `None` for join-table batches.
    pub entity: Option<String>,
    /// Key column of the entity, used when no row sets any column.
    pub key: Option<String>,
    /// Indexes into [`GraphPlan::rows`], in input order.
    pub rows: Vec<usize>,
}

/// Result of [`plan_graph`]: every row and the ordered batches to run.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPlan {
    pub(crate) entities: Vec<String>,
    pub(crate) roots: Vec<usize>,
    pub(crate) refs: HashMap<String, usize>,
    pub(crate) rows: Vec<PlannedRow>,
    pub(crate) node_rows: Vec<usize>,
    pub(crate) batches: Vec<Batch>,
}

impl GraphPlan {
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn rows(&self) -> &[PlannedRow] {
        &self.rows
    }

    pub fn node_count(&self) -> usize {
        self.node_rows.len()
    }

    /// Node ids of the forest roots.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node_for_ref(&self, ref_id: &str) -> Option<usize> {
        self.refs.get(ref_id).copied()
    }

    pub fn entity_of(&self, node: usize) -> Option<&str> {
        self.entities.get(node).map(String::as_str)
    }

    /// Number of waves (dependency levels).
    pub fn wave_count(&self) -> usize {
        self.batches.last().map_or(0, |b| b.wave + 1)
    }
}

struct Planner<'a> {
    registry: &'a RelationRegistry,
    entities: Vec<String>,
    refs: HashMap<String, usize>,
    rows: Vec<PlannedRow>,
    node_rows: Vec<usize>,
    /// (owner node, relation, child) edges, resolved after every id is known.
    edges: Vec<Edge<'a>>,
}

enum Target<'a> {
    Node(usize),
    Ref(&'a str),
}

struct Edge<'a> {
    owner: usize,
    relation: &'a Relation,
    target: Target<'a>,
    extra: &'a Record,
}

impl<'a> Planner<'a> {
    fn visit(&mut self, node: &'a GraphNode) -> QbResult<usize> {
        let meta = self.registry.entity(&node.entity)?;
        let id = self.entities.len();
        self.entities.push(node.entity.clone());

        if let Some(ref_id) = &node.ref_id {
            match self.refs.entry(ref_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(QbError::invalid_graph(format!(
                        "reference id '{ref_id}' is declared more than once"
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }

        self.node_rows.push(self.rows.len());
        self.rows.push(PlannedRow {
            table: meta.table.clone(),
            node: Some(id),
            values: node
                .columns
                .iter()
                .map(|(c, v)| (c.to_string(), Slot::Value(v.clone())))
                .collect(),
            depends_on: Vec::new(),
            wave: 0,
        });

        for (relation_name, children) in &node.relations {
            let relation = self.registry.resolve(&node.entity, relation_name)?;
            for child in children {
                let (target, extra) = match child {
                    GraphChild::Node { node: child, extra } => {
                        if child.entity != relation.target {
                            return Err(QbError::invalid_graph(format!(
                                "relation '{}.{relation_name}' expects '{}', got '{}'",
                                node.entity, relation.target, child.entity
                            )));
                        }
                        (Target::Node(self.visit(child)?), extra)
                    }
                    GraphChild::Ref { ref_id, extra } => (Target::Ref(ref_id.as_str()), extra),
                };
                self.edges.push(Edge {
                    owner: id,
                    relation,
                    target,
                    extra,
                });
            }
        }
        Ok(id)
    }

    fn resolve_edges(&mut self) -> QbResult<()> {
        let edges = std::mem::take(&mut self.edges);
        for edge in edges {
            let target = match edge.target {
                Target::Node(id) => id,
                Target::Ref(ref_id) => *self
                    .refs
                    .get(ref_id)
                    .ok_or_else(|| QbError::UnresolvedGraphReference(ref_id.to_string()))?,
            };
            if self.entities[target] != edge.relation.target {
                return Err(QbError::invalid_graph(format!(
                    "relation '{}' expects '{}', but the referenced node is '{}'",
                    edge.relation.name, edge.relation.target, self.entities[target]
                )));
            }
            self.link(edge.owner, edge.relation, target, edge.extra)?;
        }
        Ok(())
    }

    fn link(&mut self, owner: usize, relation: &Relation, target: usize, extra: &Record) -> QbResult<()> {
        match relation.kind {
            RelationKind::BelongsToOne => {
                let row = &mut self.rows[self.node_rows[owner]];
                row.set(
                    &relation.owner_column,
                    Slot::KeyOf {
                        node: target,
                        column: relation.target_column.clone(),
                    },
                )?;
                row.depend_on(target);
            }
            RelationKind::HasMany => {
                let row = &mut self.rows[self.node_rows[target]];
                row.set(
                    &relation.target_column,
                    Slot::KeyOf {
                        node: owner,
                        column: relation.owner_column.clone(),
                    },
                )?;
                row.depend_on(owner);
            }
            RelationKind::ManyToMany => {
                let Some(through) = &relation.through else {
                    return Err(QbError::Metadata(format!(
                        "relation '{}' has no through table",
                        relation.name
                    )));
                };
                let mut values = vec![
                    (
                        through.from.clone(),
                        Slot::KeyOf {
                            node: owner,
                            column: relation.owner_column.clone(),
                        },
                    ),
                    (
                        through.to.clone(),
                        Slot::KeyOf {
                            node: target,
                            column: relation.target_column.clone(),
                        },
                    ),
                ];
                values.extend(
                    extra
                        .iter()
                        .map(|(c, v)| (c.to_string(), Slot::Value(v.clone()))),
                );
                self.rows.push(PlannedRow {
                    table: through.table.clone(),
                    node: None,
                    values,
                    depends_on: vec![owner, target],
                    wave: 0,
                });
            }
        }
        Ok(())
    }

    /// Assign waves with Kahn's algorithm over node dependencies.
    fn assign_waves(&mut self) -> QbResult<()> {
        let n = self.node_rows.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, &row) in self.node_rows.iter().enumerate() {
            for &dep in &self.rows[row].depends_on {
                indegree[node] += 1;
                dependents[dep].push(node);
            }
        }

        let mut wave = vec![0usize; n];
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut done = 0;
        while let Some(node) = ready.pop() {
            done += 1;
            for &next in &dependents[node] {
                wave[next] = wave[next].max(wave[node] + 1);
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next);
                }
            }
        }
        if done < n {
            let stuck: Vec<String> = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| format!("{}#{i}", self.entities[i]))
                .collect();
            return Err(QbError::invalid_graph(format!(
                "dependency cycle between {}",
                stuck.join(", ")
            )));
        }

        for row in &mut self.rows {
            row.wave = match row.node {
                Some(node) => wave[node],
                None => row
                    .depends_on
                    .iter()
                    .map(|&d| wave[d] + 1)
                    .max()
                    .unwrap_or(0),
            };
        }
        Ok(())
    }

    fn batches(&self) -> QbResult<Vec<Batch>> {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        // Stable: rows keep input order within a wave.
        order.sort_by_key(|&i| self.rows[i].wave);

        let mut batches: Vec<Batch> = Vec::new();
        let mut wave_start = 0;
        for i in order {
            let row = &self.rows[i];
            if batches.last().is_some_and(|b| b.wave != row.wave) {
                wave_start = batches.len();
            }
            let entity = row.node.map(|n| self.entities[n].clone());
            let existing = batches[wave_start..]
                .iter_mut()
                .find(|b| b.table == row.table && b.entity == entity);
            match existing {
                Some(batch) => batch.rows.push(i),
                None => {
                    let key = match &entity {
                        Some(name) => Some(self.registry.entity(name)?.key.clone()),
                        None => None,
                    };
                    batches.push(Batch {
                        wave: row.wave,
                        table: row.table.clone(),
                        entity,
                        key,
                        rows: vec![i],
                    });
                }
            }
        }
        Ok(batches)
    }
}

/// Plan the insert of `forest` without touching the database.
///
/// Fails with `UnresolvedGraphReference` for a `#ref` nobody declares, and
/// with `InvalidGraph` for duplicate ids, wrong entity types or dependency
/// cycles. No statement can be issued before planning succeeds.
pub fn plan_graph(registry: &RelationRegistry, forest: &[GraphNode]) -> QbResult<GraphPlan> {
    let mut planner = Planner {
        registry,
        entities: Vec::new(),
        refs: HashMap::new(),
        rows: Vec::new(),
        node_rows: Vec::new(),
        edges: Vec::new(),
    };
    let mut roots = Vec::with_capacity(forest.len());
    for node in forest {
        roots.push(planner.visit(node)?);
    }
    planner.resolve_edges()?;
    planner.assign_waves()?;
    let batches = planner.batches()?;

    Ok(GraphPlan {
        entities: planner.entities,
        roots,
        refs: planner.refs,
        rows: planner.rows,
        node_rows: planner.node_rows,
        batches,
    })
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

    fn batch_tables(plan: &GraphPlan) -> Vec<(usize, String)> {
        plan.batches()
            .iter()
            .map(|b| (b.wave, b.table.to_string()))
            .collect()
    }

    #[test]
    fn belongs_to_parent_goes_first() {
        let forest = vec![
            GraphNode::new("Person")
                .column("first_name", "Child")
                .child("parent", GraphNode::new("Person").column("first_name", "Parent")),
        ];
        let plan = plan_graph(&registry(), &forest).unwrap();
        assert_eq!(plan.rows()[1].wave, 0);
        assert_eq!(plan.rows()[0].wave, 1);
        assert_eq!(
            plan.rows()[0].values.last(),
            Some(&(
                "parent_id".to_string(),
                Slot::KeyOf {
                    node: 1,
                    column: "id".to_string()
                }
            ))
        );
        assert_eq!(
            batch_tables(&plan),
            vec![(0, "persons".to_string()), (1, "persons".to_string())]
        );
    }

    #[test]
    fn has_many_children_are_batched_per_table() {
        let forest = vec![
            GraphNode::new("Person")
                .column("first_name", "Jennifer")
                .child("pets", GraphNode::new("Animal").column("name", "Doggo"))
                .child("pets", GraphNode::new("Animal").column("name", "Kat"))
                .child("children", GraphNode::new("Person").column("first_name", "Kid")),
        ];
        let plan = plan_graph(&registry(), &forest).unwrap();
        assert_eq!(
            batch_tables(&plan),
            vec![
                (0, "persons".to_string()),
                (1, "animals".to_string()),
                (1, "persons".to_string())
            ]
        );
        assert_eq!(plan.batches()[1].rows.len(), 2);
    }

    #[test]
    fn many_to_many_join_row_waits_for_both_ends() {
        let forest = vec![
            GraphNode::new("Person")
                .column("first_name", "Jennifer")
                .child_with_extra(
                    "movies",
                    GraphNode::new("Movie").column("name", "Silver Linings Playbook"),
                    Record::new().with("role", "Tiffany"),
                ),
        ];
        let plan = plan_graph(&registry(), &forest).unwrap();
        let join = plan.rows().iter().find(|r| r.node.is_none()).unwrap();
        assert_eq!(join.table.to_string(), "persons_movies");
        assert_eq!(join.wave, 1);
        assert_eq!(join.depends_on, vec![0, 1]);
        assert!(
            join.values
                .contains(&("role".to_string(), Slot::Value(Value::from("Tiffany"))))
        );
        assert_eq!(
            batch_tables(&plan),
            vec![
                (0, "persons".to_string()),
                (0, "movies".to_string()),
                (1, "persons_movies".to_string())
            ]
        );
    }

    #[test]
    fn forward_reference_is_deferred() {
        let forest = vec![
            GraphNode::new("Person")
                .column("first_name", "B")
                .reference("parent", "200"),
            GraphNode::new("Person").ref_id("200").column("first_name", "A"),
        ];
        let plan = plan_graph(&registry(), &forest).unwrap();
        assert_eq!(plan.node_for_ref("200"), Some(1));
        assert_eq!(plan.batches()[0].rows, vec![plan.node_rows[1]]);
        assert_eq!(plan.batches()[1].rows, vec![plan.node_rows[0]]);
    }

    #[test]
    fn unresolved_reference_fails() {
        let forest = vec![GraphNode::new("Person").reference("parent", "missing")];
        let err = plan_graph(&registry(), &forest).unwrap_err();
        assert!(matches!(err, QbError::UnresolvedGraphReference(ref id) if id == "missing"));
    }

    #[test]
    fn duplicate_ids_and_cycles_fail() {
        let dup = vec![
            GraphNode::new("Person").ref_id("x"),
            GraphNode::new("Person").ref_id("x"),
        ];
        assert!(matches!(
            plan_graph(&registry(), &dup),
            Err(QbError::InvalidGraph(_))
        ));

        let cycle = vec![
            GraphNode::new("Person").ref_id("a").reference("parent", "b"),
            GraphNode::new("Person").ref_id("b").reference("parent", "a"),
        ];
        assert!(matches!(
            plan_graph(&registry(), &cycle),
            Err(QbError::InvalidGraph(_))
        ));
    }

    #[test]
    fn wrong_entity_type_fails() {
        let forest = vec![GraphNode::new("Person").child("pets", GraphNode::new("Movie"))];
        assert!(matches!(
            plan_graph(&registry(), &forest),
            Err(QbError::InvalidGraph(_))
        ));
    }
}
