//! Relation metadata registry.
//!
//! Entities and their relations are plain data: an entity name maps to a
//! table, a key column and a set of named relations. Cyclic metadata
//! (`Person.children -> Person`) is fine because relations only name their
//! target entity and are resolved through the registry.
//!
//! Metadata can also be loaded from TOML or JSON using
//! `table.column` join notation:
//!
//! ```toml
//! [entities.Person]
//! table = "persons"
//! key = "id"
//!
//! [entities.Person.relations.pets]
//! kind = "has_many"
//! target = "Animal"
//! from = "persons.id"
//! to = "animals.owner_id"
//!
//! [entities.Person.relations.movies]
//! kind = "many_to_many"
//! target = "Movie"
//! from = "persons.id"
//! to = "movies.id"
//! through = { from = "persons_movies.person_id", to = "persons_movies.movie_id", extra = ["role"] }
//! ```

use crate::error::{QbError, QbResult};
use crate::ident::Ident;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The owner holds the foreign key (`persons.parent_id -> persons.id`).
    #[serde(alias = "BelongsToOneRelation")]
    BelongsToOne,
    /// The target holds the foreign key (`persons.id <- animals.owner_id`).
    #[serde(alias = "HasManyRelation")]
    HasMany,
    /// Linked through a join table.
    #[serde(alias = "ManyToManyRelation")]
    ManyToMany,
}

/// Join table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Through {
    pub table: Ident,
    /// Join-table column pointing at the owner.
    pub from: String,
    /// Join-table column pointing at the target.
    pub to: String,
    /// Extra join-table columns carried alongside the keys (e.g. `role`).
    pub extra: Vec<String>,
}

impl Through {
    pub fn new(table: &str, from: &str, to: &str) -> QbResult<Self> {
        Ok(Self {
            table: Ident::parse(table)?,
            from: from.to_string(),
            to: to.to_string(),
            extra: Vec::new(),
        })
    }

    pub fn extra<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// One named relation of an entity.
///
/// `owner_column` lives on the owner's table and `target_column` on the
/// target's table. For many-to-many they are the columns the join table's
/// `from` / `to` point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub target: String,
    pub owner_column: String,
    pub target_column: String,
    pub through: Option<Through>,
}

impl Relation {
    /// `owner.owner_column` references `target.target_column`.
    pub fn belongs_to_one(name: &str, target: &str, owner_column: &str, target_column: &str) -> Self {
        Self::plain(name, RelationKind::BelongsToOne, target, owner_column, target_column)
    }

    /// `target.target_column` references `owner.owner_column`.
    pub fn has_many(name: &str, target: &str, owner_column: &str, target_column: &str) -> Self {
        Self::plain(name, RelationKind::HasMany, target, owner_column, target_column)
    }

    pub fn many_to_many(
        name: &str,
        target: &str,
        owner_column: &str,
        through: Through,
        target_column: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: RelationKind::ManyToMany,
            target: target.to_string(),
            owner_column: owner_column.to_string(),
            target_column: target_column.to_string(),
            through: Some(through),
        }
    }

    fn plain(
        name: &str,
        kind: RelationKind,
        target: &str,
        owner_column: &str,
        target_column: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            owner_column: owner_column.to_string(),
            target_column: target_column.to_string(),
            through: None,
        }
    }

    /// Whether an eager fetch yields a single record rather than a list.
    pub fn is_single(&self) -> bool {
        self.kind == RelationKind::BelongsToOne
    }

    /// Extra join-table columns, empty unless many-to-many.
    pub fn extras(&self) -> &[String] {
        match &self.through {
            Some(through) => &through.extra,
            None => &[],
        }
    }
}

/// An entity: table, key column and relations by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub name: String,
    pub table: Ident,
    pub key: String,
    relations: BTreeMap<String, Relation>,
}

impl EntityMeta {
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }
}

/// Registry of entity metadata, loaded once and then read-only.
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    entities: BTreeMap<String, EntityMeta>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity. Relations are added with [`RelationRegistry::register`].
    pub fn register_entity(&mut self, name: &str, table: &str, key: &str) -> QbResult<()> {
        if self.entities.contains_key(name) {
            return Err(QbError::Metadata(format!("entity '{name}' is already registered")));
        }
        self.entities.insert(
            name.to_string(),
            EntityMeta {
                name: name.to_string(),
                table: Ident::parse(table)?,
                key: key.to_string(),
                relations: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Add relations to `entity`. Nothing is added if any name is already taken.
    pub fn register(
        &mut self,
        entity: &str,
        relations: impl IntoIterator<Item = Relation>,
    ) -> QbResult<()> {
        let meta = self
            .entities
            .get_mut(entity)
            .ok_or_else(|| QbError::UnknownEntity(entity.to_string()))?;
        let relations: Vec<Relation> = relations.into_iter().collect();
        for (i, relation) in relations.iter().enumerate() {
            let repeated = relations[..i].iter().any(|r| r.name == relation.name);
            if repeated || meta.relations.contains_key(&relation.name) {
                return Err(QbError::DuplicateRelation {
                    entity: entity.to_string(),
                    relation: relation.name.clone(),
                });
            }
        }
        for relation in relations {
            meta.relations.insert(relation.name.clone(), relation);
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> QbResult<&EntityMeta> {
        self.entities
            .get(name)
            .ok_or_else(|| QbError::UnknownEntity(name.to_string()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityMeta> {
        self.entities.values()
    }

    /// Look up `relation` on `entity`.
    pub fn resolve(&self, entity: &str, relation: &str) -> QbResult<&Relation> {
        self.entity(entity)?
            .relation(relation)
            .ok_or_else(|| QbError::unknown_relation(entity, relation))
    }

    /// Check that every relation targets a registered entity.
    pub fn validate(&self) -> QbResult<()> {
        for meta in self.entities.values() {
            for relation in meta.relations.values() {
                if !self.entities.contains_key(&relation.target) {
                    return Err(QbError::Metadata(format!(
                        "relation '{}.{}' targets unknown entity '{}'",
                        meta.name, relation.name, relation.target
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> QbResult<Self> {
        let doc: MetadataDoc =
            toml::from_str(s).map_err(|e| QbError::Metadata(format!("invalid TOML: {e}")))?;
        Self::from_doc(doc)
    }

    pub fn from_json(json: &serde_json::Value) -> QbResult<Self> {
        let doc: MetadataDoc = serde_json::from_value(json.clone())
            .map_err(|e| QbError::Metadata(format!("invalid JSON: {e}")))?;
        Self::from_doc(doc)
    }

    fn from_doc(doc: MetadataDoc) -> QbResult<Self> {
        let mut registry = Self::new();
        for (name, entity) in &doc.entities {
            registry.register_entity(name, &entity.table, &entity.key)?;
        }
        for (name, entity) in doc.entities {
            let mut relations = Vec::with_capacity(entity.relations.len());
            for (rel_name, rel) in entity.relations {
                relations.push(registry.relation_from_doc(&name, &rel_name, rel)?);
            }
            registry.register(&name, relations)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    fn relation_from_doc(&self, owner: &str, name: &str, doc: RelationDoc) -> QbResult<Relation> {
        let owner_meta = self.entity(owner)?;
        let target_meta = self.entities.get(&doc.target).ok_or_else(|| {
            QbError::Metadata(format!(
                "relation '{owner}.{name}' targets unknown entity '{}'",
                doc.target
            ))
        })?;
        let owner_column = column_of(&doc.from, &owner_meta.table, owner, name)?;
        let target_column = column_of(&doc.to, &target_meta.table, owner, name)?;

        match (doc.kind, doc.through) {
            (RelationKind::ManyToMany, Some(through)) => {
                let from = Ident::parse(&through.from)?;
                let to = Ident::parse(&through.to)?;
                let (Some(table), Some(to_table)) = (from.qualifier(), to.qualifier()) else {
                    return Err(QbError::Metadata(format!(
                        "relation '{owner}.{name}': through columns must be written as table.column"
                    )));
                };
                if table != to_table {
                    return Err(QbError::Metadata(format!(
                        "relation '{owner}.{name}': through columns name different tables"
                    )));
                }
                Ok(Relation {
                    name: name.to_string(),
                    kind: RelationKind::ManyToMany,
                    target: doc.target,
                    owner_column,
                    target_column,
                    through: Some(Through {
                        table,
                        from: from.name().to_string(),
                        to: to.name().to_string(),
                        extra: through.extra,
                    }),
                })
            }
            (RelationKind::ManyToMany, None) => Err(QbError::Metadata(format!(
                "relation '{owner}.{name}' is many_to_many but has no through table"
            ))),
            (_, Some(_)) => Err(QbError::Metadata(format!(
                "relation '{owner}.{name}' has a through table but is not many_to_many"
            ))),
            (kind, None) => Ok(Relation::plain(
                name,
                kind,
                &doc.target,
                &owner_column,
                &target_column,
            )),
        }
    }
}

/// Column part of `table.column`, checking the table part when present.
fn column_of(path: &str, table: &Ident, owner: &str, relation: &str) -> QbResult<String> {
    let ident = Ident::parse(path)?;
    if let Some(qualifier) = ident.qualifier() {
        if qualifier.name() != table.name() {
            return Err(QbError::Metadata(format!(
                "relation '{owner}.{relation}': '{path}' does not belong to table '{table}'"
            )));
        }
    }
    Ok(ident.name().to_string())
}

#[derive(Debug, Deserialize)]
struct MetadataDoc {
    #[serde(default)]
    entities: BTreeMap<String, EntityDoc>,
}

#[derive(Debug, Deserialize)]
struct EntityDoc {
    table: String,
    #[serde(default = "default_key")]
    key: String,
    #[serde(default)]
    relations: BTreeMap<String, RelationDoc>,
}

fn default_key() -> String {
    "id".to_string()
}

#[derive(Debug, Deserialize)]
struct RelationDoc {
    kind: RelationKind,
    target: String,
    from: String,
    to: String,
    #[serde(default)]
    through: Option<ThroughDoc>,
}

#[derive(Debug, Deserialize)]
struct ThroughDoc {
    from: String,
    to: String,
    #[serde(default)]
    extra: Vec<String>,
}
