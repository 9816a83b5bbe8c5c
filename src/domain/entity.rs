//! Tracked entities and the fetch-merge rule
//!
//! An [`Entity`] is one remote item merged with the attributes the local user
//! owns. The remote listing only ever supplies a [`FetchedEntity`]; everything
//! else either survives from the previous record or starts empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Remote identifier assigned by the listing source.
pub type EntityId = i64;

/// One tracked remote item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Display name, refreshed on every successful fetch
    pub name: String,
    /// `None` until enriched; `Some("")` means enriched with no category
    pub category: Option<String>,
    /// User-owned, never set by a fetch
    pub favorite: bool,
    /// User-owned, never set by a fetch
    pub bookmarked: bool,
}

/// The part of an entity the listing page provides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedEntity {
    pub id: EntityId,
    pub name: String,
}

impl FetchedEntity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Entity {
    /// Whether the enrichment pass still has to classify this entity
    pub const fn needs_enrichment(&self) -> bool {
        self.category.is_none()
    }
}

/// Combine a freshly fetched record with the previously stored one.
///
/// `id` and `name` always come from `fetched`. `category`, `favorite` and
/// `bookmarked` come from `previous` when it exists, otherwise they start as
/// `None`/`false`/`false`.
pub fn merge(fetched: FetchedEntity, previous: Option<&Entity>) -> Entity {
    match previous {
        Some(prev) => Entity {
            id: fetched.id,
            name: fetched.name,
            category: prev.category.clone(),
            favorite: prev.favorite,
            bookmarked: prev.bookmarked,
        },
        None => Entity {
            id: fetched.id,
            name: fetched.name,
            category: None,
            favorite: false,
            bookmarked: false,
        },
    }
}

/// Ordered set of entities keyed by id.
///
/// Insertion order is display order. Inserting an id that is already present
/// replaces that entity in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.index.get(&id).map(|&i| &mut self.entities[i])
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Append `entity`, or replace the entity with the same id.
    /// Returns `true` when the id was new.
    pub fn upsert(&mut self, entity: Entity) -> bool {
        if let Some(&i) = self.index.get(&entity.id) {
            self.entities[i] = entity;
            false
        } else {
            self.index.insert(entity.id, self.entities.len());
            self.entities.push(entity);
            true
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn as_slice(&self) -> &[Entity] {
        &self.entities
    }

    /// Ids still waiting for a classification, in display order
    pub fn ids_needing_enrichment(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.needs_enrichment())
            .map(|e| e.id)
            .collect()
    }

    /// Merge a page of fetched records against `previous` and upsert them.
    /// Returns how many ids were new to this set.
    pub fn merge_page(&mut self, fetched: Vec<FetchedEntity>, previous: &Self) -> usize {
        let mut added = 0;
        for f in fetched {
            let prev = previous.get(f.id);
            if self.upsert(merge(f, prev)) {
                added += 1;
            }
        }
        added
    }
}

impl FromIterator<Entity> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut set = Self::new();
        for entity in iter {
            set.upsert(entity);
        }
        set
    }
}

impl From<Vec<Entity>> for RecordSet {
    fn from(entities: Vec<Entity>) -> Self {
        entities.into_iter().collect()
    }
}

impl From<RecordSet> for Vec<Entity> {
    fn from(set: RecordSet) -> Self {
        set.entities
    }
}
