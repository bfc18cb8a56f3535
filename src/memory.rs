//! In-memory hierarchy store with staged transactions.
//!
//! Committed rows sit behind one `RwLock`. A [`MemoryTransaction`] buffers its
//! writes privately; [`MemoryStore::commit`] takes the write lock, re-checks
//! every unique constraint against the rows committed meanwhile and then
//! applies the whole batch. Two transactions racing for the same name both
//! pass their pre-flight reads, and the second commit fails with
//! [`StoreError::UniqueViolation`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::closure::{self, ClosureViolation};
use crate::model::{ClosureEdge, Entity, RelationshipRow};
use crate::record;
use crate::store::{
    HierarchyStore, StoreError, Transactional, CLOSURE_PRIMARY_KEY, ENTITY_NAME_CONSTRAINT,
    ENTITY_PRIMARY_KEY,
};
use crate::EntityId;

#[derive(Debug, Default)]
struct Tables {
    entities: BTreeMap<EntityId, Entity>,
    names: HashMap<String, EntityId>,
    /// `(ancestor, descendant) -> depth`
    down: BTreeMap<(EntityId, EntityId), u32>,
    /// `(descendant, ancestor) -> depth`
    up: BTreeMap<(EntityId, EntityId), u32>,
}

impl Tables {
    fn edges_from(&self, ancestor: EntityId) -> impl Iterator<Item = ClosureEdge> + '_ {
        self.down
            .range((ancestor, EntityId::MIN)..=(ancestor, EntityId::MAX))
            .map(|(&(a, d), &depth)| ClosureEdge::new(a, d, depth))
    }

    fn edges_to(&self, descendant: EntityId) -> impl Iterator<Item = ClosureEdge> + '_ {
        self.up
            .range((descendant, EntityId::MIN)..=(descendant, EntityId::MAX))
            .map(|(&(d, a), &depth)| ClosureEdge::new(a, d, depth))
    }

    fn insert_entity(&mut self, entity: Entity) {
        self.names.insert(entity.name.clone(), entity.id);
        self.entities.insert(entity.id, entity);
    }

    fn insert_edge(&mut self, edge: ClosureEdge) {
        self.down.insert(edge.key(), edge.depth);
        self.up
            .insert((edge.descendant_id, edge.ancestor_id), edge.depth);
    }

    fn all_edges(&self) -> Vec<ClosureEdge> {
        self.down
            .iter()
            .map(|(&(a, d), &depth)| ClosureEdge::new(a, d, depth))
            .collect()
    }
}

/// Shared, thread-safe in-memory store. Clones share the same tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from entity rows and an encoded closure relation.
    ///
    /// The relation must decode cleanly and pass [`closure::verify`] against
    /// the given entities.
    pub fn restore(entities: Vec<Entity>, closure_bytes: &[u8]) -> Result<Self, StoreError> {
        let edges =
            record::decode(closure_bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        closure::verify(entities.iter().map(|e| e.id), &edges)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let mut tables = Tables::default();
        for entity in entities {
            if tables.entities.contains_key(&entity.id) {
                return Err(StoreError::unique(ENTITY_PRIMARY_KEY));
            }
            if tables.names.contains_key(&entity.name) {
                return Err(StoreError::unique(ENTITY_NAME_CONSTRAINT));
            }
            tables.insert_entity(entity);
        }
        for edge in edges {
            tables.insert_edge(edge);
        }

        tracing::debug!(
            entities = tables.entities.len(),
            edges = tables.down.len(),
            "restored hierarchy"
        );
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
        })
    }

    /// Encode the committed closure relation.
    pub fn export_closure(&self) -> Vec<u8> {
        record::encode(&self.tables.read().all_edges())
    }

    /// Committed entities in id order.
    pub fn entities(&self) -> Vec<Entity> {
        self.tables.read().entities.values().cloned().collect()
    }

    /// Committed edges ordered by `(ancestor, descendant)`.
    pub fn edges(&self) -> Vec<ClosureEdge> {
        self.tables.read().all_edges()
    }

    pub fn entity_count(&self) -> usize {
        self.tables.read().entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.tables.read().down.len()
    }

    /// Check the committed relation's structural invariants.
    pub fn verify(&self) -> Result<(), ClosureViolation> {
        let tables = self.tables.read();
        closure::verify(tables.entities.keys().copied(), &tables.all_edges())
    }
}

impl Transactional for MemoryStore {
    type Tx = MemoryTransaction;

    fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            entities: Vec::new(),
            edges: Vec::new(),
        })
    }

    fn commit(&self, tx: MemoryTransaction) -> Result<(), StoreError> {
        if !Arc::ptr_eq(&self.tables, &tx.tables) {
            return Err(StoreError::Backend(
                "transaction was opened on a different store".into(),
            ));
        }
        if tx.entities.is_empty() && tx.edges.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write();

        let mut ids = HashSet::with_capacity(tx.entities.len());
        let mut names = HashSet::with_capacity(tx.entities.len());
        for entity in &tx.entities {
            if tables.entities.contains_key(&entity.id) || !ids.insert(entity.id) {
                return Err(StoreError::unique(ENTITY_PRIMARY_KEY));
            }
            if tables.names.contains_key(&entity.name) || !names.insert(entity.name.as_str()) {
                return Err(StoreError::unique(ENTITY_NAME_CONSTRAINT));
            }
        }
        let mut keys = HashSet::with_capacity(tx.edges.len());
        for edge in &tx.edges {
            if tables.down.contains_key(&edge.key()) || !keys.insert(edge.key()) {
                return Err(StoreError::unique(CLOSURE_PRIMARY_KEY));
            }
        }

        let (entity_count, edge_count) = (tx.entities.len(), tx.edges.len());
        for entity in tx.entities {
            tables.insert_entity(entity);
        }
        for edge in tx.edges {
            tables.insert_edge(edge);
        }
        tracing::trace!(entities = entity_count, edges = edge_count, "memory commit");
        Ok(())
    }
}

/// Writes staged against a [`MemoryStore`], applied on commit.
#[derive(Debug)]
pub struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    entities: Vec<Entity>,
    edges: Vec<ClosureEdge>,
}

impl MemoryTransaction {
    /// Number of staged entity and edge rows.
    pub fn pending(&self) -> (usize, usize) {
        (self.entities.len(), self.edges.len())
    }

    fn parent_in(&self, tables: &Tables, id: EntityId) -> Option<EntityId> {
        tables
            .edges_to(id)
            .chain(self.edges.iter().copied().filter(|e| e.descendant_id == id))
            .find(|e| e.depth == 1)
            .map(|e| e.ancestor_id)
    }

    fn visible_entities(&self, tables: &Tables) -> Vec<Entity> {
        let mut all: Vec<Entity> = tables.entities.values().cloned().collect();
        all.extend(self.entities.iter().cloned());
        all
    }
}

impl HierarchyStore for MemoryTransaction {
    fn exists_entity_by_name(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.entities.iter().any(|e| e.name == name) || self.tables.read().names.contains_key(name))
    }

    fn find_entity_by_id(&self, id: EntityId) -> Result<Option<Entity>, StoreError> {
        if let Some(staged) = self.entities.iter().find(|e| e.id == id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.tables.read().entities.get(&id).cloned())
    }

    fn save_entity(&mut self, entity: Entity) -> Result<Entity, StoreError> {
        self.entities.push(entity.clone());
        Ok(entity)
    }

    fn find_closure_edges_by_descendant(
        &self,
        id: EntityId,
    ) -> Result<Vec<ClosureEdge>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .edges_to(id)
            .chain(self.edges.iter().copied().filter(|e| e.descendant_id == id))
            .collect())
    }

    fn find_closure_edges_by_ancestor(
        &self,
        id: EntityId,
    ) -> Result<Vec<ClosureEdge>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .edges_from(id)
            .chain(self.edges.iter().copied().filter(|e| e.ancestor_id == id))
            .collect())
    }

    fn exists_closure_edge(&self, ancestor_id: EntityId, depth: u32) -> Result<bool, StoreError> {
        let staged = self
            .edges
            .iter()
            .any(|e| e.ancestor_id == ancestor_id && e.depth == depth);
        Ok(staged || self.tables.read().edges_from(ancestor_id).any(|e| e.depth == depth))
    }

    fn save_closure_edges(&mut self, edges: &[ClosureEdge]) -> Result<(), StoreError> {
        self.edges.extend_from_slice(edges);
        Ok(())
    }

    fn find_all_root_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let tables = self.tables.read();
        Ok(self
            .visible_entities(&tables)
            .into_iter()
            .filter(|e| self.parent_in(&tables, e.id).is_none())
            .collect())
    }

    fn find_all_relationship_rows(&self) -> Result<Vec<RelationshipRow>, StoreError> {
        let tables = self.tables.read();
        Ok(self
            .visible_entities(&tables)
            .into_iter()
            .map(|e| {
                let parent_id = self.parent_in(&tables, e.id);
                RelationshipRow::new(e.id, e.name, parent_id)
            })
            .collect())
    }
}
