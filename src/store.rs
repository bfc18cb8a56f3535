//! Storage contract for entities and closure rows.
//!
//! The engine only talks to [`HierarchyStore`]; atomicity comes from the host
//! through [`Transactional`]. A transaction handle is itself a store: reads
//! through it see committed rows plus its own staged writes, and nothing it
//! writes is visible to anyone else until [`Transactional::commit`].

use crate::model::{ClosureEdge, Entity, RelationshipRow};
use crate::EntityId;

/// Unique constraint on trimmed entity names.
pub const ENTITY_NAME_CONSTRAINT: &str = "entity_name_key";
/// Primary key on entity ids.
pub const ENTITY_PRIMARY_KEY: &str = "entity_pkey";
/// Primary key on `(ancestor_id, descendant_id)`.
pub const CLOSURE_PRIMARY_KEY: &str = "closure_pkey";

/// Failures reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique or primary-key constraint rejected the write at commit.
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    /// Serialization failure or similar; the whole operation may be retried.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("stored hierarchy is inconsistent: {0}")]
    Corrupt(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: &str) -> Self {
        Self::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }

    /// True when a concurrent writer claimed the same name first.
    pub fn is_name_conflict(&self) -> bool {
        matches!(self, Self::UniqueViolation { constraint } if constraint == ENTITY_NAME_CONSTRAINT)
    }
}

/// Row-level access to the hierarchy tables.
pub trait HierarchyStore {
    /// Exact, case-sensitive match on an already trimmed name.
    fn exists_entity_by_name(&self, name: &str) -> Result<bool, StoreError>;

    fn find_entity_by_id(&self, id: EntityId) -> Result<Option<Entity>, StoreError>;

    fn save_entity(&mut self, entity: Entity) -> Result<Entity, StoreError>;

    /// Every edge ending at `id`, self-edge included. Order unspecified.
    fn find_closure_edges_by_descendant(
        &self,
        id: EntityId,
    ) -> Result<Vec<ClosureEdge>, StoreError>;

    /// Every edge starting at `id`, self-edge included. Order unspecified.
    fn find_closure_edges_by_ancestor(
        &self,
        id: EntityId,
    ) -> Result<Vec<ClosureEdge>, StoreError>;

    /// Whether any edge leaves `ancestor_id` at exactly `depth`.
    fn exists_closure_edge(&self, ancestor_id: EntityId, depth: u32) -> Result<bool, StoreError>;

    /// Persist a batch of edges, all or nothing within the transaction.
    fn save_closure_edges(&mut self, edges: &[ClosureEdge]) -> Result<(), StoreError>;

    /// Entities without a depth-1 incoming edge.
    fn find_all_root_entities(&self) -> Result<Vec<Entity>, StoreError>;

    /// One row per entity with its parent from the depth-1 edge.
    fn find_all_relationship_rows(&self) -> Result<Vec<RelationshipRow>, StoreError>;

    /// Rows for `root` and all its descendants, each with its real parent.
    ///
    /// The default joins the descendant edges with per-id lookups; backends
    /// with a query language should override it with a single query.
    fn find_subtree_rows(&self, root: EntityId) -> Result<Vec<RelationshipRow>, StoreError> {
        let mut rows = Vec::new();
        for edge in self.find_closure_edges_by_ancestor(root)? {
            let id = edge.descendant_id;
            let entity = self.find_entity_by_id(id)?.ok_or_else(|| {
                StoreError::Corrupt(format!("closure edge names missing entity {}", id))
            })?;
            let parent_id = self
                .find_closure_edges_by_descendant(id)?
                .into_iter()
                .find(|e| e.depth == 1)
                .map(|e| e.ancestor_id);
            rows.push(RelationshipRow::new(id, entity.name, parent_id));
        }
        Ok(rows)
    }
}

/// Transaction boundary supplied by the host.
///
/// Dropping a transaction without committing discards its writes.
pub trait Transactional {
    type Tx: HierarchyStore;

    fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Apply every staged write atomically, or none of them.
    fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
}
