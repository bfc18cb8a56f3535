//! Row shapes shared by the engine and the storage contract.

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A named node of the hierarchy. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One `(ancestor, descendant, depth)` row of the closure relation.
///
/// Keyed by `(ancestor_id, descendant_id)`. `depth` counts the edges on the
/// path between the two; the self-edge has depth 0 and the parent link has
/// depth 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClosureEdge {
    pub ancestor_id: EntityId,
    pub descendant_id: EntityId,
    pub depth: u32,
}

impl ClosureEdge {
    pub const fn new(ancestor_id: EntityId, descendant_id: EntityId, depth: u32) -> Self {
        Self {
            ancestor_id,
            descendant_id,
            depth,
        }
    }

    /// The `(id, id, 0)` edge every entity carries.
    pub const fn self_edge(id: EntityId) -> Self {
        Self::new(id, id, 0)
    }

    #[inline]
    pub const fn is_self_edge(&self) -> bool {
        self.depth == 0
    }

    /// Primary key of the row.
    #[inline]
    pub const fn key(&self) -> (EntityId, EntityId) {
        (self.ancestor_id, self.descendant_id)
    }
}

/// Flat `(id, name, parent)` row used to rebuild trees in one pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRow {
    pub id: EntityId,
    pub name: String,
    /// Ancestor on the depth-1 edge, absent for roots.
    pub parent_id: Option<EntityId>,
}

impl RelationshipRow {
    pub fn new(id: EntityId, name: impl Into<String>, parent_id: Option<EntityId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
        }
    }
}

/// Outcome of a successful insertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEntity {
    pub entity: Entity,
    /// Distance from the topmost ancestor; 0 for a root.
    pub depth: u32,
    /// Root-to-node path, ending with `entity` itself.
    pub breadcrumb: Vec<Entity>,
}

/// Trim `raw` and reject names that are empty afterwards.
pub fn normalize_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
