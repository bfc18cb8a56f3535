//! Where a new child may be attached.

use catalog_tree_config::{DEFAULT_MAX_DEPTH, HierarchySettings, PolicySetting};

use crate::closure;
use crate::error::{CatalogError, PolicyViolation};
use crate::model::ClosureEdge;
use crate::store::HierarchyStore;
use crate::EntityId;

/// Rule applied before inserting under an existing parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertionPolicy {
    /// Any node may take children, as long as the child's depth stays within
    /// `max_depth` (a root is depth 0).
    DepthCapped { max_depth: u32 },
    /// Only nodes without children may take one. Depth is not capped.
    LeafOnly,
}

impl Default for InsertionPolicy {
    fn default() -> Self {
        Self::DepthCapped {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl InsertionPolicy {
    pub fn from_settings(settings: &HierarchySettings) -> Self {
        match settings.policy {
            PolicySetting::DepthCapped => Self::DepthCapped {
                max_depth: settings.max_depth,
            },
            PolicySetting::LeafOnly => Self::LeafOnly,
        }
    }

    /// Check that a child may be attached to `parent_id`.
    ///
    /// `parent_edges` are all edges ending at the parent, self-edge included.
    pub fn check<S: HierarchyStore + ?Sized>(
        &self,
        store: &S,
        parent_id: EntityId,
        parent_edges: &[ClosureEdge],
    ) -> Result<(), CatalogError> {
        match *self {
            Self::DepthCapped { max_depth } => {
                let depth = closure::depth_of(parent_edges) + 1;
                if depth > max_depth {
                    return Err(PolicyViolation::MaxDepthExceeded {
                        parent_id,
                        depth,
                        max_depth,
                    }
                    .into());
                }
            }
            Self::LeafOnly => {
                if store.exists_closure_edge(parent_id, 1)? {
                    return Err(PolicyViolation::ParentNotLeaf { parent_id }.into());
                }
            }
        }
        Ok(())
    }
}
