//! Closure relation arithmetic: the rows an insertion writes, ancestor
//! ordering and a structural checker for whole relations.
//!
//! Inserting `n` under `p` copies every edge `(a, p, k)` ending at the parent
//! into `(a, n, k + 1)` and adds the self-edge `(n, n, 0)`. Reads then answer
//! ancestor and descendant questions with a single lookup instead of a
//! recursive walk, at the cost of O(depth) writes per insertion.

use std::collections::{HashMap, HashSet};

use crate::model::ClosureEdge;
use crate::EntityId;

/// Edges to persist for a new entity `id` placed under the parent whose
/// ancestor chain (self-edge included) is `parent_edges`.
///
/// The self-edge comes first. With no parent, only the self-edge is returned.
pub fn edges_for_insert(id: EntityId, parent_edges: &[ClosureEdge]) -> Vec<ClosureEdge> {
    let mut edges = Vec::with_capacity(parent_edges.len() + 1);
    edges.push(ClosureEdge::self_edge(id));
    edges.extend(
        parent_edges
            .iter()
            .map(|edge| ClosureEdge::new(edge.ancestor_id, id, edge.depth + 1)),
    );
    edges
}

/// Depth of a node given every edge ending at it.
#[inline]
pub fn depth_of(ancestor_edges: &[ClosureEdge]) -> u32 {
    ancestor_edges.iter().map(|e| e.depth).max().unwrap_or(0)
}

/// Ancestor ids ordered root first, the node itself last.
///
/// Depth is the distance from the node, so the farthest ancestor (largest
/// depth) leads. Input order is irrelevant.
pub fn ancestors_root_first(ancestor_edges: &[ClosureEdge]) -> Vec<EntityId> {
    let mut edges = ancestor_edges.to_vec();
    edges.sort_by(|a, b| b.depth.cmp(&a.depth));
    edges.into_iter().map(|e| e.ancestor_id).collect()
}

/// Structural problems [`verify`] can find in a closure relation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClosureViolation {
    #[error("edge ({ancestor}, {descendant}) references an unknown entity")]
    UnknownEntity {
        ancestor: EntityId,
        descendant: EntityId,
    },

    #[error("edge ({ancestor}, {descendant}) appears more than once")]
    DuplicateEdge {
        ancestor: EntityId,
        descendant: EntityId,
    },

    #[error("entity {0} has no self-edge")]
    MissingSelfEdge(EntityId),

    #[error("edge ({ancestor}, {descendant}) has depth {depth}, inconsistent with its endpoints")]
    BadDepth {
        ancestor: EntityId,
        descendant: EntityId,
        depth: u32,
    },

    #[error("entity {0} has more than one parent")]
    MultipleParents(EntityId),

    #[error("edge ({ancestor}, {descendant}) at depth {depth} has no path through the parent")]
    BrokenPath {
        ancestor: EntityId,
        descendant: EntityId,
        depth: u32,
    },

    #[error("entity {descendant} is missing ancestor {ancestor} inherited from its parent")]
    IncompleteAncestry {
        ancestor: EntityId,
        descendant: EntityId,
    },
}

/// Check that `edges` is the closure of a single-parent forest over `entities`.
///
/// Verifies one self-edge per entity, unique keys, depth 0 exactly on
/// self-edges, at most one parent each, that every deeper edge continues
/// through the parent, and that each node inherits all of its parent's
/// ancestors.
pub fn verify(
    entities: impl IntoIterator<Item = EntityId>,
    edges: &[ClosureEdge],
) -> Result<(), ClosureViolation> {
    let known: HashSet<EntityId> = entities.into_iter().collect();
    let mut by_key: HashMap<(EntityId, EntityId), u32> = HashMap::with_capacity(edges.len());
    let mut parent: HashMap<EntityId, EntityId> = HashMap::new();
    let mut ancestors: HashMap<EntityId, Vec<&ClosureEdge>> = HashMap::new();

    for edge in edges {
        let (a, d) = edge.key();
        if !known.contains(&a) || !known.contains(&d) {
            return Err(ClosureViolation::UnknownEntity {
                ancestor: a,
                descendant: d,
            });
        }
        if by_key.insert((a, d), edge.depth).is_some() {
            return Err(ClosureViolation::DuplicateEdge {
                ancestor: a,
                descendant: d,
            });
        }
        if (a == d) != (edge.depth == 0) {
            return Err(ClosureViolation::BadDepth {
                ancestor: a,
                descendant: d,
                depth: edge.depth,
            });
        }
        if edge.depth == 1 && parent.insert(d, a).is_some() {
            return Err(ClosureViolation::MultipleParents(d));
        }
        ancestors.entry(d).or_default().push(edge);
    }

    for id in &known {
        if !by_key.contains_key(&(*id, *id)) {
            return Err(ClosureViolation::MissingSelfEdge(*id));
        }
    }

    for edge in edges.iter().filter(|e| e.depth > 1) {
        let through_parent = parent
            .get(&edge.descendant_id)
            .and_then(|p| by_key.get(&(edge.ancestor_id, *p)));
        if through_parent != Some(&(edge.depth - 1)) {
            return Err(ClosureViolation::BrokenPath {
                ancestor: edge.ancestor_id,
                descendant: edge.descendant_id,
                depth: edge.depth,
            });
        }
    }

    for (child, p) in &parent {
        let inherited = ancestors.get(p).map(Vec::as_slice).unwrap_or_default();
        for edge in inherited {
            if by_key.get(&(edge.ancestor_id, *child)) != Some(&(edge.depth + 1)) {
                return Err(ClosureViolation::IncompleteAncestry {
                    ancestor: edge.ancestor_id,
                    descendant: *child,
                });
            }
        }
    }

    Ok(())
}
