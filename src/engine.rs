//! Hierarchy engine: insertion under a policy, and closure-backed reads.
//!
//! The engine holds no rows of its own. Every operation runs against a
//! [`HierarchyStore`], normally a transaction handle, so a failed check
//! leaves nothing behind: all validation happens before the first write.

use std::collections::HashSet;

use crate::closure;
use crate::collation::NameCollation;
use crate::error::{BatchError, CatalogError};
use crate::model::{normalize_name, ClosureEdge, CreatedEntity, Entity};
use crate::policy::InsertionPolicy;
use crate::snowflake::IdAllocator;
use crate::store::{HierarchyStore, StoreError};
use crate::tree::{build_forest, TreeNode};
use crate::EntityId;

#[derive(Debug)]
pub struct HierarchyEngine<C> {
    policy: InsertionPolicy,
    collation: C,
    max_batch: usize,
}

impl<C: NameCollation> HierarchyEngine<C> {
    pub fn new(policy: InsertionPolicy, collation: C, max_batch: usize) -> Self {
        Self {
            policy,
            collation,
            max_batch,
        }
    }

    #[inline]
    pub fn policy(&self) -> InsertionPolicy {
        self.policy
    }

    #[inline]
    pub fn collation(&self) -> &C {
        &self.collation
    }

    #[inline]
    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Insert `name` as a root, or under `parent_id`.
    ///
    /// The id comes from `ids`, which is only consulted once every check has
    /// passed. Writes the entity, its self-edge and one edge per ancestor of
    /// the parent.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::InvalidName`] for a blank name
    /// - [`CatalogError::DuplicateName`] if the trimmed name exists
    /// - [`CatalogError::ParentNotFound`] for an unknown parent
    /// - [`CatalogError::PolicyViolation`] when the policy refuses the parent
    pub fn create_entity<S, A>(
        &self,
        store: &mut S,
        ids: &A,
        name: &str,
        parent_id: Option<EntityId>,
    ) -> Result<CreatedEntity, CatalogError>
    where
        S: HierarchyStore + ?Sized,
        A: IdAllocator + ?Sized,
    {
        let name = normalize_name(name).ok_or(CatalogError::InvalidName)?;
        if store.exists_entity_by_name(name)? {
            return Err(CatalogError::DuplicateName(name.to_string()));
        }

        let parent_edges = match parent_id {
            Some(pid) => {
                if store.find_entity_by_id(pid)?.is_none() {
                    return Err(CatalogError::ParentNotFound(pid));
                }
                let edges = store.find_closure_edges_by_descendant(pid)?;
                self.policy.check(&*store, pid, &edges)?;
                edges
            }
            None => Vec::new(),
        };

        let id = ids.allocate()?;
        let entity = store.save_entity(Entity::new(id, name))?;
        let edges = closure::edges_for_insert(id, &parent_edges);
        store.save_closure_edges(&edges)?;

        let mut breadcrumb = self.resolve_ancestors(&*store, &parent_edges)?;
        breadcrumb.push(entity.clone());

        Ok(CreatedEntity {
            entity,
            depth: closure::depth_of(&edges),
            breadcrumb,
        })
    }

    /// Insert several roots at once.
    ///
    /// Names are trimmed; the batch must be non-empty, within `max_batch`,
    /// free of repeats, and contain no existing name.
    pub fn create_batch<S, A, N>(
        &self,
        store: &mut S,
        ids: &A,
        names: &[N],
    ) -> Result<Vec<Entity>, CatalogError>
    where
        S: HierarchyStore + ?Sized,
        A: IdAllocator + ?Sized,
        N: AsRef<str>,
    {
        if names.is_empty() {
            return Err(CatalogError::InvalidBatch(BatchError::Empty));
        }
        if names.len() > self.max_batch {
            return Err(BatchError::TooLarge {
                len: names.len(),
                max: self.max_batch,
            }
            .into());
        }

        let mut seen = HashSet::with_capacity(names.len());
        let mut trimmed = Vec::with_capacity(names.len());
        for raw in names {
            let name = normalize_name(raw.as_ref()).ok_or(CatalogError::InvalidName)?;
            if !seen.insert(name) {
                return Err(BatchError::Repeated(name.to_string()).into());
            }
            if store.exists_entity_by_name(name)? {
                return Err(CatalogError::DuplicateName(name.to_string()));
            }
            trimmed.push(name);
        }

        let mut created = Vec::with_capacity(trimmed.len());
        let mut edges = Vec::with_capacity(trimmed.len());
        for name in trimmed {
            let id = ids.allocate()?;
            created.push(store.save_entity(Entity::new(id, name))?);
            edges.push(ClosureEdge::self_edge(id));
        }
        store.save_closure_edges(&edges)?;
        Ok(created)
    }

    /// Entities without a parent. Order is whatever the store returns.
    pub fn list_roots<S>(&self, store: &S) -> Result<Vec<Entity>, CatalogError>
    where
        S: HierarchyStore + ?Sized,
    {
        Ok(store.find_all_root_entities()?)
    }

    /// The whole forest, siblings in collation order.
    pub fn build_tree<S>(&self, store: &S) -> Result<Vec<TreeNode>, CatalogError>
    where
        S: HierarchyStore + ?Sized,
    {
        let rows = store.find_all_relationship_rows()?;
        Ok(build_forest(rows, &self.collation))
    }

    /// `id` and every descendant, as one ordered tree.
    pub fn subtree<S>(&self, store: &S, id: EntityId) -> Result<TreeNode, CatalogError>
    where
        S: HierarchyStore + ?Sized,
    {
        if store.find_entity_by_id(id)?.is_none() {
            return Err(CatalogError::EntityNotFound(id));
        }
        let mut rows = store.find_subtree_rows(id)?;
        // The subtree root is a root here, whatever its real parent.
        for row in rows.iter_mut().filter(|r| r.id == id) {
            row.parent_id = None;
        }
        build_forest(rows, &self.collation)
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::Corrupt(format!("entity {} has no self-edge", id)).into()
            })
    }

    /// Root-to-node path ending at `id`. A root's breadcrumb is itself.
    pub fn breadcrumb<S>(&self, store: &S, id: EntityId) -> Result<Vec<Entity>, CatalogError>
    where
        S: HierarchyStore + ?Sized,
    {
        if store.find_entity_by_id(id)?.is_none() {
            return Err(CatalogError::EntityNotFound(id));
        }
        let edges = store.find_closure_edges_by_descendant(id)?;
        self.resolve_ancestors(store, &edges)
    }

    /// Entities named by `ancestor_edges`, farthest ancestor first.
    fn resolve_ancestors<S>(
        &self,
        store: &S,
        ancestor_edges: &[ClosureEdge],
    ) -> Result<Vec<Entity>, CatalogError>
    where
        S: HierarchyStore + ?Sized,
    {
        closure::ancestors_root_first(ancestor_edges)
            .into_iter()
            .map(|ancestor| -> Result<Entity, CatalogError> {
                store.find_entity_by_id(ancestor)?.ok_or_else(|| {
                    StoreError::Corrupt(format!("closure edge names missing entity {}", ancestor))
                        .into()
                })
            })
            .collect()
    }
}
