//! Transactional façade over the engine, the generator and a store.

use std::path::Path;

use catalog_tree_config::CatalogConfig;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::collation::{Collation, NameCollation};
use crate::engine::HierarchyEngine;
use crate::error::CatalogError;
use crate::model::{CreatedEntity, Entity};
use crate::policy::InsertionPolicy;
use crate::snowflake::{IdAllocator, PreassignedId, SnowflakeGenerator};
use crate::store::{HierarchyStore, Transactional};
use crate::tree::TreeNode;
use crate::EntityId;

/// Which read the caller wants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeQuery {
    /// Top-level entities only, unordered.
    Roots,
    /// The whole forest.
    Full,
    /// One entity and its descendants.
    Subtree(EntityId),
}

/// Result of a [`TreeQuery`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum TreeView {
    Roots(Vec<Entity>),
    Forest(Vec<TreeNode>),
    Subtree(TreeNode),
}

pub struct CategoryService<S, C = Collation, K: Clock = SystemClock> {
    store: S,
    generator: SnowflakeGenerator<K>,
    engine: HierarchyEngine<C>,
}

impl<S: Transactional> CategoryService<S> {
    /// Wire a service from validated configuration.
    ///
    /// Builds the generator (inferring the node id if configured to), the
    /// insertion policy and the sibling collation.
    pub fn from_config(config: &CatalogConfig, store: S) -> Result<Self, CatalogError> {
        let generator = SnowflakeGenerator::from_settings(&config.snowflake)?;
        let collation = Collation::from_setting(&config.hierarchy.collation)
            .map_err(|e| CatalogError::ConfigurationInvalid(e.to_string()))?;
        let engine = HierarchyEngine::new(
            InsertionPolicy::from_settings(&config.hierarchy),
            collation,
            config.hierarchy.max_batch,
        );
        tracing::info!(
            generator = %generator,
            policy = ?engine.policy(),
            "category service ready"
        );
        Ok(Self::new(store, generator, engine))
    }

    /// [`from_config`](Self::from_config) on a configuration file.
    pub fn from_config_file(path: impl AsRef<Path>, store: S) -> Result<Self, CatalogError> {
        let config = catalog_tree_config::load(path)?;
        Self::from_config(&config, store)
    }
}

impl<S, C, K> CategoryService<S, C, K>
where
    S: Transactional,
    C: NameCollation,
    K: Clock,
{
    pub fn new(store: S, generator: SnowflakeGenerator<K>, engine: HierarchyEngine<C>) -> Self {
        Self {
            store,
            generator,
            engine,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generator(&self) -> &SnowflakeGenerator<K> {
        &self.generator
    }

    pub fn engine(&self) -> &HierarchyEngine<C> {
        &self.engine
    }

    /// Create an entity with a freshly minted id, in its own transaction.
    pub fn create(
        &self,
        name: &str,
        parent_id: Option<EntityId>,
    ) -> Result<CreatedEntity, CatalogError> {
        self.create_with(&self.generator, name, parent_id)
    }

    /// Create an entity under an id chosen by the caller.
    pub fn create_with_id(
        &self,
        id: EntityId,
        name: &str,
        parent_id: Option<EntityId>,
    ) -> Result<CreatedEntity, CatalogError> {
        self.create_with(&PreassignedId(id), name, parent_id)
    }

    fn create_with<A: IdAllocator + ?Sized>(
        &self,
        ids: &A,
        name: &str,
        parent_id: Option<EntityId>,
    ) -> Result<CreatedEntity, CatalogError> {
        let mut tx = self.store.begin()?;
        let created = self.engine.create_entity(&mut tx, ids, name, parent_id)?;
        self.commit(tx, &[created.entity.name.as_str()])?;
        tracing::info!(
            id = created.entity.id,
            parent = ?parent_id,
            depth = created.depth,
            "created entity"
        );
        Ok(created)
    }

    /// Create several roots in one transaction.
    pub fn create_batch<N: AsRef<str>>(&self, names: &[N]) -> Result<Vec<Entity>, CatalogError> {
        let mut tx = self.store.begin()?;
        let created = self.engine.create_batch(&mut tx, &self.generator, names)?;
        let staged: Vec<&str> = created.iter().map(|e| e.name.as_str()).collect();
        self.commit(tx, &staged)?;
        tracing::info!(count = created.len(), "created root batch");
        Ok(created)
    }

    pub fn get_roots(&self) -> Result<Vec<Entity>, CatalogError> {
        let tx = self.store.begin()?;
        self.engine.list_roots(&tx)
    }

    pub fn get_full_tree(&self) -> Result<Vec<TreeNode>, CatalogError> {
        let tx = self.store.begin()?;
        self.engine.build_tree(&tx)
    }

    pub fn subtree(&self, id: EntityId) -> Result<TreeNode, CatalogError> {
        let tx = self.store.begin()?;
        self.engine.subtree(&tx, id)
    }

    pub fn breadcrumb(&self, id: EntityId) -> Result<Vec<Entity>, CatalogError> {
        let tx = self.store.begin()?;
        self.engine.breadcrumb(&tx, id)
    }

    /// Dispatch a read.
    pub fn get(&self, query: TreeQuery) -> Result<TreeView, CatalogError> {
        match query {
            TreeQuery::Roots => self.get_roots().map(TreeView::Roots),
            TreeQuery::Full => self.get_full_tree().map(TreeView::Forest),
            TreeQuery::Subtree(id) => self.subtree(id).map(TreeView::Subtree),
        }
    }

    /// Commit, reporting a lost name race as a duplicate of the name that
    /// was actually taken.
    fn commit(&self, tx: S::Tx, names: &[&str]) -> Result<(), CatalogError> {
        let err = match self.store.commit(tx) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_name_conflict() => err,
            Err(err) => return Err(CatalogError::Store(err)),
        };
        let committed = self.store.begin()?;
        for name in names {
            if committed.exists_entity_by_name(name)? {
                tracing::debug!(name, "name claimed by a concurrent writer");
                return Err(CatalogError::DuplicateName(name.to_string()));
            }
        }
        Err(CatalogError::Store(err))
    }
}

impl<S, C, K: Clock> std::fmt::Debug for CategoryService<S, C, K>
where
    S: std::fmt::Debug,
    C: std::fmt::Debug,
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryService")
            .field("store", &self.store)
            .field("generator", &self.generator)
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collation::CodePointOrder;
    use crate::memory::MemoryStore;
    use crate::store::{ENTITY_PRIMARY_KEY, StoreError};

    fn service(policy: InsertionPolicy) -> CategoryService<MemoryStore, CodePointOrder, ManualClock> {
        let generator = SnowflakeGenerator::with_clock(
            0,
            1,
            10,
            ManualClock::new(1_000).with_auto_advance(1),
        )
        .unwrap();
        CategoryService::new(
            MemoryStore::new(),
            generator,
            HierarchyEngine::new(policy, CodePointOrder, 5),
        )
    }

    #[test]
    fn create_commits_atomically() {
        let svc = service(InsertionPolicy::default());
        let root = svc.create("root", None).unwrap();
        let child = svc.create("child", Some(root.entity.id)).unwrap();

        assert_eq!(svc.store().entity_count(), 2);
        assert_eq!(svc.store().edge_count(), 3);
        assert_eq!(svc.store().verify(), Ok(()));
        assert!(child.entity.id > root.entity.id);
    }

    #[test]
    fn failed_create_leaves_store_untouched() {
        let svc = service(InsertionPolicy::LeafOnly);
        let root = svc.create("root", None).unwrap();
        svc.create("only", Some(root.entity.id)).unwrap();
        let before = svc.store().edges();

        assert!(svc.create("second", Some(root.entity.id)).is_err());
        assert!(svc.create("only", None).is_err());
        assert_eq!(svc.store().edges(), before);
    }

    #[test]
    fn lost_name_race_maps_to_duplicate() {
        let svc = service(InsertionPolicy::default());
        // A concurrent writer slips in between pre-flight check and commit
        let mut tx = svc.store().begin().unwrap();
        svc.engine()
            .create_entity(&mut tx, &PreassignedId(5), "contested", None)
            .unwrap();
        svc.create("contested", None).unwrap();

        let err = svc.commit(tx, &["contested"]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateName("contested".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn create_with_id_uses_caller_id() {
        let svc = service(InsertionPolicy::default());
        let created = svc.create_with_id(42, "answer", None).unwrap();
        assert_eq!(created.entity.id, 42);
        let clash = svc.create_with_id(42, "other", None).unwrap_err();
        assert_eq!(
            clash,
            CatalogError::Store(StoreError::unique(ENTITY_PRIMARY_KEY))
        );
        assert!(!clash.is_retryable());
        // Retrying the same id never helps
        for i in 0..3 {
            let again = svc.create_with_id(42, &format!("other{i}"), None).unwrap_err();
            assert_eq!(again, clash);
        }
        assert_eq!(svc.store().entity_count(), 1);
    }

    #[test]
    fn lost_batch_race_names_the_taken_entry() {
        let svc = service(InsertionPolicy::default());
        let mut tx = svc.store().begin().unwrap();
        svc.engine()
            .create_batch(&mut tx, svc.generator(), &["a", "b", "c"])
            .unwrap();
        svc.create("b", None).unwrap();

        let err = svc.commit(tx, &["a", "b", "c"]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateName("b".into()));
        assert_eq!(svc.store().entity_count(), 1);
    }

    #[test]
    fn query_dispatch() {
        let svc = service(InsertionPolicy::default());
        let root = svc.create("root", None).unwrap().entity;
        svc.create("kid", Some(root.id)).unwrap();

        assert!(matches!(svc.get(TreeQuery::Roots), Ok(TreeView::Roots(r)) if r.len() == 1));
        assert!(matches!(svc.get(TreeQuery::Full), Ok(TreeView::Forest(f)) if f.len() == 1));
        match svc.get(TreeQuery::Subtree(root.id)).unwrap() {
            TreeView::Subtree(node) => assert_eq!(node.children()[0].name(), "kid"),
            other => panic!("unexpected view {:?}", other),
        }
        assert_eq!(
            svc.get(TreeQuery::Subtree(12345)),
            Err(CatalogError::EntityNotFound(12345))
        );
    }

    #[test]
    fn tree_view_json_shape() {
        let svc = service(InsertionPolicy::default());
        svc.create("solo", None).unwrap();
        let json = serde_json::to_value(svc.get(TreeQuery::Roots).unwrap()).unwrap();
        assert_eq!(json["kind"], "roots");
        assert_eq!(json["items"][0]["name"], "solo");
    }

    #[test]
    fn from_config_wires_everything() {
        let config: CatalogConfig = r#"
[snowflake]
node_id = 3

[hierarchy]
policy = "leaf-only"
max_batch = 2
collation = "ko"
"#
        .parse()
        .unwrap();
        let svc = CategoryService::from_config(&config, MemoryStore::new()).unwrap();
        assert_eq!(svc.generator().node_id(), 3);
        assert_eq!(svc.engine().policy(), InsertionPolicy::LeafOnly);
        assert_eq!(svc.engine().max_batch(), 2);
        assert!(svc.create_batch(&["a", "b", "c"]).is_err());
    }

    #[test]
    fn from_config_rejects_bad_locale() {
        let mut config = CatalogConfig::default();
        config.hierarchy.collation =
            catalog_tree_config::CollationSetting::Locale("???".into());
        let err = CategoryService::from_config(&config, MemoryStore::new()).unwrap_err();
        assert!(matches!(err, CatalogError::ConfigurationInvalid(_)));
    }

    #[test]
    fn reads_see_only_committed_rows() {
        let svc = service(InsertionPolicy::default());
        let mut tx = svc.store().begin().unwrap();
        tx.save_entity(Entity::new(1, "staged")).unwrap();
        assert!(svc.get_roots().unwrap().is_empty());
    }
}
