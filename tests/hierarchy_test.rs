//! End-to-end tests for the category service over the in-memory store.

use catalog_tree::*;

fn service(policy: InsertionPolicy) -> CategoryService<MemoryStore, LocaleCollation> {
    let engine = HierarchyEngine::new(policy, LocaleCollation::korean().unwrap(), 5);
    CategoryService::new(MemoryStore::new(), SnowflakeGenerator::with_defaults(), engine)
}

fn names(entities: &[Entity]) -> Vec<&str> {
    entities.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn self_edge_exists_after_create() {
    let svc = service(InsertionPolicy::default());
    let created = svc.create("가전", None).unwrap();
    let id = created.entity.id;
    assert!(svc.store().edges().contains(&ClosureEdge::self_edge(id)));
}

#[test]
fn child_inherits_parent_ancestry_plus_one() {
    let svc = service(InsertionPolicy::default());
    let root = svc.create("root", None).unwrap().entity;
    let mid = svc.create("mid", Some(root.id)).unwrap().entity;
    let leaf = svc.create("leaf", Some(mid.id)).unwrap().entity;

    let edges = svc.store().edges();
    let ending_at = |id: EntityId| edges.iter().filter(|e| e.descendant_id == id).collect::<Vec<_>>();

    let parent_edges = ending_at(mid.id);
    let child_edges = ending_at(leaf.id);
    assert_eq!(child_edges.len(), parent_edges.len() + 1);
    for pe in parent_edges {
        assert!(child_edges
            .iter()
            .any(|ce| ce.ancestor_id == pe.ancestor_id && ce.depth == pe.depth + 1));
    }
}

#[test]
fn breadcrumb_runs_root_to_leaf() {
    let svc = service(InsertionPolicy::default());
    let root = svc.create("root", None).unwrap().entity;
    let a = svc.create("A", Some(root.id)).unwrap().entity;
    let b = svc.create("B", Some(a.id)).unwrap().entity;
    let c = svc.create("C", Some(b.id)).unwrap();

    assert_eq!(names(&c.breadcrumb), vec!["root", "A", "B", "C"]);
    assert_eq!(names(&svc.breadcrumb(b.id).unwrap()), vec!["root", "A", "B"]);
    assert_eq!(names(&svc.breadcrumb(root.id).unwrap()), vec!["root"]);
}

#[test]
fn fourth_level_allowed_fifth_refused() {
    let svc = service(InsertionPolicy::DepthCapped { max_depth: 4 });
    let mut parent = svc.create("L0", None).unwrap();
    for level in 1..=4 {
        parent = svc
            .create(&format!("L{}", level), Some(parent.entity.id))
            .unwrap();
    }
    assert_eq!(parent.depth, 4);

    let err = svc.create("L5", Some(parent.entity.id)).unwrap_err();
    assert!(matches!(
        err,
        CatalogError::PolicyViolation(PolicyViolation::MaxDepthExceeded { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[test]
fn depth_capped_accepts_non_leaf_parent() {
    let svc = service(InsertionPolicy::default());
    let root = svc.create("root", None).unwrap().entity;
    svc.create("first", Some(root.id)).unwrap();
    assert!(svc.create("second", Some(root.id)).is_ok());
}

#[test]
fn leaf_only_refuses_occupied_parent() {
    let svc = service(InsertionPolicy::LeafOnly);
    let root = svc.create("root", None).unwrap().entity;
    let child = svc.create("child", Some(root.id)).unwrap().entity;

    let err = svc.create("second", Some(root.id)).unwrap_err();
    assert_eq!(
        err,
        CatalogError::PolicyViolation(PolicyViolation::ParentNotLeaf { parent_id: root.id })
    );
    assert!(svc.create("grandchild", Some(child.id)).is_ok());
}

#[test]
fn duplicate_name_after_trimming_rejected_anywhere() {
    let svc = service(InsertionPolicy::default());
    let root = svc.create("도서", None).unwrap().entity;

    for (name, parent) in [(" 도서", None), ("도서  ", Some(root.id))] {
        let err = svc.create(name, parent).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateName("도서".into()));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
    // Case-sensitive
    svc.create("Books", None).unwrap();
    assert!(svc.create("books", None).is_ok());
}

#[test]
fn unknown_parent_is_not_found() {
    let svc = service(InsertionPolicy::default());
    let err = svc.create("orphan", Some(123)).unwrap_err();
    assert_eq!(err, CatalogError::ParentNotFound(123));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(svc.store().entity_count(), 0);
}

#[test]
fn roots_exclude_children() {
    let svc = service(InsertionPolicy::default());
    let a = svc.create("a", None).unwrap().entity;
    let b = svc.create("b", None).unwrap().entity;
    let a1 = svc.create("a1", Some(a.id)).unwrap().entity;

    let roots = svc.get_roots().unwrap();
    let ids: Vec<EntityId> = roots.iter().map(|e| e.id).collect();
    assert!(ids.contains(&a.id) && ids.contains(&b.id));
    assert!(!ids.contains(&a1.id));
}

#[test]
fn korean_tree_from_spec_rows() {
    let svc = service(InsertionPolicy::default());
    svc.create_with_id(1, "나", None).unwrap();
    svc.create_with_id(3, "다", Some(1)).unwrap();
    svc.create_with_id(2, "가", Some(1)).unwrap();

    let forest = svc.get_full_tree().unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].id(), 1);
    let children: Vec<(EntityId, &str)> = forest[0]
        .children()
        .iter()
        .map(|n| (n.id(), n.name()))
        .collect();
    assert_eq!(children, vec![(2, "가"), (3, "다")]);
}

#[test]
fn roots_in_full_tree_follow_korean_order() {
    let svc = service(InsertionPolicy::default());
    for name in ["하늘", "가방", "나무", "다리"] {
        svc.create(name, None).unwrap();
    }
    let forest = svc.get_full_tree().unwrap();
    let order: Vec<&str> = forest.iter().map(TreeNode::name).collect();
    assert_eq!(order, vec!["가방", "나무", "다리", "하늘"]);
}

#[test]
fn batch_creates_roots_atomically() {
    let svc = service(InsertionPolicy::default());
    let created = svc.create_batch(&["의류", "식품", " 가구 "]).unwrap();
    assert_eq!(names(&created), vec!["의류", "식품", "가구"]);
    assert_eq!(svc.store().edge_count(), 3);

    let err = svc.create_batch(&["새것", "식품"]).unwrap_err();
    assert_eq!(err, CatalogError::DuplicateName("식품".into()));
    assert_eq!(svc.store().entity_count(), 3);

    let too_many = ["1", "2", "3", "4", "5", "6"];
    assert!(matches!(
        svc.create_batch(&too_many),
        Err(CatalogError::InvalidBatch(BatchError::TooLarge { len: 6, max: 5 }))
    ));
}

#[test]
fn subtree_query_returns_ordered_descendants() {
    let svc = service(InsertionPolicy::default());
    let root = svc.create("전체", None).unwrap().entity;
    let food = svc.create("식품", Some(root.id)).unwrap().entity;
    svc.create("채소", Some(food.id)).unwrap();
    svc.create("과일", Some(food.id)).unwrap();
    svc.create("의류", Some(root.id)).unwrap();

    let TreeView::Subtree(node) = svc.get(TreeQuery::Subtree(food.id)).unwrap() else {
        panic!("expected subtree view");
    };
    assert_eq!(node.name(), "식품");
    let kids: Vec<&str> = node.children().iter().map(TreeNode::name).collect();
    assert_eq!(kids, vec!["과일", "채소"]);
    assert!(node.find(root.id).is_none());
}

#[test]
fn closure_stays_valid_and_exportable() {
    let svc = service(InsertionPolicy::default());
    let root = svc.create("root", None).unwrap().entity;
    let mut parent = root.id;
    for i in 0..3 {
        parent = svc.create(&format!("n{}", i), Some(parent)).unwrap().entity.id;
        svc.create(&format!("side{}", i), Some(root.id)).unwrap();
    }
    svc.store().verify().unwrap();

    let restored =
        MemoryStore::restore(svc.store().entities(), &svc.store().export_closure()).unwrap();
    assert_eq!(restored.edges(), svc.store().edges());
}

#[test]
fn created_ids_decode_to_generator_node() {
    let svc = service(InsertionPolicy::default());
    let created = svc.create("x", None).unwrap();
    assert_eq!(node_of(created.entity.id), svc.generator().node_id());
}

#[test]
fn concurrent_creates_under_one_parent_keep_closure_consistent() {
    let store = MemoryStore::new();
    let generator = std::sync::Arc::new(SnowflakeGenerator::with_defaults());
    let engine = std::sync::Arc::new(HierarchyEngine::new(
        InsertionPolicy::default(),
        CodePointOrder,
        5,
    ));

    let root = {
        let mut tx = store.begin().unwrap();
        let created = engine
            .create_entity(&mut tx, generator.as_ref(), "root", None)
            .unwrap();
        store.commit(tx).unwrap();
        created.entity.id
    };

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let (store, generator, engine) = (store.clone(), generator.clone(), engine.clone());
            std::thread::spawn(move || {
                for i in 0..25 {
                    let mut tx = store.begin().unwrap();
                    let name = format!("t{}-{}", t, i);
                    engine
                        .create_entity(&mut tx, generator.as_ref(), &name, Some(root))
                        .unwrap();
                    store.commit(tx).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.entity_count(), 201);
    assert_eq!(store.edge_count(), 1 + 200 * 2);
    store.verify().unwrap();
}

#[test]
fn clock_jump_past_tolerance_is_fatal() {
    let clock = ManualClock::new(10_000);
    let generator = SnowflakeGenerator::with_clock(0, 1, 10, clock).unwrap();
    let engine = HierarchyEngine::new(InsertionPolicy::default(), CodePointOrder, 5);
    let svc = CategoryService::new(MemoryStore::new(), generator, engine);
    svc.create("first", None).unwrap();

    svc.generator().clock().set(9_950);
    let err = svc.create("second", None).unwrap_err();
    assert_eq!(
        err,
        CatalogError::ClockMovedBackwards {
            drift_millis: 50,
            tolerance_millis: 10
        }
    );
    assert!(!err.is_retryable());
    assert_eq!(svc.store().entity_count(), 1);
}

#[test]
fn preassigned_id_clash_is_not_retryable() {
    let svc = service(InsertionPolicy::default());
    svc.create_with_id(42, "x", None).unwrap();
    for i in 0..3 {
        let err = svc.create_with_id(42, &format!("y{i}"), None).unwrap_err();
        assert_eq!(err, CatalogError::Store(StoreError::unique(store::ENTITY_PRIMARY_KEY)));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }
}
