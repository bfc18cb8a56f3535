//! # Category Hierarchy Engine (catalog-tree)
//!
//! Maintains a category tree as a closure table and mints time-ordered 64-bit
//! ids for its entities.
//!
//! ## Design
//!
//! Every entity `x` stores one row per ancestor `(a, x, depth)`, including
//! the self-row `(x, x, 0)`. Ancestor and descendant queries are then a single
//! lookup, and insertion costs one write per ancestor of the parent.
//!
//! Ids are snowflakes, sortable by creation time:
//!
//! ```text
//! ┌────────┬──────────────────────────────┬───────────┬────────────┐
//! │ Unused │ Elapsed ms since epoch       │ Node id   │ Sequence   │
//! │ 1 bit  │ 41 bits                      │ 10 bits   │ 12 bits    │
//! └────────┴──────────────────────────────┴───────────┴────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use catalog_tree::{CategoryService, MemoryStore, TreeQuery};
//!
//! let config = catalog_tree_config::load("catalog.toml")?;
//! let service = CategoryService::from_config(&config, MemoryStore::new())?;
//!
//! let food = service.create("식품", None)?;
//! let fruit = service.create("과일", Some(food.entity.id))?;
//! assert_eq!(fruit.breadcrumb.len(), 2);
//!
//! let forest = service.get(TreeQuery::Full)?;
//! ```
//!
//! Storage is pluggable through [`HierarchyStore`] and [`Transactional`];
//! [`MemoryStore`] is the bundled implementation.

pub mod clock;
pub mod closure;
pub mod collation;
pub mod engine;
pub mod error;
pub mod layout;
pub mod memory;
pub mod model;
pub mod node_id;
pub mod policy;
pub mod record;
pub mod service;
pub mod snowflake;
pub mod store;
pub mod tree;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collation::{CodePointOrder, Collation, CollationError, LocaleCollation, NameCollation};
pub use engine::HierarchyEngine;
pub use error::{BatchError, CatalogError, ErrorKind, PolicyViolation};
pub use layout::{
    compose_id, elapsed_of, node_of, sequence_of, time_millis_of, MAX_NODE_ID, MAX_SEQUENCE,
    NODE_SHIFT, TIMESTAMP_SHIFT,
};
pub use memory::{MemoryStore, MemoryTransaction};
pub use model::{ClosureEdge, CreatedEntity, Entity, RelationshipRow};
pub use node_id::{infer_node_id, InferredNodeId, NodeIdOrigin};
pub use policy::InsertionPolicy;
pub use service::{CategoryService, TreeQuery, TreeView};
pub use snowflake::{IdAllocator, IdError, PreassignedId, SnowflakeGenerator};
pub use store::{HierarchyStore, StoreError, Transactional};
pub use tree::TreeNode;

/// Entity identifier. A snowflake id, or any caller-supplied `u64`.
///
/// Minted ids never set the top bit, so they also fit a signed 64-bit column.
pub type EntityId = u64;
