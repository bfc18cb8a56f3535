//! Configuration for catalog-tree.
//!
//! This crate provides:
//! - Parsing of `catalog.toml` documents
//! - Validation of snowflake epoch, node id and clock tolerance
//! - Hierarchy policy, batch and collation settings
//!
//! # Usage
//!
//! ```ignore
//! let config = catalog_tree_config::load("catalog.toml")?;
//! let generator = catalog_tree::SnowflakeGenerator::from_settings(&config.snowflake)?;
//! ```
//!
//! # Node Id Resolution
//!
//! - `node_id = N`: used as-is (must be in `0..=1023`)
//! - no `node_id`, `auto_detect_node_id = true` (default): derived at startup
//! - no `node_id`, `auto_detect_node_id = false`: [`ConfigError::NodeIdRequired`]
//!
//! Two running generators must never share a node id; this crate cannot
//! check that, it only validates one instance's settings.

mod toml_parser;

pub use toml_parser::{
    CatalogConfig, CollationSetting, ConfigError, HierarchySettings, NodeIdSetting,
    PolicySetting, SnowflakeSettings, DEFAULT_CLOCK_SKEW_TOLERANCE_MILLIS, DEFAULT_COLLATION,
    DEFAULT_EPOCH_MILLIS, DEFAULT_MAX_BATCH, DEFAULT_MAX_DEPTH, MAX_NODE_ID,
};

use std::path::Path;

/// Read and validate a configuration file.
///
/// # Errors
///
/// Returns an error if:
/// - the file cannot be read
/// - the TOML is malformed or contains unknown keys
/// - a value fails validation
pub fn load(path: impl AsRef<Path>) -> Result<CatalogConfig, ConfigError> {
    CatalogConfig::from_file(path)
}
