//! TOML configuration parser for catalog.toml.

use chrono::DateTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 2025-09-22T00:00:00Z in Unix milliseconds.
pub const DEFAULT_EPOCH_MILLIS: i64 = 1_758_499_200_000;

/// Backward clock steps up to this many milliseconds are waited out.
pub const DEFAULT_CLOCK_SKEW_TOLERANCE_MILLIS: i64 = 10;

/// Largest node id representable in 10 bits.
pub const MAX_NODE_ID: i64 = 1023;

/// Depth ceiling for depth-capped insertion (a root is depth 0).
pub const DEFAULT_MAX_DEPTH: u32 = 4;

/// Largest number of names accepted by one batch creation.
pub const DEFAULT_MAX_BATCH: usize = 5;

/// Locale used for sibling ordering unless configured otherwise.
pub const DEFAULT_COLLATION: &str = "ko";

/// How the generator obtains its node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdSetting {
    /// Explicitly assigned id (0..=1023).
    Fixed(u16),
    /// Derived from hardware addresses, random as last resort.
    AutoDetect,
}

/// Validated identifier generator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnowflakeSettings {
    /// UTC epoch in milliseconds.
    pub epoch_millis: i64,
    pub node_id: NodeIdSetting,
    /// Backward clock tolerance in milliseconds.
    pub clock_skew_tolerance_millis: i64,
}

impl Default for SnowflakeSettings {
    fn default() -> Self {
        Self {
            epoch_millis: DEFAULT_EPOCH_MILLIS,
            node_id: NodeIdSetting::AutoDetect,
            clock_skew_tolerance_millis: DEFAULT_CLOCK_SKEW_TOLERANCE_MILLIS,
        }
    }
}

/// Which insertion policy the hierarchy enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicySetting {
    /// Insert under any node, bounded by `max_depth` (default)
    #[default]
    DepthCapped,
    /// Insert only under nodes that have no children yet
    LeafOnly,
}

/// Sibling ordering rule used when assembling trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollationSetting {
    /// Plain Unicode scalar order.
    CodePoint,
    /// Locale-aware collation for a BCP-47 tag (e.g. `ko`).
    Locale(String),
}

/// Validated hierarchy settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchySettings {
    pub policy: PolicySetting,
    pub max_depth: u32,
    pub max_batch: usize,
    pub collation: CollationSetting,
}

impl Default for HierarchySettings {
    fn default() -> Self {
        Self {
            policy: PolicySetting::DepthCapped,
            max_depth: DEFAULT_MAX_DEPTH,
            max_batch: DEFAULT_MAX_BATCH,
            collation: CollationSetting::Locale(DEFAULT_COLLATION.to_string()),
        }
    }
}

/// Parsed and validated catalog configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogConfig {
    pub snowflake: SnowflakeSettings,
    pub hierarchy: HierarchySettings,
}

/// Raw TOML structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalogConfig {
    #[serde(default)]
    snowflake: RawSnowflake,
    #[serde(default)]
    hierarchy: RawHierarchy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSnowflake {
    /// RFC 3339 timestamp, e.g. "2025-09-22T00:00:00Z"
    epoch: Option<String>,
    epoch_millis: Option<i64>,
    node_id: Option<i64>,
    auto_detect_node_id: Option<bool>,
    clock_skew_tolerance_millis: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHierarchy {
    /// "depth-capped" (default) or "leaf-only"
    policy: Option<String>,
    max_depth: Option<u32>,
    max_batch: Option<usize>,
    /// BCP-47 locale tag or "codepoint"
    collation: Option<String>,
}

impl CatalogConfig {
    /// Parse from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    fn from_raw(raw: RawCatalogConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            snowflake: Self::snowflake_from_raw(raw.snowflake)?,
            hierarchy: Self::hierarchy_from_raw(raw.hierarchy)?,
        })
    }

    fn snowflake_from_raw(raw: RawSnowflake) -> Result<SnowflakeSettings, ConfigError> {
        let epoch_millis = match (raw.epoch.as_deref(), raw.epoch_millis) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "set either 'epoch' or 'epoch_millis', not both".into(),
                ));
            }
            (Some(text), None) => DateTime::parse_from_rfc3339(text)
                .map_err(|e| {
                    ConfigError::Validation(format!("invalid epoch '{}': {}", text, e))
                })?
                .timestamp_millis(),
            (None, Some(millis)) => millis,
            (None, None) => DEFAULT_EPOCH_MILLIS,
        };
        if epoch_millis < 0 {
            return Err(ConfigError::Validation(format!(
                "epoch must not precede 1970-01-01T00:00:00Z, got {} ms",
                epoch_millis
            )));
        }

        let clock_skew_tolerance_millis = raw
            .clock_skew_tolerance_millis
            .unwrap_or(DEFAULT_CLOCK_SKEW_TOLERANCE_MILLIS);
        if clock_skew_tolerance_millis < 0 {
            return Err(ConfigError::Validation(format!(
                "clock_skew_tolerance_millis must be >= 0, got {}",
                clock_skew_tolerance_millis
            )));
        }

        let node_id = match raw.node_id {
            Some(id) if (0..=MAX_NODE_ID).contains(&id) => NodeIdSetting::Fixed(id as u16),
            Some(id) => {
                return Err(ConfigError::Validation(format!(
                    "node_id must be in [0, {}], got {}",
                    MAX_NODE_ID, id
                )));
            }
            None if raw.auto_detect_node_id.unwrap_or(true) => NodeIdSetting::AutoDetect,
            None => return Err(ConfigError::NodeIdRequired),
        };

        Ok(SnowflakeSettings {
            epoch_millis,
            node_id,
            clock_skew_tolerance_millis,
        })
    }

    fn hierarchy_from_raw(raw: RawHierarchy) -> Result<HierarchySettings, ConfigError> {
        let policy = match raw.policy.as_deref() {
            None | Some("depth-capped") => PolicySetting::DepthCapped,
            Some("leaf-only") => PolicySetting::LeafOnly,
            Some(other) => {
                return Err(ConfigError::Validation(format!(
                    "Invalid policy value '{}': expected 'depth-capped' or 'leaf-only'",
                    other
                )));
            }
        };

        let max_depth = raw.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        if max_depth == 0 {
            return Err(ConfigError::Validation("max_depth must be at least 1".into()));
        }

        let max_batch = raw.max_batch.unwrap_or(DEFAULT_MAX_BATCH);
        if max_batch == 0 {
            return Err(ConfigError::Validation("max_batch must be at least 1".into()));
        }

        let collation = match raw.collation.as_deref().map(str::trim) {
            None => CollationSetting::Locale(DEFAULT_COLLATION.to_string()),
            Some("") => {
                return Err(ConfigError::Validation("collation must not be empty".into()));
            }
            Some("codepoint") => CollationSetting::CodePoint,
            Some(tag) => CollationSetting::Locale(tag.to_string()),
        };

        Ok(HierarchySettings {
            policy,
            max_depth,
            max_batch,
            collation,
        })
    }
}

impl FromStr for CatalogConfig {
    type Err = ConfigError;

    /// Parse from a TOML string. Missing tables and keys take their defaults.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let raw: RawCatalogConfig = toml::from_str(content)?;
        Self::from_raw(raw)
    }
}

/// Errors during config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    /// Auto-detection disabled and no explicit id configured.
    #[error("snowflake node_id is required when auto_detect_node_id = false")]
    NodeIdRequired,
}
