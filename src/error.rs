//! Error taxonomy surfaced to callers of the hierarchy.

use crate::snowflake::IdError;
use crate::store::StoreError;
use crate::EntityId;

/// Why an insertion point was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("max depth exceeded: a child of {parent_id} would sit at depth {depth}, limit is {max_depth}")]
    MaxDepthExceeded {
        parent_id: EntityId,
        depth: u32,
        max_depth: u32,
    },

    #[error("parent {parent_id} is not a leaf")]
    ParentNotLeaf { parent_id: EntityId },
}

/// Invalid batch requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("batch is empty")]
    Empty,

    #[error("batch of {len} names exceeds the limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("name '{0}' appears more than once in the batch")]
    Repeated(String),
}

/// Reportable class of an error, as a host would map it to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    NotFound,
    BadRequest,
    Internal,
}

/// Every failure the hierarchy can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("an entity named '{0}' already exists")]
    DuplicateName(String),

    #[error("parent {0} does not exist")]
    ParentNotFound(EntityId),

    #[error("entity {0} does not exist")]
    EntityNotFound(EntityId),

    #[error(transparent)]
    PolicyViolation(#[from] PolicyViolation),

    #[error("name must not be blank")]
    InvalidName,

    #[error("invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    #[error("clock moved backwards by {drift_millis} ms (tolerance {tolerance_millis} ms)")]
    ClockMovedBackwards {
        drift_millis: u64,
        tolerance_millis: u64,
    },

    #[error("{elapsed_millis} ms since epoch overflows the id timestamp")]
    TimestampOverflow { elapsed_millis: u64 },

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateName(_) => ErrorKind::Conflict,
            Self::ParentNotFound(_) | Self::EntityNotFound(_) => ErrorKind::NotFound,
            Self::PolicyViolation(_) | Self::InvalidName | Self::InvalidBatch(_) => {
                ErrorKind::BadRequest
            }
            Self::Store(StoreError::UniqueViolation { .. } | StoreError::Conflict(_)) => {
                ErrorKind::Conflict
            }
            Self::ClockMovedBackwards { .. }
            | Self::TimestampOverflow { .. }
            | Self::ConfigurationInvalid(_)
            | Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Whether repeating the same operation unchanged may succeed.
    ///
    /// Only transient storage conflicts qualify. A unique-key clash repeats
    /// for as long as the same key is supplied, and a clock step past the
    /// tolerance is fatal to the call that saw it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict(_)))
    }
}

impl From<IdError> for CatalogError {
    fn from(err: IdError) -> Self {
        match err {
            IdError::ClockMovedBackwards {
                drift_millis,
                tolerance_millis,
            } => Self::ClockMovedBackwards {
                drift_millis,
                tolerance_millis,
            },
            IdError::TimestampOverflow { elapsed_millis } => {
                Self::TimestampOverflow { elapsed_millis }
            }
            IdError::ConfigurationInvalid(msg) => Self::ConfigurationInvalid(msg),
        }
    }
}

impl From<catalog_tree_config::ConfigError> for CatalogError {
    fn from(err: catalog_tree_config::ConfigError) -> Self {
        Self::ConfigurationInvalid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CLOSURE_PRIMARY_KEY, ENTITY_PRIMARY_KEY};

    #[test]
    fn kinds() {
        assert_eq!(CatalogError::DuplicateName("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(CatalogError::ParentNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(CatalogError::EntityNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(CatalogError::InvalidName.kind(), ErrorKind::BadRequest);
        assert_eq!(
            CatalogError::from(PolicyViolation::ParentNotLeaf { parent_id: 1 }).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            CatalogError::from(BatchError::Empty).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            CatalogError::from(StoreError::Conflict("serialization".into())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CatalogError::from(StoreError::Backend("down".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn retryable_errors() {
        let clock = CatalogError::from(IdError::ClockMovedBackwards {
            drift_millis: 50,
            tolerance_millis: 10,
        });
        assert!(!clock.is_retryable());
        assert_eq!(clock.kind(), ErrorKind::Internal);

        assert!(CatalogError::from(StoreError::Conflict("x".into())).is_retryable());
        for constraint in [ENTITY_PRIMARY_KEY, CLOSURE_PRIMARY_KEY] {
            let clash = CatalogError::from(StoreError::unique(constraint));
            assert!(!clash.is_retryable(), "{constraint}");
            assert_eq!(clash.kind(), ErrorKind::Conflict);
        }
        assert!(!CatalogError::DuplicateName("x".into()).is_retryable());
        assert!(!CatalogError::from(StoreError::Corrupt("x".into())).is_retryable());
        assert!(
            !CatalogError::from(PolicyViolation::MaxDepthExceeded {
                parent_id: 1,
                depth: 5,
                max_depth: 4
            })
            .is_retryable()
        );
    }

    #[test]
    fn messages_name_the_offender() {
        let err = CatalogError::from(PolicyViolation::MaxDepthExceeded {
            parent_id: 7,
            depth: 5,
            max_depth: 4,
        });
        assert!(err.to_string().starts_with("max depth exceeded"));
        assert_eq!(
            CatalogError::from(BatchError::Repeated("a".into())).to_string(),
            "invalid batch: name 'a' appears more than once in the batch"
        );
    }
}
