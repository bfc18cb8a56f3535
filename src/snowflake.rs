//! Thread-safe snowflake generator minting time-ordered 64-bit ids.
//!
//! `(last_timestamp, sequence)` is the only mutable state. It lives behind a
//! single mutex, and the critical section contains nothing but clock reads
//! and bounded spin-waits: at most the skew tolerance after a backward clock
//! step, or up to one millisecond after exhausting a millisecond's sequence.
//!
//! Two live generators must never share a node id. That is a deployment
//! invariant; nothing here can detect a violation.

use std::fmt;

use catalog_tree_config::{DEFAULT_CLOCK_SKEW_TOLERANCE_MILLIS, DEFAULT_EPOCH_MILLIS};
use catalog_tree_config::{NodeIdSetting, SnowflakeSettings};
use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::layout::{compose_id, time_millis_of, MAX_ELAPSED_MILLIS, MAX_NODE_ID, MAX_SEQUENCE};
use crate::node_id::infer_node_id;
use crate::EntityId;

/// Errors from id generation and generator construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The wall clock fell further behind the last issued timestamp than the
    /// tolerance allows. Not retried internally.
    #[error("clock moved backwards by {drift_millis} ms (tolerance {tolerance_millis} ms)")]
    ClockMovedBackwards {
        drift_millis: u64,
        tolerance_millis: u64,
    },

    #[error("{elapsed_millis} ms since epoch no longer fits the 41-bit timestamp field")]
    TimestampOverflow { elapsed_millis: u64 },

    #[error("invalid generator configuration: {0}")]
    ConfigurationInvalid(String),
}

/// Anything that can hand out entity ids.
pub trait IdAllocator {
    fn allocate(&self) -> Result<EntityId, IdError>;
}

/// An id chosen by the caller rather than minted.
///
/// Yields the same id on every call; use it for a single insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreassignedId(pub EntityId);

impl IdAllocator for PreassignedId {
    fn allocate(&self) -> Result<EntityId, IdError> {
        Ok(self.0)
    }
}

#[derive(Debug)]
struct SequenceState {
    last_timestamp: u64,
    sequence: u16,
}

/// 64-bit snowflake id generator: `[0][41-bit elapsed ms][10-bit node][12-bit sequence]`.
#[derive(Debug)]
pub struct SnowflakeGenerator<C: Clock = SystemClock> {
    epoch_millis: u64,
    node_id: u16,
    clock_skew_tolerance_millis: u64,
    clock: C,
    state: Mutex<SequenceState>,
}

impl SnowflakeGenerator<SystemClock> {
    /// Create a generator on the system clock.
    ///
    /// # Errors
    ///
    /// [`IdError::ConfigurationInvalid`] if the epoch or tolerance is negative,
    /// or the node id is outside `0..=1023`.
    pub fn new(
        epoch_millis: i64,
        node_id: i64,
        clock_skew_tolerance_millis: i64,
    ) -> Result<Self, IdError> {
        Self::with_clock(epoch_millis, node_id, clock_skew_tolerance_millis, SystemClock)
    }

    /// Default epoch (2025-09-22T00:00:00Z), node 0, 10 ms tolerance.
    pub fn with_defaults() -> Self {
        Self::from_parts(
            DEFAULT_EPOCH_MILLIS as u64,
            0,
            DEFAULT_CLOCK_SKEW_TOLERANCE_MILLIS as u64,
            SystemClock,
        )
    }

    /// Build from validated settings, inferring the node id when asked to.
    pub fn from_settings(settings: &SnowflakeSettings) -> Result<Self, IdError> {
        let node_id = match settings.node_id {
            NodeIdSetting::Fixed(id) => id,
            NodeIdSetting::AutoDetect => {
                let inferred = infer_node_id();
                tracing::info!(
                    node_id = inferred.node_id,
                    origin = ?inferred.origin,
                    "inferred snowflake node id"
                );
                inferred.node_id
            }
        };
        Self::new(
            settings.epoch_millis,
            i64::from(node_id),
            settings.clock_skew_tolerance_millis,
        )
    }
}

impl<C: Clock> SnowflakeGenerator<C> {
    /// Create a generator on an explicit clock.
    pub fn with_clock(
        epoch_millis: i64,
        node_id: i64,
        clock_skew_tolerance_millis: i64,
        clock: C,
    ) -> Result<Self, IdError> {
        let epoch_millis = u64::try_from(epoch_millis).map_err(|_| {
            IdError::ConfigurationInvalid(format!("epochMillis must be >= 0, got {}", epoch_millis))
        })?;
        let node_id = u16::try_from(node_id)
            .ok()
            .filter(|id| *id <= MAX_NODE_ID)
            .ok_or_else(|| {
                IdError::ConfigurationInvalid(format!(
                    "nodeId must be in [0, {}], got {}",
                    MAX_NODE_ID, node_id
                ))
            })?;
        let tolerance = u64::try_from(clock_skew_tolerance_millis).map_err(|_| {
            IdError::ConfigurationInvalid(format!(
                "clockSkewToleranceMillis must be >= 0, got {}",
                clock_skew_tolerance_millis
            ))
        })?;
        Ok(Self::from_parts(epoch_millis, node_id, tolerance, clock))
    }

    fn from_parts(epoch_millis: u64, node_id: u16, tolerance: u64, clock: C) -> Self {
        Self {
            epoch_millis,
            node_id,
            clock_skew_tolerance_millis: tolerance,
            clock,
            state: Mutex::new(SequenceState {
                last_timestamp: epoch_millis,
                sequence: 0,
            }),
        }
    }

    /// Mint the next id.
    ///
    /// Callers are serialized; concurrent callers wait for the lock and are
    /// never rejected.
    ///
    /// # Errors
    ///
    /// - [`IdError::ClockMovedBackwards`] when the clock is behind the last
    ///   issued timestamp by more than the tolerance
    /// - [`IdError::TimestampOverflow`] once the epoch is ~69 years in the past
    pub fn next_id(&self) -> Result<EntityId, IdError> {
        let mut state = self.state.lock();
        let last = state.last_timestamp;

        let mut now = self.clock.now_millis();
        if now < last {
            let drift = last - now;
            if drift > self.clock_skew_tolerance_millis {
                tracing::error!(
                    drift_millis = drift,
                    tolerance_millis = self.clock_skew_tolerance_millis,
                    node_id = self.node_id,
                    "clock moved backwards beyond tolerance"
                );
                return Err(IdError::ClockMovedBackwards {
                    drift_millis: drift,
                    tolerance_millis: self.clock_skew_tolerance_millis,
                });
            }
            tracing::warn!(drift_millis = drift, "clock moved backwards, waiting it out");
            now = self.wait_until(last);
        }

        let sequence = if now == last {
            let next = (state.sequence + 1) & MAX_SEQUENCE;
            if next == 0 {
                // Millisecond exhausted
                now = self.wait_until(last + 1);
            }
            next
        } else {
            0
        };

        let elapsed = now - self.epoch_millis;
        if elapsed > MAX_ELAPSED_MILLIS {
            return Err(IdError::TimestampOverflow {
                elapsed_millis: elapsed,
            });
        }

        state.last_timestamp = now;
        state.sequence = sequence;
        Ok(compose_id(elapsed, self.node_id, sequence))
    }

    /// Wall-clock milliseconds at which `id` was minted. Diagnostics only.
    #[inline]
    pub fn extract_time_millis(&self, id: EntityId) -> u64 {
        time_millis_of(id, self.epoch_millis)
    }

    #[inline]
    pub fn epoch_millis(&self) -> u64 {
        self.epoch_millis
    }

    #[inline]
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    #[inline]
    pub fn clock_skew_tolerance_millis(&self) -> u64 {
        self.clock_skew_tolerance_millis
    }

    /// The clock this generator reads.
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Busy-spin until the clock reaches `target`.
    fn wait_until(&self, target: u64) -> u64 {
        let mut now = self.clock.now_millis();
        while now < target {
            std::hint::spin_loop();
            now = self.clock.now_millis();
        }
        now
    }
}

impl<C: Clock> IdAllocator for SnowflakeGenerator<C> {
    #[inline]
    fn allocate(&self) -> Result<EntityId, IdError> {
        self.next_id()
    }
}

impl<C: Clock> fmt::Display for SnowflakeGenerator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let epoch = i64::try_from(self.epoch_millis)
            .ok()
            .and_then(chrono::DateTime::from_timestamp_millis);
        match epoch {
            Some(at) => write!(f, "Snowflake{{epoch={}", at.to_rfc3339())?,
            None => write!(f, "Snowflake{{epoch={}ms", self.epoch_millis)?,
        }
        write!(
            f,
            ", nodeId={}, toleranceMs={}}}",
            self.node_id, self.clock_skew_tolerance_millis
        )
    }
}
