//! Id layout: fixed bit allocation for 64-bit snowflake identifiers.
//!
//! An id is self-describing: the creation time, the minting node and the
//! per-millisecond sequence can all be recovered with shifts and masks,
//! without consulting the generator that produced it.
//!
//! ## Id Layout (u64)
//!
//! ```text
//! ┌────────┬──────────────────────────────┬───────────┬────────────┐
//! │ Unused │ Elapsed ms since epoch       │ Node id   │ Sequence   │
//! │ 1 bit  │ 41 bits                      │ 10 bits   │ 12 bits    │
//! │ [63]   │ [62:22]                      │ [21:12]   │ [11:0]     │
//! └────────┴──────────────────────────────┴───────────┴────────────┘
//! ```
//!
//! Total: 1 + 41 + 10 + 12 = 64 bits. The unused bit is always 0, so every
//! id also fits a signed 64-bit column.

use crate::EntityId;

/// Sign bit, always zero.
pub const UNUSED_BITS: u8 = 1;

/// Bits for elapsed milliseconds since the configured epoch (~69 years).
pub const TIMESTAMP_BITS: u8 = 41;

/// Bits for the node id (1024 nodes).
pub const NODE_ID_BITS: u8 = 10;

/// Bits for the per-millisecond sequence (4096 ids per ms per node).
pub const SEQUENCE_BITS: u8 = 12;

/// Largest node id (1023).
pub const MAX_NODE_ID: u16 = (1 << NODE_ID_BITS) - 1;

/// Largest sequence value (4095).
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// Largest elapsed-millisecond value that still fits the timestamp field.
pub const MAX_ELAPSED_MILLIS: u64 = (1 << TIMESTAMP_BITS) - 1;

/// Bit position of the node id field.
pub const NODE_SHIFT: u8 = SEQUENCE_BITS;

/// Bit position of the timestamp field.
pub const TIMESTAMP_SHIFT: u8 = NODE_ID_BITS + SEQUENCE_BITS;

/// Static assertion: the fields must cover exactly 64 bits.
const _: () = {
    let total = UNUSED_BITS as u16
        + TIMESTAMP_BITS as u16
        + NODE_ID_BITS as u16
        + SEQUENCE_BITS as u16;
    assert!(total == 64, "id fields must sum to exactly 64 bits");
};

// =============================================================================
// Standalone id operations (no generator needed)
// =============================================================================

/// Pack the three fields into an id.
///
/// Callers guarantee each field is within its width; debug builds check it.
#[inline]
pub const fn compose_id(elapsed_millis: u64, node_id: u16, sequence: u16) -> EntityId {
    debug_assert!(elapsed_millis <= MAX_ELAPSED_MILLIS, "elapsed overflows 41 bits");
    debug_assert!(node_id <= MAX_NODE_ID, "node id overflows 10 bits");
    debug_assert!(sequence <= MAX_SEQUENCE, "sequence overflows 12 bits");
    (elapsed_millis << TIMESTAMP_SHIFT) | ((node_id as u64) << NODE_SHIFT) | sequence as u64
}

/// Elapsed milliseconds since the epoch encoded in `id`.
#[inline]
pub const fn elapsed_of(id: EntityId) -> u64 {
    id >> TIMESTAMP_SHIFT
}

/// Node id encoded in `id`.
#[inline]
pub const fn node_of(id: EntityId) -> u16 {
    ((id >> NODE_SHIFT) & MAX_NODE_ID as u64) as u16
}

/// Sequence number encoded in `id`.
#[inline]
pub const fn sequence_of(id: EntityId) -> u16 {
    (id & MAX_SEQUENCE as u64) as u16
}

/// Wall-clock milliseconds at which `id` was minted, given the generator epoch.
///
/// Pure bit arithmetic; intended for diagnostics.
#[inline]
pub const fn time_millis_of(id: EntityId, epoch_millis: u64) -> u64 {
    elapsed_of(id) + epoch_millis
}
