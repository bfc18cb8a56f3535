//! Fixed-width binary encoding of closure rows.
//!
//! ## Layout (little endian)
//!
//! ```text
//! header  │ magic "CTCL" │ version u16 │ reserved u16 │ count u64 │   16 bytes
//! record  │ ancestor u64 │ descendant u64 │ depth u32 │               20 bytes
//! ```
//!
//! Records are `Unaligned`, so a buffer of any alignment is viewed in place
//! without copying.

use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::model::ClosureEdge;

pub const MAGIC: [u8; 4] = *b"CTCL";
pub const VERSION: u16 = 1;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
struct Header {
    magic: [u8; 4],
    version: U16,
    reserved: U16,
    count: U64,
}

/// One closure row as stored on disk.
#[derive(
    FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug, PartialEq, Eq,
)]
#[repr(C)]
pub struct EdgeRecord {
    ancestor: U64,
    descendant: U64,
    depth: U32,
}

impl From<ClosureEdge> for EdgeRecord {
    fn from(edge: ClosureEdge) -> Self {
        Self {
            ancestor: U64::new(edge.ancestor_id),
            descendant: U64::new(edge.descendant_id),
            depth: U32::new(edge.depth),
        }
    }
}

impl From<&EdgeRecord> for ClosureEdge {
    fn from(record: &EdgeRecord) -> Self {
        ClosureEdge::new(record.ancestor.get(), record.descendant.get(), record.depth.get())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("buffer of {len} bytes is too short for a header")]
    Truncated { len: usize },

    #[error("bad magic {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),

    #[error("header announces {expected} records but the body holds {body_len} bytes")]
    LengthMismatch { expected: u64, body_len: usize },

    #[error("record {index} has depth {depth} inconsistent with its endpoints")]
    InvalidRecord { index: usize, depth: u32 },
}

/// Encode edges behind a header.
pub fn encode(edges: &[ClosureEdge]) -> Vec<u8> {
    let header = Header {
        magic: MAGIC,
        version: U16::new(VERSION),
        reserved: U16::ZERO,
        count: U64::new(edges.len() as u64),
    };
    let records: Vec<EdgeRecord> = edges.iter().copied().map(EdgeRecord::from).collect();

    let body = records.as_bytes();
    let mut out = Vec::with_capacity(header.as_bytes().len() + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body);
    out
}

/// View the records of an encoded buffer in place.
///
/// Checks the header and that every record has depth 0 exactly when its two
/// endpoints coincide. Tree-level invariants are left to
/// [`closure::verify`](crate::closure::verify).
pub fn view(bytes: &[u8]) -> Result<&[EdgeRecord], RecordError> {
    let (header, body) = Header::ref_from_prefix(bytes)
        .map_err(|_| RecordError::Truncated { len: bytes.len() })?;
    if header.magic != MAGIC {
        return Err(RecordError::BadMagic {
            found: header.magic,
        });
    }
    if header.version.get() != VERSION {
        return Err(RecordError::UnsupportedVersion(header.version.get()));
    }

    let expected = header.count.get();
    let mismatch = RecordError::LengthMismatch {
        expected,
        body_len: body.len(),
    };
    let records = <[EdgeRecord]>::ref_from_bytes(body).map_err(|_| mismatch.clone())?;
    if records.len() as u64 != expected {
        return Err(mismatch);
    }

    for (index, record) in records.iter().enumerate() {
        let is_self = record.ancestor == record.descendant;
        if is_self != (record.depth.get() == 0) {
            return Err(RecordError::InvalidRecord {
                index,
                depth: record.depth.get(),
            });
        }
    }
    Ok(records)
}

/// Decode an encoded buffer into owned edges.
pub fn decode(bytes: &[u8]) -> Result<Vec<ClosureEdge>, RecordError> {
    Ok(view(bytes)?.iter().map(ClosureEdge::from).collect())
}
