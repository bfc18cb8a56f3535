//! Node-id inference for deployments without an explicit assignment.
//!
//! Folds every hardware address into a base-31 polynomial hash and reduces it
//! to 10 bits. Hosts without readable addresses, or where enumeration fails,
//! get a value from the operating system's CSPRNG instead. Inference always
//! yields a valid id; it never fails.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

use crate::layout::MAX_NODE_ID;

/// Fold bytes into a running base-31 hash (unsigned byte values, wrapping).
///
/// Only the low 10 bits survive the final reduction, and those are identical
/// under wrapping unsigned and two's-complement signed arithmetic.
pub const fn fold_hardware_bytes(mut acc: u64, bytes: &[u8]) -> u64 {
    let mut i = 0;
    while i < bytes.len() {
        acc = acc.wrapping_mul(31).wrapping_add(bytes[i] as u64);
        i += 1;
    }
    acc
}

/// Hash a sequence of hardware addresses in enumeration order.
pub fn hardware_hash<I, B>(addresses: I) -> u64
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    addresses
        .into_iter()
        .fold(0, |acc, addr| fold_hardware_bytes(acc, addr.as_ref()))
}

/// Errors raised while enumerating interfaces. Never escapes inference.
#[derive(Debug, thiserror::Error)]
pub enum NodeIdError {
    #[error("failed to enumerate network interfaces: {0}")]
    Enumerate(String),
}

/// Something that can list network hardware addresses.
pub trait HardwareAddresses {
    fn hardware_addresses(&self) -> Result<Vec<Vec<u8>>, NodeIdError>;
}

/// The host's network interfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemInterfaces;

impl HardwareAddresses for SystemInterfaces {
    fn hardware_addresses(&self) -> Result<Vec<Vec<u8>>, NodeIdError> {
        let interfaces = mac_address::MacAddressIterator::new()
            .map_err(|e| NodeIdError::Enumerate(e.to_string()))?;
        Ok(interfaces.map(|mac| mac.bytes().to_vec()).collect())
    }
}

/// Where an inferred node id came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeIdOrigin {
    HardwareAddress,
    Random,
}

/// Result of node-id inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InferredNodeId {
    pub node_id: u16,
    pub origin: NodeIdOrigin,
}

/// Infer a node id from this host's interfaces, falling back to `OsRng`.
pub fn infer_node_id() -> InferredNodeId {
    infer_node_id_with(&SystemInterfaces, &mut OsRng)
}

/// Infer a node id from an arbitrary address source and CSPRNG.
pub fn infer_node_id_with<S, R>(source: &S, rng: &mut R) -> InferredNodeId
where
    S: HardwareAddresses + ?Sized,
    R: RngCore + CryptoRng,
{
    match source.hardware_addresses() {
        Ok(addresses) => {
            let acc = hardware_hash(&addresses);
            if acc != 0 {
                return InferredNodeId {
                    node_id: (acc % (MAX_NODE_ID as u64 + 1)) as u16,
                    origin: NodeIdOrigin::HardwareAddress,
                };
            }
            tracing::warn!(
                interfaces = addresses.len(),
                "no usable hardware address, drawing a random node id"
            );
        }
        Err(err) => {
            tracing::warn!(error = %err, "drawing a random node id");
        }
    }
    InferredNodeId {
        node_id: rng.gen_range(0..=MAX_NODE_ID),
        origin: NodeIdOrigin::Random,
    }
}
