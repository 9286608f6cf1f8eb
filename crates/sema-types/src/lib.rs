#![forbid(unsafe_code)]
#![warn(clippy::all)]

mod error;
mod field;
mod signals;

pub use error::{SemaError, SemaResult};
pub use field::FieldElement;
pub use signals::{
    CircuitParams, FullProof, HashScheme, MerklePath, PublicSignals, Receipt, SignalProof,
};

pub const FIELD_ELEMENT_SIZE: usize = 32;

/// Bytes kept from a BLAKE3 digest when mapping strings into the field.
/// 31 bytes is always below the BN254 scalar modulus.
pub const TRUNCATED_HASH_SIZE: usize = 31;

pub const DEFAULT_TREE_DEPTH: usize = 20;

pub const DEFAULT_TREE_ARITY: usize = 5;

/// Preimage of the default zero leaf.
pub const ZERO_VALUE_SEED: &[u8] = b"Semaphore";

pub const CIRCUIT_NAME: &str = "semaphore";

pub const CIRCUIT_VERSION: &str = "1.0.0";
