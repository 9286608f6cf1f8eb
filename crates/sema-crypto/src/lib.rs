//! Cryptography for SEMA anonymous signaling.
//!
//! Identities commit to their secrets, commitments are appended to a
//! K-ary Merkle accumulator, and a Groth16 circuit proves membership plus
//! a per-context nullifier without revealing which leaf is the prover's.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod accumulator;
pub mod backend;
pub mod circuit;
pub mod field;
pub mod hasher;
pub mod identity;
pub mod poseidon;
pub mod witness;

pub use accumulator::{compute_root_from_path, MembershipAccumulator, RootHistory};
pub use backend::{
    load_artifacts, read_metadata, write_artifacts, ArtifactMetadata, CircuitBackend,
    Groth16Backend, SignalProver, SignalVerifier,
};
#[cfg(any(test, feature = "mock"))]
pub use backend::MockBackend;
pub use circuit::SignalCircuit;
pub use field::{
    canonical_fr, default_zero_value, element_to_fr, external_nullifier, fr_to_element,
    is_canonical, signal_hash,
};
pub use hasher::{hasher_for, Blake3FieldHasher, FieldHasher, PoseidonHasher};
pub use identity::{Identity, IdentityFile};
pub use witness::{PrivateInputs, Witness};
