//! Proof backends.
//!
//! A backend is fixed to one set of [`CircuitParams`] for its lifetime.
//! Provers and verifiers are `Send + Sync` and stateless per call, so one
//! instance is shared by every caller.

mod artifacts;
mod groth16;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use artifacts::{
    load_artifacts, read_metadata, vk_hash, write_artifacts, ArtifactMetadata, META_FILE,
    PROVING_KEY_FILE, VERIFYING_KEY_FILE, VK_HASH_FILE,
};
pub use groth16::Groth16Backend;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockBackend;

use sema_types::{CircuitParams, PublicSignals, SemaResult, SignalProof};

use crate::witness::Witness;

pub trait CircuitBackend: Send + Sync {
    fn params(&self) -> CircuitParams;

    /// Short backend name for logs and CLI output.
    fn name(&self) -> &'static str;
}

pub trait SignalProver: CircuitBackend {
    /// Heavy and blocking. Run it off the async executor.
    fn prove(&self, witness: &Witness) -> SemaResult<SignalProof>;
}

pub trait SignalVerifier: CircuitBackend {
    /// `Ok(false)` for a well-formed proof that does not verify,
    /// `Err(InvalidProof)` for bytes that are not a proof at all.
    fn verify(&self, public_signals: &PublicSignals, proof: &SignalProof) -> SemaResult<bool>;
}
