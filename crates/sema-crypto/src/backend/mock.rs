use sema_types::{CircuitParams, PublicSignals, SemaError, SemaResult, SignalProof};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{CircuitBackend, SignalProver, SignalVerifier};
use crate::hasher::{hasher_for, FieldHasher};
use crate::witness::Witness;

const MOCK_KEY_CONTEXT: &str = "sema 2024-01 mock proof backend v1";

/// Transparent stand-in for a proof system. NOT zero-knowledge.
///
/// Proving checks the witness relation natively and tags the public
/// signals with a keyed BLAKE3 MAC. Any holder of the key can forge
/// proofs, so this only belongs in tests and local development.
pub struct MockBackend {
    params: CircuitParams,
    key: [u8; 32],
    hasher: Arc<dyn FieldHasher>,
}

impl MockBackend {
    pub fn new(params: CircuitParams) -> Self {
        let key = blake3::derive_key(MOCK_KEY_CONTEXT, params.to_string().as_bytes());
        Self::with_key(params, key)
    }

    pub fn with_key(params: CircuitParams, key: [u8; 32]) -> Self {
        Self {
            params,
            key,
            hasher: hasher_for(params.hash_scheme),
        }
    }

    fn tag(&self, public_signals: &PublicSignals) -> [u8; 32] {
        *blake3::keyed_hash(&self.key, &public_signals.to_bytes()).as_bytes()
    }
}

impl CircuitBackend for MockBackend {
    fn params(&self) -> CircuitParams {
        self.params
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

impl SignalProver for MockBackend {
    fn prove(&self, witness: &Witness) -> SemaResult<SignalProof> {
        if witness.params() != self.params {
            return Err(SemaError::ProofGenerationFailed(format!(
                "witness built for {}, backend is for {}",
                witness.params(),
                self.params
            )));
        }
        witness
            .check(self.hasher.as_ref())
            .map_err(|e| SemaError::ProofGenerationFailed(e.to_string()))?;

        Ok(SignalProof::from_bytes(self.tag(&witness.public_signals()).to_vec()))
    }
}

impl SignalVerifier for MockBackend {
    fn verify(&self, public_signals: &PublicSignals, proof: &SignalProof) -> SemaResult<bool> {
        if proof.as_bytes().len() != 32 {
            return Err(SemaError::InvalidProof(format!(
                "mock proof must be 32 bytes, got {}",
                proof.as_bytes().len()
            )));
        }
        let expected = self.tag(public_signals);
        Ok(bool::from(expected[..].ct_eq(proof.as_bytes())))
    }
}
