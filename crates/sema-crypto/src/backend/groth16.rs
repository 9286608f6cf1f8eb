use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::rngs::OsRng;
use sema_types::{CircuitParams, HashScheme, PublicSignals, SemaError, SemaResult, SignalProof};
use tracing::{debug, info};

use super::{CircuitBackend, SignalProver, SignalVerifier};
use crate::circuit::SignalCircuit;
use crate::field::canonical_fr;
use crate::witness::Witness;

/// Groth16 over BN254. Proofs are randomised, so proving the same witness
/// twice gives different bytes that both verify.
pub struct Groth16Backend {
    params: CircuitParams,
    proving_key: Option<ProvingKey<Bn254>>,
    verifying_key: VerifyingKey<Bn254>,
    prepared: PreparedVerifyingKey<Bn254>,
}

fn ensure_supported(params: &CircuitParams) -> SemaResult<()> {
    if params.hash_scheme != HashScheme::Poseidon {
        return Err(SemaError::ArtifactMismatch(format!(
            "groth16 circuit only supports poseidon, configured scheme is {}",
            params.hash_scheme
        )));
    }
    if params.depth == 0 || params.arity < 2 {
        return Err(SemaError::InvalidParameters(format!(
            "unsupported circuit parameters: {}",
            params
        )));
    }
    Ok(())
}

impl Groth16Backend {
    /// Circuit-specific setup with fresh toxic waste from the OS RNG.
    pub fn setup(params: CircuitParams) -> SemaResult<Self> {
        ensure_supported(&params)?;
        info!(%params, "Running Groth16 circuit-specific setup");

        let circuit = SignalCircuit::empty(params.depth, params.arity);
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit, &mut OsRng)
            .map_err(|e| SemaError::Crypto(format!("Groth16 setup failed: {}", e)))?;

        Self::from_keys(params, Some(pk), vk)
    }

    pub fn from_keys(
        params: CircuitParams,
        proving_key: Option<ProvingKey<Bn254>>,
        verifying_key: VerifyingKey<Bn254>,
    ) -> SemaResult<Self> {
        ensure_supported(&params)?;
        if verifying_key.gamma_abc_g1.len() != PublicSignals::LEN + 1 {
            return Err(SemaError::ArtifactMismatch(format!(
                "verifying key expects {} public inputs, circuit has {}",
                verifying_key.gamma_abc_g1.len().saturating_sub(1),
                PublicSignals::LEN
            )));
        }
        let prepared = Groth16::<Bn254>::process_vk(&verifying_key)
            .map_err(|e| SemaError::Crypto(format!("Failed to prepare verifying key: {}", e)))?;

        Ok(Self {
            params,
            proving_key,
            verifying_key,
            prepared,
        })
    }

    pub fn has_proving_key(&self) -> bool {
        self.proving_key.is_some()
    }

    pub fn proving_key(&self) -> Option<&ProvingKey<Bn254>> {
        self.proving_key.as_ref()
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.verifying_key
    }

    pub fn verifying_key_bytes(&self) -> SemaResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SemaError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    pub fn proving_key_bytes(&self) -> SemaResult<Option<Vec<u8>>> {
        let Some(pk) = &self.proving_key else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        pk.serialize_compressed(&mut bytes)
            .map_err(|e| SemaError::Serialization(e.to_string()))?;
        Ok(Some(bytes))
    }
}

impl CircuitBackend for Groth16Backend {
    fn params(&self) -> CircuitParams {
        self.params
    }

    fn name(&self) -> &'static str {
        "groth16"
    }
}

impl SignalProver for Groth16Backend {
    fn prove(&self, witness: &Witness) -> SemaResult<SignalProof> {
        let pk = self.proving_key.as_ref().ok_or_else(|| {
            SemaError::ProofGenerationFailed("no proving key loaded".into())
        })?;
        if witness.params() != self.params {
            return Err(SemaError::ProofGenerationFailed(format!(
                "witness built for {}, proving key is for {}",
                witness.params(),
                self.params
            )));
        }

        let circuit = SignalCircuit::from_witness(witness)
            .map_err(|e| SemaError::ProofGenerationFailed(e.to_string()))?;

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit
            .clone()
            .generate_constraints(cs.clone())
            .map_err(|e| SemaError::ProofGenerationFailed(e.to_string()))?;
        let satisfied = cs
            .is_satisfied()
            .map_err(|e| SemaError::ProofGenerationFailed(e.to_string()))?;
        if !satisfied {
            let unsatisfied = cs.which_is_unsatisfied().ok().flatten().unwrap_or_default();
            return Err(SemaError::ProofGenerationFailed(format!(
                "witness does not satisfy the circuit ({})",
                unsatisfied
            )));
        }

        let proof = Groth16::<Bn254>::prove(pk, circuit, &mut OsRng)
            .map_err(|e| SemaError::ProofGenerationFailed(e.to_string()))?;

        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| SemaError::Serialization(e.to_string()))?;
        debug!(size = bytes.len(), "Generated Groth16 proof");
        Ok(SignalProof::from_bytes(bytes))
    }
}

impl SignalVerifier for Groth16Backend {
    fn verify(&self, public_signals: &PublicSignals, proof: &SignalProof) -> SemaResult<bool> {
        let proof = Proof::<Bn254>::deserialize_compressed(proof.as_bytes())
            .map_err(|e| SemaError::InvalidProof(format!("undecodable proof: {}", e)))?;

        let inputs = public_signals
            .to_array()
            .iter()
            .map(canonical_fr)
            .collect::<SemaResult<Vec<Fr>>>()
            .map_err(|e| SemaError::InvalidProof(e.to_string()))?;

        Groth16::<Bn254>::verify_with_processed_vk(&self.prepared, &inputs, &proof)
            .map_err(|e| SemaError::InvalidProof(e.to_string()))
    }
}
