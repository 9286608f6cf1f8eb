use sema_crypto::{
    hasher_for, load_artifacts, Identity, MembershipAccumulator, SignalProver, SignalVerifier,
    Witness,
};
use sema_types::{
    CircuitParams, FieldElement, FullProof, MerklePath, PublicSignals, Receipt, SemaError,
    SemaResult, SignalProof,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::cancellation::CancellationToken;
use crate::config::{NodeConfig, ProverBackend};
use crate::coordinator::{ProofCoordinator, ProverStats};
use crate::gate::{GateStats, SignalEvent, VerificationGate};
use crate::registry::MembershipRegistry;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeStats {
    pub params: CircuitParams,
    pub members: u64,
    pub capacity: u64,
    pub current_root: FieldElement,
    pub registrations: u64,
    pub rejected_registrations: u64,
    pub gate: GateStats,
    /// `None` on verify-only nodes.
    pub prover: Option<ProverStats>,
}

/// Registry, proof coordinator and verification gate wired to one set of
/// circuit parameters.
pub struct SignalingService {
    registry: Arc<MembershipRegistry>,
    coordinator: Option<ProofCoordinator>,
    gate: VerificationGate,
}

impl SignalingService {
    /// Build from configuration. Groth16 artifacts are loaded and checked here,
    /// so a mismatched key set stops the node before it accepts anything.
    pub fn from_config(config: &NodeConfig) -> SemaResult<Self> {
        config.validate()?;
        let params = config.circuit_params();

        let (prover, verifier): (Option<Arc<dyn SignalProver>>, Arc<dyn SignalVerifier>) =
            match config.prover.backend {
                ProverBackend::Groth16 => {
                    let dir = config.artifacts_dir();
                    let backend = Arc::new(load_artifacts(&dir, &params)?);
                    info!(dir = ?dir, proving = backend.has_proving_key(), "Loaded circuit artifacts");
                    let prover = if backend.has_proving_key() {
                        Some(backend.clone() as Arc<dyn SignalProver>)
                    } else {
                        None
                    };
                    (prover, backend as Arc<dyn SignalVerifier>)
                }
                ProverBackend::Mock => mock_backends(params)?,
            };

        Self::with_backends(config, prover, verifier)
    }

    /// Build around caller-supplied backends.
    pub fn with_backends(
        config: &NodeConfig,
        prover: Option<Arc<dyn SignalProver>>,
        verifier: Arc<dyn SignalVerifier>,
    ) -> SemaResult<Self> {
        let tree = MembershipAccumulator::new(
            config.tree.depth,
            config.tree.arity,
            config.zero_value(),
            hasher_for(config.tree.hash_scheme),
        )?;
        let registry = Arc::new(MembershipRegistry::new(tree));

        let coordinator = match prover {
            Some(prover) => {
                registry.params().ensure_matches(&prover.params())?;
                Some(ProofCoordinator::new(
                    prover,
                    registry.hasher().clone(),
                    config.prover.max_concurrent_proofs,
                    config.proof_timeout(),
                ))
            }
            None => {
                info!("No prover configured, node is verify-only");
                None
            }
        };
        let gate = VerificationGate::new(registry.clone(), verifier, &config.gate)?;

        Ok(Self {
            registry,
            coordinator,
            gate,
        })
    }

    pub fn params(&self) -> CircuitParams {
        self.registry.params()
    }

    pub fn registry(&self) -> &Arc<MembershipRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    pub fn can_prove(&self) -> bool {
        self.coordinator.is_some()
    }

    fn coordinator(&self) -> SemaResult<&ProofCoordinator> {
        self.coordinator.as_ref().ok_or_else(|| {
            SemaError::ProofGenerationFailed("no proving key loaded on this node".into())
        })
    }

    pub async fn register(&self, commitment: &FieldElement) -> SemaResult<u64> {
        self.registry.insert_identity(commitment).await
    }

    pub async fn path(&self, leaf_index: u64) -> SemaResult<MerklePath> {
        self.registry.path(leaf_index).await
    }

    pub async fn current_root(&self) -> FieldElement {
        self.registry.current_root().await
    }

    pub async fn is_known_root(&self, root: &FieldElement) -> bool {
        self.registry.is_known_root(root).await
    }

    pub fn build_witness(
        &self,
        identity: &Identity,
        signal_hash: &FieldElement,
        path: &MerklePath,
        external_nullifier: &FieldElement,
    ) -> SemaResult<Witness> {
        Witness::build(
            identity,
            signal_hash,
            path,
            external_nullifier,
            self.registry.hasher().as_ref(),
        )
    }

    pub async fn generate_proof(
        &self,
        witness: Witness,
        cancel: &CancellationToken,
    ) -> SemaResult<FullProof> {
        self.coordinator()?.generate_proof(witness, cancel).await
    }

    /// Prove `signal` for the identity at `leaf_index` against the current root.
    pub async fn prove_signal(
        &self,
        identity: &Identity,
        leaf_index: u64,
        signal: &[u8],
        external_nullifier: &FieldElement,
        cancel: &CancellationToken,
    ) -> SemaResult<FullProof> {
        let coordinator = self.coordinator()?;
        let path = self.registry.path(leaf_index).await?;
        coordinator
            .prove_signal(identity, signal, &path, external_nullifier, cancel)
            .await
    }

    pub async fn pre_broadcast_check(
        &self,
        root: &FieldElement,
        nullifier_hash: &FieldElement,
        external_nullifier: &FieldElement,
    ) -> bool {
        self.gate
            .pre_broadcast_check(root, nullifier_hash, external_nullifier)
            .await
    }

    pub async fn verify_proof(
        &self,
        public_signals: &PublicSignals,
        proof: &SignalProof,
    ) -> SemaResult<()> {
        self.gate.verify_proof(public_signals, proof).await
    }

    pub async fn broadcast_signal(
        &self,
        signal: &[u8],
        proof: Option<&SignalProof>,
        root: &FieldElement,
        nullifier_hash: &FieldElement,
        external_nullifier: &FieldElement,
    ) -> SemaResult<Receipt> {
        self.gate
            .broadcast_signal(signal, proof, root, nullifier_hash, external_nullifier)
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.gate.subscribe()
    }

    pub async fn stats(&self) -> NodeStats {
        NodeStats {
            params: self.registry.params(),
            members: self.registry.len().await,
            capacity: self.registry.capacity().await,
            current_root: self.registry.current_root().await,
            registrations: self.registry.registrations(),
            rejected_registrations: self.registry.rejected_registrations(),
            gate: self.gate.stats(),
            prover: self.coordinator.as_ref().map(|c| c.stats()),
        }
    }
}

#[cfg(feature = "mock")]
fn mock_backends(
    params: CircuitParams,
) -> SemaResult<(Option<Arc<dyn SignalProver>>, Arc<dyn SignalVerifier>)> {
    tracing::warn!("Using the mock proof backend - proofs are not zero-knowledge or sound");
    let backend = Arc::new(sema_crypto::MockBackend::new(params));
    Ok((
        Some(backend.clone() as Arc<dyn SignalProver>),
        backend as Arc<dyn SignalVerifier>,
    ))
}

#[cfg(not(feature = "mock"))]
fn mock_backends(
    _params: CircuitParams,
) -> SemaResult<(Option<Arc<dyn SignalProver>>, Arc<dyn SignalVerifier>)> {
    Err(SemaError::Config(
        "backend = \"mock\" requires building with the `mock` feature".into(),
    ))
}
