use sema_crypto::{signal_hash, FieldHasher, Identity, SignalProver, Witness};
use sema_types::{CircuitParams, FieldElement, FullProof, MerklePath, SemaError, SemaResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;

#[derive(Default)]
struct ProverCounters {
    requested: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    timed_out: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverStats {
    pub requested: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
}

/// Turns identities and membership paths into proofs.
///
/// Proving runs on the blocking pool. At most `max_concurrent` proofs run at
/// once; further requests wait for a permit.
pub struct ProofCoordinator {
    prover: Arc<dyn SignalProver>,
    hasher: Arc<dyn FieldHasher>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    timeout: Option<Duration>,
    counters: ProverCounters,
}

impl ProofCoordinator {
    pub fn new(
        prover: Arc<dyn SignalProver>,
        hasher: Arc<dyn FieldHasher>,
        max_concurrent: usize,
        timeout: Option<Duration>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        info!(
            backend = prover.name(),
            params = %prover.params(),
            max_concurrent,
            timeout_secs = timeout.map(|t| t.as_secs()),
            "Proof coordinator ready"
        );

        Self {
            prover,
            hasher,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            timeout,
            counters: ProverCounters::default(),
        }
    }

    pub fn params(&self) -> CircuitParams {
        self.prover.params()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn build_witness(
        &self,
        identity: &Identity,
        signal_hash: &FieldElement,
        path: &MerklePath,
        external_nullifier: &FieldElement,
    ) -> SemaResult<Witness> {
        Witness::build(identity, signal_hash, path, external_nullifier, self.hasher.as_ref())
    }

    /// Prove a witness. Returns `Cancelled` if `cancel` fires first.
    ///
    /// A cancelled or timed-out proof keeps running on the blocking pool
    /// until it finishes and holds its permit until then.
    pub async fn generate_proof(
        &self,
        witness: Witness,
        cancel: &CancellationToken,
    ) -> SemaResult<FullProof> {
        self.counters.requested.fetch_add(1, Ordering::Relaxed);
        let result = self.run(witness, cancel).await;

        let counter = match &result {
            Ok(_) => &self.counters.completed,
            Err(SemaError::Cancelled) => &self.counters.cancelled,
            Err(_) => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = &result {
            warn!(reason = e.kind(), error = %e, "Proof generation did not complete");
        }
        result
    }

    async fn run(&self, witness: Witness, cancel: &CancellationToken) -> SemaResult<FullProof> {
        self.prover.params().ensure_matches(&witness.params())?;
        if cancel.is_cancelled() {
            return Err(SemaError::Cancelled);
        }

        let mut cancel = cancel.clone();
        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => permit
                .map_err(|_| SemaError::ProofGenerationFailed("prover is shut down".into()))?,
            _ = cancel.cancelled() => return Err(SemaError::Cancelled),
        };

        let public_signals = witness.public_signals();
        let prover = self.prover.clone();
        let started = Instant::now();
        debug!(nullifier = %public_signals.nullifier_hash.short(), "Proving");

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            prover.prove(&witness)
        });

        let limit = self.timeout;
        let deadline = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let proof = tokio::select! {
            joined = task => joined
                .map_err(|e| SemaError::ProofGenerationFailed(format!("proving task failed: {}", e)))??,
            _ = deadline => {
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                return Err(SemaError::ProofGenerationFailed(format!(
                    "proof generation exceeded {:?}",
                    limit.unwrap_or_default()
                )));
            }
            _ = cancel.cancelled() => return Err(SemaError::Cancelled),
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = proof.as_bytes().len(),
            "Proof generated"
        );

        Ok(FullProof {
            proof,
            public_signals,
        })
    }

    /// Hash `signal`, build the witness and prove it.
    pub async fn prove_signal(
        &self,
        identity: &Identity,
        signal: &[u8],
        path: &MerklePath,
        external_nullifier: &FieldElement,
        cancel: &CancellationToken,
    ) -> SemaResult<FullProof> {
        let witness = self.build_witness(identity, &signal_hash(signal), path, external_nullifier)?;
        self.generate_proof(witness, cancel).await
    }

    pub fn stats(&self) -> ProverStats {
        ProverStats {
            requested: self.counters.requested.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sema_crypto::{
        default_zero_value, external_nullifier, CircuitBackend, MembershipAccumulator, MockBackend,
        PoseidonHasher, SignalVerifier,
    };
    use sema_types::{HashScheme, PublicSignals, SignalProof};
    use std::sync::atomic::AtomicUsize;

    const PARAMS: CircuitParams = CircuitParams {
        depth: 4,
        arity: 3,
        hash_scheme: HashScheme::Poseidon,
    };

    /// Blocks each proof for a fixed time and tracks how many run at once.
    struct SlowProver {
        inner: MockBackend,
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowProver {
        fn new(delay: Duration) -> Self {
            Self {
                inner: MockBackend::new(PARAMS),
                delay,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl CircuitBackend for SlowProver {
        fn params(&self) -> CircuitParams {
            PARAMS
        }

        fn name(&self) -> &'static str {
            "slow-mock"
        }
    }

    impl SignalProver for SlowProver {
        fn prove(&self, witness: &Witness) -> SemaResult<SignalProof> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.inner.prove(witness)
        }
    }

    fn witness(member: usize) -> (Witness, Identity) {
        let mut tree =
            MembershipAccumulator::new(PARAMS.depth, PARAMS.arity, default_zero_value(), Arc::new(PoseidonHasher))
                .unwrap();
        let identities: Vec<Identity> = (0..3).map(|_| Identity::generate().unwrap()).collect();
        for identity in &identities {
            tree.insert(&identity.commitment(&PoseidonHasher)).unwrap();
        }
        let path = tree.path(member as u64).unwrap();
        let witness = Witness::build(
            &identities[member],
            &signal_hash(b"yes"),
            &path,
            &external_nullifier("voting-1"),
            &PoseidonHasher,
        )
        .unwrap();
        (witness, identities[member].clone())
    }

    fn coordinator(prover: Arc<dyn SignalProver>, max: usize, timeout: Option<Duration>) -> ProofCoordinator {
        ProofCoordinator::new(prover, Arc::new(PoseidonHasher), max, timeout)
    }

    #[tokio::test]
    async fn test_generate_and_verify() {
        let backend = Arc::new(MockBackend::new(PARAMS));
        let coordinator = coordinator(backend.clone(), 2, None);
        let (witness, _) = witness(1);
        let expected: PublicSignals = witness.public_signals();

        let full = coordinator
            .generate_proof(witness, &CancellationToken::default())
            .await
            .unwrap();
        assert_eq!(full.public_signals, expected);
        assert!(backend.verify(&full.public_signals, &full.proof).unwrap());
        assert_eq!(coordinator.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_prove_signal_hashes_signal() {
        let backend = Arc::new(MockBackend::new(PARAMS));
        let coordinator = coordinator(backend, 1, None);
        let mut tree =
            MembershipAccumulator::new(PARAMS.depth, PARAMS.arity, default_zero_value(), Arc::new(PoseidonHasher))
                .unwrap();
        let identity = Identity::generate().unwrap();
        tree.insert(&identity.commitment(&PoseidonHasher)).unwrap();
        let path = tree.path(0).unwrap();

        let full = coordinator
            .prove_signal(&identity, b"yes", &path, &external_nullifier("voting-1"), &CancellationToken::default())
            .await
            .unwrap();
        assert_eq!(full.public_signals.signal_hash, signal_hash(b"yes"));
        assert_eq!(full.public_signals.root, tree.root());
    }

    #[tokio::test]
    async fn test_unsatisfied_witness_fails() {
        let coordinator = coordinator(Arc::new(MockBackend::new(PARAMS)), 1, None);
        let (witness, _) = witness(0);
        let mut signals = witness.public_signals();
        signals.root = FieldElement::from_u64(1);
        let forged = Witness::from_parts(witness.private_inputs().clone(), signals, witness.params());

        let err = coordinator
            .generate_proof(forged, &CancellationToken::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SemaError::ProofGenerationFailed(_)));
        assert_eq!(coordinator.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_params_mismatch_rejected() {
        let other = CircuitParams::new(5, 3, HashScheme::Poseidon);
        let coordinator = coordinator(Arc::new(MockBackend::new(other)), 1, None);
        let (witness, _) = witness(0);
        let err = coordinator
            .generate_proof(witness, &CancellationToken::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SemaError::ArtifactMismatch(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bounded() {
        let prover = Arc::new(SlowProver::new(Duration::from_millis(50)));
        let coordinator = Arc::new(coordinator(prover.clone(), 2, None));

        let jobs = (0..6).map(|i| {
            let coordinator = coordinator.clone();
            let (witness, _) = witness(i % 3);
            async move {
                coordinator
                    .generate_proof(witness, &CancellationToken::default())
                    .await
            }
        });
        let results = futures::future::join_all(jobs).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(prover.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(coordinator.stats().completed, 6);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_permit() {
        let prover = Arc::new(SlowProver::new(Duration::from_millis(300)));
        let coordinator = Arc::new(coordinator(prover, 1, None));

        let busy = {
            let coordinator = coordinator.clone();
            let (witness, _) = witness(0);
            tokio::spawn(async move {
                coordinator
                    .generate_proof(witness, &CancellationToken::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (tx, token) = CancellationToken::new();
        let waiting = {
            let coordinator = coordinator.clone();
            let (witness, _) = witness(1);
            tokio::spawn(async move { coordinator.generate_proof(witness, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, SemaError::Cancelled));
        assert!(busy.await.unwrap().is_ok());
        assert_eq!(coordinator.stats().cancelled, 1);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let coordinator = coordinator(Arc::new(MockBackend::new(PARAMS)), 1, None);
        let (tx, token) = CancellationToken::new();
        tx.send(true).unwrap();
        let (witness, _) = witness(0);
        let err = coordinator.generate_proof(witness, &token).await.unwrap_err();
        assert!(matches!(err, SemaError::Cancelled));
    }

    #[tokio::test]
    async fn test_timeout() {
        let prover = Arc::new(SlowProver::new(Duration::from_millis(500)));
        let coordinator = coordinator(prover, 1, Some(Duration::from_millis(50)));
        let (witness, _) = witness(0);
        let err = coordinator
            .generate_proof(witness, &CancellationToken::default())
            .await
            .unwrap_err();
        match err {
            SemaError::ProofGenerationFailed(msg) => assert!(msg.contains("50ms"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
        let stats = coordinator.stats();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.failed, 1);
    }
}
