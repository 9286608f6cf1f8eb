use chrono::Utc;
use sema_crypto::{is_canonical, signal_hash, SignalVerifier};
use sema_types::{FieldElement, PublicSignals, Receipt, SemaError, SemaResult, SignalProof};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::nullifier::NullifierLedger;
use super::types::{GateStats, SignalEvent};
use crate::config::{BroadcastMode, GateConfig};
use crate::registry::MembershipRegistry;

#[derive(Default)]
struct GateCounters {
    accepted: AtomicU64,
    proofs_verified: AtomicU64,
    invalid_proof: AtomicU64,
    missing_proof: AtomicU64,
    unknown_root: AtomicU64,
    nullifier_used: AtomicU64,
    unknown_context: AtomicU64,
}

/// Accepts a signal at most once per `(nullifierHash, externalNullifier)`.
pub struct VerificationGate {
    registry: Arc<MembershipRegistry>,
    verifier: Arc<dyn SignalVerifier>,
    mode: BroadcastMode,
    allowed_contexts: HashSet<FieldElement>,
    ledger: NullifierLedger,
    events: broadcast::Sender<SignalEvent>,
    sequence: AtomicU64,
    counters: GateCounters,
}

impl VerificationGate {
    pub fn new(
        registry: Arc<MembershipRegistry>,
        verifier: Arc<dyn SignalVerifier>,
        config: &GateConfig,
    ) -> SemaResult<Self> {
        registry.params().ensure_matches(&verifier.params())?;

        let allowed_contexts = config
            .external_nullifiers
            .iter()
            .map(|label| sema_crypto::external_nullifier(label))
            .collect();
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        info!(
            mode = %config.broadcast_mode,
            verifier = verifier.name(),
            contexts = config.external_nullifiers.len(),
            "Verification gate ready"
        );

        Ok(Self {
            registry,
            verifier,
            mode: config.broadcast_mode,
            allowed_contexts,
            ledger: NullifierLedger::new(),
            events,
            sequence: AtomicU64::new(0),
            counters: GateCounters::default(),
        })
    }

    pub fn mode(&self) -> BroadcastMode {
        self.mode
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.events.subscribe()
    }

    fn context_allowed(&self, external_nullifier: &FieldElement) -> bool {
        self.allowed_contexts.is_empty() || self.allowed_contexts.contains(external_nullifier)
    }

    /// Side-effect free: would a validly proved broadcast with these values succeed now?
    pub async fn pre_broadcast_check(
        &self,
        root: &FieldElement,
        nullifier_hash: &FieldElement,
        external_nullifier: &FieldElement,
    ) -> bool {
        if ![root, nullifier_hash, external_nullifier]
            .into_iter()
            .all(is_canonical)
        {
            return false;
        }
        if !self.context_allowed(external_nullifier) {
            return false;
        }
        self.registry.is_known_root(root).await
            && !self.ledger.contains(nullifier_hash, external_nullifier)
    }

    /// Cryptographic check only. Does not look at roots or nullifiers.
    pub async fn verify_proof(&self, public_signals: &PublicSignals, proof: &SignalProof) -> SemaResult<()> {
        let verifier = self.verifier.clone();
        let signals = *public_signals;
        let proof = proof.clone();
        let valid = tokio::task::spawn_blocking(move || verifier.verify(&signals, &proof))
            .await
            .map_err(|e| SemaError::InvalidProof(format!("verification task failed: {}", e)))??;

        self.counters.proofs_verified.fetch_add(1, Ordering::Relaxed);
        if !valid {
            return Err(SemaError::InvalidProof("proof does not match public signals".into()));
        }
        Ok(())
    }

    /// Verify, check and record a signal. Nothing is recorded unless every check passes.
    pub async fn broadcast_signal(
        &self,
        signal: &[u8],
        proof: Option<&SignalProof>,
        root: &FieldElement,
        nullifier_hash: &FieldElement,
        external_nullifier: &FieldElement,
    ) -> SemaResult<Receipt> {
        let result = self
            .try_broadcast(signal, proof, root, nullifier_hash, external_nullifier)
            .await;

        match &result {
            Ok(receipt) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                info!(
                    sequence = receipt.sequence,
                    nullifier = %nullifier_hash.short(),
                    context = %external_nullifier.short(),
                    "Signal accepted"
                );
            }
            Err(e) => {
                self.record_rejection(e);
                warn!(
                    reason = e.kind(),
                    nullifier = %nullifier_hash.short(),
                    context = %external_nullifier.short(),
                    "Signal rejected"
                );
            }
        }
        result
    }

    async fn try_broadcast(
        &self,
        signal: &[u8],
        proof: Option<&SignalProof>,
        root: &FieldElement,
        nullifier_hash: &FieldElement,
        external_nullifier: &FieldElement,
    ) -> SemaResult<Receipt> {
        for value in [root, nullifier_hash, external_nullifier] {
            if !is_canonical(value) {
                return Err(SemaError::InvalidProof(format!(
                    "public signal {} is not a canonical field element",
                    value.short()
                )));
            }
        }
        if !self.context_allowed(external_nullifier) {
            return Err(SemaError::UnknownExternalNullifier(external_nullifier.to_hex()));
        }

        let public_signals = PublicSignals::new(
            *root,
            *nullifier_hash,
            signal_hash(signal),
            *external_nullifier,
        );

        match (proof, self.mode) {
            (Some(proof), _) => self.verify_proof(&public_signals, proof).await?,
            (None, BroadcastMode::ProofRequired) => return Err(SemaError::MissingProof),
            (None, BroadcastMode::PreVerified) => {
                debug!("Broadcast without proof, relying on out-of-band verification");
            }
        }

        // Roots are never forgotten, so this check cannot be invalidated by
        // the time the nullifier is marked.
        if !self.registry.is_known_root(root).await {
            return Err(SemaError::UnknownRoot(root.to_hex()));
        }

        self.ledger.mark(nullifier_hash, external_nullifier, || {
            let receipt = Receipt {
                signal_hash: public_signals.signal_hash,
                nullifier_hash: *nullifier_hash,
                external_nullifier: *external_nullifier,
                accepted_at: Utc::now(),
                sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            };
            // No subscribers is not an error.
            let _ = self.events.send(SignalEvent {
                signal: signal.to_vec(),
                public_signals,
                receipt: receipt.clone(),
            });
            receipt
        })
    }

    fn record_rejection(&self, error: &SemaError) {
        let counter = match error {
            SemaError::InvalidProof(_) => &self.counters.invalid_proof,
            SemaError::MissingProof => &self.counters.missing_proof,
            SemaError::UnknownRoot(_) => &self.counters.unknown_root,
            SemaError::NullifierAlreadyUsed { .. } => &self.counters.nullifier_used,
            SemaError::UnknownExternalNullifier(_) => &self.counters.unknown_context,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn used_nullifiers(&self) -> usize {
        self.ledger.len()
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            proofs_verified: self.counters.proofs_verified.load(Ordering::Relaxed),
            rejected_invalid_proof: self.counters.invalid_proof.load(Ordering::Relaxed),
            rejected_missing_proof: self.counters.missing_proof.load(Ordering::Relaxed),
            rejected_unknown_root: self.counters.unknown_root.load(Ordering::Relaxed),
            rejected_nullifier_used: self.counters.nullifier_used.load(Ordering::Relaxed),
            rejected_unknown_context: self.counters.unknown_context.load(Ordering::Relaxed),
            used_nullifiers: self.ledger.len(),
        }
    }
}
