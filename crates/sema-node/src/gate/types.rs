use sema_types::{FieldElement, PublicSignals, Receipt};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ScopedNullifier {
    pub nullifier_hash: FieldElement,
    pub external_nullifier: FieldElement,
}

impl ScopedNullifier {
    pub fn new(nullifier_hash: FieldElement, external_nullifier: FieldElement) -> Self {
        Self {
            nullifier_hash,
            external_nullifier,
        }
    }
}

/// Published for every accepted broadcast.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalEvent {
    pub signal: Vec<u8>,
    pub public_signals: PublicSignals,
    pub receipt: Receipt,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub accepted: u64,
    pub proofs_verified: u64,
    pub rejected_invalid_proof: u64,
    pub rejected_missing_proof: u64,
    pub rejected_unknown_root: u64,
    pub rejected_nullifier_used: u64,
    pub rejected_unknown_context: u64,
    pub used_nullifiers: usize,
}

impl GateStats {
    pub fn rejected(&self) -> u64 {
        self.rejected_invalid_proof
            + self.rejected_missing_proof
            + self.rejected_unknown_root
            + self.rejected_nullifier_used
            + self.rejected_unknown_context
    }
}
