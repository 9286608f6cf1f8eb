use parking_lot::Mutex;
use sema_types::{FieldElement, SemaError, SemaResult};
use std::collections::HashSet;

use super::types::ScopedNullifier;

const SHARD_COUNT: usize = 16;

/// Set of spent `(nullifierHash, externalNullifier)` pairs.
///
/// Keys are spread over independently locked shards, so marks on different
/// keys rarely contend. Nothing is ever evicted.
pub struct NullifierLedger {
    shards: Vec<Mutex<HashSet<ScopedNullifier>>>,
}

impl NullifierLedger {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| Mutex::new(HashSet::with_capacity(64)))
                .collect(),
        }
    }

    fn shard(&self, key: &ScopedNullifier) -> &Mutex<HashSet<ScopedNullifier>> {
        let n = key.nullifier_hash.as_bytes();
        let e = key.external_nullifier.as_bytes();
        &self.shards[(n[0] ^ e[0]) as usize % SHARD_COUNT]
    }

    pub fn contains(&self, nullifier_hash: &FieldElement, external_nullifier: &FieldElement) -> bool {
        let key = ScopedNullifier::new(*nullifier_hash, *external_nullifier);
        self.shard(&key).lock().contains(&key)
    }

    /// Mark the pair as used and run `on_mark` before the shard unlocks.
    ///
    /// At most one caller ever gets `Ok` for a given pair.
    pub fn mark<R>(
        &self,
        nullifier_hash: &FieldElement,
        external_nullifier: &FieldElement,
        on_mark: impl FnOnce() -> R,
    ) -> SemaResult<R> {
        let key = ScopedNullifier::new(*nullifier_hash, *external_nullifier);
        let mut shard = self.shard(&key).lock();
        if !shard.insert(key) {
            return Err(SemaError::NullifierAlreadyUsed {
                nullifier_hash: nullifier_hash.to_hex(),
                external_nullifier: external_nullifier.to_hex(),
            });
        }
        Ok(on_mark())
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NullifierLedger {
    fn default() -> Self {
        Self::new()
    }
}
