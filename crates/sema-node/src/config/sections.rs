use sema_types::{FieldElement, HashScheme, DEFAULT_TREE_ARITY, DEFAULT_TREE_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::{BroadcastMode, ProverBackend};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub depth: usize,
    pub arity: usize,
    /// Hex field element. Unset means BLAKE3("Semaphore") reduced into the field.
    pub zero_value: Option<FieldElement>,
    pub hash_scheme: HashScheme,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
            arity: DEFAULT_TREE_ARITY,
            zero_value: None,
            hash_scheme: HashScheme::Poseidon,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub broadcast_mode: BroadcastMode,
    /// Labels of accepted signaling contexts. Empty accepts every context.
    pub external_nullifiers: Vec<String>,
    /// Capacity of the accepted-signal event channel.
    pub event_buffer: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            broadcast_mode: BroadcastMode::ProofRequired,
            external_nullifiers: Vec::new(),
            event_buffer: 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    pub backend: ProverBackend,
    /// Defaults to `<data_dir>/keys`.
    pub artifacts_dir: Option<PathBuf>,
    /// Zero disables the timeout.
    pub proof_timeout_secs: u64,
    pub max_concurrent_proofs: usize,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            backend: ProverBackend::Groth16,
            artifacts_dir: None,
            proof_timeout_secs: 300,
            max_concurrent_proofs: 2,
        }
    }
}
