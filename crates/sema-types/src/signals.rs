use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{FieldElement, SemaError, SemaResult};

/// Hash function family used for commitments, nullifiers and tree nodes.
///
/// Must agree with the hash scheme the loaded circuit artifacts were built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashScheme {
    #[default]
    Poseidon,
    Blake3,
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashScheme::Poseidon => write!(f, "poseidon"),
            HashScheme::Blake3 => write!(f, "blake3"),
        }
    }
}

impl std::str::FromStr for HashScheme {
    type Err = SemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poseidon" => Ok(HashScheme::Poseidon),
            "blake3" => Ok(HashScheme::Blake3),
            other => Err(SemaError::Config(format!("Unknown hash scheme: {}", other))),
        }
    }
}

/// Parameters that the accumulator and the circuit artifacts must agree on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitParams {
    pub depth: usize,
    pub arity: usize,
    pub hash_scheme: HashScheme,
}

impl CircuitParams {
    pub fn new(depth: usize, arity: usize, hash_scheme: HashScheme) -> Self {
        Self {
            depth,
            arity,
            hash_scheme,
        }
    }

    /// `arity ^ depth`, or `None` if it does not fit in a `u64`.
    pub fn capacity(&self) -> Option<u64> {
        let depth = u32::try_from(self.depth).ok()?;
        (self.arity as u64).checked_pow(depth)
    }

    pub fn ensure_matches(&self, other: &CircuitParams) -> SemaResult<()> {
        if self != other {
            return Err(SemaError::ArtifactMismatch(format!(
                "expected depth={} arity={} hash={}, found depth={} arity={} hash={}",
                self.depth,
                self.arity,
                self.hash_scheme,
                other.depth,
                other.arity,
                other.hash_scheme
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CircuitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "depth={} arity={} hash={}",
            self.depth, self.arity, self.hash_scheme
        )
    }
}

/// Membership path from a leaf to the root.
///
/// Level 0 is the leaf level. Each sibling group holds the `arity - 1`
/// other children of the node's parent, in slot order with the node's own
/// slot removed; `position_indices[l]` is that slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    pub leaf_index: u64,
    pub sibling_groups: Vec<Vec<FieldElement>>,
    pub position_indices: Vec<u32>,
}

impl MerklePath {
    pub fn depth(&self) -> usize {
        self.sibling_groups.len()
    }
}

/// The ordered vector a proof attests over: `[root, nullifierHash, signalHash, externalNullifier]`.
///
/// The order is part of the wire contract and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicSignals {
    pub root: FieldElement,
    pub nullifier_hash: FieldElement,
    pub signal_hash: FieldElement,
    pub external_nullifier: FieldElement,
}

impl PublicSignals {
    pub const LEN: usize = 4;

    pub fn new(
        root: FieldElement,
        nullifier_hash: FieldElement,
        signal_hash: FieldElement,
        external_nullifier: FieldElement,
    ) -> Self {
        Self {
            root,
            nullifier_hash,
            signal_hash,
            external_nullifier,
        }
    }

    pub fn to_array(&self) -> [FieldElement; Self::LEN] {
        [
            self.root,
            self.nullifier_hash,
            self.signal_hash,
            self.external_nullifier,
        ]
    }

    pub fn from_array(values: [FieldElement; Self::LEN]) -> Self {
        let [root, nullifier_hash, signal_hash, external_nullifier] = values;
        Self::new(root, nullifier_hash, signal_hash, external_nullifier)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::LEN * 32);
        for value in self.to_array() {
            bytes.extend_from_slice(value.as_bytes());
        }
        bytes
    }
}

/// Opaque proof bytes produced by a proving backend.
#[derive(Clone, PartialEq, Eq)]
pub struct SignalProof(pub Vec<u8>);

impl SignalProof {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> SemaResult<Self> {
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map(Self)
            .map_err(|e| SemaError::Serialization(format!("Invalid base64 proof: {}", e)))
    }
}

impl fmt::Debug for SignalProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignalProof({} bytes)", self.0.len())
    }
}

impl Serialize for SignalProof {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for SignalProof {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SignalProof::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// A proof together with the public signals it was generated for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FullProof {
    pub proof: SignalProof,
    pub public_signals: PublicSignals,
}

/// Returned by a successful broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub signal_hash: FieldElement,
    pub nullifier_hash: FieldElement,
    pub external_nullifier: FieldElement,
    pub accepted_at: DateTime<Utc>,
    /// Position of this signal in the gate's acceptance order, starting at 0.
    pub sequence: u64,
}
