use thiserror::Error;

#[derive(Error, Debug)]
pub enum SemaError {
    #[error("Membership tree is full: capacity {capacity} reached")]
    TreeFull { capacity: u64 },

    #[error("Leaf index {index} out of range (next index is {next_index})")]
    IndexOutOfRange { index: u64, next_index: u64 },

    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Proof required for broadcast but none supplied")]
    MissingProof,

    #[error("Unknown Merkle root: {0}")]
    UnknownRoot(String),

    #[error("Nullifier already used: {nullifier_hash} in context {external_nullifier}")]
    NullifierAlreadyUsed {
        nullifier_hash: String,
        external_nullifier: String,
    },

    #[error("External nullifier not accepted: {0}")]
    UnknownExternalNullifier(String),

    #[error("Circuit artifact mismatch: {0}")]
    ArtifactMismatch(String),

    #[error("Invalid tree parameters: {0}")]
    InvalidParameters(String),

    #[error("Entropy source failure: {0}")]
    Entropy(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SemaError {
    /// Short, stable name of the error kind. Used as a metrics/log label.
    pub fn kind(&self) -> &'static str {
        match self {
            SemaError::TreeFull { .. } => "tree_full",
            SemaError::IndexOutOfRange { .. } => "index_out_of_range",
            SemaError::ProofGenerationFailed(_) => "proof_generation_failed",
            SemaError::InvalidProof(_) => "invalid_proof",
            SemaError::MissingProof => "missing_proof",
            SemaError::UnknownRoot(_) => "unknown_root",
            SemaError::NullifierAlreadyUsed { .. } => "nullifier_already_used",
            SemaError::UnknownExternalNullifier(_) => "unknown_external_nullifier",
            SemaError::ArtifactMismatch(_) => "artifact_mismatch",
            SemaError::InvalidParameters(_) => "invalid_parameters",
            SemaError::Entropy(_) => "entropy",
            SemaError::Cancelled => "cancelled",
            SemaError::Crypto(_) => "crypto",
            SemaError::Serialization(_) => "serialization",
            SemaError::Config(_) => "config",
            SemaError::Io(_) => "io",
        }
    }
}

pub type SemaResult<T> = Result<T, SemaError>;
