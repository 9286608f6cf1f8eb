use serde::{Deserialize, Serialize};
use sema_types::SemaError;

/// Where proof verification happens for a broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// `broadcast_signal` must carry a proof and verifies it inline.
    #[default]
    ProofRequired,
    /// Proofs are checked out of band through `verify_proof`; a broadcast
    /// without a proof relies on the root and nullifier checks alone.
    PreVerified,
}

impl std::fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastMode::ProofRequired => write!(f, "proof_required"),
            BroadcastMode::PreVerified => write!(f, "pre_verified"),
        }
    }
}

impl std::str::FromStr for BroadcastMode {
    type Err = SemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "proof_required" => Ok(BroadcastMode::ProofRequired),
            "pre_verified" => Ok(BroadcastMode::PreVerified),
            other => Err(SemaError::Config(format!("Unknown broadcast mode: {}", other))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProverBackend {
    #[default]
    Groth16,
    /// Transparent test backend, only available with the `mock` feature.
    Mock,
}

impl std::fmt::Display for ProverBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProverBackend::Groth16 => write!(f, "groth16"),
            ProverBackend::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = SemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(SemaError::Config(format!("Unknown log level: {}", other))),
        }
    }
}

/// Boolean switch as accepted in environment variables.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
