//! SEMA node: membership registry, proof coordination and the
//! nullifier-gated broadcast path.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod gate;
pub mod registry;
pub mod service;

pub use cancellation::CancellationToken;
pub use config::{
    BroadcastMode, GateConfig, LogLevel, LoggingConfig, NodeConfig, ProverBackend, ProverConfig,
    TreeConfig,
};
pub use coordinator::{ProofCoordinator, ProverStats};
pub use gate::{GateStats, NullifierLedger, ScopedNullifier, SignalEvent, VerificationGate};
pub use registry::MembershipRegistry;
pub use service::{NodeStats, SignalingService};
