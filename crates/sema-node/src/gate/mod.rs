mod nullifier;
mod types;
mod verification;

pub use nullifier::NullifierLedger;
pub use types::{GateStats, ScopedNullifier, SignalEvent};
pub use verification::VerificationGate;
