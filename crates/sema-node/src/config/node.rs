use sema_crypto::default_zero_value;
use sema_types::{CircuitParams, FieldElement, SemaError, SemaResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use super::logging::LoggingConfig;
use super::sections::{GateConfig, ProverConfig, TreeConfig};
use super::types::{parse_flag, BroadcastMode, LogLevel, ProverBackend};

/// Largest tree the node accepts. Paths and circuits grow linearly with depth.
const MAX_TREE_DEPTH: usize = 32;

const MAX_TREE_ARITY: usize = 16;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub tree: TreeConfig,
    pub gate: GateConfig,
    pub prover: ProverConfig,
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/var/lib/sema"));

        Self {
            data_dir: home.join(".sema"),
            tree: TreeConfig::default(),
            gate: GateConfig::default(),
            prover: ProverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> SemaResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load from `path`, taking `SEMA_*` overrides from `get` instead of the
    /// process environment.
    pub(crate) fn load_with(
        path: impl AsRef<std::path::Path>,
        get: impl Fn(&str) -> Option<String>,
    ) -> SemaResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| SemaError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| SemaError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(get);
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> SemaResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SemaError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SemaError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| SemaError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    /// Apply `SEMA_*` overrides from `get`. Values that fail to parse are
    /// logged and ignored.
    pub(crate) fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = get("SEMA_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(depth) = get("SEMA_TREE_DEPTH") {
            match depth.parse() {
                Ok(d) => self.tree.depth = d,
                Err(_) => warn!("Ignoring invalid SEMA_TREE_DEPTH: {}", depth),
            }
        }

        if let Some(arity) = get("SEMA_TREE_ARITY") {
            match arity.parse() {
                Ok(a) => self.tree.arity = a,
                Err(_) => warn!("Ignoring invalid SEMA_TREE_ARITY: {}", arity),
            }
        }

        if let Some(scheme) = get("SEMA_HASH_SCHEME") {
            match scheme.parse() {
                Ok(s) => self.tree.hash_scheme = s,
                Err(e) => warn!("Ignoring SEMA_HASH_SCHEME: {}", e),
            }
        }

        if let Some(mode) = get("SEMA_BROADCAST_MODE") {
            match mode.parse::<BroadcastMode>() {
                Ok(m) => self.gate.broadcast_mode = m,
                Err(e) => warn!("Ignoring SEMA_BROADCAST_MODE: {}", e),
            }
        }

        if let Some(dir) = get("SEMA_ARTIFACTS_DIR") {
            self.prover.artifacts_dir = Some(PathBuf::from(dir));
        }

        if let Some(level) = get("SEMA_LOG_LEVEL") {
            match level.parse::<LogLevel>() {
                Ok(l) => self.logging.level = l,
                Err(e) => warn!("Ignoring SEMA_LOG_LEVEL: {}", e),
            }
        }

        if let Some(json) = get("SEMA_LOG_JSON") {
            match parse_flag(&json) {
                Some(on) => self.logging.json = on,
                None => warn!("Ignoring invalid SEMA_LOG_JSON: {}", json),
            }
        }
    }

    pub fn validate(&self) -> SemaResult<()> {
        if self.tree.depth == 0 || self.tree.depth > MAX_TREE_DEPTH {
            return Err(SemaError::Config(format!(
                "Tree depth must be between 1 and {}",
                MAX_TREE_DEPTH
            )));
        }

        if self.tree.arity < 2 || self.tree.arity > MAX_TREE_ARITY {
            return Err(SemaError::Config(format!(
                "Tree arity must be between 2 and {}",
                MAX_TREE_ARITY
            )));
        }

        if self.circuit_params().capacity().is_none() {
            return Err(SemaError::Config(format!(
                "Tree capacity {}^{} does not fit in 64 bits",
                self.tree.arity, self.tree.depth
            )));
        }

        if let Some(zero) = &self.tree.zero_value {
            if !sema_crypto::is_canonical(zero) {
                return Err(SemaError::Config(
                    "zero_value is not a canonical field element".into(),
                ));
            }
        }

        if self.prover.max_concurrent_proofs == 0 {
            return Err(SemaError::Config(
                "max_concurrent_proofs must be at least 1".into(),
            ));
        }

        if self.gate.event_buffer == 0 {
            return Err(SemaError::Config("Gate event buffer cannot be 0".into()));
        }

        if self.gate.external_nullifiers.iter().any(|l| l.trim().is_empty()) {
            return Err(SemaError::Config(
                "external_nullifiers entries cannot be empty".into(),
            ));
        }

        if self.prover.backend == ProverBackend::Mock {
            if cfg!(feature = "mock") {
                warn!("Mock proof backend selected - proofs are NOT zero-knowledge and can be forged");
            } else {
                return Err(SemaError::Config(
                    "Mock proof backend requires building with the 'mock' feature".into(),
                ));
            }
        }

        if self.gate.broadcast_mode == BroadcastMode::PreVerified {
            warn!("Broadcast mode is 'pre_verified' - broadcasts without a proof are accepted");
        }

        Ok(())
    }

    pub fn circuit_params(&self) -> CircuitParams {
        CircuitParams::new(self.tree.depth, self.tree.arity, self.tree.hash_scheme)
    }

    pub fn zero_value(&self) -> FieldElement {
        self.tree.zero_value.unwrap_or_else(default_zero_value)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.prover
            .artifacts_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("keys"))
    }

    pub fn identities_dir(&self) -> PathBuf {
        self.data_dir.join("identities")
    }

    pub fn proof_timeout(&self) -> Option<std::time::Duration> {
        match self.prover.proof_timeout_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }
}

impl std::fmt::Display for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SEMA Node Configuration")?;
        writeln!(f, "=======================")?;
        writeln!(f, "Data dir: {:?}", self.data_dir)?;
        writeln!(f, "Tree: {}", self.circuit_params())?;
        writeln!(f, "Zero value: {}", self.zero_value().short())?;
        writeln!(f, "Broadcast mode: {}", self.gate.broadcast_mode)?;
        if self.gate.external_nullifiers.is_empty() {
            writeln!(f, "External nullifiers: any")?;
        } else {
            writeln!(f, "External nullifiers: {}", self.gate.external_nullifiers.join(", "))?;
        }
        writeln!(f, "Prover: {}", self.prover.backend)?;
        writeln!(f, "Artifacts: {:?}", self.artifacts_dir())?;
        writeln!(f, "Max concurrent proofs: {}", self.prover.max_concurrent_proofs)?;
        writeln!(f, "Log level: {}", self.logging.level)?;
        Ok(())
    }
}
