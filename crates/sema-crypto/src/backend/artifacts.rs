//! On-disk Groth16 circuit artifacts.
//!
//! Layout of an artifacts directory:
//! - `semaphore.pk.bin`    compressed proving key (optional for verifier-only nodes)
//! - `semaphore.vk.bin`    compressed verifying key
//! - `semaphore.vk.hash`   BLAKE3 hex of the verifying key bytes
//! - `semaphore.meta.json` circuit parameters and hashes

use ark_bn254::Bn254;
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_serialize::CanonicalDeserialize;
use chrono::{DateTime, Utc};
use sema_types::{CircuitParams, HashScheme, SemaError, SemaResult, CIRCUIT_NAME, CIRCUIT_VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::{CircuitBackend, Groth16Backend};

pub const PROVING_KEY_FILE: &str = "semaphore.pk.bin";
pub const VERIFYING_KEY_FILE: &str = "semaphore.vk.bin";
pub const VK_HASH_FILE: &str = "semaphore.vk.hash";
pub const META_FILE: &str = "semaphore.meta.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub circuit: String,
    pub version: String,
    pub depth: usize,
    pub arity: usize,
    pub hash_scheme: HashScheme,
    pub vk_hash: String,
    pub pk_size: Option<usize>,
    pub vk_size: usize,
    pub generated_at: DateTime<Utc>,
}

impl ArtifactMetadata {
    pub fn params(&self) -> CircuitParams {
        CircuitParams::new(self.depth, self.arity, self.hash_scheme)
    }
}

pub fn vk_hash(vk_bytes: &[u8]) -> String {
    hex::encode(blake3::hash(vk_bytes).as_bytes())
}

fn artifact_err(path: &Path, e: impl std::fmt::Display) -> SemaError {
    SemaError::ArtifactMismatch(format!("{}: {}", path.display(), e))
}

/// Write every artifact of `backend` into `dir`, creating it if needed.
pub fn write_artifacts(dir: &Path, backend: &Groth16Backend) -> SemaResult<ArtifactMetadata> {
    fs::create_dir_all(dir)?;

    let vk_bytes = backend.verifying_key_bytes()?;
    let hash = vk_hash(&vk_bytes);
    fs::write(dir.join(VERIFYING_KEY_FILE), &vk_bytes)?;
    fs::write(dir.join(VK_HASH_FILE), format!("{}\n", hash))?;

    let pk_size = match backend.proving_key_bytes()? {
        Some(pk_bytes) => {
            fs::write(dir.join(PROVING_KEY_FILE), &pk_bytes)?;
            Some(pk_bytes.len())
        }
        None => None,
    };

    let params = backend.params();
    let metadata = ArtifactMetadata {
        circuit: CIRCUIT_NAME.to_string(),
        version: CIRCUIT_VERSION.to_string(),
        depth: params.depth,
        arity: params.arity,
        hash_scheme: params.hash_scheme,
        vk_hash: hash,
        pk_size,
        vk_size: vk_bytes.len(),
        generated_at: Utc::now(),
    };
    let json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| SemaError::Serialization(e.to_string()))?;
    fs::write(dir.join(META_FILE), json)?;

    info!(dir = %dir.display(), vk_hash = %metadata.vk_hash, "Wrote circuit artifacts");
    Ok(metadata)
}

pub fn read_metadata(dir: &Path) -> SemaResult<ArtifactMetadata> {
    let path = dir.join(META_FILE);
    let content = fs::read_to_string(&path).map_err(|e| artifact_err(&path, e))?;
    serde_json::from_str(&content).map_err(|e| artifact_err(&path, e))
}

/// Load artifacts and check them against the accumulator's parameters.
///
/// Every disagreement is an `ArtifactMismatch`, so callers can fail before
/// serving any traffic.
pub fn load_artifacts(dir: &Path, expected: &CircuitParams) -> SemaResult<Groth16Backend> {
    let metadata = read_metadata(dir)?;
    if metadata.circuit != CIRCUIT_NAME {
        return Err(SemaError::ArtifactMismatch(format!(
            "artifacts are for circuit '{}', expected '{}'",
            metadata.circuit, CIRCUIT_NAME
        )));
    }
    if metadata.version != CIRCUIT_VERSION {
        return Err(SemaError::ArtifactMismatch(format!(
            "artifact version {} does not match circuit version {}",
            metadata.version, CIRCUIT_VERSION
        )));
    }
    expected.ensure_matches(&metadata.params())?;

    let vk_path = dir.join(VERIFYING_KEY_FILE);
    let vk_bytes = fs::read(&vk_path).map_err(|e| artifact_err(&vk_path, e))?;
    let actual_hash = vk_hash(&vk_bytes);
    if actual_hash != metadata.vk_hash {
        return Err(SemaError::ArtifactMismatch(format!(
            "verifying key hash {} does not match metadata {}",
            actual_hash, metadata.vk_hash
        )));
    }

    let hash_path = dir.join(VK_HASH_FILE);
    match fs::read_to_string(&hash_path) {
        Ok(stored) if stored.trim() != actual_hash => {
            return Err(SemaError::ArtifactMismatch(format!(
                "verifying key hash {} does not match {}",
                actual_hash,
                hash_path.display()
            )));
        }
        Ok(_) => {}
        Err(e) => warn!(path = %hash_path.display(), error = %e, "No stored verifying key hash"),
    }

    let vk = VerifyingKey::<Bn254>::deserialize_compressed(&vk_bytes[..])
        .map_err(|e| artifact_err(&vk_path, e))?;

    let pk_path = dir.join(PROVING_KEY_FILE);
    let pk = if pk_path.exists() {
        let pk_bytes = fs::read(&pk_path).map_err(|e| artifact_err(&pk_path, e))?;
        let pk = ProvingKey::<Bn254>::deserialize_compressed(&pk_bytes[..])
            .map_err(|e| artifact_err(&pk_path, e))?;
        if pk.vk != vk {
            return Err(SemaError::ArtifactMismatch(
                "proving key was not generated with this verifying key".into(),
            ));
        }
        Some(pk)
    } else {
        info!(dir = %dir.display(), "No proving key found, loading verifier only");
        None
    };

    let backend = Groth16Backend::from_keys(metadata.params(), pk, vk)?;
    info!(
        params = %metadata.params(),
        vk_hash = %metadata.vk_hash,
        prover = backend.has_proving_key(),
        "Loaded circuit artifacts"
    );
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params() -> CircuitParams {
        CircuitParams::new(2, 2, HashScheme::Poseidon)
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let backend = Groth16Backend::setup(params()).unwrap();
        let metadata = write_artifacts(dir.path(), &backend).unwrap();

        assert_eq!(metadata.params(), params());
        assert!(metadata.pk_size.is_some());
        assert_eq!(read_metadata(dir.path()).unwrap(), metadata);

        let loaded = load_artifacts(dir.path(), &params()).unwrap();
        assert!(loaded.has_proving_key());
        assert_eq!(loaded.verifying_key(), backend.verifying_key());
    }

    #[test]
    fn test_param_mismatch_fails_fast() {
        let dir = TempDir::new().unwrap();
        let backend = Groth16Backend::setup(params()).unwrap();
        write_artifacts(dir.path(), &backend).unwrap();

        let wrong = CircuitParams::new(2, 3, HashScheme::Poseidon);
        assert!(matches!(
            load_artifacts(dir.path(), &wrong),
            Err(SemaError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_tampered_vk_detected() {
        let dir = TempDir::new().unwrap();
        let backend = Groth16Backend::setup(params()).unwrap();
        write_artifacts(dir.path(), &backend).unwrap();

        let other = Groth16Backend::setup(params()).unwrap();
        fs::write(dir.path().join(VERIFYING_KEY_FILE), other.verifying_key_bytes().unwrap()).unwrap();

        assert!(matches!(
            load_artifacts(dir.path(), &params()),
            Err(SemaError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_verifier_only_directory() {
        let dir = TempDir::new().unwrap();
        let backend = Groth16Backend::setup(params()).unwrap();
        write_artifacts(dir.path(), &backend).unwrap();
        fs::remove_file(dir.path().join(PROVING_KEY_FILE)).unwrap();

        let loaded = load_artifacts(dir.path(), &params()).unwrap();
        assert!(!loaded.has_proving_key());
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_artifacts(&dir.path().join("absent"), &params()),
            Err(SemaError::ArtifactMismatch(_))
        ));
    }
}
