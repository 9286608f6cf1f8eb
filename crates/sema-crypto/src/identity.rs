//! Member identities: secret material, the public commitment inserted into
//! the accumulator, and per-context nullifier derivation.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::{OsRng, RngCore};
use sema_types::{FieldElement, HashScheme, SemaError, SemaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::field::{canonical_fr, fr_to_bytes, fr_to_element};
use crate::hasher::FieldHasher;

const IDENTITY_FILE_VERSION: u32 = 1;

/// Secrets held by a group member. Never leaves the holder.
#[derive(Clone)]
pub struct Identity {
    trapdoor: [u8; 32],
    nullifier_secret: [u8; 32],
    signing_key: SigningKey,
}

fn random_scalar() -> SemaResult<[u8; 32]> {
    let mut wide = [0u8; 64];
    OsRng
        .try_fill_bytes(&mut wide)
        .map_err(|e| SemaError::Entropy(e.to_string()))?;
    let scalar = Fr::from_le_bytes_mod_order(&wide);
    wide.zeroize();
    Ok(fr_to_bytes(&scalar))
}

impl Identity {
    /// Draw fresh secrets from the operating system RNG.
    pub fn generate() -> SemaResult<Self> {
        let trapdoor = random_scalar()?;
        let nullifier_secret = random_scalar()?;

        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| SemaError::Entropy(e.to_string()))?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();

        Ok(Self {
            trapdoor,
            nullifier_secret,
            signing_key,
        })
    }

    pub fn from_secrets(trapdoor: Fr, nullifier_secret: Fr, signing_key: SigningKey) -> Self {
        Self {
            trapdoor: fr_to_bytes(&trapdoor),
            nullifier_secret: fr_to_bytes(&nullifier_secret),
            signing_key,
        }
    }

    pub fn trapdoor(&self) -> Fr {
        Fr::from_le_bytes_mod_order(&self.trapdoor)
    }

    pub fn nullifier_secret(&self) -> Fr {
        Fr::from_le_bytes_mod_order(&self.nullifier_secret)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Ed25519 verifying key reduced into the field.
    pub fn public_key(&self) -> Fr {
        Fr::from_le_bytes_mod_order(self.verifying_key().as_bytes())
    }

    pub fn commitment_fr(&self, hasher: &dyn FieldHasher) -> Fr {
        hasher.hash(&[self.trapdoor(), self.nullifier_secret(), self.public_key()])
    }

    pub fn commitment(&self, hasher: &dyn FieldHasher) -> FieldElement {
        fr_to_element(&self.commitment_fr(hasher))
    }

    pub fn nullifier_hash_fr(&self, hasher: &dyn FieldHasher, external_nullifier: Fr, depth: usize) -> Fr {
        nullifier_hash(hasher, external_nullifier, self.nullifier_secret(), depth)
    }

    /// Deterministic per (identity, context); independent of tree state.
    pub fn nullifier_hash(
        &self,
        hasher: &dyn FieldHasher,
        external_nullifier: &FieldElement,
        depth: usize,
    ) -> SemaResult<FieldElement> {
        let en = canonical_fr(external_nullifier)?;
        Ok(fr_to_element(&self.nullifier_hash_fr(hasher, en, depth)))
    }

    pub fn export(&self, hasher: &dyn FieldHasher, label: Option<String>) -> IdentityFile {
        let commitment = self.commitment(hasher);
        IdentityFile {
            version: IDENTITY_FILE_VERSION,
            id: hex::encode(&commitment.as_bytes()[..8]),
            label,
            hash_scheme: hasher.scheme(),
            commitment: commitment.to_hex(),
            trapdoor: hex::encode(self.trapdoor),
            nullifier_secret: hex::encode(self.nullifier_secret),
            signing_key: hex::encode(self.signing_key.to_bytes()),
            created_at: Utc::now(),
        }
    }
}

/// `H(externalNullifier, nullifierSecret, D)`.
pub fn nullifier_hash(hasher: &dyn FieldHasher, external_nullifier: Fr, nullifier_secret: Fr, depth: usize) -> Fr {
    hasher.hash(&[external_nullifier, nullifier_secret, Fr::from(depth as u64)])
}

impl Drop for Identity {
    fn drop(&mut self) {
        self.trapdoor.zeroize();
        self.nullifier_secret.zeroize();
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("trapdoor", &"[REDACTED]")
            .field("nullifier_secret", &"[REDACTED]")
            .field("verifying_key", &hex::encode(self.verifying_key().as_bytes()))
            .finish()
    }
}

/// On-disk form of an identity, kept only on the holder's machine.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IdentityFile {
    #[zeroize(skip)]
    pub version: u32,
    #[zeroize(skip)]
    pub id: String,
    #[zeroize(skip)]
    pub label: Option<String>,
    #[zeroize(skip)]
    pub hash_scheme: HashScheme,
    #[zeroize(skip)]
    pub commitment: String,
    pub trapdoor: String,
    pub nullifier_secret: String,
    pub signing_key: String,
    #[zeroize(skip)]
    pub created_at: DateTime<Utc>,
}

fn decode_secret(name: &str, value: &str) -> SemaResult<[u8; 32]> {
    let bytes = hex::decode(value)
        .map_err(|e| SemaError::Serialization(format!("Invalid {} hex: {}", name, e)))?;
    bytes
        .try_into()
        .map_err(|_| SemaError::Serialization(format!("{} must be 32 bytes", name)))
}

impl IdentityFile {
    /// Rebuild the identity and check it still matches the stored commitment.
    pub fn restore(&self, hasher: &dyn FieldHasher) -> SemaResult<Identity> {
        if self.version != IDENTITY_FILE_VERSION {
            return Err(SemaError::Serialization(format!(
                "Unsupported identity file version {}",
                self.version
            )));
        }
        if self.hash_scheme != hasher.scheme() {
            return Err(SemaError::Config(format!(
                "Identity was created for hash scheme {}, configured scheme is {}",
                self.hash_scheme,
                hasher.scheme()
            )));
        }

        let mut trapdoor = decode_secret("trapdoor", &self.trapdoor)?;
        let mut nullifier_secret = decode_secret("nullifier_secret", &self.nullifier_secret)?;
        let mut seed = decode_secret("signing_key", &self.signing_key)?;

        let identity = Identity::from_secrets(
            Fr::from_le_bytes_mod_order(&trapdoor),
            Fr::from_le_bytes_mod_order(&nullifier_secret),
            SigningKey::from_bytes(&seed),
        );
        trapdoor.zeroize();
        nullifier_secret.zeroize();
        seed.zeroize();

        if identity.commitment(hasher).to_hex() != self.commitment {
            return Err(SemaError::Crypto(
                "Identity file commitment does not match its secrets".into(),
            ));
        }
        Ok(identity)
    }
}
