//! Conversions between `FieldElement` encodings and BN254 `Fr`, plus the
//! string-to-field helpers applications use for contexts and signals.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use sema_types::{
    FieldElement, SemaError, SemaResult, FIELD_ELEMENT_SIZE, TRUNCATED_HASH_SIZE, ZERO_VALUE_SEED,
};

/// Convert field element to 32 bytes (little-endian, canonical).
pub fn fr_to_bytes(f: &Fr) -> [u8; FIELD_ELEMENT_SIZE] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut result = [0u8; FIELD_ELEMENT_SIZE];
    result.copy_from_slice(&bytes[..FIELD_ELEMENT_SIZE]);
    result
}

/// Convert 32 bytes to field element (mod order).
pub fn bytes_to_fr(bytes: &[u8; FIELD_ELEMENT_SIZE]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

pub fn fr_to_element(f: &Fr) -> FieldElement {
    FieldElement(fr_to_bytes(f))
}

pub fn element_to_fr(e: &FieldElement) -> Fr {
    bytes_to_fr(e.as_bytes())
}

/// Like [`element_to_fr`] but rejects encodings at or above the modulus.
///
/// Two encodings that reduce to the same `Fr` would otherwise verify
/// against the same proof while looking like different nullifiers.
pub fn canonical_fr(e: &FieldElement) -> SemaResult<Fr> {
    let f = element_to_fr(e);
    if fr_to_bytes(&f) != *e.as_bytes() {
        return Err(SemaError::Crypto(format!(
            "Non-canonical field element: {}",
            e.to_hex()
        )));
    }
    Ok(f)
}

pub fn is_canonical(e: &FieldElement) -> bool {
    canonical_fr(e).is_ok()
}

fn truncated_blake3(data: &[u8]) -> FieldElement {
    let digest = blake3::hash(data);
    let mut bytes = [0u8; FIELD_ELEMENT_SIZE];
    bytes[..TRUNCATED_HASH_SIZE].copy_from_slice(&digest.as_bytes()[..TRUNCATED_HASH_SIZE]);
    FieldElement(bytes)
}

/// Derive an external nullifier (signaling context) from a human readable label.
pub fn external_nullifier(label: &str) -> FieldElement {
    truncated_blake3(label.as_bytes())
}

/// Hash of the raw signal bytes, as committed to in the proof.
pub fn signal_hash(signal: &[u8]) -> FieldElement {
    truncated_blake3(signal)
}

/// Default placeholder value for unfilled leaves.
pub fn default_zero_value() -> FieldElement {
    let digest = blake3::hash(ZERO_VALUE_SEED);
    fr_to_element(&Fr::from_le_bytes_mod_order(digest.as_bytes()))
}
