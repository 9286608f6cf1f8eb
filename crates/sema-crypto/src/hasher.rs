//! Pluggable field hashing.
//!
//! The accumulator, identities and witnesses are written against
//! [`FieldHasher`]; which concrete function backs them is chosen by
//! [`HashScheme`] in configuration.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use sema_types::HashScheme;
use std::sync::Arc;

use crate::field::fr_to_bytes;
use crate::poseidon::poseidon_hash_fields;

const BLAKE3_FIELD_CONTEXT: &str = "sema 2024-01 field hasher v1";

/// Hash a sequence of field elements to a single field element.
pub trait FieldHasher: Send + Sync {
    fn scheme(&self) -> HashScheme;

    fn hash(&self, inputs: &[Fr]) -> Fr;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PoseidonHasher;

impl FieldHasher for PoseidonHasher {
    fn scheme(&self) -> HashScheme {
        HashScheme::Poseidon
    }

    fn hash(&self, inputs: &[Fr]) -> Fr {
        poseidon_hash_fields(inputs)
    }
}

/// BLAKE3 in key-derivation mode, 64 output bytes reduced into the field.
///
/// Has no circuit gadget; only usable with backends that check the
/// witness natively.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3FieldHasher;

impl FieldHasher for Blake3FieldHasher {
    fn scheme(&self) -> HashScheme {
        HashScheme::Blake3
    }

    fn hash(&self, inputs: &[Fr]) -> Fr {
        let mut hasher = blake3::Hasher::new_derive_key(BLAKE3_FIELD_CONTEXT);
        hasher.update(&(inputs.len() as u64).to_le_bytes());
        for input in inputs {
            hasher.update(&fr_to_bytes(input));
        }
        let mut wide = [0u8; 64];
        hasher.finalize_xof().fill(&mut wide);
        Fr::from_le_bytes_mod_order(&wide)
    }
}

pub fn hasher_for(scheme: HashScheme) -> Arc<dyn FieldHasher> {
    match scheme {
        HashScheme::Poseidon => Arc::new(PoseidonHasher),
        HashScheme::Blake3 => Arc::new(Blake3FieldHasher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_for_scheme() {
        assert_eq!(hasher_for(HashScheme::Poseidon).scheme(), HashScheme::Poseidon);
        assert_eq!(hasher_for(HashScheme::Blake3).scheme(), HashScheme::Blake3);
    }

    #[test]
    fn test_schemes_differ() {
        let inputs = [Fr::from(1u64), Fr::from(2u64)];
        assert_ne!(PoseidonHasher.hash(&inputs), Blake3FieldHasher.hash(&inputs));
    }

    #[test]
    fn test_blake3_length_prefixed() {
        let zero = Fr::from(0u64);
        assert_ne!(
            Blake3FieldHasher.hash(&[zero, zero]),
            Blake3FieldHasher.hash(&[zero, zero, zero])
        );
        assert_eq!(
            Blake3FieldHasher.hash(&[Fr::from(7u64)]),
            Blake3FieldHasher.hash(&[Fr::from(7u64)])
        );
    }
}
