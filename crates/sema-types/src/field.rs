use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{SemaError, SemaResult, FIELD_ELEMENT_SIZE};

/// Canonical little-endian encoding of a BN254 scalar field element.
///
/// This crate does not do field arithmetic; `sema-crypto` converts to and
/// from `Fr`. Values produced by hashing are always canonical.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement(pub [u8; FIELD_ELEMENT_SIZE]);

impl FieldElement {
    pub const ZERO: FieldElement = FieldElement([0u8; FIELD_ELEMENT_SIZE]);

    pub fn from_bytes(bytes: [u8; FIELD_ELEMENT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FIELD_ELEMENT_SIZE] {
        &self.0
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; FIELD_ELEMENT_SIZE];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> SemaResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| SemaError::Serialization(e.to_string()))?;
        if bytes.len() != FIELD_ELEMENT_SIZE {
            return Err(SemaError::Serialization(format!(
                "Invalid field element length: {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; FIELD_ELEMENT_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_hex())
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; FIELD_ELEMENT_SIZE]> for FieldElement {
    fn from(bytes: [u8; FIELD_ELEMENT_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FieldElement::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
