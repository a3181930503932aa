//! Trace Signature Function
//!
//! Maps canonical trace bytes to a fixed-size digest. The algorithm is a
//! configuration constant and must match across all replaying parties.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize, Serializer, Deserializer};
use sha2::{Sha256, Digest};

use crate::core::hash::Digest32;
use crate::trace::canonical::CanonicalTrace;

/// Digest algorithm for trace signatures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// SHA-256 (FIPS 180-4).
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
}

impl SignatureAlgorithm {
    /// Identifier written into `SSP_CONFIG.txt`.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Digest arbitrary bytes.
    pub fn digest(&self, bytes: &[u8]) -> Digest32 {
        match self {
            Self::Sha256 => Sha256::digest(bytes).into(),
        }
    }

    /// Digest the concatenation of `parts` as one message.
    pub fn digest_parts(&self, parts: &[&[u8]]) -> Digest32 {
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(*part);
                }
                hasher.finalize().into()
            }
        }
    }
}

/// Fixed-size digest of a canonical trace.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceSignature(Digest32);

impl TraceSignature {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: Digest32) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &Digest32 {
        &self.0
    }

    /// Lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TraceSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TraceSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceSignature({})", self.to_hex())
    }
}

impl FromStr for TraceSignature {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for TraceSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TraceSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Sign raw bytes.
pub fn sign(bytes: &[u8], algorithm: SignatureAlgorithm) -> TraceSignature {
    TraceSignature(algorithm.digest(bytes))
}

/// Sign a canonical trace bound to the digest of the input that produced it.
///
/// The signed message is `input_digest || canonical_trace`.
pub fn sign_trace(
    input_digest: &Digest32,
    trace: &CanonicalTrace,
    algorithm: SignatureAlgorithm,
) -> TraceSignature {
    TraceSignature(algorithm.digest_parts(&[input_digest.as_slice(), trace.as_bytes()]))
}
