//! Identity Input
//!
//! The raw input `m` and its grammar. Inputs are held exactly as presented;
//! traversal reads a seed word derived from them but never rewrites them.

use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::{DomainHasher, Digest32, digest_prefix_u64};

/// Maximum accepted input length in bytes.
pub const MAX_INPUT_LEN: usize = 256;

/// Input grammar violations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InputFormatError {
    /// Input is empty.
    #[error("input is empty")]
    Empty,

    /// Input is longer than the grammar allows.
    #[error("input is {len} bytes, maximum is {max}")]
    TooLong {
        /// Presented length.
        len: usize,
        /// Declared maximum.
        max: usize,
    },

    /// Input contains a byte outside ASCII graphic characters.
    #[error("invalid byte 0x{byte:02x} at position {position}")]
    InvalidCharacter {
        /// Zero-based byte offset.
        position: usize,
        /// Offending byte.
        byte: u8,
    },
}

/// Validated identity input `m`.
///
/// Grammar: 1..=256 bytes, each in `0x21..=0x7E`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityInput(String);

impl IdentityInput {
    /// Validate raw text against the input grammar.
    pub fn parse(raw: &str) -> Result<Self, InputFormatError> {
        validate(raw)?;
        Ok(Self(raw.to_string()))
    }

    /// The input exactly as presented.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The input bytes exactly as presented.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Domain-separated digest of the whole input.
    ///
    /// Trace signatures are bound to this digest, so two inputs whose seed
    /// words agree still sign differently.
    pub fn digest(&self) -> Digest32 {
        let mut hasher = DomainHasher::for_input();
        hasher.update_prefixed(self.as_bytes());
        hasher.finalize()
    }

    /// Seed word read by traversal.
    pub fn seed_word(&self) -> u64 {
        digest_prefix_u64(&self.digest())
    }
}

impl fmt::Display for IdentityInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdentityInput {
    type Error = InputFormatError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        validate(&raw)?;
        Ok(Self(raw))
    }
}

impl From<IdentityInput> for String {
    fn from(input: IdentityInput) -> Self {
        input.0
    }
}

fn validate(raw: &str) -> Result<(), InputFormatError> {
    if raw.is_empty() {
        return Err(InputFormatError::Empty);
    }
    if raw.len() > MAX_INPUT_LEN {
        return Err(InputFormatError::TooLong {
            len: raw.len(),
            max: MAX_INPUT_LEN,
        });
    }
    match raw.bytes().position(|b| !b.is_ascii_graphic()) {
        Some(position) => Err(InputFormatError::InvalidCharacter {
            position,
            byte: raw.as_bytes()[position],
        }),
        None => Ok(()),
    }
}
