//! Core primitives shared by every pipeline stage.
//!
//! Hashing helpers, the immutable verifier configuration, and the
//! crate-level error type.

pub mod hash;
pub mod config;
pub mod error;

pub use hash::{Digest32, DomainHasher, hash_bytes, sha256_hex};
pub use config::{SspConfig, ConfigError, DEFAULT_HORIZON_STEPS, MAX_HORIZON_STEPS};
pub use error::{SspError, SspResult};
