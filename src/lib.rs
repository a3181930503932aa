//! # SSP Verifier
//!
//! Deterministic identity / execution-admissibility verifier. A re-presented
//! input is accepted only if it reproduces, bit for bit, the structural
//! traversal recorded at enrollment.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SSP VERIFIER                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/              - Shared primitives                     │
//! │  ├── hash.rs        - Domain-separated SHA-256 helpers      │
//! │  ├── config.rs      - Immutable verifier configuration      │
//! │  └── error.rs       - Crate-level error type                │
//! │                                                             │
//! │  engine/            - Evaluation (deterministic)            │
//! │  ├── admissibility.rs - Posture / structural-time gate      │
//! │  ├── input.rs       - Input grammar                         │
//! │  ├── record.rs      - Identity record (m, a, s)             │
//! │  ├── state.rs       - Structural registers                  │
//! │  ├── events.rs      - Layers and transitions                │
//! │  ├── traverse.rs    - Four-layer structural traversal       │
//! │  └── decision.rs    - ACCEPT / REJECT / ABSTAIN             │
//! │                                                             │
//! │  trace/             - Canonical encoding and signatures     │
//! │                                                             │
//! │  evidence/          - Artifacts, manifests, replay          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `engine/` and `trace/` modules are **pure**:
//! - No floating-point arithmetic
//! - No HashMap (uses BTreeMap / BTreeSet for sorted iteration)
//! - No system time, no randomness, no I/O
//! - Configuration is an explicit immutable value
//!
//! Given identical input, context and configuration, every run produces
//! **identical traces, signatures and evidence bytes**.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod engine;
pub mod trace;
pub mod evidence;

// Re-export commonly used types
pub use crate::core::config::SspConfig;
pub use crate::core::error::{SspError, SspResult};
pub use crate::engine::admissibility::{AdmissibilityContext, PostureClass, TimeClass};
pub use crate::engine::decision::{enroll, verify, Decision, DecisionError, DecisionReason, Enrollment, Verification};
pub use crate::trace::signature::{SignatureAlgorithm, TraceSignature};
pub use crate::evidence::replay::{ReplayScript, ReplayVerifier, ReplayReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default engine tag written into evidence
pub const ENGINE_TAG: &str = crate::core::config::DEFAULT_ENGINE_TAG;
