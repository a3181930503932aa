//! Trace Encoding and Signatures
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TRACE                                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  canonical.rs    - Unique byte encoding (+ strict decoder)  │
//! │  signature.rs    - Fixed-size digest over canonical bytes   │
//! │  audit.rs        - Statistics for summaries (never decides) │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod canonical;
pub mod signature;
pub mod audit;

pub use canonical::{CanonicalTrace, TraceDecodeError, encode, decode, render_csv, CSV_HEADER};
pub use signature::{SignatureAlgorithm, TraceSignature, sign, sign_trace};
pub use audit::{TraceStats, DivergenceMetrics};
