//! Crate-level error type.

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::engine::decision::DecisionError;
use crate::engine::input::InputFormatError;
use crate::evidence::manifest::ManifestError;
use crate::evidence::replay::ReplayDivergence;
use crate::trace::canonical::TraceDecodeError;

/// Result alias for fallible verifier operations.
pub type SspResult<T> = Result<T, SspError>;

/// Every failure a verifier call can surface.
///
/// ABSTAIN and REJECT are outcomes, not errors, and never appear here.
#[derive(Debug, Error)]
pub enum SspError {
    /// Presented input violates the input grammar.
    #[error("input format error: {0}")]
    InputFormat(#[from] InputFormatError),

    /// Enrollment or verification could not run.
    #[error("decision error: {0}")]
    Decision(#[from] DecisionError),

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Trace bytes are not canonical.
    #[error("trace decode error: {0}")]
    TraceDecode(#[from] TraceDecodeError),

    /// Replay A and Replay B diverged. This is an implementation defect.
    #[error("replay divergence: {0}")]
    ReplayDivergence(#[from] ReplayDivergence),

    /// A case folder disagrees with its own manifest.
    #[error("manifest check failed for {case}: {source}")]
    Manifest {
        /// Case folder name.
        case: String,
        /// What disagreed.
        #[source]
        source: ManifestError,
    },

    /// Replay script cannot be run as given.
    #[error("invalid replay script: {0}")]
    InvalidScript(String),

    /// Evidence could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure while writing or reading evidence.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl SspError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// True if this error reports a defect in the implementation itself.
    pub fn is_implementation_defect(&self) -> bool {
        matches!(self, Self::ReplayDivergence(_))
    }
}
