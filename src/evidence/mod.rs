//! Evidence (outside the decision path)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EVIDENCE                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  artifacts.rs    - Case folder rendering, artifact trees    │
//! │  manifest.rs     - MANIFEST.sha256 build / parse / check    │
//! │  writer.rs       - Trees to and from disk                   │
//! │  replay.rs       - Scripted runs, A/B replay comparison     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here feeds back into a decision. Evidence is derived from
//! decisions and compared for byte identity.

pub mod artifacts;
pub mod manifest;
pub mod writer;
pub mod replay;

pub use artifacts::{ArtifactTree, CaseArtifacts, CaseEvidence, CaseOutcome, RunMode};
pub use manifest::{Manifest, ManifestError, MANIFEST_FILE};
pub use writer::{read_tree, remove_tree, write_tree};
pub use replay::{
    compare_trees, execute_script, run_script, shift_trailing_number, AttackCase, CaseSummary,
    ReplayDivergence, ReplayReport, ReplayScript, ReplayVerifier, ScriptRun,
};
