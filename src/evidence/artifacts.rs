//! Case Artifacts
//!
//! Renders one verification case into its evidence folder:
//!
//! ```text
//! <CASE>/
//!   ssp_trace.csv      header + one row per presented event
//!   ssp_summary.txt    decision, signatures, audit metrics, stats
//!   SSP_CONFIG.txt     engine, constants, case parameters
//!   MANIFEST.sha256    digests of the three files above
//! ```
//!
//! Rendering is a pure function of its inputs; no timestamps, no paths.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::config::SspConfig;
use crate::core::error::{SspError, SspResult};
use crate::core::hash::Digest32;
use crate::engine::admissibility::{evaluate, Admissibility, AdmissibilityContext};
use crate::engine::decision::{Enrolled, Verification};
use crate::engine::events::TraceEvent;
use crate::evidence::manifest::{Manifest, ManifestError, MANIFEST_FILE};
use crate::trace::audit::{DivergenceMetrics, TraceStats};
use crate::trace::canonical::render_csv;
use crate::trace::signature::{SignatureAlgorithm, TraceSignature};

/// Trace file name.
pub const TRACE_FILE: &str = "ssp_trace.csv";

/// Summary file name.
pub const SUMMARY_FILE: &str = "ssp_summary.txt";

/// Config file name.
pub const CONFIG_FILE: &str = "SSP_CONFIG.txt";

/// Placeholder for an absent signature.
const NONE: &str = "NONE";

/// How a run was started. Written into `SSP_CONFIG.txt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Single evidence run.
    Demo,
    /// One side of a replay comparison.
    Replay,
}

impl RunMode {
    /// Evidence label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Replay => "replay",
        }
    }
}

/// What happened in a case.
#[derive(Clone, Copy, Debug)]
pub enum CaseOutcome<'a> {
    /// The enrollment itself.
    Enrolled,
    /// A verification against the enrollment.
    Verified(&'a Verification),
}

impl CaseOutcome<'_> {
    /// Outcome label (`ENROLLED`, `ACCEPT`, `REJECT`, `ABSTAIN`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Enrolled => "ENROLLED",
            Self::Verified(v) => v.decision.label(),
        }
    }

    /// Reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Enrolled => "ENROLLMENT_RECORDED",
            Self::Verified(v) => v.reason.code(),
        }
    }
}

/// Everything needed to render one case folder.
#[derive(Clone, Debug)]
pub struct CaseEvidence<'a> {
    /// Folder name (`ENROLL`, `AUTH_OK`, ...).
    pub name: &'a str,
    /// Run mode.
    pub mode: RunMode,
    /// Run tag.
    pub tag: &'a str,
    /// Presented input.
    pub input: &'a str,
    /// Presented context.
    pub context: &'a AdmissibilityContext,
    /// The enrollment this case is anchored to.
    pub enrolled: &'a Enrolled,
    /// Outcome.
    pub outcome: CaseOutcome<'a>,
}

impl<'a> CaseEvidence<'a> {
    /// Events written to `ssp_trace.csv`.
    pub fn events(&self) -> &'a [TraceEvent] {
        match self.outcome {
            CaseOutcome::Enrolled => &self.enrolled.traversal.events,
            CaseOutcome::Verified(v) => v.events(),
        }
    }

    fn expected_signature(&self) -> Option<TraceSignature> {
        match self.outcome {
            CaseOutcome::Enrolled => None,
            CaseOutcome::Verified(v) => Some(v.expected),
        }
    }

    fn actual_signature(&self) -> Option<TraceSignature> {
        match self.outcome {
            CaseOutcome::Enrolled => Some(self.enrolled.enrollment.signature),
            CaseOutcome::Verified(v) => v.presented,
        }
    }

    fn metrics(&self) -> DivergenceMetrics {
        match self.outcome {
            CaseOutcome::Enrolled => DivergenceMetrics::unanchored(self.events()),
            CaseOutcome::Verified(_) => {
                DivergenceMetrics::compare(&self.enrolled.traversal.events, self.events())
            }
        }
    }

    /// Render `ssp_summary.txt`.
    pub fn render_summary(&self, config: &SspConfig) -> String {
        let mut lines = vec![
            format!("SSP Verifier v{} :: {}", crate::VERSION, self.name),
            format!("engine = {}", config.engine_tag),
            format!("decision = {}", self.outcome.label()),
            format!("reason = {}", self.outcome.reason()),
            format!("m = {}", self.input),
            format!("horizon_steps = {}", config.horizon_steps),
            format!("posture = {}", self.context.posture),
            format!("time_class = {}", self.context.time_class),
            format!("binding_sig = {}", binding_hex(self.context, config)),
            format!(
                "enrolled_binding_sig = {}",
                self.enrolled.enrollment.binding.signature_hex()
            ),
            format!("expected_sig = {}", sig_or_none(self.expected_signature())),
            format!("actual_sig = {}", sig_or_none(self.actual_signature())),
            String::new(),
            "audit_distance_metrics (not used for acceptance):".to_string(),
        ];
        lines.extend(self.metrics().summary_lines());

        let stats = TraceStats::collect(self.events());
        lines.push(String::new());
        lines.push("trace_stats:".to_string());
        lines.push(format!("events_total = {}", stats.events_total));
        lines.push(format!("steps_executed = {}", stats.steps_executed));
        for (key, count) in &stats.counts {
            lines.push(format!("count[{}] = {}", key, count));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Render `SSP_CONFIG.txt`.
    pub fn render_config(&self, config: &SspConfig) -> String {
        let mut out = format!(
            "SSP Verifier v{}\n\
             engine={}\n\
             mode={}\n\
             tag={}\n\
             config_hash={}\n",
            crate::VERSION,
            config.engine_tag,
            self.mode.label(),
            self.tag,
            hex::encode(config.config_hash()),
        );
        out.push_str(&config.render_constants());
        out.push_str(&format!(
            "case={}\n\
             m={}\n\
             posture={}\n\
             time_class={}\n\
             enrolled_posture={}\n\
             enrolled_time_class={}\n\
             decision={}\n\
             reason={}\n",
            self.name,
            self.input,
            self.context.posture,
            self.context.time_class,
            self.enrolled.enrollment.context.posture,
            self.enrolled.enrollment.context.time_class,
            self.outcome.label(),
            self.outcome.reason(),
        ));
        out
    }

    /// Render the full case folder, manifest included.
    pub fn render(&self, config: &SspConfig) -> CaseArtifacts {
        let mut files = BTreeMap::new();
        files.insert(TRACE_FILE, render_csv(self.events()).into_bytes());
        files.insert(SUMMARY_FILE, self.render_summary(config).into_bytes());
        files.insert(CONFIG_FILE, self.render_config(config).into_bytes());

        let manifest = Manifest::build(
            files.iter().map(|(name, bytes)| (*name, bytes.as_slice())),
            config.signature_algorithm,
        );
        files.insert(MANIFEST_FILE, manifest.render().into_bytes());

        CaseArtifacts {
            name: self.name.to_string(),
            files,
            manifest,
        }
    }
}

fn binding_hex(context: &AdmissibilityContext, config: &SspConfig) -> String {
    match evaluate(context, config) {
        Admissibility::Admissible(binding) => binding.signature_hex(),
        Admissibility::Inadmissible(_) => NONE.to_string(),
    }
}

fn sig_or_none(sig: Option<TraceSignature>) -> String {
    sig.map(|s| s.to_hex()).unwrap_or_else(|| NONE.to_string())
}

/// One rendered case folder.
#[derive(Clone, Debug)]
pub struct CaseArtifacts {
    /// Folder name.
    pub name: String,
    /// File name to bytes.
    pub files: BTreeMap<&'static str, Vec<u8>>,
    /// Manifest over `files` (excluding itself).
    pub manifest: Manifest,
}

/// Relative path to bytes, for a whole run.
///
/// Paths use `/` regardless of platform so trees compare equal everywhere.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl ArtifactTree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Returns the previous bytes if the path was taken.
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> Option<Vec<u8>> {
        self.files.insert(path.into(), bytes)
    }

    /// Add every file of a case under `<case>/`.
    pub fn insert_case(&mut self, case: CaseArtifacts) {
        for (file, bytes) in case.files {
            self.files.insert(format!("{}/{}", case.name, file), bytes);
        }
    }

    /// Bytes at `path`.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// `(path, bytes)` in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_str(), b.as_slice()))
    }

    /// Top-level folder names.
    pub fn case_names(&self) -> BTreeSet<&str> {
        self.files
            .keys()
            .filter_map(|p| p.split_once('/').map(|(case, _)| case))
            .collect()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Digest over every file in the tree.
    pub fn digest(&self, algorithm: SignatureAlgorithm) -> Digest32 {
        Manifest::build(self.iter(), algorithm).digest(algorithm)
    }

    /// Check every case folder against its own `MANIFEST.sha256`.
    pub fn check_manifests(&self, algorithm: SignatureAlgorithm) -> SspResult<()> {
        for case in self.case_names() {
            let prefix = format!("{}/", case);
            let files: Vec<(&str, &[u8])> = self
                .iter()
                .filter_map(|(path, bytes)| path.strip_prefix(&prefix).map(|f| (f, bytes)))
                .collect();

            let manifest_err = |source| SspError::Manifest {
                case: case.to_string(),
                source,
            };
            let text = files
                .iter()
                .find(|(f, _)| *f == MANIFEST_FILE)
                .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
                .ok_or_else(|| manifest_err(ManifestError::MissingFile(MANIFEST_FILE.to_string())))?;
            let manifest = Manifest::parse(&text).map_err(manifest_err)?;
            manifest
                .check(files.iter().copied(), algorithm)
                .map_err(manifest_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decision::{enroll, verify};
    use crate::trace::canonical::CSV_HEADER;

    fn setup() -> (SspConfig, AdmissibilityContext, Enrolled) {
        let config = SspConfig::default().with_horizon_steps(32);
        let ctx = AdmissibilityContext::new("P1", "T1");
        let enrolled = enroll("alpha-7", &ctx, &config).unwrap();
        (config, ctx, enrolled)
    }

    fn text(case: &CaseArtifacts, file: &str) -> String {
        String::from_utf8(case.files[file].clone()).unwrap()
    }

    #[test]
    fn test_enroll_case_files() {
        let (config, ctx, enrolled) = setup();
        let case = CaseEvidence {
            name: "ENROLL",
            mode: RunMode::Replay,
            tag: "t",
            input: "alpha-7",
            context: &ctx,
            enrolled: &enrolled,
            outcome: CaseOutcome::Enrolled,
        }
        .render(&config);

        let names: Vec<&str> = case.files.keys().copied().collect();
        assert_eq!(names, vec![MANIFEST_FILE, CONFIG_FILE, SUMMARY_FILE, TRACE_FILE]);

        let csv = text(&case, TRACE_FILE);
        assert_eq!(csv.lines().count(), enrolled.traversal.events.len() + 1);

        let summary = text(&case, SUMMARY_FILE);
        assert!(summary.contains("decision = ENROLLED\n"));
        assert!(summary.contains("expected_sig = NONE\n"));
        assert!(summary.contains(&format!("actual_sig = {}\n", enrolled.enrollment.signature)));
    }

    #[test]
    fn test_abstain_case_has_header_only_trace() {
        let (config, _, enrolled) = setup();
        let ctx = AdmissibilityContext::new("P1", "T9");
        let v = verify("alpha-7", &ctx, &enrolled.enrollment, &config).unwrap();
        let case = CaseEvidence {
            name: "AUTH_CROSS_P1_T9",
            mode: RunMode::Replay,
            tag: "t",
            input: "alpha-7",
            context: &ctx,
            enrolled: &enrolled,
            outcome: CaseOutcome::Verified(&v),
        }
        .render(&config);

        assert_eq!(text(&case, TRACE_FILE), format!("{}\n", CSV_HEADER));
        let summary = text(&case, SUMMARY_FILE);
        assert!(summary.contains("decision = ABSTAIN\n"));
        assert!(summary.contains("reason = TIME_CLASS_NOT_ADMISSIBLE\n"));
        assert!(summary.contains("binding_sig = NONE\n"));
        assert!(summary.contains("actual_sig = NONE\n"));
        assert!(summary.contains("events_total = 0\n"));
    }

    #[test]
    fn test_config_text_carries_constants() {
        let (config, ctx, enrolled) = setup();
        let v = verify("alpha-8", &ctx, &enrolled.enrollment, &config).unwrap();
        let case = CaseEvidence {
            name: "ATTACK_MPLUS1",
            mode: RunMode::Demo,
            tag: "t",
            input: "alpha-8",
            context: &ctx,
            enrolled: &enrolled,
            outcome: CaseOutcome::Verified(&v),
        }
        .render(&config);

        let cfg = text(&case, CONFIG_FILE);
        assert!(cfg.contains("mode=demo\n"));
        assert!(cfg.contains(&config.render_constants()));
        assert!(cfg.contains("decision=REJECT\n"));
        assert!(cfg.contains("reason=TRACE_MISMATCH\n"));
    }

    #[test]
    fn test_manifest_matches_files() {
        let (config, ctx, enrolled) = setup();
        let case = CaseEvidence {
            name: "ENROLL",
            mode: RunMode::Replay,
            tag: "t",
            input: "alpha-7",
            context: &ctx,
            enrolled: &enrolled,
            outcome: CaseOutcome::Enrolled,
        }
        .render(&config);

        let parsed = Manifest::parse(&text(&case, MANIFEST_FILE)).unwrap();
        assert_eq!(parsed, case.manifest);
        assert!(parsed
            .check(case.files.iter().map(|(n, b)| (*n, b.as_slice())), config.signature_algorithm)
            .is_ok());
    }

    #[test]
    fn test_tree_paths_and_digest() {
        let (config, ctx, enrolled) = setup();
        let render = |name| {
            CaseEvidence {
                name,
                mode: RunMode::Replay,
                tag: "t",
                input: "alpha-7",
                context: &ctx,
                enrolled: &enrolled,
                outcome: CaseOutcome::Enrolled,
            }
            .render(&config)
        };

        let mut tree = ArtifactTree::new();
        tree.insert_case(render("ENROLL"));
        tree.insert_case(render("AUTH_OK"));

        assert_eq!(tree.len(), 8);
        assert!(tree.get("ENROLL/ssp_trace.csv").is_some());
        assert_eq!(tree.case_names().into_iter().collect::<Vec<_>>(), vec!["AUTH_OK", "ENROLL"]);

        let mut other = tree.clone();
        assert_eq!(tree.digest(config.signature_algorithm), other.digest(config.signature_algorithm));
        other.insert("ENROLL/ssp_trace.csv", b"tampered".to_vec());
        assert_ne!(tree.digest(config.signature_algorithm), other.digest(config.signature_algorithm));

        assert!(tree.check_manifests(config.signature_algorithm).is_ok());
        match other.check_manifests(config.signature_algorithm) {
            Err(SspError::Manifest { case, source }) => {
                assert_eq!(case, "ENROLL");
                assert_eq!(source, ManifestError::DigestMismatch(TRACE_FILE.to_string()));
            }
            other => panic!("expected manifest error, got {:?}", other),
        }
    }
}
