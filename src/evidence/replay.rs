//! Replay Verification
//!
//! Runs the same script twice and requires byte-identical evidence:
//!
//! ```text
//! ReplayScript ──► run A ──► ArtifactTree A ─┐
//!              └─► run B ──► ArtifactTree B ─┴─► file list ─► bytes ─► PASS
//! ```
//!
//! A divergence means the pipeline is not deterministic. It is reported as
//! [`ReplayDivergence`], never as a decision.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::core::config::SspConfig;
use crate::core::error::{SspError, SspResult};
use crate::core::hash::Digest32;
use crate::engine::admissibility::{is_valid_label, AdmissibilityContext};
use crate::engine::decision::{enroll, verify, Enrolled};
use crate::engine::input::IdentityInput;
use crate::evidence::artifacts::{ArtifactTree, CaseEvidence, CaseOutcome, RunMode};
use crate::evidence::writer::{read_tree, remove_tree, write_tree};

/// One attack presentation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackCase {
    /// Case label (`MPLUS1`, ...). Folders are `ATTACK_<label>`.
    pub label: String,
    /// Presented input.
    pub input: String,
}

/// The fixed case sequence of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayScript {
    /// Enrolled input `m`.
    pub input: String,
    /// Enrolled context.
    pub context: AdmissibilityContext,
    /// Second context presented with the same input and every attack.
    pub cross_context: Option<AdmissibilityContext>,
    /// Near-but-not-equal inputs.
    pub attacks: Vec<AttackCase>,
}

impl ReplayScript {
    /// Script with no cross context and no attacks.
    pub fn new(input: impl Into<String>, context: AdmissibilityContext) -> Self {
        Self {
            input: input.into(),
            context,
            cross_context: None,
            attacks: Vec::new(),
        }
    }

    /// Present the same input (and each attack) at a second context.
    pub fn with_cross_context(mut self, context: AdmissibilityContext) -> Self {
        self.cross_context = Some(context);
        self
    }

    /// Add an explicit attack input.
    pub fn with_attack(mut self, label: impl Into<String>, input: impl Into<String>) -> Self {
        self.attacks.push(AttackCase {
            label: label.into(),
            input: input.into(),
        });
        self
    }

    /// Add one attack per delta, shifting the trailing number of `m`.
    ///
    /// Zero deltas, and deltas that would make the number negative, are
    /// skipped.
    pub fn with_attack_deltas(mut self, deltas: &[i64]) -> Self {
        for &delta in deltas {
            if delta == 0 {
                continue;
            }
            if let Some(input) = shift_trailing_number(&self.input, delta) {
                let sign = if delta > 0 { "PLUS" } else { "MINUS" };
                self.attacks.push(AttackCase {
                    label: format!("M{}{}", sign, delta.unsigned_abs()),
                    input,
                });
            }
        }
        self
    }

    /// Case folder names in run order.
    pub fn case_names(&self) -> Vec<String> {
        let mut names = vec!["ENROLL".to_string(), "AUTH_OK".to_string()];
        if let Some(cross) = &self.cross_context {
            names.push(cross_case_name(cross));
        }
        for attack in &self.attacks {
            names.push(format!("ATTACK_{}", attack.label));
            if self.cross_context.is_some() {
                names.push(format!("ATTACK_{}_CROSS", attack.label));
            }
        }
        names
    }

    fn validate(&self) -> SspResult<()> {
        let names = self.case_names();
        for (idx, name) in names.iter().enumerate() {
            if !is_valid_case_name(name) {
                return Err(SspError::InvalidScript(format!("bad case name {:?}", name)));
            }
            if names[..idx].contains(name) {
                return Err(SspError::InvalidScript(format!("duplicate case {}", name)));
            }
        }
        Ok(())
    }
}

/// Add `delta` to the trailing decimal number of `m`, or append it.
///
/// Zero padding is kept (`id-007` + 1 is `id-008`). Returns `None` when the
/// result would be negative or not a valid input.
pub fn shift_trailing_number(m: &str, delta: i64) -> Option<String> {
    let digits = m.bytes().rev().take_while(u8::is_ascii_digit).count();
    let (stem, number) = m.split_at(m.len() - digits);
    let current: i128 = if number.is_empty() {
        0
    } else {
        number.parse::<u128>().ok()?.try_into().ok()?
    };

    let shifted = current.checked_add(i128::from(delta))?;
    if shifted < 0 {
        return None;
    }
    let candidate = format!("{}{:0width$}", stem, shifted, width = digits);
    IdentityInput::parse(&candidate).ok()?;
    Some(candidate)
}

fn cross_case_name(cross: &AdmissibilityContext) -> String {
    format!("AUTH_CROSS_{}_{}", cross.posture, cross.time_class)
}

fn is_valid_case_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Outcome of one case, for reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseSummary {
    /// Folder name.
    pub name: String,
    /// `ENROLLED`, `ACCEPT`, `REJECT` or `ABSTAIN`.
    pub outcome: &'static str,
    /// Reason code.
    pub reason: &'static str,
    /// Digest of the case manifest.
    pub manifest_digest: Digest32,
}

/// Evidence of one run plus its case list.
#[derive(Clone, Debug)]
pub struct ScriptRun {
    /// Every rendered file.
    pub tree: ArtifactTree,
    /// Cases in run order.
    pub cases: Vec<CaseSummary>,
}

/// Per-run fields shared by every case.
struct CaseBase<'a> {
    mode: RunMode,
    tag: &'a str,
    enrolled: &'a Enrolled,
    config: &'a SspConfig,
}

impl ScriptRun {
    fn record(
        &mut self,
        base: &CaseBase<'_>,
        name: &str,
        input: &str,
        context: &AdmissibilityContext,
        outcome: CaseOutcome<'_>,
    ) {
        let artifacts = CaseEvidence {
            name,
            mode: base.mode,
            tag: base.tag,
            input,
            context,
            enrolled: base.enrolled,
            outcome,
        }
        .render(base.config);

        self.cases.push(CaseSummary {
            name: name.to_string(),
            outcome: outcome.label(),
            reason: outcome.reason(),
            manifest_digest: artifacts.manifest.digest(base.config.signature_algorithm),
        });
        self.tree.insert_case(artifacts);
    }
}

/// Run `script` once and return its artifact tree.
pub fn run_script(script: &ReplayScript, config: &SspConfig, tag: &str) -> SspResult<ArtifactTree> {
    execute_script(script, config, tag, RunMode::Replay).map(|run| run.tree)
}

/// Run `script` once in the given mode.
#[instrument(skip_all, fields(tag = %tag, mode = mode.label()))]
pub fn execute_script(
    script: &ReplayScript,
    config: &SspConfig,
    tag: &str,
    mode: RunMode,
) -> SspResult<ScriptRun> {
    config.validate()?;
    if !is_valid_label(tag) {
        return Err(SspError::InvalidScript(format!("bad tag {:?}", tag)));
    }
    script.validate()?;

    let enrolled = enroll(&script.input, &script.context, config)?;
    let base = CaseBase {
        mode,
        tag,
        enrolled: &enrolled,
        config,
    };
    let mut run = ScriptRun {
        tree: ArtifactTree::new(),
        cases: Vec::new(),
    };

    run.record(&base, "ENROLL", &script.input, &script.context, CaseOutcome::Enrolled);

    let v = verify(&script.input, &script.context, &enrolled.enrollment, config)?;
    run.record(&base, "AUTH_OK", &script.input, &script.context, CaseOutcome::Verified(&v));

    if let Some(cross) = &script.cross_context {
        let v = verify(&script.input, cross, &enrolled.enrollment, config)?;
        run.record(&base, &cross_case_name(cross), &script.input, cross, CaseOutcome::Verified(&v));
    }

    for attack in &script.attacks {
        let name = format!("ATTACK_{}", attack.label);
        let v = verify(&attack.input, &script.context, &enrolled.enrollment, config)?;
        run.record(&base, &name, &attack.input, &script.context, CaseOutcome::Verified(&v));

        if let Some(cross) = &script.cross_context {
            let v = verify(&attack.input, cross, &enrolled.enrollment, config)?;
            let cross_name = format!("{}_CROSS", name);
            run.record(&base, &cross_name, &attack.input, cross, CaseOutcome::Verified(&v));
        }
    }

    info!(cases = run.cases.len(), files = run.tree.len(), "script complete");
    Ok(run)
}

/// Replay A and Replay B disagree.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReplayDivergence {
    /// The two trees hold different paths.
    #[error("file list mismatch (only in A: {only_in_a:?}, only in B: {only_in_b:?})")]
    FileListMismatch {
        /// Paths only Replay A produced.
        only_in_a: Vec<String>,
        /// Paths only Replay B produced.
        only_in_b: Vec<String>,
    },

    /// Same path, different bytes.
    #[error("byte mismatch at {path}")]
    ByteMismatch {
        /// First differing path in sorted order.
        path: String,
    },
}

/// Compare two trees: file list first, then bytes.
pub fn compare_trees(a: &ArtifactTree, b: &ArtifactTree) -> Result<(), ReplayDivergence> {
    let only_in_a: Vec<String> = a.paths().filter(|p| b.get(p).is_none()).map(String::from).collect();
    let only_in_b: Vec<String> = b.paths().filter(|p| a.get(p).is_none()).map(String::from).collect();
    if !only_in_a.is_empty() || !only_in_b.is_empty() {
        return Err(ReplayDivergence::FileListMismatch { only_in_a, only_in_b });
    }

    for (path, bytes) in a.iter() {
        if b.get(path) != Some(bytes) {
            return Err(ReplayDivergence::ByteMismatch {
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

/// Result of a passing replay.
#[derive(Clone, Debug)]
pub struct ReplayReport {
    /// Cases in run order.
    pub cases: Vec<CaseSummary>,
    /// Files per replay.
    pub files: usize,
    /// Digest over the whole tree.
    pub tree_digest: Digest32,
    /// Replay A folder, for on-disk runs.
    pub replay_a: Option<PathBuf>,
    /// Replay B folder, for on-disk runs.
    pub replay_b: Option<PathBuf>,
}

impl ReplayReport {
    /// Look up a case by folder name.
    pub fn case(&self, name: &str) -> Option<&CaseSummary> {
        self.cases.iter().find(|c| c.name == name)
    }
}

/// Runs a script twice and diffs the evidence.
#[derive(Clone, Debug)]
pub struct ReplayVerifier {
    config: SspConfig,
    tag: String,
}

impl ReplayVerifier {
    /// Create a verifier for one configuration and run tag.
    pub fn new(config: SspConfig, tag: impl Into<String>) -> SspResult<Self> {
        config.validate()?;
        let tag = tag.into();
        if !is_valid_label(&tag) {
            return Err(SspError::InvalidScript(format!("bad tag {:?}", tag)));
        }
        Ok(Self { config, tag })
    }

    /// Configuration in force.
    pub fn config(&self) -> &SspConfig {
        &self.config
    }

    /// Folder name for one replay side (`'A'` or `'B'`).
    pub fn replay_folder(&self, side: char) -> String {
        format!("REPLAY_{}__{}__{}", side, self.config.engine_tag, self.tag)
    }

    /// Replay in memory.
    #[instrument(skip_all, fields(tag = %self.tag))]
    pub fn verify(&self, script: &ReplayScript) -> SspResult<ReplayReport> {
        let a = execute_script(script, &self.config, &self.tag, RunMode::Replay)?;
        let b = execute_script(script, &self.config, &self.tag, RunMode::Replay)?;
        self.finish(a, &b.tree, None)
    }

    /// Replay through the filesystem under `out_root`.
    ///
    /// Stale replay folders are removed first. Both trees are read back
    /// from disk before comparison.
    #[instrument(skip_all, fields(tag = %self.tag))]
    pub fn verify_on_disk(&self, script: &ReplayScript, out_root: &Path) -> SspResult<ReplayReport> {
        let a_dir = out_root.join(self.replay_folder('A'));
        let b_dir = out_root.join(self.replay_folder('B'));
        remove_tree(&a_dir)?;
        remove_tree(&b_dir)?;

        let a = execute_script(script, &self.config, &self.tag, RunMode::Replay)?;
        write_tree(&a_dir, &a.tree)?;
        let b = execute_script(script, &self.config, &self.tag, RunMode::Replay)?;
        write_tree(&b_dir, &b.tree)?;

        let a_disk = read_tree(&a_dir)?;
        let b_disk = read_tree(&b_dir)?;
        a_disk.check_manifests(self.config.signature_algorithm)?;
        b_disk.check_manifests(self.config.signature_algorithm)?;

        let run = ScriptRun {
            tree: a_disk,
            cases: a.cases,
        };
        self.finish(run, &b_disk, Some((a_dir, b_dir)))
    }

    fn finish(
        &self,
        a: ScriptRun,
        b: &ArtifactTree,
        dirs: Option<(PathBuf, PathBuf)>,
    ) -> SspResult<ReplayReport> {
        if let Err(divergence) = compare_trees(&a.tree, b) {
            warn!(%divergence, "replay diverged");
            return Err(divergence.into());
        }

        let tree_digest = a.tree.digest(self.config.signature_algorithm);
        info!(files = a.tree.len(), digest = %hex::encode(tree_digest), "replay byte-identical");
        let (replay_a, replay_b) = match dirs {
            Some((a_dir, b_dir)) => (Some(a_dir), Some(b_dir)),
            None => (None, None),
        };
        Ok(ReplayReport {
            cases: a.cases,
            files: a.tree.len(),
            tree_digest,
            replay_a,
            replay_b,
        })
    }
}
