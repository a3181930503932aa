//! End-to-end scenario: enroll alpha-7 at P1/T1, then accept, reject and
//! abstain, and replay the whole run through the filesystem.

use ssp::engine::admissibility::InadmissibleReason;
use ssp::engine::input::IdentityInput;
use ssp::evidence::artifacts::{SUMMARY_FILE, TRACE_FILE};
use ssp::evidence::writer::read_tree;
use ssp::evidence::MANIFEST_FILE;
use ssp::trace::canonical::{decode, CSV_HEADER};
use ssp::trace::signature::sign_trace;
use ssp::{
    enroll, verify, AdmissibilityContext, Decision, DecisionReason, ReplayScript, ReplayVerifier,
    SspConfig,
};

fn enrolled_context() -> AdmissibilityContext {
    AdmissibilityContext::new("P1", "T1")
}

#[test]
fn test_concrete_scenario_outcomes() {
    let config = SspConfig::default();
    let enrolled = enroll("alpha-7", &enrolled_context(), &config).unwrap();
    assert!(!enrolled.traversal.events.is_empty());

    let ok = verify("alpha-7", &enrolled_context(), &enrolled.enrollment, &config).unwrap();
    assert_eq!(ok.decision, Decision::Accept);
    assert_eq!(ok.reason, DecisionReason::ExactTraceMatch);

    let attack = verify("alpha-8", &enrolled_context(), &enrolled.enrollment, &config).unwrap();
    assert_eq!(attack.decision, Decision::Reject);
    assert_eq!(attack.reason, DecisionReason::TraceMismatch);

    // Same traversal, different input
    let twin = enroll("user-108789", &enrolled_context(), &config).unwrap();
    let collided = verify("user-154937", &enrolled_context(), &twin.enrollment, &config).unwrap();
    assert_eq!(collided.events(), twin.traversal.events.as_slice());
    assert_eq!(collided.decision, Decision::Reject);

    let stale = AdmissibilityContext::new("P1", "T9");
    let abstain = verify("alpha-7", &stale, &enrolled.enrollment, &config).unwrap();
    assert_eq!(abstain.decision, Decision::Abstain);
    assert_eq!(
        abstain.reason,
        DecisionReason::Inadmissible(InadmissibleReason::TimeClassNotAdmissible)
    );
    assert!(abstain.events().is_empty());
}

#[test]
fn test_enrollment_trace_decodes_to_its_events() {
    let config = SspConfig::default();
    let enrolled = enroll("alpha-7", &enrolled_context(), &config).unwrap();

    let events = decode(enrolled.trace.as_bytes()).unwrap();
    assert_eq!(events, enrolled.traversal.events);
    assert_eq!(
        sign_trace(
            &IdentityInput::parse("alpha-7").unwrap().digest(),
            &enrolled.trace,
            config.signature_algorithm
        ),
        enrolled.enrollment.signature
    );
}

#[test]
fn test_on_disk_replay_is_byte_identical() {
    let out = tempfile::tempdir().unwrap();
    let verifier = ReplayVerifier::new(SspConfig::default(), "SCENARIO").unwrap();
    let script = ReplayScript::new("alpha-7", enrolled_context())
        .with_cross_context(AdmissibilityContext::new("P1", "T9"))
        .with_attack_deltas(&[1]);

    let report = verifier.verify_on_disk(&script, out.path()).unwrap();

    let outcome = |name: &str| report.case(name).map(|c| c.outcome);
    assert_eq!(outcome("ENROLL"), Some("ENROLLED"));
    assert_eq!(outcome("AUTH_OK"), Some("ACCEPT"));
    assert_eq!(outcome("AUTH_CROSS_P1_T9"), Some("ABSTAIN"));
    assert_eq!(outcome("ATTACK_MPLUS1"), Some("REJECT"));
    assert_eq!(outcome("ATTACK_MPLUS1_CROSS"), Some("ABSTAIN"));

    let a_dir = report.replay_a.clone().unwrap();
    let b_dir = report.replay_b.clone().unwrap();
    assert_eq!(
        a_dir.file_name().and_then(|n| n.to_str()),
        Some("REPLAY_A__SSP_VERIFIER__V03__SCENARIO")
    );

    let a = read_tree(&a_dir).unwrap();
    let b = read_tree(&b_dir).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 5 * 4);

    let abstain_csv = a.get(&format!("AUTH_CROSS_P1_T9/{}", TRACE_FILE)).unwrap();
    assert_eq!(abstain_csv, format!("{}\n", CSV_HEADER).as_bytes());

    let manifest = String::from_utf8(a.get(&format!("AUTH_OK/{}", MANIFEST_FILE)).unwrap().to_vec()).unwrap();
    let listed: Vec<&str> = manifest.lines().filter_map(|l| l.split_once("  ").map(|(_, f)| f)).collect();
    assert_eq!(listed, vec!["SSP_CONFIG.txt", "ssp_summary.txt", "ssp_trace.csv"]);

    let summary = String::from_utf8(a.get(&format!("ATTACK_MPLUS1/{}", SUMMARY_FILE)).unwrap().to_vec()).unwrap();
    assert!(summary.contains("m = alpha-8\n"));
    assert!(summary.contains("audit_distance_metrics (not used for acceptance):\n"));

    // A second replay into the same root replaces the folders and matches
    let again = verifier.verify_on_disk(&script, out.path()).unwrap();
    assert_eq!(again.tree_digest, report.tree_digest);
}

#[test]
fn test_different_configs_produce_different_evidence() {
    let script = ReplayScript::new("alpha-7", enrolled_context());
    let a = ReplayVerifier::new(SspConfig::default(), "CFG").unwrap().verify(&script).unwrap();
    let b = ReplayVerifier::new(SspConfig::default().with_horizon_steps(64), "CFG")
        .unwrap()
        .verify(&script)
        .unwrap();
    assert_ne!(a.tree_digest, b.tree_digest);
}
