//! Decision Engine
//!
//! ```text
//! Start -> Gate(a)
//! Gate: Inadmissible -> ABSTAIN            (terminal, nothing traversed)
//! Gate: Admissible   -> Evaluate
//! Evaluate: sig(T(m')) == sig(T(m)) -> ACCEPT (terminal)
//! Evaluate: sig(T(m')) != sig(T(m)) -> REJECT (terminal)
//! ```
//!
//! `sig` covers the input digest followed by the canonical trace, so an
//! ACCEPT needs both the same path and the same input.
//!
//! Comparison is exact digest equality. The engine performs no I/O; callers
//! hand the returned [`Verification`] to an evidence writer.
//!
//! Precedence inside [`verify`]: input grammar, then the verifier's own
//! config, then class membership (ABSTAIN), then the enrollment's config
//! fingerprint, then the enrolled binding (ABSTAIN).

use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::info;

use crate::core::config::{ConfigError, SspConfig};
use crate::core::error::SspError;
use crate::core::hash::Digest32;
use crate::engine::admissibility::{
    evaluate, evaluate_bound, Admissibility, AdmissibilityContext, InadmissibleReason,
    StructuralBinding,
};
use crate::engine::events::TraceEvent;
use crate::engine::input::{IdentityInput, InputFormatError};
use crate::engine::record::IdentityRecord;
use crate::engine::traverse::{traverse_input, Traversal};
use crate::trace::canonical::{encode, CanonicalTrace};
use crate::trace::signature::{sign_trace, SignatureAlgorithm, TraceSignature};

/// Current enrollment encoding version.
pub const ENROLLMENT_VERSION: u8 = 1;

/// Terminal outcome of one verification call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Presented trace reproduces the enrolled one.
    Accept,
    /// Presented trace diverges from the enrolled one.
    Reject,
    /// Gate refused evaluation.
    Abstain,
}

impl Decision {
    /// Evidence label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Reject => "REJECT",
            Self::Abstain => "ABSTAIN",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a decision was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    /// Signatures are byte-identical.
    ExactTraceMatch,
    /// Signatures differ.
    TraceMismatch,
    /// Gate refused.
    Inadmissible(InadmissibleReason),
}

impl DecisionReason {
    /// Evidence code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ExactTraceMatch => "EXACT_TRACE_MATCH",
            Self::TraceMismatch => "TRACE_MISMATCH",
            Self::Inadmissible(reason) => reason.code(),
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Recorded `sig(T(m))` for one identity context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    /// Encoding version.
    pub version: u8,
    /// Context the identity was enrolled under.
    pub context: AdmissibilityContext,
    /// Binding derived from that context.
    pub binding: StructuralBinding,
    /// Recorded trace signature.
    pub signature: TraceSignature,
    /// Algorithm that produced the signature.
    pub algorithm: SignatureAlgorithm,
    /// Fingerprint of the configuration in force at enrollment.
    pub config_hash: Digest32,
}

impl Enrollment {
    /// Compact binary encoding for evidence storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SspError> {
        bincode::serialize(self).map_err(|e| SspError::Serialization(e.to_string()))
    }

    /// Decode a stored enrollment.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SspError> {
        let enrollment: Self =
            bincode::deserialize(data).map_err(|e| SspError::Serialization(e.to_string()))?;
        if enrollment.version != ENROLLMENT_VERSION {
            return Err(SspError::Serialization(format!(
                "enrollment version mismatch: expected {}, got {}",
                ENROLLMENT_VERSION, enrollment.version
            )));
        }
        Ok(enrollment)
    }
}

/// Everything produced while enrolling.
#[derive(Clone, Debug)]
pub struct Enrolled {
    /// The record to keep.
    pub enrollment: Enrollment,
    /// Enrollment traversal (audit evidence).
    pub traversal: Traversal,
    /// Canonical enrollment trace.
    pub trace: CanonicalTrace,
}

/// Result of one verification call.
#[derive(Clone, Debug)]
pub struct Verification {
    /// Terminal outcome.
    pub decision: Decision,
    /// Why.
    pub reason: DecisionReason,
    /// Enrolled signature.
    pub expected: TraceSignature,
    /// Presented signature; `None` on ABSTAIN.
    pub presented: Option<TraceSignature>,
    /// Presented traversal; `None` on ABSTAIN.
    pub traversal: Option<Traversal>,
}

impl Verification {
    /// Presented events (empty on ABSTAIN).
    pub fn events(&self) -> &[TraceEvent] {
        self.traversal.as_ref().map(|t| t.events.as_slice()).unwrap_or(&[])
    }
}

/// Failures of enroll / verify. Outcomes are never errors.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Input violates the grammar.
    #[error(transparent)]
    InputFormat(#[from] InputFormatError),

    /// The configuration passed in is not valid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Enrollment attempted under an inadmissible context.
    #[error("cannot enroll under inadmissible context: {0}")]
    Inadmissible(InadmissibleReason),

    /// Enrollment was recorded under a different configuration.
    #[error("enrollment was recorded under a different configuration")]
    ConfigMismatch,
}

/// Record `sig(T(m))` for a fresh identity context.
pub fn enroll(
    raw: &str,
    context: &AdmissibilityContext,
    config: &SspConfig,
) -> Result<Enrolled, DecisionError> {
    let input = IdentityInput::parse(raw)?;
    config.validate()?;
    let binding = match evaluate(context, config) {
        Admissibility::Admissible(binding) => binding,
        Admissibility::Inadmissible(reason) => return Err(DecisionError::Inadmissible(reason)),
    };

    let (traversal, trace, signature) = evaluate_path(&input, context, &binding, config);
    info!(context = %context, signature = %signature, "enrollment recorded");

    Ok(Enrolled {
        enrollment: Enrollment {
            version: ENROLLMENT_VERSION,
            context: context.clone(),
            binding,
            signature,
            algorithm: config.signature_algorithm,
            config_hash: config.config_hash(),
        },
        traversal,
        trace,
    })
}

/// Decide whether `raw` under `context` reproduces the enrolled path.
pub fn verify(
    raw: &str,
    context: &AdmissibilityContext,
    enrollment: &Enrollment,
    config: &SspConfig,
) -> Result<Verification, DecisionError> {
    let input = IdentityInput::parse(raw)?;
    config.validate()?;

    let gate = evaluate_bound(context, &enrollment.binding, config);
    if let Admissibility::Inadmissible(reason) = gate {
        if reason != InadmissibleReason::PostureMismatch {
            return Ok(abstain(context, reason, enrollment));
        }
    }
    if enrollment.algorithm != config.signature_algorithm
        || enrollment.config_hash != config.config_hash()
    {
        return Err(DecisionError::ConfigMismatch);
    }
    let binding = match gate {
        Admissibility::Admissible(binding) => binding,
        Admissibility::Inadmissible(reason) => return Ok(abstain(context, reason, enrollment)),
    };

    let (traversal, _, presented) = evaluate_path(&input, context, &binding, config);
    let (decision, reason) = if presented == enrollment.signature {
        (Decision::Accept, DecisionReason::ExactTraceMatch)
    } else {
        (Decision::Reject, DecisionReason::TraceMismatch)
    };
    info!(context = %context, decision = %decision, reason = %reason, "decision");

    Ok(Verification {
        decision,
        reason,
        expected: enrollment.signature,
        presented: Some(presented),
        traversal: Some(traversal),
    })
}

fn abstain(
    context: &AdmissibilityContext,
    reason: InadmissibleReason,
    enrollment: &Enrollment,
) -> Verification {
    info!(context = %context, reason = %reason, "ABSTAIN");
    Verification {
        decision: Decision::Abstain,
        reason: DecisionReason::Inadmissible(reason),
        expected: enrollment.signature,
        presented: None,
        traversal: None,
    }
}

/// Traverse, encode and sign under an admissible binding.
fn evaluate_path(
    input: &IdentityInput,
    context: &AdmissibilityContext,
    binding: &StructuralBinding,
    config: &SspConfig,
) -> (Traversal, CanonicalTrace, TraceSignature) {
    let record = IdentityRecord::new(input, context.clone());
    let traversal = traverse_input(record.phi(), binding, config);
    let record = record.with_state(traversal.final_state);
    debug_assert!(std::ptr::eq(record.phi(), input));

    let trace = encode(&traversal.events);
    let signature = sign_trace(&input.digest(), &trace, config.signature_algorithm);
    (traversal, trace, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MAX_HORIZON_STEPS;
    use proptest::prelude::*;

    fn admissible() -> AdmissibilityContext {
        AdmissibilityContext::new("P1", "T1")
    }

    #[test]
    fn test_enroll_then_accept() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
        let v = verify("alpha-7", &admissible(), &enrolled.enrollment, &config).unwrap();

        assert_eq!(v.decision, Decision::Accept);
        assert_eq!(v.reason, DecisionReason::ExactTraceMatch);
        assert_eq!(v.presented, Some(enrolled.enrollment.signature));
        assert_eq!(v.events(), enrolled.traversal.events.as_slice());
    }

    #[test]
    fn test_near_input_rejects() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
        let v = verify("alpha-8", &admissible(), &enrolled.enrollment, &config).unwrap();

        assert_eq!(v.decision, Decision::Reject);
        assert_eq!(v.reason, DecisionReason::TraceMismatch);
        assert_ne!(v.presented, Some(v.expected));
    }

    #[test]
    fn test_inadmissible_time_class_abstains_without_traversal() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
        let v = verify(
            "alpha-7",
            &AdmissibilityContext::new("P1", "T9"),
            &enrolled.enrollment,
            &config,
        )
        .unwrap();

        assert_eq!(v.decision, Decision::Abstain);
        assert_eq!(
            v.reason,
            DecisionReason::Inadmissible(InadmissibleReason::TimeClassNotAdmissible)
        );
        assert!(v.events().is_empty());
        assert!(v.presented.is_none());
        assert!(v.traversal.is_none());
    }

    #[test]
    fn test_cross_posture_abstains() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &AdmissibilityContext::new("P0", "T1"), &config).unwrap();
        let v = verify("alpha-7", &admissible(), &enrolled.enrollment, &config).unwrap();

        assert_eq!(v.decision, Decision::Abstain);
        assert_eq!(v.reason.code(), "POSTURE_MISMATCH_INADMISSIBLE");
    }

    #[test]
    fn test_malformed_input_is_an_error_not_an_outcome() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();

        assert!(matches!(
            verify("", &admissible(), &enrolled.enrollment, &config),
            Err(DecisionError::InputFormat(InputFormatError::Empty))
        ));
        // Still an error when the context would abstain
        assert!(matches!(
            verify("bad input", &AdmissibilityContext::new("P1", "T9"), &enrolled.enrollment, &config),
            Err(DecisionError::InputFormat(_))
        ));
        assert!(matches!(
            enroll("", &AdmissibilityContext::new("P9", "T9"), &config),
            Err(DecisionError::InputFormat(_))
        ));
    }

    #[test]
    fn test_cannot_enroll_inadmissible() {
        let config = SspConfig::default();
        assert!(matches!(
            enroll("alpha-7", &AdmissibilityContext::new("P9", "T1"), &config),
            Err(DecisionError::Inadmissible(InadmissibleReason::PostureNotAdmissible))
        ));
    }

    #[test]
    fn test_config_mismatch_detected() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
        let other = SspConfig::default().with_horizon_steps(64);
        assert!(matches!(
            verify("alpha-7", &admissible(), &enrolled.enrollment, &other),
            Err(DecisionError::ConfigMismatch)
        ));
    }

    #[test]
    fn test_gate_runs_before_config_fingerprint() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
        let other = SspConfig::default().with_horizon_steps(64);

        // Class inadmissibility abstains even across configs
        let v = verify("alpha-7", &AdmissibilityContext::new("P1", "T9"), &enrolled.enrollment, &other)
            .unwrap();
        assert_eq!(v.decision, Decision::Abstain);
        assert_eq!(
            v.reason,
            DecisionReason::Inadmissible(InadmissibleReason::TimeClassNotAdmissible)
        );
        assert!(v.traversal.is_none());

        // An admissible but foreign context is still a config mismatch
        assert!(matches!(
            verify("alpha-7", &AdmissibilityContext::new("P0", "T1"), &enrolled.enrollment, &other),
            Err(DecisionError::ConfigMismatch)
        ));
    }

    #[test]
    fn test_invalid_horizon_rejected_by_enroll() {
        for horizon in [0, MAX_HORIZON_STEPS + 1] {
            let config = SspConfig::default().with_horizon_steps(horizon);
            assert!(matches!(
                enroll("alpha-7", &admissible(), &config),
                Err(DecisionError::Config(ConfigError::HorizonOutOfRange { got, .. })) if got == horizon
            ));
        }
    }

    #[test]
    fn test_invalid_horizon_rejected_by_verify() {
        let enrolled = enroll("alpha-7", &admissible(), &SspConfig::default()).unwrap();
        for horizon in [0, MAX_HORIZON_STEPS + 1] {
            let config = SspConfig::default().with_horizon_steps(horizon);
            assert!(matches!(
                verify("zzzz-9", &admissible(), &enrolled.enrollment, &config),
                Err(DecisionError::Config(ConfigError::HorizonOutOfRange { got, .. })) if got == horizon
            ));
        }
    }

    #[test]
    fn test_low_seed_collision_still_rejects() {
        // These inputs agree in the low 32 bits of their seed word and so
        // traverse identically
        let config = SspConfig::default();
        let enrolled = enroll("user-108789", &admissible(), &config).unwrap();
        let v = verify("user-154937", &admissible(), &enrolled.enrollment, &config).unwrap();

        assert_eq!(v.events(), enrolled.traversal.events.as_slice());
        assert_eq!(v.decision, Decision::Reject);
        assert_eq!(v.reason, DecisionReason::TraceMismatch);
    }

    #[test]
    fn test_enrollment_bytes_roundtrip() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
        let bytes = enrolled.enrollment.to_bytes().unwrap();
        let restored = Enrollment::from_bytes(&bytes).unwrap();
        assert_eq!(restored, enrolled.enrollment);

        let v = verify("alpha-7", &admissible(), &restored, &config).unwrap();
        assert_eq!(v.decision, Decision::Accept);

        assert!(Enrollment::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_enrollment_trace_signature_consistent() {
        let config = SspConfig::default();
        let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
        let input = IdentityInput::parse("alpha-7").unwrap();
        assert_eq!(
            sign_trace(&input.digest(), &enrolled.trace, config.signature_algorithm),
            enrolled.enrollment.signature
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_same_input_accepts(m in "[!-~]{1,48}") {
            let config = SspConfig::default().with_horizon_steps(32);
            let enrolled = enroll(&m, &admissible(), &config).unwrap();
            let v = verify(&m, &admissible(), &enrolled.enrollment, &config).unwrap();
            prop_assert_eq!(v.decision, Decision::Accept);
        }

        #[test]
        fn prop_inadmissible_always_abstains(m in "[!-~]{1,48}", t in "T[2-9][0-9]?") {
            let config = SspConfig::default().with_horizon_steps(32);
            let enrolled = enroll("alpha-7", &admissible(), &config).unwrap();
            let v = verify(&m, &AdmissibilityContext::new("P1", t), &enrolled.enrollment, &config).unwrap();
            prop_assert_eq!(v.decision, Decision::Abstain);
            prop_assert!(v.events().is_empty());
        }

        #[test]
        fn prop_single_char_edit_rejects(
            m in "[!-~]{1,48}",
            index in any::<prop::sample::Index>(),
            replacement in 0x21u8..=0x7E
        ) {
            let position = index.index(m.len());
            let mut edited = m.clone().into_bytes();
            prop_assume!(edited[position] != replacement);
            edited[position] = replacement;
            let edited = String::from_utf8(edited).unwrap();

            let config = SspConfig::default().with_horizon_steps(32);
            let enrolled = enroll(&m, &admissible(), &config).unwrap();
            let v = verify(&edited, &admissible(), &enrolled.enrollment, &config).unwrap();
            prop_assert_eq!(v.decision, Decision::Reject);
        }
    }
}
