//! Admissibility Gate
//!
//! Decides, before any traversal, whether evaluation may proceed at all.
//!
//! Posture and structural time are opaque class labels compared by exact
//! set membership. There is no window, no drift tolerance and no clock.
//! An admissible context yields a [`StructuralBinding`]; its salt is the
//! only way the context reaches the traversal engine.

use std::fmt;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::config::SspConfig;
use crate::core::hash::{hash_bytes, digest_prefix_u64, Digest32};

/// Maximum length of a class label.
pub const MAX_LABEL_LEN: usize = 32;

/// Label grammar: 1..=32 characters from `[A-Za-z0-9_-]`.
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Posture class label.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostureClass(String);

impl PostureClass {
    /// Wrap a label. Grammar is enforced by config validation, not here.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structural-time class label.
///
/// Deliberately not a timestamp: it has no ordering meaning and supports
/// nothing but equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeClass(String);

impl TimeClass {
    /// Wrap a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Admissibility context `a`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissibilityContext {
    /// Posture class.
    pub posture: PostureClass,
    /// Structural-time class.
    pub time_class: TimeClass,
}

impl AdmissibilityContext {
    /// Build a context from two labels.
    pub fn new(posture: impl Into<String>, time_class: impl Into<String>) -> Self {
        Self {
            posture: PostureClass::new(posture),
            time_class: TimeClass::new(time_class),
        }
    }
}

impl fmt::Display for AdmissibilityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.posture, self.time_class)
    }
}

/// Digest and salt derived from an admissible context.
///
/// Only the gate constructs these, so holding one proves the context
/// passed admissibility under some configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralBinding {
    signature: Digest32,
    salt: u64,
}

impl StructuralBinding {
    fn derive(context: &AdmissibilityContext, modulus: u64) -> Self {
        let payload = format!(
            "SSP_T|p={}|t={}|mod={}",
            context.posture, context.time_class, modulus
        );
        let signature = hash_bytes(payload.as_bytes());
        Self {
            signature,
            salt: digest_prefix_u64(&signature),
        }
    }

    /// Binding digest.
    pub fn signature(&self) -> &Digest32 {
        &self.signature
    }

    /// Binding digest as lowercase hex.
    pub fn signature_hex(&self) -> String {
        hex::encode(self.signature)
    }

    /// Salt fed into traversal.
    pub fn salt(&self) -> u64 {
        self.salt
    }
}

/// Why the gate refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InadmissibleReason {
    /// Posture class outside the admissible set.
    PostureNotAdmissible,
    /// Structural-time class outside the admissible set.
    TimeClassNotAdmissible,
    /// Admissible context, but not the one the identity was enrolled under.
    PostureMismatch,
}

impl InadmissibleReason {
    /// Stable evidence code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PostureNotAdmissible => "POSTURE_NOT_ADMISSIBLE",
            Self::TimeClassNotAdmissible => "TIME_CLASS_NOT_ADMISSIBLE",
            Self::PostureMismatch => "POSTURE_MISMATCH_INADMISSIBLE",
        }
    }
}

impl fmt::Display for InadmissibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Gate verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admissibility {
    /// Evaluation may proceed under this binding.
    Admissible(StructuralBinding),
    /// Caller must halt: no traversal, no signature, no comparison.
    Inadmissible(InadmissibleReason),
}

impl Admissibility {
    /// True if evaluation may proceed.
    pub fn is_admissible(&self) -> bool {
        matches!(self, Self::Admissible(_))
    }
}

/// Evaluate a context against the configured admissible classes.
///
/// Pure and idempotent.
pub fn evaluate(context: &AdmissibilityContext, config: &SspConfig) -> Admissibility {
    let verdict = if !config.admissible_postures.contains(&context.posture) {
        Admissibility::Inadmissible(InadmissibleReason::PostureNotAdmissible)
    } else if !config.admissible_time_classes.contains(&context.time_class) {
        Admissibility::Inadmissible(InadmissibleReason::TimeClassNotAdmissible)
    } else {
        Admissibility::Admissible(StructuralBinding::derive(context, config.posture_modulus))
    };

    debug!(context = %context, admissible = verdict.is_admissible(), "gate evaluated");
    verdict
}

/// Evaluate a context and additionally require it to match an enrolled binding.
pub fn evaluate_bound(
    context: &AdmissibilityContext,
    enrolled: &StructuralBinding,
    config: &SspConfig,
) -> Admissibility {
    match evaluate(context, config) {
        Admissibility::Admissible(binding) if binding != *enrolled => {
            debug!(context = %context, "context differs from enrolled binding");
            Admissibility::Inadmissible(InadmissibleReason::PostureMismatch)
        }
        verdict => verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(p: &str, t: &str) -> AdmissibilityContext {
        AdmissibilityContext::new(p, t)
    }

    #[test]
    fn test_admissible_context() {
        let config = SspConfig::default();
        assert!(evaluate(&ctx("P1", "T1"), &config).is_admissible());
        assert!(evaluate(&ctx("P0", "T0"), &config).is_admissible());
    }

    #[test]
    fn test_posture_checked_before_time() {
        let config = SspConfig::default();
        assert_eq!(
            evaluate(&ctx("P7", "T9"), &config),
            Admissibility::Inadmissible(InadmissibleReason::PostureNotAdmissible)
        );
        assert_eq!(
            evaluate(&ctx("P1", "T9"), &config),
            Admissibility::Inadmissible(InadmissibleReason::TimeClassNotAdmissible)
        );
    }

    #[test]
    fn test_exact_membership_only() {
        let config = SspConfig::default();
        for (p, t) in [("P1", "T1 "), ("P1", "t1"), ("p1", "T1"), ("P1", "T01"), ("P1", "")] {
            assert!(!evaluate(&ctx(p, t), &config).is_admissible(), "{p:?}/{t:?}");
        }
    }

    #[test]
    fn test_gate_is_idempotent() {
        let config = SspConfig::default();
        let a = ctx("P1", "T1");
        let first = evaluate(&a, &config);
        for _ in 0..10 {
            assert_eq!(evaluate(&a, &config), first);
        }
    }

    #[test]
    fn test_binding_depends_on_both_classes() {
        let config = SspConfig::default();
        let salt = |p: &str, t: &str| match evaluate(&ctx(p, t), &config) {
            Admissibility::Admissible(b) => b.salt(),
            other => panic!("unexpected {:?}", other),
        };
        assert_ne!(salt("P0", "T1"), salt("P1", "T1"));
        assert_ne!(salt("P1", "T0"), salt("P1", "T1"));
    }

    #[test]
    fn test_binding_payload() {
        let binding = StructuralBinding::derive(&ctx("P1", "T1"), 1_000_003);
        assert_eq!(*binding.signature(), hash_bytes(b"SSP_T|p=P1|t=T1|mod=1000003"));
        assert_eq!(binding.salt(), digest_prefix_u64(binding.signature()));
        assert_eq!(binding.signature_hex().len(), 64);
    }

    #[test]
    fn test_bound_gate_rejects_other_admissible_context() {
        let config = SspConfig::default();
        let enrolled = match evaluate(&ctx("P0", "T1"), &config) {
            Admissibility::Admissible(b) => b,
            other => panic!("unexpected {:?}", other),
        };

        assert!(evaluate_bound(&ctx("P0", "T1"), &enrolled, &config).is_admissible());
        assert_eq!(
            evaluate_bound(&ctx("P1", "T1"), &enrolled, &config),
            Admissibility::Inadmissible(InadmissibleReason::PostureMismatch)
        );
        assert_eq!(
            evaluate_bound(&ctx("P1", "T9"), &enrolled, &config),
            Admissibility::Inadmissible(InadmissibleReason::TimeClassNotAdmissible)
        );
    }

    #[test]
    fn test_label_grammar() {
        assert!(is_valid_label("P1"));
        assert!(is_valid_label("night-shift_2"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("P 1"));
        assert!(!is_valid_label("P|1"));
        assert!(!is_valid_label(&"x".repeat(MAX_LABEL_LEN + 1)));
    }
}
