//! Identity Record
//!
//! The triple `(m, a, s)` built fresh for one verification call.

use crate::engine::admissibility::AdmissibilityContext;
use crate::engine::input::IdentityInput;
use crate::engine::state::StructuralState;

/// Identity record `(m, a, s)`.
///
/// `m` is borrowed from the caller for the duration of the call and is
/// never copied into another representation; `s` is `None` until a
/// traversal has run (and stays `None` on ABSTAIN).
#[derive(Clone, Debug)]
pub struct IdentityRecord<'m> {
    m: &'m IdentityInput,
    a: AdmissibilityContext,
    s: Option<StructuralState>,
}

impl<'m> IdentityRecord<'m> {
    /// Start a record for one call.
    pub fn new(m: &'m IdentityInput, a: AdmissibilityContext) -> Self {
        Self { m, a, s: None }
    }

    /// Projection `phi((m, a, s)) = m`.
    pub fn phi(&self) -> &'m IdentityInput {
        self.m
    }

    /// Admissibility context.
    pub fn context(&self) -> &AdmissibilityContext {
        &self.a
    }

    /// Structural state, once traversal has run.
    pub fn structural_state(&self) -> Option<&StructuralState> {
        self.s.as_ref()
    }

    /// Attach the state produced by traversal.
    pub(crate) fn with_state(mut self, s: StructuralState) -> Self {
        self.s = Some(s);
        self
    }
}
