//! Evaluation engine (deterministic).
//!
//! Gate, input grammar, structural traversal and the decision procedure.

pub mod admissibility;
pub mod input;
pub mod record;
pub mod state;
pub mod events;
pub mod traverse;
pub mod decision;

pub use admissibility::{
    evaluate, evaluate_bound, Admissibility, AdmissibilityContext, InadmissibleReason,
    PostureClass, StructuralBinding, TimeClass,
};
pub use input::{IdentityInput, InputFormatError};
pub use record::IdentityRecord;
pub use state::StructuralState;
pub use events::{Layer, TraceEvent, Transition};
pub use traverse::{traverse, traverse_input, Traversal};
pub use decision::{
    enroll, verify, Decision, DecisionError, DecisionReason, Enrolled, Enrollment, Verification,
};
