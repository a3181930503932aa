//! Structural Traversal Engine
//!
//! The deterministic finite-step state machine that turns an input and an
//! admissible binding into an ordered sequence of trace events.
//!
//! # Determinism
//!
//! Every layer is a pure function `state -> (state, events)`:
//! - Wrapping u64 integer arithmetic only, masked after every update
//! - No floating point, no clock, no randomness, no hash-ordered containers
//! - Fixed layer order L0 -> L1 -> L2 -> L3 per step
//! - At most `horizon_steps` steps, no recursion

use tracing::debug;

use crate::core::config::{SspConfig, MAX_HORIZON_STEPS};
use crate::engine::admissibility::StructuralBinding;
use crate::engine::events::{TraceEvent, Transition};
use crate::engine::input::{IdentityInput, InputFormatError};
use crate::engine::state::{StructuralState, X_MASK, WORD_MASK};

/// Upper bound on events emitted per step (L2 may emit two).
pub const MAX_EVENTS_PER_STEP: usize = 5;

/// LCG multiplier for the L1 evolution.
const L1_MULTIPLIER: u64 = 1_103_515_245;

/// LCG increment for the L1 evolution.
const L1_INCREMENT: u64 = 12_345;

/// Golden-ratio step mixer for `s1`.
const STEP_MIXER: u64 = 2_654_435_761;

/// Constant folded into `x` on reroute.
const REROUTE_MASK: u64 = 0xA5A5;

/// One layer: pure transformation of the sub-state.
pub type LayerFn = fn(StructuralState, u32, u64) -> (StructuralState, Vec<TraceEvent>);

/// Layers in traversal order.
pub const LAYERS: [LayerFn; 4] = [
    admissibility_layer,
    evolution_layer,
    refusal_layer,
    closure_layer,
];

/// Result of one traversal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Traversal {
    /// Ordered events.
    pub events: Vec<TraceEvent>,
    /// State after the last layer ran.
    pub final_state: StructuralState,
    /// Number of steps started.
    pub steps_executed: u32,
    /// True if L3 closed before the horizon.
    pub closed_early: bool,
}

/// Parse `raw` and traverse it.
///
/// Malformed input fails before any layer runs.
pub fn traverse(
    raw: &str,
    binding: &StructuralBinding,
    config: &SspConfig,
) -> Result<Traversal, InputFormatError> {
    let input = IdentityInput::parse(raw)?;
    Ok(traverse_input(&input, binding, config))
}

/// Traverse an already validated input.
pub fn traverse_input(
    input: &IdentityInput,
    binding: &StructuralBinding,
    config: &SspConfig,
) -> Traversal {
    let salt = binding.salt();
    let mut state = StructuralState::seeded(input.seed_word(), salt);
    // Unvalidated configs must not drive the reservation
    let reserve_steps = config.horizon_steps.min(MAX_HORIZON_STEPS) as usize;
    let mut events = Vec::with_capacity(reserve_steps * MAX_EVENTS_PER_STEP);
    let mut steps_executed = 0;
    let mut closed_early = false;

    'steps: for step in 0..config.horizon_steps {
        steps_executed = step + 1;
        for layer in LAYERS {
            let (next, emitted) = layer(state, step, salt);
            state = next;
            let exit = emitted.iter().any(|e| e.transition == Transition::Exit);
            events.extend(emitted);
            if exit {
                closed_early = true;
                break 'steps;
            }
        }
    }

    debug!(
        events = events.len(),
        steps = steps_executed,
        closed_early,
        "traversal complete"
    );

    Traversal {
        events,
        final_state: state,
        steps_executed,
        closed_early,
    }
}

/// L0: admissibility bookkeeping gate.
pub fn admissibility_layer(state: StructuralState, step: u32, _salt: u64) -> (StructuralState, Vec<TraceEvent>) {
    let s = step as u64;
    let pass = (state.s0 + state.x + s) % 17 == 0 || (state.s0 ^ state.x) % 19 == 1;
    let transition = if pass { Transition::GatePass } else { Transition::GateHold };
    (state, vec![TraceEvent::new(step, transition, state.x_word())])
}

/// L1: bounded evolution of `x` and `s1`.
pub fn evolution_layer(mut state: StructuralState, step: u32, salt: u64) -> (StructuralState, Vec<TraceEvent>) {
    let s = step as u64;
    state.x = state.x
        .wrapping_mul(L1_MULTIPLIER)
        .wrapping_add(L1_INCREMENT)
        .wrapping_add(salt & 0xFFFF)
        .wrapping_add(s)
        & X_MASK;
    let mixer = s.wrapping_mul(STEP_MIXER) & WORD_MASK;
    state.s1 = state.s1.wrapping_add(state.x ^ mixer) & WORD_MASK;

    let transition = if (state.s1 + state.x) % 29 == 0 {
        Transition::StepAccel
    } else {
        Transition::StepNorm
    };
    (state, vec![TraceEvent::new(step, transition, state.x_word())])
}

/// L2: refusal witness and deterministic reroute.
pub fn refusal_layer(mut state: StructuralState, step: u32, salt: u64) -> (StructuralState, Vec<TraceEvent>) {
    let s = step as u64;
    state.s2 = (state.s2 ^ (state.x >> 5) ^ (salt & WORD_MASK) ^ s) & WORD_MASK;

    if state.s2 % 31 != 7 {
        return (state, vec![TraceEvent::new(step, Transition::Flow, state.x_word())]);
    }

    let refusal = TraceEvent::new(step, Transition::Refusal, state.x_word());
    state.x = (state.x ^ (state.s2 & 0xFFFF) ^ REROUTE_MASK) & X_MASK;
    state.s0 = (state.s0 + 97 + (state.x & 0xFF)) & WORD_MASK;
    let reroute = TraceEvent::new(step, Transition::Reroute, state.x_word());
    (state, vec![refusal, reroute])
}

/// L3: closure posture; `EXIT` ends the traversal.
pub fn closure_layer(mut state: StructuralState, step: u32, salt: u64) -> (StructuralState, Vec<TraceEvent>) {
    let s = step as u64;
    state.s3 = (state.s3 + (state.x & 0xFFFF) + (salt >> 11) + s) & WORD_MASK;

    let transition = if (state.s3 ^ state.x) % 23 == 5 {
        Transition::Exit
    } else {
        Transition::Keep
    };
    (state, vec![TraceEvent::new(step, transition, state.x_word())])
}
