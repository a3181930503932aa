//! Structural Evolution State
//!
//! The sub-state `s` threaded through the layers. All registers are kept
//! inside their masks after every update, using wrapping u64 arithmetic,
//! so results are identical on every platform.

use serde::{Serialize, Deserialize};

/// Mask for the 31-bit structural register `x`.
pub const X_MASK: u64 = 0x7FFF_FFFF;

/// Mask for the 32-bit layer registers.
pub const WORD_MASK: u64 = 0xFFFF_FFFF;

/// Multiplier mixing the seed into `s1`.
pub const S1_SEED_MULTIPLIER: u64 = 1_315_423_911;

/// Structural-evolution state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralState {
    /// Evolving register, visible in the trace.
    pub x: u64,
    /// L0 bookkeeping register.
    pub s0: u64,
    /// L1 evolution register.
    pub s1: u64,
    /// L2 refusal register.
    pub s2: u64,
    /// L3 closure register.
    pub s3: u64,
}

impl StructuralState {
    /// Initial state for seed word `m` and binding salt `k`.
    pub fn seeded(m: u64, k: u64) -> Self {
        Self {
            x: (m ^ k) & X_MASK,
            s0: m.wrapping_add(k & 0xFFFF) & WORD_MASK,
            s1: m.wrapping_mul(S1_SEED_MULTIPLIER).wrapping_add(k) & WORD_MASK,
            s2: (m ^ (k >> 3)) & WORD_MASK,
            s3: m.wrapping_add(k >> 7) & WORD_MASK,
        }
    }

    /// `x` as recorded in trace events.
    #[inline]
    pub fn x_word(&self) -> u32 {
        // x is always inside X_MASK
        self.x as u32
    }

    /// True if every register lies inside its mask.
    pub fn is_masked(&self) -> bool {
        self.x <= X_MASK
            && self.s0 <= WORD_MASK
            && self.s1 <= WORD_MASK
            && self.s2 <= WORD_MASK
            && self.s3 <= WORD_MASK
    }
}
