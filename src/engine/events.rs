//! Trace Events
//!
//! One record per traversal step. Order is semantically significant.

use std::fmt;

use serde::{Serialize, Deserialize};

/// Structural layer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Layer {
    /// Admissibility bookkeeping
    L0 = 0,
    /// Bounded evolution
    L1 = 1,
    /// Refusal / reroute posture
    L2 = 2,
    /// Closure / quiescence
    L3 = 3,
}

impl Layer {
    /// All layers in traversal order.
    pub const ALL: [Layer; 4] = [Layer::L0, Layer::L1, Layer::L2, Layer::L3];

    /// Canonical label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        }
    }

    /// Parse a canonical label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|layer| layer.label() == label)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Transition taken by a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Transition {
    /// L0 gate opened.
    GatePass,
    /// L0 gate held.
    GateHold,
    /// L1 accelerated step.
    StepAccel,
    /// L1 normal step.
    StepNorm,
    /// L2 collapse witness.
    Refusal,
    /// L2 structural reroute following a refusal.
    Reroute,
    /// L2 pass-through.
    Flow,
    /// L3 early closure.
    Exit,
    /// L3 continue.
    Keep,
}

impl Transition {
    /// Every transition.
    pub const ALL: [Transition; 9] = [
        Transition::GatePass,
        Transition::GateHold,
        Transition::StepAccel,
        Transition::StepNorm,
        Transition::Refusal,
        Transition::Reroute,
        Transition::Flow,
        Transition::Exit,
        Transition::Keep,
    ];

    /// Layer that emits this transition.
    pub fn layer(&self) -> Layer {
        match self {
            Self::GatePass | Self::GateHold => Layer::L0,
            Self::StepAccel | Self::StepNorm => Layer::L1,
            Self::Refusal | Self::Reroute | Self::Flow => Layer::L2,
            Self::Exit | Self::Keep => Layer::L3,
        }
    }

    /// Canonical transition label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GatePass => "GATE_PASS",
            Self::GateHold => "GATE_HOLD",
            Self::StepAccel => "STEP_ACCEL",
            Self::StepNorm => "STEP_NORM",
            Self::Refusal => "REFUSAL",
            Self::Reroute => "REROUTE",
            Self::Flow => "FLOW",
            Self::Exit => "EXIT",
            Self::Keep => "KEEP",
        }
    }

    /// Gate marker column.
    pub fn gate_marker(&self) -> &'static str {
        match self {
            Self::GatePass => "G0_OK",
            Self::GateHold => "G0_HOLD",
            Self::StepAccel => "L1_A",
            Self::StepNorm => "L1_N",
            Self::Refusal => "L2_R",
            Self::Reroute => "L2_RR",
            Self::Flow => "L2_F",
            Self::Exit => "L3_E",
            Self::Keep => "L3_K",
        }
    }

    /// Parse a canonical transition label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.label() == label)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One traversal step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Step index (layer pass number).
    pub step: u32,
    /// Transition taken.
    pub transition: Transition,
    /// Structural register `x` at emission.
    pub x: u32,
}

impl TraceEvent {
    /// Create a new event.
    pub fn new(step: u32, transition: Transition, x: u32) -> Self {
        Self { step, transition, x }
    }

    /// Emitting layer.
    #[inline]
    pub fn layer(&self) -> Layer {
        self.transition.layer()
    }

    /// `layer:transition` key used for statistics.
    pub fn kind_key(&self) -> String {
        format!("{}:{}", self.layer(), self.transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_roundtrip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_label(layer.label()), Some(layer));
        }
        for t in Transition::ALL {
            assert_eq!(Transition::from_label(t.label()), Some(t));
        }
        assert_eq!(Layer::from_label("L4"), None);
        assert_eq!(Transition::from_label("gate_pass"), None);
    }

    #[test]
    fn test_each_layer_owns_its_transitions() {
        let per_layer = |layer: Layer| Transition::ALL.iter().filter(|t| t.layer() == layer).count();
        assert_eq!(per_layer(Layer::L0), 2);
        assert_eq!(per_layer(Layer::L1), 2);
        assert_eq!(per_layer(Layer::L2), 3);
        assert_eq!(per_layer(Layer::L3), 2);
    }

    #[test]
    fn test_kind_key() {
        let event = TraceEvent::new(3, Transition::Reroute, 42);
        assert_eq!(event.layer(), Layer::L2);
        assert_eq!(event.kind_key(), "L2:REROUTE");
    }
}
