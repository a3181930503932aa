//! Audit Metrics
//!
//! Descriptive statistics written into `ssp_summary.txt`. Nothing here is
//! consulted by the decision engine: acceptance is exact signature equality.

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::events::TraceEvent;

/// Per-trace statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceStats {
    /// Total events.
    pub events_total: usize,
    /// Steps that emitted at least one event.
    pub steps_executed: u32,
    /// Event counts keyed by `layer:transition`.
    pub counts: BTreeMap<String, usize>,
}

impl TraceStats {
    /// Collect statistics over an event sequence.
    pub fn collect(events: &[TraceEvent]) -> Self {
        Self {
            events_total: events.len(),
            steps_executed: events.last().map(|e| e.step + 1).unwrap_or(0),
            counts: histogram(events),
        }
    }
}

/// Divergence between an enrolled trace and a presented one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DivergenceMetrics {
    /// One-based index of the first differing event in the overlap, 0 if none.
    pub first_div_step: usize,
    /// Differing events within the common prefix length.
    pub event_divergences_in_overlap: usize,
    /// L1 distance between `layer:transition` histograms.
    pub hist_l1_delta: usize,
    /// Events in the enrolled trace.
    pub expected_events: usize,
    /// Events in the presented trace.
    pub actual_events: usize,
    /// `actual_events - expected_events`.
    pub length_delta: i64,
}

impl DivergenceMetrics {
    /// Compare two event sequences.
    pub fn compare(expected: &[TraceEvent], actual: &[TraceEvent]) -> Self {
        let mut first_div_step = 0;
        let mut event_divergences_in_overlap = 0;
        for (idx, (e, a)) in expected.iter().zip(actual).enumerate() {
            if e != a {
                event_divergences_in_overlap += 1;
                if first_div_step == 0 {
                    first_div_step = idx + 1;
                }
            }
        }

        let eh = histogram(expected);
        let ah = histogram(actual);
        let keys: BTreeSet<&String> = eh.keys().chain(ah.keys()).collect();
        let hist_l1_delta: usize = keys
            .into_iter()
            .map(|k| {
                let e = eh.get(k).copied().unwrap_or(0);
                let a = ah.get(k).copied().unwrap_or(0);
                e.abs_diff(a)
            })
            .sum();

        Self {
            first_div_step,
            event_divergences_in_overlap,
            hist_l1_delta,
            expected_events: expected.len(),
            actual_events: actual.len(),
            length_delta: actual.len() as i64 - expected.len() as i64,
        }
    }

    /// Metrics for a presentation with no enrolled trace to compare against.
    pub fn unanchored(actual: &[TraceEvent]) -> Self {
        Self {
            actual_events: actual.len(),
            length_delta: actual.len() as i64,
            ..Self::default()
        }
    }

    /// `key = value` lines in summary order.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("first_div_step = {}", self.first_div_step),
            format!("event_divergences_in_overlap = {}", self.event_divergences_in_overlap),
            format!("hist_l1_delta = {}", self.hist_l1_delta),
            format!("expected_events = {}", self.expected_events),
            format!("actual_events = {}", self.actual_events),
            format!("length_delta = {}", self.length_delta),
        ]
    }
}

fn histogram(events: &[TraceEvent]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.kind_key()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::Transition;

    fn ev(step: u32, t: Transition, x: u32) -> TraceEvent {
        TraceEvent::new(step, t, x)
    }

    #[test]
    fn test_stats() {
        let events = vec![
            ev(0, Transition::GatePass, 1),
            ev(0, Transition::StepNorm, 2),
            ev(1, Transition::GatePass, 3),
        ];
        let stats = TraceStats::collect(&events);
        assert_eq!(stats.events_total, 3);
        assert_eq!(stats.steps_executed, 2);
        assert_eq!(stats.counts["L0:GATE_PASS"], 2);
        assert_eq!(stats.counts["L1:STEP_NORM"], 1);
        assert_eq!(TraceStats::collect(&[]), TraceStats::default());
    }

    #[test]
    fn test_identical_traces_have_zero_divergence() {
        let events = vec![ev(0, Transition::GatePass, 1), ev(0, Transition::StepNorm, 2)];
        let m = DivergenceMetrics::compare(&events, &events);
        assert_eq!(m.first_div_step, 0);
        assert_eq!(m.event_divergences_in_overlap, 0);
        assert_eq!(m.hist_l1_delta, 0);
        assert_eq!(m.length_delta, 0);
    }

    #[test]
    fn test_divergence_counts() {
        let expected = vec![
            ev(0, Transition::GatePass, 1),
            ev(0, Transition::StepNorm, 2),
            ev(0, Transition::Flow, 2),
        ];
        let actual = vec![
            ev(0, Transition::GatePass, 1),
            ev(0, Transition::StepAccel, 2),
        ];
        let m = DivergenceMetrics::compare(&expected, &actual);
        assert_eq!(m.first_div_step, 2);
        assert_eq!(m.event_divergences_in_overlap, 1);
        // STEP_NORM -1, STEP_ACCEL +1, FLOW -1
        assert_eq!(m.hist_l1_delta, 3);
        assert_eq!(m.expected_events, 3);
        assert_eq!(m.actual_events, 2);
        assert_eq!(m.length_delta, -1);
    }

    #[test]
    fn test_unanchored() {
        let actual = vec![ev(0, Transition::GatePass, 1)];
        let m = DivergenceMetrics::unanchored(&actual);
        assert_eq!(m.actual_events, 1);
        assert_eq!(m.length_delta, 1);
        assert_eq!(m.summary_lines().len(), 6);
    }
}
