//! Canonical Trace Encoding
//!
//! Exactly one byte encoding per event sequence:
//!
//! ```text
//! <step>|<layer>|<transition>|<x>|<gate>\n
//! ```
//!
//! - ASCII only, `|` separators, `\n` after every line (including the last)
//! - Integers in plain decimal: no sign, no leading zeros, no grouping
//! - Empty sequence encodes to zero bytes
//!
//! [`decode`] accepts only this form, so `encode(decode(b)) == b` for every
//! accepted `b`.

use std::fmt::Write as _;

use thiserror::Error;

use crate::engine::events::{Layer, TraceEvent, Transition};
use crate::engine::state::X_MASK;

/// Field separator.
pub const FIELD_SEPARATOR: char = '|';

/// Line terminator.
pub const LINE_TERMINATOR: char = '\n';

/// Header row of `ssp_trace.csv`.
pub const CSV_HEADER: &str = "step,layer,event,x,gate";

/// Canonical byte encoding of an event sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CanonicalTrace(Vec<u8>);

impl CanonicalTrace {
    /// Validate bytes as a canonical trace.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TraceDecodeError> {
        decode(&bytes)?;
        Ok(Self(bytes))
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the encoding of an empty sequence.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encode events into their canonical form.
pub fn encode(events: &[TraceEvent]) -> CanonicalTrace {
    let mut out = String::with_capacity(events.len() * 32);
    for event in events {
        write_row(&mut out, event, FIELD_SEPARATOR);
        out.push(LINE_TERMINATOR);
    }
    CanonicalTrace(out.into_bytes())
}

/// Render `ssp_trace.csv`: header plus one row per event.
pub fn render_csv(events: &[TraceEvent]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + events.len() * 32);
    out.push_str(CSV_HEADER);
    out.push(LINE_TERMINATOR);
    for event in events {
        write_row(&mut out, event, ',');
        out.push(LINE_TERMINATOR);
    }
    out
}

fn write_row(out: &mut String, event: &TraceEvent, sep: char) {
    // Writing into a String cannot fail
    let _ = write!(
        out,
        "{}{sep}{}{sep}{}{sep}{}{sep}{}",
        event.step,
        event.layer().label(),
        event.transition.label(),
        event.x,
        event.transition.gate_marker(),
    );
}

/// Decode canonical bytes back into events.
pub fn decode(bytes: &[u8]) -> Result<Vec<TraceEvent>, TraceDecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| TraceDecodeError::NotUtf8)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let body = text
        .strip_suffix(LINE_TERMINATOR)
        .ok_or(TraceDecodeError::MissingTrailingNewline)?;

    body.split(LINE_TERMINATOR)
        .enumerate()
        .map(|(idx, line)| decode_line(idx + 1, line))
        .collect()
}

fn decode_line(line: usize, text: &str) -> Result<TraceEvent, TraceDecodeError> {
    let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
    let [step, layer, transition, x, gate] = fields.as_slice() else {
        return Err(TraceDecodeError::FieldCount { line, got: fields.len() });
    };

    let step = parse_canonical_u32(step).ok_or(TraceDecodeError::InvalidInteger { line, field: "step" })?;
    let layer = Layer::from_label(layer).ok_or_else(|| TraceDecodeError::UnknownLayer {
        line,
        label: layer.to_string(),
    })?;
    let transition = Transition::from_label(transition).ok_or_else(|| TraceDecodeError::UnknownTransition {
        line,
        label: transition.to_string(),
    })?;
    if transition.layer() != layer {
        return Err(TraceDecodeError::LayerMismatch { line });
    }
    let x = parse_canonical_u32(x).ok_or(TraceDecodeError::InvalidInteger { line, field: "x" })?;
    if x as u64 > X_MASK {
        return Err(TraceDecodeError::XOutOfRange { line });
    }
    if *gate != transition.gate_marker() {
        return Err(TraceDecodeError::GateMarkerMismatch { line });
    }

    Ok(TraceEvent::new(step, transition, x))
}

/// Plain decimal, no leading zeros, no sign.
fn parse_canonical_u32(text: &str) -> Option<u32> {
    let canonical = !text.is_empty()
        && text.bytes().all(|b| b.is_ascii_digit())
        && (text == "0" || !text.starts_with('0'));
    if canonical { text.parse().ok() } else { None }
}

/// Errors decoding a canonical trace.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TraceDecodeError {
    /// Bytes are not UTF-8.
    #[error("trace is not valid UTF-8")]
    NotUtf8,

    /// Last line is not terminated.
    #[error("trace does not end with a newline")]
    MissingTrailingNewline,

    /// Wrong number of fields.
    #[error("line {line}: expected 5 fields, got {got}")]
    FieldCount {
        /// One-based line number.
        line: usize,
        /// Fields found.
        got: usize,
    },

    /// Integer not in canonical decimal form.
    #[error("line {line}: non-canonical integer in field {field}")]
    InvalidInteger {
        /// One-based line number.
        line: usize,
        /// Field name.
        field: &'static str,
    },

    /// Unknown layer label.
    #[error("line {line}: unknown layer {label:?}")]
    UnknownLayer {
        /// One-based line number.
        line: usize,
        /// Label found.
        label: String,
    },

    /// Unknown transition label.
    #[error("line {line}: unknown transition {label:?}")]
    UnknownTransition {
        /// One-based line number.
        line: usize,
        /// Label found.
        label: String,
    },

    /// Transition does not belong to the stated layer.
    #[error("line {line}: transition is not emitted by this layer")]
    LayerMismatch {
        /// One-based line number.
        line: usize,
    },

    /// `x` outside the 31-bit register range.
    #[error("line {line}: x out of range")]
    XOutOfRange {
        /// One-based line number.
        line: usize,
    },

    /// Gate marker inconsistent with the transition.
    #[error("line {line}: gate marker does not match transition")]
    GateMarkerMismatch {
        /// One-based line number.
        line: usize,
    },
}
