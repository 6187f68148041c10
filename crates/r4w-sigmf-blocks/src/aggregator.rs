//! Annotation Aggregator: pairs start/end markers into annotations
//!
//! A start marker is queued until an end marker arrives; the end always
//! closes the *oldest* pending start (first in, first out), regardless of
//! payload. This is correct for well-nested, in-order markers.
//!
//! ```text
//!            start                        start
//!   ┌──────┐ ─────▶ ┌──────────────────┐ ◀───┐
//!   │ Idle │        │ Open (n pending) │ ────┘
//!   └──────┘ ◀───── └──────────────────┘
//!     │  ▲   end, n == 1      │  end, n > 1 → stays Open
//!     └──┘
//!   end → QueueUnderflow
//! ```
//!
//! Every optional field present in the start payload (`freq_lower_edge`,
//! `freq_upper_edge`, `generator`, `comment`) is copied onto the annotation.
//! The end payload is ignored.

use r4w_sigmf::{Annotation, Capture, SigMfError, SigMfResult};
use std::collections::VecDeque;
use tracing::warn;

use crate::stream_tags::TagValue;

/// Aggregation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// No open annotation
    Idle,
    /// One or more starts waiting for their end
    Open,
}

/// A start marker waiting for its end.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnnotation {
    pub offset: u64,
    pub payload: TagValue,
}

/// First-in-first-out start/end pairing.
#[derive(Debug, Clone, Default)]
pub struct AnnotationAggregator {
    pending: VecDeque<PendingAnnotation>,
}

impl AnnotationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AggregatorState {
        if self.pending.is_empty() {
            AggregatorState::Idle
        } else {
            AggregatorState::Open
        }
    }

    /// Number of open regions.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queue a start marker.
    pub fn on_start(&mut self, offset: u64, payload: TagValue) {
        self.pending.push_back(PendingAnnotation { offset, payload });
    }

    /// Close the oldest open region at `offset`.
    ///
    /// Fails with `QueueUnderflow` when nothing is open, and with
    /// `InvalidSpan` when `offset` precedes the start; in the latter case the
    /// start is consumed.
    pub fn on_end(&mut self, offset: u64) -> SigMfResult<Annotation> {
        let start = self
            .pending
            .pop_front()
            .ok_or(SigMfError::QueueUnderflow { offset })?;

        let sample_count = offset
            .checked_sub(start.offset)
            .ok_or(SigMfError::InvalidSpan {
                start: start.offset,
                end: offset,
            })?;

        let mut annotation = Annotation::new(start.offset, sample_count);
        apply_annotation_fields(&mut annotation, &start.payload);
        Ok(annotation)
    }

    /// Discard every open region, returning them oldest first.
    pub fn clear(&mut self) -> Vec<PendingAnnotation> {
        self.pending.drain(..).collect()
    }
}

/// Copy every recognised optional field of `payload` onto `annotation`.
pub fn apply_annotation_fields(annotation: &mut Annotation, payload: &TagValue) {
    let Some(fields) = payload.as_dict() else {
        return;
    };

    for (key, value) in fields {
        match key.as_str() {
            "freq_lower_edge" => match value.as_f64() {
                Some(v) => annotation.set_freq_lower_edge(v),
                None => ignored_field(key, value),
            },
            "freq_upper_edge" => match value.as_f64() {
                Some(v) => annotation.set_freq_upper_edge(v),
                None => ignored_field(key, value),
            },
            "generator" => match value.as_str() {
                Some(v) => annotation.set_generator(v),
                None => ignored_field(key, value),
            },
            "comment" => match value.as_str() {
                Some(v) => annotation.set_comment(v),
                None => ignored_field(key, value),
            },
            _ => {}
        }
    }
}

fn ignored_field(key: &str, value: &TagValue) {
    warn!(field = key, value = %value, "Ignoring annotation field with unexpected type");
}

/// Capture for a frequency-change marker.
pub fn capture_from_frequency(offset: u64, value: &TagValue) -> SigMfResult<Capture> {
    let freq = value.as_f64().ok_or_else(|| {
        SigMfError::Structural(format!("frequency tag at {} carries {}", offset, value))
    })?;
    Ok(Capture::new(offset).with_frequency(freq))
}

/// Record built from a single pre-aggregated payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatedRecord {
    Capture(Capture),
    Annotation(Annotation),
}

/// Build a record from a pre-aggregated payload.
///
/// A dict with `sample_count` describes an annotation; otherwise a dict with
/// `frequency` describes a capture. Anything else is rejected.
pub fn record_from_payload(offset: u64, payload: &TagValue) -> SigMfResult<AggregatedRecord> {
    if let Some(count) = payload.get("sample_count") {
        let sample_count = count.as_u64().ok_or_else(|| {
            SigMfError::Structural(format!(
                "annotation at {}: sample_count is {}",
                offset, count
            ))
        })?;
        let mut annotation = Annotation::new(offset, sample_count);
        apply_annotation_fields(&mut annotation, payload);
        return Ok(AggregatedRecord::Annotation(annotation));
    }

    if let Some(freq) = payload.get("frequency") {
        let mut capture = capture_from_frequency(offset, freq)?;
        if let Some(datetime) = payload.get("datetime").and_then(TagValue::as_str) {
            capture.set_datetime(datetime);
        }
        return Ok(AggregatedRecord::Capture(capture));
    }

    Err(SigMfError::Structural(format!(
        "message at {} describes neither a capture nor an annotation: {}",
        offset, payload
    )))
}
