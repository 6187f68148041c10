//! Annotation Tagger: marks a fixed-length region for the SigMF sink
//!
//! Samples pass through unchanged. When the gate is armed, the next `work`
//! call emits an `annotation_start` tag at the first sample of its block and
//! schedules an `annotation_end` tag `burst_len` samples later, both carrying
//! the configured description fields, then disarms the gate.
//!
//! Scheduled tags are held until a `work` call produces the sample they
//! refer to, so every emitted tag lies inside the block it is returned with.
//!
//! ## Example
//!
//! ```rust
//! use r4w_sigmf_blocks::annotation_tagger::AnnotationTagger;
//! use r4w_sigmf_blocks::stream_tags::ANNOTATION_END;
//!
//! let mut tagger = AnnotationTagger::new();
//! tagger.set_comment("keyfob press");
//! tagger.set_tag_gate(true);
//!
//! let out = tagger.work(&[0.0f32; 640]);
//! assert_eq!(out.tags.len(), 1);
//! assert_eq!(tagger.scheduled_tags(), 1);
//!
//! let out = tagger.work(&[0.0f32; 640]);
//! assert_eq!(out.tags[0].key, ANNOTATION_END);
//! assert_eq!(out.tags[0].offset, 1000);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crate::stream_tags::{StreamTag, TagStore, TagValue, ANNOTATION_END, ANNOTATION_START};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Default annotated region length in samples.
pub const DEFAULT_BURST_LEN: u64 = 1000;

/// Samples and tags produced by one `work` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggerOutput<T> {
    pub samples: Vec<T>,
    pub tags: Vec<StreamTag>,
}

/// Pass-through block emitting start/end annotation markers on demand.
#[derive(Debug, Clone)]
pub struct AnnotationTagger {
    name: String,
    freq_lower_edge: Option<f64>,
    freq_upper_edge: Option<f64>,
    comment: Option<String>,
    generator: Option<String>,
    burst_len: u64,
    gate: bool,
    nitems_written: u64,
    scheduled: TagStore,
}

impl Default for AnnotationTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationTagger {
    pub fn new() -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            name: format!("annotation_tagger{id}"),
            freq_lower_edge: None,
            freq_upper_edge: None,
            comment: None,
            generator: None,
            burst_len: DEFAULT_BURST_LEN,
            gate: false,
            nitems_written: 0,
            scheduled: TagStore::new(),
        }
    }

    pub fn set_freq_lower_edge(&mut self, freq_hz: f64) {
        self.freq_lower_edge = Some(freq_hz);
    }

    pub fn set_freq_upper_edge(&mut self, freq_hz: f64) {
        self.freq_upper_edge = Some(freq_hz);
    }

    /// Set the comment; an empty string clears it.
    pub fn set_comment(&mut self, comment: &str) {
        self.comment = (!comment.is_empty()).then(|| comment.to_string());
    }

    /// Set the generator; an empty string clears it.
    pub fn set_generator(&mut self, generator: &str) {
        self.generator = (!generator.is_empty()).then(|| generator.to_string());
    }

    /// Arm (or disarm) the gate for the next `work` call.
    pub fn set_tag_gate(&mut self, armed: bool) {
        self.gate = armed;
    }

    /// Set the annotated region length in samples.
    pub fn set_burst_len(&mut self, samples: u64) {
        self.burst_len = samples;
    }

    pub fn is_armed(&self) -> bool {
        self.gate
    }

    /// Source name attached to emitted tags.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute offset of the next output sample.
    pub fn nitems_written(&self) -> u64 {
        self.nitems_written
    }

    /// Tags waiting for a later block.
    pub fn scheduled_tags(&self) -> usize {
        self.scheduled.len()
    }

    /// Payload carried by both markers: every field that has been set.
    pub fn tag_value(&self) -> TagValue {
        let mut fields = Vec::new();
        if let Some(v) = self.freq_lower_edge {
            fields.push(("freq_lower_edge", TagValue::Float(v)));
        }
        if let Some(v) = self.freq_upper_edge {
            fields.push(("freq_upper_edge", TagValue::Float(v)));
        }
        if let Some(ref v) = self.comment {
            fields.push(("comment", TagValue::from(v.as_str())));
        }
        if let Some(ref v) = self.generator {
            fields.push(("generator", TagValue::from(v.as_str())));
        }
        TagValue::dict(fields)
    }

    /// Pass samples through with the tags that fall inside this block.
    ///
    /// An armed gate schedules the marker pair starting at the first sample
    /// of the block.
    pub fn work<T: Copy>(&mut self, samples: &[T]) -> TaggerOutput<T> {
        let start = self.nitems_written;
        let end = start + samples.len() as u64;

        if self.gate {
            let value = self.tag_value();
            self.scheduled.add_tag(StreamTag::with_source(
                start,
                ANNOTATION_START,
                value.clone(),
                self.name.as_str(),
            ));
            self.scheduled.add_tag(StreamTag::with_source(
                start + self.burst_len,
                ANNOTATION_END,
                value,
                self.name.as_str(),
            ));
            self.gate = false;
        }

        let tags: Vec<StreamTag> = self
            .scheduled
            .range(start, end)
            .into_iter()
            .cloned()
            .collect();
        self.scheduled.trim_before(end);

        self.nitems_written = end;
        TaggerOutput {
            samples: samples.to_vec(),
            tags,
        }
    }

    /// Disarm, drop scheduled tags and restart at offset zero.
    pub fn reset(&mut self) {
        self.gate = false;
        self.nitems_written = 0;
        self.scheduled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AnnotationAggregator;
    use num_complex::Complex32;

    #[test]
    fn test_pass_through_without_gate() {
        let mut tagger = AnnotationTagger::new();
        let input = vec![Complex32::new(1.0, 2.0); 10];
        let out = tagger.work(&input);
        assert_eq!(out.samples, input);
        assert!(out.tags.is_empty());
        assert_eq!(tagger.nitems_written(), 10);
    }

    #[test]
    fn test_gate_emits_pair_once() {
        let mut tagger = AnnotationTagger::new();
        tagger.work(&[0u8; 200]);
        tagger.set_tag_gate(true);

        let out = tagger.work(&[0u8; 50]);
        assert_eq!(out.tags.len(), 1);
        assert_eq!(out.tags[0].key, ANNOTATION_START);
        assert_eq!(out.tags[0].offset, 200);
        assert_eq!(out.tags[0].source.as_deref(), Some(tagger.name()));
        assert!(!tagger.is_armed());
        assert_eq!(tagger.scheduled_tags(), 1);

        // Blocks before the end marker carry nothing
        assert!(tagger.work(&[0u8; 950]).tags.is_empty());

        let out = tagger.work(&[0u8; 50]);
        assert_eq!(out.tags.len(), 1);
        assert_eq!(out.tags[0].key, ANNOTATION_END);
        assert_eq!(out.tags[0].offset, 1200);
        assert_eq!(tagger.scheduled_tags(), 0);

        assert!(tagger.work(&[0u8; 2000]).tags.is_empty());
    }

    #[test]
    fn test_tags_stay_inside_their_block() {
        let mut tagger = AnnotationTagger::new();
        tagger.set_tag_gate(true);

        let mut emitted = Vec::new();
        for _ in 0..40 {
            let start = tagger.nitems_written();
            let out = tagger.work(&[0.0f32; 64]);
            let end = tagger.nitems_written();
            assert!(out.tags.iter().all(|t| (start..end).contains(&t.offset)));
            emitted.extend(out.tags);
        }

        let offsets: Vec<u64> = emitted.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 1000]);
    }

    #[test]
    fn test_reset_drops_scheduled_end() {
        let mut tagger = AnnotationTagger::new();
        tagger.set_tag_gate(true);
        tagger.work(&[0u8; 10]);
        assert_eq!(tagger.scheduled_tags(), 1);

        tagger.reset();
        assert_eq!(tagger.scheduled_tags(), 0);
        assert_eq!(tagger.nitems_written(), 0);
        assert!(tagger.work(&[0u8; 2000]).tags.is_empty());
    }

    #[test]
    fn test_payload_only_has_set_fields() {
        let mut tagger = AnnotationTagger::new();
        assert_eq!(tagger.tag_value(), TagValue::dict(Vec::<(&str, TagValue)>::new()));

        tagger.set_freq_lower_edge(914.9e6);
        tagger.set_comment("burst");
        tagger.set_generator("");
        let value = tagger.tag_value();
        assert_eq!(value.get("freq_lower_edge"), Some(&TagValue::Float(914.9e6)));
        assert_eq!(value.get("comment").and_then(TagValue::as_str), Some("burst"));
        assert!(value.get("freq_upper_edge").is_none());
        assert!(value.get("generator").is_none());
    }

    #[test]
    fn test_burst_len() {
        let mut tagger = AnnotationTagger::new();
        tagger.set_burst_len(64);
        tagger.set_tag_gate(true);
        let out = tagger.work(&[0.0f32; 128]);
        assert_eq!(out.tags.len(), 2);
        assert_eq!(out.tags[1].offset - out.tags[0].offset, 64);
    }

    #[test]
    fn test_markers_aggregate() {
        let mut tagger = AnnotationTagger::new();
        tagger.set_comment("preamble");
        tagger.set_freq_upper_edge(915.1e6);
        tagger.set_tag_gate(true);
        let tags: Vec<StreamTag> = (0..4)
            .flat_map(|_| tagger.work(&[0.0f32; 300]).tags)
            .collect();
        assert_eq!(tags.len(), 2);

        let mut agg = AnnotationAggregator::new();
        agg.on_start(tags[0].offset, tags[0].value.clone());
        let ann = agg.on_end(tags[1].offset).unwrap();
        assert_eq!(ann.sample_count, DEFAULT_BURST_LEN);
        assert_eq!(ann.comment.as_deref(), Some("preamble"));
        assert_eq!(ann.freq_upper_edge, Some(915.1e6));
    }
}
