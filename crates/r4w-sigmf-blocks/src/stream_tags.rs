//! Stream Tags: metadata markers attached to sample offsets
//!
//! Tags ride alongside the sample stream and are handed to each block
//! together with its input buffer. The SigMF blocks recognise a small
//! fixed set of keys:
//!
//! | Key                | Value           | Meaning                              |
//! |--------------------|-----------------|--------------------------------------|
//! | `rx_freq`          | Float           | Center frequency changed (Hz)        |
//! | `annotation_start` | Dict or Null    | Opens an annotated region            |
//! | `annotation_end`   | any             | Closes the oldest open region        |
//! | `annotation`       | Dict            | Capture or annotation in one message |
//!
//! ## Example
//!
//! ```rust
//! use r4w_sigmf_blocks::stream_tags::{StreamTag, TagValue, ANNOTATION_START};
//!
//! let payload = TagValue::dict([
//!     ("comment", TagValue::from("burst")),
//!     ("freq_lower_edge", TagValue::Float(914.9e6)),
//! ]);
//! let tag = StreamTag::new(100, ANNOTATION_START, payload);
//! assert_eq!(tag.value.get("comment").and_then(TagValue::as_str), Some("burst"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

/// Default key of a frequency-change tag (UHD source convention).
pub const RX_FREQ: &str = "rx_freq";
/// Default key opening an annotated region.
pub const ANNOTATION_START: &str = "annotation_start";
/// Default key closing the oldest open region.
pub const ANNOTATION_END: &str = "annotation_end";
/// Default key of a pre-aggregated capture/annotation description.
pub const ANNOTATION: &str = "annotation";

/// Tag value: typed payload attached to a sample offset.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TagValue {
    /// No payload
    #[default]
    Null,
    Bool(bool),
    /// Unsigned integer (sample counts, indices)
    UInt(u64),
    /// Signed integer
    Int(i64),
    /// Floating-point value (frequencies)
    Float(f64),
    String(String),
    /// Named fields
    Dict(BTreeMap<String, TagValue>),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Null => write!(f, "nil"),
            TagValue::Bool(v) => write!(f, "{v}"),
            TagValue::UInt(v) => write!(f, "{v}"),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v:.6}"),
            TagValue::String(v) => write!(f, "\"{v}\""),
            TagValue::Dict(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl TagValue {
    /// Build a dict from name/value pairs.
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, TagValue)>,
    {
        TagValue::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TagValue::Null)
    }

    /// Try to get as float; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Float(v) => Some(*v),
            TagValue::UInt(v) => Some(*v as f64),
            TagValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as unsigned integer; negative or fractional values fail.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TagValue::UInt(v) => Some(*v),
            TagValue::Int(v) => u64::try_from(*v).ok(),
            TagValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64 => {
                Some(*v as u64)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, TagValue>> {
        match self {
            TagValue::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a field of a dict payload.
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.as_dict().and_then(|map| map.get(key))
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        TagValue::UInt(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::String(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::String(v)
    }
}

/// A single stream tag: key-value pair at an absolute sample offset.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTag {
    /// Absolute sample offset where the tag applies
    pub offset: u64,
    pub key: String,
    pub value: TagValue,
    /// Block that emitted the tag
    pub source: Option<String>,
}

impl StreamTag {
    pub fn new(offset: u64, key: impl Into<String>, value: TagValue) -> Self {
        Self {
            offset,
            key: key.into(),
            value,
            source: None,
        }
    }

    /// Create a tag with source attribution.
    pub fn with_source(
        offset: u64,
        key: impl Into<String>,
        value: TagValue,
        source: impl Into<String>,
    ) -> Self {
        Self {
            offset,
            key: key.into(),
            value,
            source: Some(source.into()),
        }
    }
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}: {} = {}", self.offset, self.key, self.value)?;
        if let Some(ref src) = self.source {
            write!(f, " (from {src})")?;
        }
        Ok(())
    }
}

/// Ordered collection of stream tags.
///
/// Tags are keyed by offset, then by insertion order at the same offset.
#[derive(Debug, Clone, Default)]
pub struct TagStore {
    tags: BTreeMap<(u64, u64), StreamTag>,
    seq: u64,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&mut self, tag: StreamTag) {
        self.tags.insert((tag.offset, self.seq), tag);
        self.seq += 1;
    }

    /// Tags in `[start, end)`, ordered by offset.
    pub fn range(&self, start: u64, end: u64) -> Vec<&StreamTag> {
        if end <= start {
            return Vec::new();
        }
        self.tags
            .range((start, 0)..(end, 0))
            .map(|(_, tag)| tag)
            .collect()
    }

    /// Remove all tags before `offset`.
    pub fn trim_before(&mut self, offset: u64) {
        self.tags.retain(|&(off, _), _| off >= offset);
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
        self.seq = 0;
    }
}
