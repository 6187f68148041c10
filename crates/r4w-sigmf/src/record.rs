//! # SigMF Records
//!
//! Value types for the three SigMF entities:
//!
//! - [`Global`]: recording-wide properties, one per document
//! - [`Capture`]: recording parameters taking effect at a sample index
//! - [`Annotation`]: a region of interest bounded in samples and frequency
//!
//! Optional fields are `Option`s and are omitted from the JSON when unset.
//! Keys use the SigMF `core:` namespace. Keys from other namespaces are kept
//! in `extensions` so that foreign metadata survives a read/append cycle.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{SigMfError, SigMfResult};

/// Common behaviour of the records stored in a SigMF document.
pub trait SigMfRecord: Serialize + DeserializeOwned {
    /// Name used in error messages.
    const RECORD: &'static str;

    /// JSON keys every stored entry must carry.
    const REQUIRED: &'static [&'static str];

    /// Check required fields before the record is serialized.
    fn validate(&self) -> SigMfResult<()> {
        Ok(())
    }

    /// Build the JSON object for this record.
    fn to_json(&self) -> SigMfResult<Value> {
        self.validate()?;
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a record from a stored JSON object.
    fn from_json(value: &Value) -> SigMfResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            SigMfError::Structural(format!("{} entry is not a JSON object", Self::RECORD))
        })?;
        for &field in Self::REQUIRED {
            if !obj.contains_key(field) {
                return Err(SigMfError::RequiredFieldMissing {
                    record: Self::RECORD,
                    field,
                });
            }
        }
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// SigMF global metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    /// Sample format of the dataset (e.g. `cf32_le`)
    #[serde(rename = "core:datatype")]
    pub datatype: String,

    /// Version of the SigMF format
    #[serde(rename = "core:version")]
    pub version: String,

    /// Sample rate in Hz
    #[serde(rename = "core:sample_rate", skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,

    /// Index of the first sample in the dataset
    #[serde(rename = "core:offset", skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,

    #[serde(rename = "core:description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "core:author", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(rename = "core:license", skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Hardware used for the recording
    #[serde(rename = "core:hw", skip_serializing_if = "Option::is_none")]
    pub hw: Option<String>,

    /// SHA512 hash of the dataset
    #[serde(rename = "core:sha512", skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,

    /// Fields outside the core namespace
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Global {
    pub fn new(datatype: &str, version: &str) -> Self {
        Self {
            datatype: datatype.to_string(),
            version: version.to_string(),
            sample_rate: None,
            offset: None,
            description: None,
            author: None,
            license: None,
            hw: None,
            sha512: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn set_datatype(&mut self, datatype: &str) {
        self.datatype = datatype.to_string();
    }

    pub fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
    }

    pub fn set_sample_rate(&mut self, rate: f64) {
        self.sample_rate = Some(rate);
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    pub fn set_description(&mut self, desc: &str) {
        self.description = Some(desc.to_string());
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = Some(author.to_string());
    }

    pub fn set_license(&mut self, license: &str) {
        self.license = Some(license.to_string());
    }

    pub fn set_hw(&mut self, hw: &str) {
        self.hw = Some(hw.to_string());
    }

    pub fn set_sha512(&mut self, sha512: &str) {
        self.sha512 = Some(sha512.to_string());
    }

    /// Set sample rate (builder form).
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Set description (builder form).
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Set author (builder form).
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }
}

impl SigMfRecord for Global {
    const RECORD: &'static str = "global";
    const REQUIRED: &'static [&'static str] = &["core:datatype", "core:version"];

    fn validate(&self) -> SigMfResult<()> {
        if self.datatype.is_empty() {
            return Err(SigMfError::RequiredFieldMissing {
                record: Self::RECORD,
                field: "core:datatype",
            });
        }
        if self.version.is_empty() {
            return Err(SigMfError::RequiredFieldMissing {
                record: Self::RECORD,
                field: "core:version",
            });
        }
        Ok(())
    }
}

/// SigMF capture segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    /// Sample index where this capture's parameters take effect
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,

    /// Center frequency in Hz
    #[serde(rename = "core:frequency", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,

    /// Date/time of the first sample (ISO 8601)
    #[serde(rename = "core:datetime", skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Capture {
    pub fn new(sample_start: u64) -> Self {
        Self {
            sample_start,
            frequency: None,
            datetime: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn set_sample_start(&mut self, sample_start: u64) {
        self.sample_start = sample_start;
    }

    pub fn set_frequency(&mut self, freq_hz: f64) {
        self.frequency = Some(freq_hz);
    }

    pub fn set_datetime(&mut self, datetime: &str) {
        self.datetime = Some(datetime.to_string());
    }

    /// Set center frequency (builder form).
    pub fn with_frequency(mut self, freq_hz: f64) -> Self {
        self.frequency = Some(freq_hz);
        self
    }
}

impl SigMfRecord for Capture {
    const RECORD: &'static str = "capture";
    const REQUIRED: &'static [&'static str] = &["core:sample_start"];
}

/// SigMF annotation segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Sample index where the annotated region starts
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,

    /// Length of the region in samples
    #[serde(rename = "core:sample_count")]
    pub sample_count: u64,

    /// Lower frequency bound in Hz
    #[serde(rename = "core:freq_lower_edge", skip_serializing_if = "Option::is_none")]
    pub freq_lower_edge: Option<f64>,

    /// Upper frequency bound in Hz
    #[serde(rename = "core:freq_upper_edge", skip_serializing_if = "Option::is_none")]
    pub freq_upper_edge: Option<f64>,

    /// Name of the tool or block that produced the annotation
    #[serde(rename = "core:generator", skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,

    #[serde(rename = "core:comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Annotation {
    pub fn new(sample_start: u64, sample_count: u64) -> Self {
        Self {
            sample_start,
            sample_count,
            freq_lower_edge: None,
            freq_upper_edge: None,
            generator: None,
            comment: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn set_sample_start(&mut self, sample_start: u64) {
        self.sample_start = sample_start;
    }

    pub fn set_sample_count(&mut self, sample_count: u64) {
        self.sample_count = sample_count;
    }

    pub fn set_freq_lower_edge(&mut self, freq_hz: f64) {
        self.freq_lower_edge = Some(freq_hz);
    }

    pub fn set_freq_upper_edge(&mut self, freq_hz: f64) {
        self.freq_upper_edge = Some(freq_hz);
    }

    pub fn set_generator(&mut self, generator: &str) {
        self.generator = Some(generator.to_string());
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = Some(comment.to_string());
    }

    /// Set both frequency edges (builder form).
    pub fn with_freq_edges(mut self, lower_hz: f64, upper_hz: f64) -> Self {
        self.freq_lower_edge = Some(lower_hz);
        self.freq_upper_edge = Some(upper_hz);
        self
    }

    /// Set comment (builder form).
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Index one past the last annotated sample.
    pub fn sample_end(&self) -> u64 {
        self.sample_start.saturating_add(self.sample_count)
    }
}

impl SigMfRecord for Annotation {
    const RECORD: &'static str = "annotation";
    const REQUIRED: &'static [&'static str] = &["core:sample_start", "core:sample_count"];
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_fields_are_omitted() {
        let value = Capture::new(0).to_json().unwrap();
        assert_eq!(value, json!({ "core:sample_start": 0 }));

        let value = Annotation::new(10, 20).to_json().unwrap();
        assert_eq!(
            value,
            json!({ "core:sample_start": 10, "core:sample_count": 20 })
        );
    }

    #[test]
    fn test_empty_comment_is_distinct_from_unset() {
        let mut ann = Annotation::new(0, 1);
        ann.set_comment("");
        let value = ann.to_json().unwrap();
        assert_eq!(value["core:comment"], json!(""));

        let back = Annotation::from_json(&value).unwrap();
        assert_eq!(back.comment, Some(String::new()));
    }

    #[test]
    fn test_global_requires_datatype_and_version() {
        let err = Global::new("", "1.0.0").to_json().unwrap_err();
        assert!(matches!(
            err,
            SigMfError::RequiredFieldMissing { field: "core:datatype", .. }
        ));

        let err = Global::new("cf32_le", "").to_json().unwrap_err();
        assert!(matches!(
            err,
            SigMfError::RequiredFieldMissing { field: "core:version", .. }
        ));
    }

    #[test]
    fn test_from_json_reports_missing_sample_start() {
        let err = Capture::from_json(&json!({ "core:frequency": 1e9 })).unwrap_err();
        assert!(matches!(
            err,
            SigMfError::RequiredFieldMissing {
                record: "capture",
                field: "core:sample_start"
            }
        ));

        let err = Annotation::from_json(&json!({ "core:sample_start": 4 })).unwrap_err();
        assert!(matches!(
            err,
            SigMfError::RequiredFieldMissing { field: "core:sample_count", .. }
        ));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = Capture::from_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, SigMfError::Structural(_)));
    }

    #[test]
    fn test_extensions_survive() {
        let value = json!({
            "core:sample_start": 0,
            "core:frequency": 915e6,
            "r4w:waveform": "LoRa SF7"
        });
        let capture = Capture::from_json(&value).unwrap();
        assert_eq!(capture.frequency, Some(915e6));
        assert_eq!(capture.extensions["r4w:waveform"], json!("LoRa SF7"));
        assert_eq!(capture.to_json().unwrap(), value);
    }

    #[test]
    fn test_setters_touch_one_field() {
        let mut ann = Annotation::new(100, 150);
        ann.set_freq_lower_edge(500e6);
        assert_eq!(ann.freq_lower_edge, Some(500e6));
        assert_eq!(ann.freq_upper_edge, None);
        assert_eq!(ann.sample_end(), 250);

        let mut global = Global::new("cf32_le", "1.0.0");
        global.set_hw("USRP B210");
        global.set_offset(0);
        assert_eq!(global.hw.as_deref(), Some("USRP B210"));
        assert_eq!(global.offset, Some(0));
        assert_eq!(global.sample_rate, None);
    }
}
