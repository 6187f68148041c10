//! # SigMF Document
//!
//! A SigMF metadata file is a JSON object with up to three top-level
//! members, selected by [`Mode`]:
//!
//! ```text
//! {
//!   "global":     { "core:datatype": ..., "core:version": ..., ... },
//!   "capture":    [ { "core:sample_start": ..., ... }, ... ],
//!   "annotation": [ { "core:sample_start": ..., "core:sample_count": ..., ... }, ... ]
//! }
//! ```
//!
//! [`SigMfDocument`] owns the file names and the parsed tree, and keeps
//! index bounds for each section so readers and writers can find the right
//! subtree without rescanning.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{SigMfError, SigMfResult};

/// Key of the global section.
pub const GLOBAL_KEY: &str = "global";
/// Key of the capture array.
pub const CAPTURE_KEY: &str = "capture";
/// Key of the annotation array.
pub const ANNOTATION_KEY: &str = "annotation";

/// Which top-level sections a document may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// global, capture and annotation
    #[default]
    Full,
    /// capture array only
    CaptureOnly,
    /// annotation array only
    AnnotationOnly,
}

impl Mode {
    /// Top-level keys permitted in this mode, in file order.
    pub fn sections(&self) -> &'static [&'static str] {
        match self {
            Mode::Full => &[GLOBAL_KEY, CAPTURE_KEY, ANNOTATION_KEY],
            Mode::CaptureOnly => &[CAPTURE_KEY],
            Mode::AnnotationOnly => &[ANNOTATION_KEY],
        }
    }

    pub fn permits(&self, key: &str) -> bool {
        self.sections().contains(&key)
    }

    /// Empty document for this mode.
    pub fn skeleton(&self) -> Map<String, Value> {
        self.sections()
            .iter()
            .map(|&key| {
                let empty = if key == GLOBAL_KEY {
                    Value::Object(Map::new())
                } else {
                    Value::Array(Vec::new())
                };
                (key.to_string(), empty)
            })
            .collect()
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Full => write!(f, "full"),
            Mode::CaptureOnly => write!(f, "capture_only"),
            Mode::AnnotationOnly => write!(f, "annotation_only"),
        }
    }
}

/// Half-open index range into one level of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionBounds {
    pub begin: usize,
    pub end: usize,
}

impl SectionBounds {
    fn of_len(len: usize) -> Self {
        Self { begin: 0, end: len }
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.begin..self.end
    }
}

/// A SigMF metadata file and its parsed tree.
///
/// Not synchronised: one instance per file, used from one thread.
#[derive(Debug, Clone)]
pub struct SigMfDocument {
    metadata_path: PathBuf,
    dataset_path: Option<PathBuf>,
    mode: Mode,
    tree: Map<String, Value>,
    /// Top-level members
    document: SectionBounds,
    /// Members of the global object
    global: Option<SectionBounds>,
    /// Entries of the capture array
    capture: Option<SectionBounds>,
    /// Entries of the annotation array
    annotation: Option<SectionBounds>,
}

impl SigMfDocument {
    /// Open a metadata file, or start from an empty tree if it does not
    /// exist yet.
    pub fn open<P: AsRef<Path>>(metadata_path: P, mode: Mode) -> SigMfResult<Self> {
        let metadata_path = metadata_path.as_ref().to_path_buf();
        let tree = read_tree(&metadata_path)?.unwrap_or_default();

        let mut doc = Self {
            metadata_path,
            dataset_path: None,
            mode,
            tree,
            document: SectionBounds::default(),
            global: None,
            capture: None,
            annotation: None,
        };
        doc.init_section_bounds()?;
        Ok(doc)
    }

    /// Open a metadata file paired with a dataset file.
    pub fn open_with_dataset<P: AsRef<Path>, Q: AsRef<Path>>(
        metadata_path: P,
        dataset_path: Q,
        mode: Mode,
    ) -> SigMfResult<Self> {
        let mut doc = Self::open(metadata_path, mode)?;
        doc.dataset_path = Some(dataset_path.as_ref().to_path_buf());
        Ok(doc)
    }

    /// Recompute the section bounds from the current tree.
    ///
    /// Fails if the tree holds a member the mode does not permit, or a
    /// section of the wrong JSON type.
    pub fn init_section_bounds(&mut self) -> SigMfResult<()> {
        check_members(&self.tree, self.mode)?;

        self.document = SectionBounds::of_len(self.tree.len());
        self.global = self
            .tree
            .get(GLOBAL_KEY)
            .and_then(Value::as_object)
            .map(|g| SectionBounds::of_len(g.len()));
        self.capture = self
            .tree
            .get(CAPTURE_KEY)
            .and_then(Value::as_array)
            .map(|a| SectionBounds::of_len(a.len()));
        self.annotation = self
            .tree
            .get(ANNOTATION_KEY)
            .and_then(Value::as_array)
            .map(|a| SectionBounds::of_len(a.len()));
        Ok(())
    }

    /// Re-read the tree from disk.
    pub fn reload(&mut self) -> SigMfResult<()> {
        self.tree = read_tree(&self.metadata_path)?.unwrap_or_default();
        self.init_section_bounds()
    }

    /// Adopt a tree that has just been written to disk.
    pub(crate) fn replace_tree(&mut self, tree: Map<String, Value>) -> SigMfResult<()> {
        self.tree = tree;
        self.init_section_bounds()
    }

    /// Schema validation hook. Only the structural check is performed.
    pub fn validate_schema(&self) -> SigMfResult<()> {
        check_members(&self.tree, self.mode)
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn dataset_path(&self) -> Option<&Path> {
        self.dataset_path.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The parsed top-level object.
    pub fn tree(&self) -> &Map<String, Value> {
        &self.tree
    }

    /// True when the document has no top-level members.
    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    pub fn document_bounds(&self) -> SectionBounds {
        self.document
    }

    pub fn global_bounds(&self) -> Option<SectionBounds> {
        self.global
    }

    pub fn capture_bounds(&self) -> Option<SectionBounds> {
        self.capture
    }

    pub fn annotation_bounds(&self) -> Option<SectionBounds> {
        self.annotation
    }

    /// The global object, if present.
    pub fn global_entry(&self) -> Option<&Map<String, Value>> {
        self.tree.get(GLOBAL_KEY).and_then(Value::as_object)
    }

    /// Capture entries within the current bounds; empty if the section is absent.
    pub fn capture_entries(&self) -> &[Value] {
        self.entries(CAPTURE_KEY, self.capture)
    }

    /// Annotation entries within the current bounds; empty if the section is absent.
    pub fn annotation_entries(&self) -> &[Value] {
        self.entries(ANNOTATION_KEY, self.annotation)
    }

    fn entries(&self, key: &str, bounds: Option<SectionBounds>) -> &[Value] {
        match (self.tree.get(key).and_then(Value::as_array), bounds) {
            (Some(array), Some(bounds)) => &array[bounds.range()],
            _ => &[],
        }
    }
}

/// Parse the metadata file.
///
/// Returns `None` if the file is missing or blank.
pub(crate) fn read_tree(path: &Path) -> SigMfResult<Option<Map<String, Value>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(&content).map_err(|e| {
        SigMfError::Parse(format!("{}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        other => Err(SigMfError::Structural(format!(
            "{}: top level is not an object ({})",
            path.display(),
            json_type(&other)
        ))),
    }
}

/// Serialize the tree and replace the file contents.
///
/// The tree is rendered before the file is opened, so a failure leaves
/// the previous contents in place.
pub(crate) fn write_tree(path: &Path, tree: &Map<String, Value>) -> SigMfResult<()> {
    let mut rendered = serde_json::to_vec_pretty(tree)?;
    rendered.push(b'\n');
    fs::write(path, rendered)?;
    Ok(())
}

/// Check top-level members against the mode.
pub(crate) fn check_members(tree: &Map<String, Value>, mode: Mode) -> SigMfResult<()> {
    for (key, value) in tree {
        if !mode.permits(key) {
            return Err(SigMfError::Structural(format!(
                "member '{}' is not permitted in {} mode",
                key, mode
            )));
        }
        let well_typed = if key == GLOBAL_KEY {
            value.is_object()
        } else {
            value.is_array()
        };
        if !well_typed {
            return Err(SigMfError::Structural(format!(
                "member '{}' has unexpected type {}",
                key,
                json_type(value)
            )));
        }
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_skeleton_per_mode() {
        let full = Value::Object(Mode::Full.skeleton());
        assert_eq!(
            full,
            serde_json::json!({ "global": {}, "capture": [], "annotation": [] })
        );

        let captures = Value::Object(Mode::CaptureOnly.skeleton());
        assert_eq!(captures, serde_json::json!({ "capture": [] }));

        let annotations = Value::Object(Mode::AnnotationOnly.skeleton());
        assert_eq!(annotations, serde_json::json!({ "annotation": [] }));
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let doc = SigMfDocument::open(temp_dir.path().join("none.sigmf-meta"), Mode::Full).unwrap();

        assert!(doc.is_empty());
        assert!(doc.global_entry().is_none());
        assert!(doc.capture_entries().is_empty());
        assert_eq!(doc.capture_bounds(), None);
    }

    #[test]
    fn test_bounds_follow_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rec.sigmf-meta");
        fs::write(
            &path,
            r#"{
                "global": { "core:datatype": "cf32_le", "core:version": "1.0.0" },
                "capture": [ { "core:sample_start": 0 }, { "core:sample_start": 2000 } ],
                "annotation": []
            }"#,
        )
        .unwrap();

        let doc = SigMfDocument::open_with_dataset(&path, "rec.sigmf-data", Mode::Full).unwrap();
        assert_eq!(doc.document_bounds().len(), 3);
        assert_eq!(doc.global_bounds().map(|b| b.len()), Some(2));
        assert_eq!(doc.capture_bounds().map(|b| b.len()), Some(2));
        assert_eq!(doc.annotation_bounds(), Some(SectionBounds { begin: 0, end: 0 }));
        assert_eq!(doc.capture_entries()[1]["core:sample_start"], 2000);
        assert_eq!(doc.dataset_path(), Some(Path::new("rec.sigmf-data")));
    }

    #[test]
    fn test_mode_mismatch_is_structural() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rec.sigmf-meta");
        fs::write(&path, r#"{ "capture": [], "annotation": [] }"#).unwrap();

        let err = SigMfDocument::open(&path, Mode::CaptureOnly).unwrap_err();
        assert!(matches!(err, SigMfError::Structural(_)));

        // A subset of the permitted members is accepted
        assert!(SigMfDocument::open(&path, Mode::Full).is_ok());
    }

    #[test]
    fn test_wrong_section_type_is_structural() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rec.sigmf-meta");
        fs::write(&path, r#"{ "capture": {} }"#).unwrap();

        let err = SigMfDocument::open(&path, Mode::Full).unwrap_err();
        assert!(matches!(err, SigMfError::Structural(_)));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rec.sigmf-meta");
        fs::write(&path, r#"{ "capture": [ "#).unwrap();

        let err = SigMfDocument::open(&path, Mode::Full).unwrap_err();
        assert!(matches!(err, SigMfError::Parse(_)));
    }

    #[test]
    fn test_top_level_array_is_structural() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rec.sigmf-meta");
        fs::write(&path, "[]").unwrap();

        let err = SigMfDocument::open(&path, Mode::Full).unwrap_err();
        assert!(matches!(err, SigMfError::Structural(_)));
    }

    #[test]
    fn test_mode_serde_names() {
        let mode: Mode = serde_json::from_str("\"capture_only\"").unwrap();
        assert_eq!(mode, Mode::CaptureOnly);
        assert_eq!(Mode::AnnotationOnly.to_string(), "annotation_only");
    }
}
