//! # Incremental SigMF Writer
//!
//! Each append reads the metadata file into a fresh tree, checks that the
//! target section exists, mutates the tree and rewrites the whole file:
//!
//! ```text
//! open → parse → check section → mutate → render → truncate+write → close
//! ```
//!
//! JSON arrays cannot be extended in place inside a text file, so every call
//! rewrites the file. Metadata is small next to the dataset, which keeps
//! the cost acceptable. Nothing is written unless the whole mutation
//! succeeds. The rewrite is not atomic: a crash while writing can leave a
//! truncated file.
//!
//! ## Example
//!
//! ```rust,no_run
//! use r4w_sigmf::{Annotation, Capture, Mode, SigMfWriter};
//!
//! let mut writer = SigMfWriter::new("recording.sigmf-meta", Mode::Full)?;
//! writer.append_capture(&Capture::new(0).with_frequency(1e9))?;
//! writer.append_annotations(&[
//!     Annotation::new(0, 100).with_comment("preamble"),
//!     Annotation::new(100, 150).with_comment("payload"),
//! ])?;
//! # Ok::<(), r4w_sigmf::SigMfError>(())
//! ```

use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

use crate::document::{
    check_members, read_tree, write_tree, Mode, SigMfDocument, ANNOTATION_KEY, CAPTURE_KEY,
    GLOBAL_KEY,
};
use crate::error::{SigMfError, SigMfResult};
use crate::record::{Annotation, Capture, Global, SigMfRecord};

/// Appends SigMF records to a metadata file.
///
/// Only one writer may target a given file at a time; concurrent use from
/// several threads or instances is not supported.
#[derive(Debug)]
pub struct SigMfWriter {
    doc: SigMfDocument,
}

impl SigMfWriter {
    /// Open (or create) a metadata file and write the empty skeleton for
    /// `mode` if the file holds no document yet.
    pub fn new<P: AsRef<Path>>(metadata_path: P, mode: Mode) -> SigMfResult<Self> {
        let doc = SigMfDocument::open(metadata_path, mode)?;
        let mut writer = Self { doc };
        writer.init()?;
        Ok(writer)
    }

    /// Like [`SigMfWriter::new`], recording the paired dataset file name.
    pub fn with_dataset<P: AsRef<Path>, Q: AsRef<Path>>(
        metadata_path: P,
        dataset_path: Q,
        mode: Mode,
    ) -> SigMfResult<Self> {
        let doc = SigMfDocument::open_with_dataset(metadata_path, dataset_path, mode)?;
        let mut writer = Self { doc };
        writer.init()?;
        Ok(writer)
    }

    /// Write the skeleton for the document's mode if the file is empty.
    ///
    /// Returns `true` if the skeleton was written. A file that already holds
    /// a document is left untouched.
    pub fn init(&mut self) -> SigMfResult<bool> {
        let path = self.doc.metadata_path().to_path_buf();
        if let Some(existing) = read_tree(&path)? {
            check_members(&existing, self.doc.mode())?;
            if !existing.is_empty() {
                self.doc.replace_tree(existing)?;
                return Ok(false);
            }
        }

        let skeleton = self.doc.mode().skeleton();
        write_tree(&path, &skeleton)?;
        info!(path = %path.display(), mode = %self.doc.mode(), "Initialized SigMF metadata");
        self.doc.replace_tree(skeleton)?;
        Ok(true)
    }

    /// Replace the global object with `global`.
    pub fn append_global(&mut self, global: &Global) -> SigMfResult<()> {
        let entry = global.to_json()?;
        self.rewrite("append_global", |root| {
            let slot = root
                .get_mut(GLOBAL_KEY)
                .ok_or_else(|| missing_section("append_global", GLOBAL_KEY))?;
            *slot = entry;
            Ok(())
        })
    }

    /// Append one capture segment.
    pub fn append_capture(&mut self, capture: &Capture) -> SigMfResult<()> {
        self.append_captures(std::slice::from_ref(capture))
    }

    /// Append capture segments in order.
    pub fn append_captures(&mut self, captures: &[Capture]) -> SigMfResult<()> {
        let entries = to_entries(captures)?;
        self.rewrite("append_captures", |root| {
            push_entries(root, "append_captures", CAPTURE_KEY, entries)
        })
    }

    /// Append one annotation segment.
    pub fn append_annotation(&mut self, annotation: &Annotation) -> SigMfResult<()> {
        self.append_annotations(std::slice::from_ref(annotation))
    }

    /// Append annotation segments in order.
    pub fn append_annotations(&mut self, annotations: &[Annotation]) -> SigMfResult<()> {
        let entries = to_entries(annotations)?;
        self.rewrite("append_annotations", |root| {
            push_entries(root, "append_annotations", ANNOTATION_KEY, entries)
        })
    }

    /// Write a whole document in one pass, replacing the file contents.
    ///
    /// Meant for first-time construction; requires [`Mode::Full`].
    pub fn complete(
        &mut self,
        global: &Global,
        captures: &[Capture],
        annotations: &[Annotation],
    ) -> SigMfResult<()> {
        if self.doc.mode() != Mode::Full {
            return Err(SigMfError::Structural(format!(
                "complete: requires full mode, document is {}",
                self.doc.mode()
            )));
        }

        let mut tree = Map::new();
        tree.insert(GLOBAL_KEY.to_string(), global.to_json()?);
        tree.insert(CAPTURE_KEY.to_string(), Value::Array(to_entries(captures)?));
        tree.insert(ANNOTATION_KEY.to_string(), Value::Array(to_entries(annotations)?));

        write_tree(self.doc.metadata_path(), &tree)?;
        debug!(
            path = %self.doc.metadata_path().display(),
            captures = captures.len(),
            annotations = annotations.len(),
            "Wrote complete SigMF metadata"
        );
        self.doc.replace_tree(tree)
    }

    /// The document as of the last successful write.
    pub fn document(&self) -> &SigMfDocument {
        &self.doc
    }

    pub fn mode(&self) -> Mode {
        self.doc.mode()
    }

    /// One read-modify-write cycle against the metadata file.
    fn rewrite<F>(&mut self, op: &'static str, mutate: F) -> SigMfResult<()>
    where
        F: FnOnce(&mut Map<String, Value>) -> SigMfResult<()>,
    {
        let path = self.doc.metadata_path().to_path_buf();
        let mut root = read_tree(&path)?.ok_or_else(|| {
            SigMfError::Structural(format!("{}: {} holds no document", op, path.display()))
        })?;
        check_members(&root, self.doc.mode())?;

        mutate(&mut root)?;

        write_tree(&path, &root)?;
        debug!(
            op,
            path = %path.display(),
            captures = section_len(&root, CAPTURE_KEY),
            annotations = section_len(&root, ANNOTATION_KEY),
            "Rewrote SigMF metadata"
        );
        self.doc.replace_tree(root)
    }
}

fn to_entries<T: SigMfRecord>(records: &[T]) -> SigMfResult<Vec<Value>> {
    records.iter().map(T::to_json).collect()
}

fn push_entries(
    root: &mut Map<String, Value>,
    op: &'static str,
    key: &'static str,
    entries: Vec<Value>,
) -> SigMfResult<()> {
    let array = root
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| missing_section(op, key))?;
    array.extend(entries);
    Ok(())
}

fn missing_section(op: &str, key: &str) -> SigMfError {
    SigMfError::Structural(format!("{}: no '{}' member in document", op, key))
}

fn section_len(root: &Map<String, Value>, key: &str) -> usize {
    root.get(key).and_then(Value::as_array).map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_new_writes_skeleton() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");

        let writer = SigMfWriter::new(&path, Mode::Full).unwrap();
        assert_eq!(
            read_json(&path),
            serde_json::json!({ "global": {}, "capture": [], "annotation": [] })
        );
        assert_eq!(writer.document().document_bounds().len(), 3);
    }

    #[test]
    fn test_init_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");

        let mut writer = SigMfWriter::new(&path, Mode::Full).unwrap();
        writer.append_capture(&Capture::new(0).with_frequency(1e9)).unwrap();
        let before = fs::read(&path).unwrap();

        assert!(!writer.init().unwrap());
        assert_eq!(fs::read(&path).unwrap(), before);

        // Reopening an existing document leaves it untouched as well
        let _again = SigMfWriter::new(&path, Mode::Full).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_init_on_blank_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blank.sigmf-meta");
        fs::write(&path, "").unwrap();

        let _writer = SigMfWriter::new(&path, Mode::AnnotationOnly).unwrap();
        assert_eq!(read_json(&path), serde_json::json!({ "annotation": [] }));
    }

    #[test]
    fn test_append_global_replaces_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");
        let mut writer = SigMfWriter::new(&path, Mode::Full).unwrap();

        writer
            .append_global(&Global::new("cf32_le", "1.0.0").with_description("first"))
            .unwrap();
        writer
            .append_global(&Global::new("ci16_le", "1.0.0").with_sample_rate(2.4e6))
            .unwrap();

        let json = read_json(&path);
        assert_eq!(json["global"]["core:datatype"], "ci16_le");
        assert_eq!(json["global"]["core:sample_rate"], 2.4e6);
        assert!(json["global"].get("core:description").is_none());
        assert_eq!(writer.document().global_bounds().map(|b| b.len()), Some(3));
    }

    #[test]
    fn test_append_captures_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");
        let mut writer = SigMfWriter::new(&path, Mode::Full).unwrap();

        writer.append_capture(&Capture::new(0).with_frequency(1e9)).unwrap();
        writer
            .append_captures(&[Capture::new(2000).with_frequency(2e9), Capture::new(1000)])
            .unwrap();

        let json = read_json(&path);
        let starts: Vec<u64> = json["capture"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["core:sample_start"].as_u64().unwrap())
            .collect();
        assert_eq!(starts, vec![0, 2000, 1000]);
        assert_eq!(writer.document().capture_entries().len(), 3);
    }

    #[test]
    fn test_append_to_absent_section_leaves_file_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("captures.sigmf-meta");
        let mut writer = SigMfWriter::new(&path, Mode::CaptureOnly).unwrap();
        writer.append_capture(&Capture::new(0)).unwrap();
        let before = fs::read(&path).unwrap();

        let err = writer.append_annotation(&Annotation::new(0, 10)).unwrap_err();
        assert!(matches!(err, SigMfError::Structural(_)));
        let err = writer.append_global(&Global::new("cf32_le", "1.0.0")).unwrap_err();
        assert!(matches!(err, SigMfError::Structural(_)));

        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_missing_required_field_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");
        let mut writer = SigMfWriter::new(&path, Mode::Full).unwrap();
        let before = fs::read(&path).unwrap();

        let err = writer.append_global(&Global::new("", "1.0.0")).unwrap_err();
        assert!(matches!(err, SigMfError::RequiredFieldMissing { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");
        let mut writer = SigMfWriter::new(&path, Mode::Full).unwrap();

        fs::write(&path, "{ \"capture\": [ ").unwrap();
        let err = writer.append_capture(&Capture::new(0)).unwrap_err();
        assert!(matches!(err, SigMfError::Parse(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ \"capture\": [ ");
    }

    #[test]
    fn test_complete_replaces_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");
        let mut writer = SigMfWriter::with_dataset(&path, "test.sigmf-data", Mode::Full).unwrap();

        writer
            .complete(
                &Global::new("cf32_le", "1.0.0"),
                &[Capture::new(0).with_frequency(915e6)],
                &[Annotation::new(0, 500), Annotation::new(500, 500)],
            )
            .unwrap();

        let json = read_json(&path);
        assert_eq!(json["capture"].as_array().unwrap().len(), 1);
        assert_eq!(json["annotation"][1]["core:sample_start"], 500);
        assert_eq!(writer.document().annotation_entries().len(), 2);
    }

    #[test]
    fn test_complete_requires_full_mode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");
        let mut writer = SigMfWriter::new(&path, Mode::CaptureOnly).unwrap();

        let err = writer
            .complete(&Global::new("cf32_le", "1.0.0"), &[], &[])
            .unwrap_err();
        assert!(matches!(err, SigMfError::Structural(_)));
    }

    #[test]
    fn test_document_tracks_file_after_each_call() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.sigmf-meta");
        let mut writer = SigMfWriter::new(&path, Mode::Full).unwrap();

        for i in 0..5u64 {
            writer.append_annotation(&Annotation::new(i * 10, 10)).unwrap();
            let on_disk = read_json(&path);
            assert_eq!(&Value::Object(writer.document().tree().clone()), &on_disk);
        }
    }
}
