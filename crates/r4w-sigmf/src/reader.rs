//! SigMF metadata reader.
//!
//! Every call parses the whole file; there is no streaming mode. Entries
//! come back in file order.

use std::path::{Path, PathBuf};

use crate::document::{Mode, SigMfDocument};
use crate::error::{SigMfError, SigMfResult};
use crate::record::{Annotation, Capture, Global, SigMfRecord};

/// All records of a metadata file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SigMfMeta {
    pub global: Option<Global>,
    pub captures: Vec<Capture>,
    pub annotations: Vec<Annotation>,
}

/// Reconstructs typed records from a metadata file.
#[derive(Debug, Clone)]
pub struct SigMfReader {
    metadata_path: PathBuf,
    dataset_path: Option<PathBuf>,
    mode: Mode,
}

impl SigMfReader {
    /// Open an existing metadata file.
    pub fn open<P: AsRef<Path>>(metadata_path: P, mode: Mode) -> SigMfResult<Self> {
        let metadata_path = metadata_path.as_ref().to_path_buf();
        if !metadata_path.exists() {
            return Err(SigMfError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", metadata_path.display()),
            )));
        }
        Ok(Self {
            metadata_path,
            dataset_path: None,
            mode,
        })
    }

    /// Open an existing metadata file paired with a dataset file.
    pub fn open_with_dataset<P: AsRef<Path>, Q: AsRef<Path>>(
        metadata_path: P,
        dataset_path: Q,
        mode: Mode,
    ) -> SigMfResult<Self> {
        let mut reader = Self::open(metadata_path, mode)?;
        reader.dataset_path = Some(dataset_path.as_ref().to_path_buf());
        Ok(reader)
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn dataset_path(&self) -> Option<&Path> {
        self.dataset_path.as_deref()
    }

    /// Global record, or `None` if the section is absent or still empty.
    pub fn get_global(&self) -> SigMfResult<Option<Global>> {
        let doc = self.load()?;
        global_of(&doc)
    }

    /// Capture records in file order; empty if the section is absent.
    pub fn get_captures(&self) -> SigMfResult<Vec<Capture>> {
        let doc = self.load()?;
        records_of(doc.capture_entries())
    }

    /// Annotation records in file order; empty if the section is absent.
    pub fn get_annotations(&self) -> SigMfResult<Vec<Annotation>> {
        let doc = self.load()?;
        records_of(doc.annotation_entries())
    }

    /// Captures ordered by `sample_start`; ties keep file order.
    pub fn get_captures_sorted(&self) -> SigMfResult<Vec<Capture>> {
        let mut captures = self.get_captures()?;
        captures.sort_by_key(|c| c.sample_start);
        Ok(captures)
    }

    /// Annotations ordered by `sample_start`; ties keep file order.
    pub fn get_annotations_sorted(&self) -> SigMfResult<Vec<Annotation>> {
        let mut annotations = self.get_annotations()?;
        annotations.sort_by_key(|a| a.sample_start);
        Ok(annotations)
    }

    /// Every record, from a single parse of the file.
    pub fn read_all(&self) -> SigMfResult<SigMfMeta> {
        let doc = self.load()?;
        Ok(SigMfMeta {
            global: global_of(&doc)?,
            captures: records_of(doc.capture_entries())?,
            annotations: records_of(doc.annotation_entries())?,
        })
    }

    fn load(&self) -> SigMfResult<SigMfDocument> {
        match &self.dataset_path {
            Some(data) => SigMfDocument::open_with_dataset(&self.metadata_path, data, self.mode),
            None => SigMfDocument::open(&self.metadata_path, self.mode),
        }
    }
}

fn global_of(doc: &SigMfDocument) -> SigMfResult<Option<Global>> {
    match doc.global_entry() {
        Some(entry) if !entry.is_empty() => {
            Global::from_json(&serde_json::Value::Object(entry.clone())).map(Some)
        }
        _ => Ok(None),
    }
}

fn records_of<T: SigMfRecord>(entries: &[serde_json::Value]) -> SigMfResult<Vec<T>> {
    entries.iter().map(T::from_json).collect()
}
