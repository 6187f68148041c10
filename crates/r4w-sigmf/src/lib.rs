//! # SigMF Metadata
//!
//! Incremental reading and writing of SigMF (Signal Metadata Format)
//! metadata files: the JSON sidecar that describes a raw sample dataset.
//!
//! ## Layout
//!
//! - [`record`]: `Global`, `Capture` and `Annotation` value types
//! - [`document`]: the parsed file, its [`Mode`] and section bounds
//! - [`writer`]: read-modify-write appends that keep file and tree in step
//! - [`reader`]: typed records back out of a metadata file
//!
//! ## Example
//!
//! ```rust,no_run
//! use r4w_sigmf::{Capture, Global, Mode, SigMfReader, SigMfWriter};
//!
//! let mut writer = SigMfWriter::new("rx.sigmf-meta", Mode::Full)?;
//! writer.append_global(&Global::new("cf32_le", "1.0.0").with_sample_rate(2.4e6))?;
//! writer.append_capture(&Capture::new(0).with_frequency(915e6))?;
//!
//! let reader = SigMfReader::open("rx.sigmf-meta", Mode::Full)?;
//! assert_eq!(reader.get_captures()?.len(), 1);
//! # Ok::<(), r4w_sigmf::SigMfError>(())
//! ```

pub mod document;
pub mod error;
pub mod reader;
pub mod record;
pub mod writer;

pub use document::{Mode, SectionBounds, SigMfDocument, ANNOTATION_KEY, CAPTURE_KEY, GLOBAL_KEY};
pub use error::{SigMfError, SigMfResult};
pub use reader::{SigMfMeta, SigMfReader};
pub use record::{Annotation, Capture, Global, SigMfRecord};
pub use writer::SigMfWriter;

/// SigMF format version written by default.
pub const SIGMF_VERSION: &str = "1.0.0";
