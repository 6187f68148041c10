//! SigMF error types

use std::io;
use thiserror::Error;

/// Result type for SigMF metadata operations
pub type SigMfResult<T> = Result<T, SigMfError>;

/// Errors raised while building, writing or reading SigMF metadata
#[derive(Error, Debug)]
pub enum SigMfError {
    /// A top-level member required by the operation or mode is absent,
    /// or one not permitted by the mode is present
    #[error("Structural error: {0}")]
    Structural(String),

    /// The metadata file is not valid JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// A record lacks a field the format requires
    #[error("Required field '{field}' missing from {record}")]
    RequiredFieldMissing {
        record: &'static str,
        field: &'static str,
    },

    /// An annotation end arrived with no pending start
    #[error("Annotation end at sample {offset} has no pending start")]
    QueueUnderflow { offset: u64 },

    /// An annotation end precedes the start it would close
    #[error("Annotation end at sample {end} precedes its start at sample {start}")]
    InvalidSpan { start: u64, end: u64 },

    /// Filesystem error on the metadata or dataset file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SigMfError {
    /// Whether the error must abort the caller.
    ///
    /// Unmatched or reversed annotation markers are skipped by the sink;
    /// everything else propagates.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SigMfError::QueueUnderflow { .. } | SigMfError::InvalidSpan { .. }
        )
    }
}

impl From<serde_json::Error> for SigMfError {
    fn from(e: serde_json::Error) -> Self {
        SigMfError::Parse(e.to_string())
    }
}
