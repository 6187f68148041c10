//! Block-level error types

use r4w_sigmf::SigMfError;
use thiserror::Error;

/// Result type for block construction
pub type BlockResult<T> = Result<T, BlockError>;

/// Recorder configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read or write a configuration file
    #[error("failed to read config: {0}")]
    ReadError(String),

    /// YAML could not be parsed or rendered
    #[error("failed to parse config: {0}")]
    ParseError(String),

    /// Values are inconsistent
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Errors raised while setting up or running the SigMF blocks
#[derive(Error, Debug)]
pub enum BlockError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    SigMf(#[from] SigMfError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = BlockError::from(ConfigError::ValidationError("tag keys must be distinct".into()));
        assert_eq!(err.to_string(), "invalid config: tag keys must be distinct");

        let err = BlockError::from(SigMfError::QueueUnderflow { offset: 7 });
        assert!(matches!(err, BlockError::SigMf(SigMfError::QueueUnderflow { offset: 7 })));
    }
}
