//! # SigMF Blocks
//!
//! Streaming blocks that record SigMF metadata while samples flow:
//!
//! - [`sigmf_sink`]: writes samples to the dataset and turns stream tags and
//!   messages into captures and annotations
//! - [`annotation_tagger`]: pass-through block that emits start/end markers
//! - [`aggregator`]: first-in-first-out pairing of start/end markers
//! - [`stream_tags`], [`message_port`]: the tag and message plumbing
//! - [`config`], [`logging`]: YAML configuration and `tracing` setup
//! - [`error`]: configuration and block errors
//!
//! ## Example
//!
//! ```rust,no_run
//! use num_complex::Complex32;
//! use r4w_sigmf_blocks::{init_logging, AnnotationTagger, RecorderConfig, SigMfSink};
//!
//! let config = RecorderConfig::load()?;
//! init_logging(&config.logging);
//!
//! let mut tagger = AnnotationTagger::new();
//! tagger.set_comment("burst");
//! tagger.set_tag_gate(true);
//!
//! let mut sink = SigMfSink::new(&config)?;
//! let block = tagger.work(&vec![Complex32::new(0.0, 0.0); 1024]);
//! sink.work(&block.samples, &block.tags)?;
//! sink.close()?;
//! # Ok::<(), r4w_sigmf_blocks::BlockError>(())
//! ```

pub mod aggregator;
pub mod annotation_tagger;
pub mod config;
pub mod error;
pub mod logging;
pub mod message_port;
pub mod sigmf_sink;
pub mod stream_tags;

pub use aggregator::{AggregatorState, AnnotationAggregator};
pub use annotation_tagger::{AnnotationTagger, TaggerOutput};
pub use config::RecorderConfig;
pub use error::{BlockError, BlockResult, ConfigError};
pub use logging::{init_logging, LogConfig};
pub use message_port::{message_port, Message, MessageInbox, MessageSender};
pub use sigmf_sink::{SigMfSink, SinkStats};
pub use stream_tags::{StreamTag, TagStore, TagValue};
