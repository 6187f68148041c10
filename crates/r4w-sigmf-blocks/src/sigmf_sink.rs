//! SigMF Sink: records samples and turns stream tags into SigMF metadata
//!
//! Each `work` call consumes up to `max_items_per_work` samples, appends them
//! to the dataset as `cf32_le` and handles the tags that fall inside the
//! consumed window `[nitems_read, nitems_read + consumed)`:
//!
//! | Tag                | Effect                                           |
//! |--------------------|--------------------------------------------------|
//! | `rx_freq`          | capture at the tag offset                        |
//! | `annotation_start` | opens a region (queued)                          |
//! | `annotation_end`   | closes the oldest region → annotation            |
//! | `annotation`       | capture or annotation described by the payload   |
//!
//! Messages posted to a [`MessageInbox`] are handled like `annotation` tags.
//! Every record is written to the metadata file immediately, so a recording
//! interrupted mid-stream still has metadata for everything seen so far.
//!
//! Unmatched end markers, reversed spans and malformed payloads are logged,
//! counted in [`SinkStats`] and skipped. Only I/O and metadata file errors
//! abort a call.
//!
//! ## Example
//!
//! ```rust,no_run
//! use num_complex::Complex32;
//! use r4w_sigmf_blocks::config::RecorderConfig;
//! use r4w_sigmf_blocks::sigmf_sink::SigMfSink;
//! use r4w_sigmf_blocks::stream_tags::{StreamTag, TagValue, RX_FREQ};
//!
//! let config = RecorderConfig::load()?;
//! let mut sink = SigMfSink::new(&config)?;
//!
//! let samples = vec![Complex32::new(0.0, 0.0); 512];
//! let tags = [StreamTag::new(0, RX_FREQ, TagValue::Float(915e6))];
//! sink.work(&samples, &tags)?;
//! let stats = sink.close()?;
//! assert_eq!(stats.captures_written, 1);
//! # Ok::<(), r4w_sigmf_blocks::error::BlockError>(())
//! ```

use num_complex::Complex32;
use r4w_sigmf::{
    Annotation, Capture, Mode, SigMfError, SigMfResult, SigMfWriter, ANNOTATION_KEY, CAPTURE_KEY,
    GLOBAL_KEY,
};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use tracing::{debug, info, trace, warn};

use crate::aggregator::{
    capture_from_frequency, record_from_payload, AggregatedRecord, AnnotationAggregator,
};
use crate::config::{RecorderConfig, SinkSettings, TagKeys};
use crate::error::BlockResult;
use crate::message_port::{Message, MessageInbox};
use crate::stream_tags::{StreamTag, TagValue};

/// Counters reported by the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub captures_written: u64,
    pub annotations_written: u64,
    /// End markers with no open region
    pub underflows: u64,
    /// End markers preceding their start
    pub invalid_spans: u64,
    /// Tags or messages whose payload could not be turned into a record
    pub rejected: u64,
    /// Tags offered after their sample had already been consumed
    pub late_tags: u64,
}

/// Sample and metadata recorder.
pub struct SigMfSink {
    writer: SigMfWriter,
    keys: TagKeys,
    settings: SinkSettings,
    aggregator: AnnotationAggregator,
    dataset: Option<BufWriter<File>>,
    nitems_read: u64,
    stats: SinkStats,
}

impl std::fmt::Debug for SigMfSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigMfSink")
            .field("metadata", &self.writer.document().metadata_path())
            .field("mode", &self.writer.mode())
            .field("nitems_read", &self.nitems_read)
            .field("pending", &self.aggregator.pending())
            .field("stats", &self.stats)
            .finish()
    }
}

impl SigMfSink {
    /// Open the metadata file, write the global record and open the dataset.
    pub fn new(config: &RecorderConfig) -> BlockResult<Self> {
        config.validate()?;
        let meta = &config.metadata;

        let mut writer = match &meta.dataset_path {
            Some(dataset) => SigMfWriter::with_dataset(&meta.path, dataset, meta.mode)?,
            None => SigMfWriter::new(&meta.path, meta.mode)?,
        };

        if meta.mode.permits(GLOBAL_KEY) {
            writer.append_global(&config.global())?;
        }

        let dataset = match &meta.dataset_path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(SigMfError::from)?;
                Some(BufWriter::new(file))
            }
            None => None,
        };

        info!(
            metadata = %meta.path.display(),
            mode = %meta.mode,
            dataset = dataset.is_some(),
            "SigMF sink ready"
        );

        Ok(Self {
            writer,
            keys: config.tags.clone(),
            settings: config.sink.clone(),
            aggregator: AnnotationAggregator::new(),
            dataset,
            nitems_read: 0,
            stats: SinkStats::default(),
        })
    }

    /// Consume samples and handle the tags inside the consumed window.
    ///
    /// Returns the number of samples consumed.
    pub fn work(&mut self, samples: &[Complex32], tags: &[StreamTag]) -> SigMfResult<usize> {
        let consumed = samples.len().min(self.settings.max_items_per_work);

        if let Some(dataset) = self.dataset.as_mut() {
            for s in &samples[..consumed] {
                dataset.write_all(&s.re.to_le_bytes())?;
                dataset.write_all(&s.im.to_le_bytes())?;
            }
        }

        let window = self.nitems_read..self.nitems_read + consumed as u64;
        let mut in_window = Vec::new();
        for tag in tags {
            if window.contains(&tag.offset) {
                in_window.push(tag);
            } else if tag.offset < window.start {
                self.stats.late_tags += 1;
                warn!(tag = %tag, nitems_read = window.start, "Dropping late tag");
            } else {
                trace!(tag = %tag, "Tag beyond consumed window");
            }
        }
        in_window.sort_by_key(|t| t.offset);

        for tag in in_window {
            self.handle_tag(tag)?;
        }

        self.nitems_read = window.end;
        Ok(consumed)
    }

    /// Handle one stream tag.
    pub fn handle_tag(&mut self, tag: &StreamTag) -> SigMfResult<()> {
        trace!(tag = %tag, "Handling tag");

        if tag.key == self.keys.frequency {
            if !self.mode().permits(CAPTURE_KEY) {
                return Ok(());
            }
            match capture_from_frequency(tag.offset, &tag.value) {
                Ok(capture) => self.write_capture(capture),
                Err(e) => {
                    self.skip(e);
                    Ok(())
                }
            }
        } else if tag.key == self.keys.annotation_start {
            if self.mode().permits(ANNOTATION_KEY) {
                self.aggregator.on_start(tag.offset, tag.value.clone());
            }
            Ok(())
        } else if tag.key == self.keys.annotation_end {
            if !self.mode().permits(ANNOTATION_KEY) {
                return Ok(());
            }
            match self.aggregator.on_end(tag.offset) {
                Ok(annotation) => self.write_annotation(annotation),
                Err(e) => {
                    self.skip(e);
                    Ok(())
                }
            }
        } else if tag.key == self.keys.annotation {
            self.handle_payload(tag.offset, &tag.value)
        } else {
            Ok(())
        }
    }

    /// Handle one pre-aggregated message.
    pub fn handle_message(&mut self, msg: &Message) -> SigMfResult<()> {
        self.handle_payload(msg.offset, &msg.payload)
    }

    /// Handle every message currently waiting in `inbox`.
    ///
    /// Returns the number of messages taken.
    pub fn drain_inbox(&mut self, inbox: &mut MessageInbox) -> SigMfResult<usize> {
        let messages = inbox.drain();
        for msg in &messages {
            self.handle_message(msg)?;
        }
        if !messages.is_empty() {
            debug!(port = inbox.name(), count = messages.len(), "Drained messages");
        }
        Ok(messages.len())
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Absolute offset of the next sample to be consumed.
    pub fn nitems_read(&self) -> u64 {
        self.nitems_read
    }

    /// Regions opened but not yet closed.
    pub fn pending_annotations(&self) -> usize {
        self.aggregator.pending()
    }

    pub fn mode(&self) -> Mode {
        self.writer.mode()
    }

    pub fn writer(&self) -> &SigMfWriter {
        &self.writer
    }

    /// Flush buffered samples to the dataset file.
    pub fn flush(&mut self) -> SigMfResult<()> {
        if let Some(dataset) = self.dataset.as_mut() {
            dataset.flush()?;
        }
        Ok(())
    }

    /// Flush the dataset and finish the recording.
    ///
    /// Regions still open are discarded.
    pub fn close(mut self) -> SigMfResult<SinkStats> {
        for open in self.aggregator.clear() {
            warn!(
                sample_start = open.offset,
                payload = %open.payload,
                "Discarding annotation with no end marker"
            );
        }
        self.flush()?;

        info!(
            samples = self.nitems_read,
            captures = self.stats.captures_written,
            annotations = self.stats.annotations_written,
            "SigMF sink closed"
        );
        Ok(self.stats)
    }

    fn handle_payload(&mut self, offset: u64, payload: &TagValue) -> SigMfResult<()> {
        match record_from_payload(offset, payload) {
            Ok(AggregatedRecord::Capture(capture)) => {
                if self.mode().permits(CAPTURE_KEY) {
                    self.write_capture(capture)?;
                }
                Ok(())
            }
            Ok(AggregatedRecord::Annotation(annotation)) => {
                if self.mode().permits(ANNOTATION_KEY) {
                    self.write_annotation(annotation)?;
                }
                Ok(())
            }
            Err(e) => {
                self.skip(e);
                Ok(())
            }
        }
    }

    fn write_capture(&mut self, mut capture: Capture) -> SigMfResult<()> {
        if self.settings.stamp_capture_datetime && capture.datetime.is_none() {
            capture.set_datetime(&chrono::Utc::now().to_rfc3339());
        }
        self.writer.append_capture(&capture)?;
        self.stats.captures_written += 1;
        debug!(
            sample_start = capture.sample_start,
            frequency = ?capture.frequency,
            "Capture written"
        );
        Ok(())
    }

    fn write_annotation(&mut self, annotation: Annotation) -> SigMfResult<()> {
        self.writer.append_annotation(&annotation)?;
        self.stats.annotations_written += 1;
        debug!(
            sample_start = annotation.sample_start,
            sample_count = annotation.sample_count,
            "Annotation written"
        );
        Ok(())
    }

    fn skip(&mut self, err: SigMfError) {
        match err {
            SigMfError::QueueUnderflow { .. } => self.stats.underflows += 1,
            SigMfError::InvalidSpan { .. } => self.stats.invalid_spans += 1,
            _ => self.stats.rejected += 1,
        }
        warn!(error = %err, "Skipping marker");
    }
}
