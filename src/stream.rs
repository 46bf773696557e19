//! Video stream orchestration.
//!
//! Applies a [`FrameProcessor`] across a bounded frame range of a source.
//! Frames outside the range skip detection but are still written to the
//! sink in their original order. Whatever way a run ends (end of stream,
//! cancellation or a fatal error), the detector is released and the sink
//! finalized.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::detect::Detector;
use crate::pipeline::FrameProcessor;
use crate::video::{FrameSink, FrameSource};

/// Frame indices on which detection actually runs: `min ..= max`, with an
/// absent `max` meaning "to the end of the stream".
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameRange {
    pub min: u64,
    pub max: Option<u64>,
}

impl FrameRange {
    pub fn contains(&self, index: u64) -> bool {
        index >= self.min && self.max.is_none_or(|max| index <= max)
    }
}

/// What a finished (or aborted) run did.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub cancelled: bool,
}

pub struct StreamController {
    pub processor: FrameProcessor,
    pub range: FrameRange,
    /// Log the frame counter every 10 frames.
    pub log_progress: bool,
}

impl StreamController {
    /// Drive the source to completion.
    ///
    /// The detector is released and the sink finalized on every exit
    /// path, including when the loop fails; a loop error takes precedence
    /// over cleanup errors, which are logged.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        detector: &mut dyn Detector,
        cancel: &AtomicBool,
    ) -> Result<StreamSummary> {
        let result = self.run_loop(source, sink, detector, cancel);

        let released = detector.release();
        let finalized = sink.finalize();

        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                if let Err(cleanup) = released {
                    log::warn!("detector release failed during error cleanup: {cleanup}");
                }
                if let Err(cleanup) = finalized {
                    log::warn!("sink finalize failed during error cleanup: {cleanup}");
                }
                return Err(err);
            }
        };
        released?;
        finalized?;
        Ok(summary)
    }

    fn run_loop(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        detector: &mut dyn Detector,
        cancel: &AtomicBool,
    ) -> Result<StreamSummary> {
        let mut summary = StreamSummary::default();
        loop {
            if cancel.load(Ordering::Relaxed) {
                log::warn!("stream cancelled after {} frames", summary.frames_read);
                summary.cancelled = true;
                return Ok(summary);
            }

            let Some(mut frame) = source.next_frame()? else {
                return Ok(summary);
            };
            let index = summary.frames_read;
            summary.frames_read += 1;

            if self.range.contains(index) {
                self.processor.process(&mut frame, detector)?;
                summary.frames_processed += 1;
            }
            sink.write_frame(&frame)?;

            if self.log_progress && summary.frames_read % 10 == 0 {
                log::info!("   . frame {}", summary.frames_read);
            }
        }
    }
}
