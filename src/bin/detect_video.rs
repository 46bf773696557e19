//! Video detection run.
//!
//! Streams frames from the capture source, detects and annotates those
//! inside the configured frame range, and writes every frame in order to
//! the output sink. Ctrl-C stops the run between frames; the backend
//! session is released and the sink finalized on every exit path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use humandet::video::{FrameDirSink, FrameDirSource, FrameSource};
use humandet::{build_detector, Frame, FrameProcessor, RunConfig, StreamController};

#[derive(Parser)]
#[command(name = "detect_video", about = "Detect humans in a video stream")]
struct Args {
    /// Path to the JSON run configuration.
    config: PathBuf,
}

/// Source adapter that ticks a progress bar per frame.
struct ProgressSource {
    inner: Box<dyn FrameSource>,
    bar: ProgressBar,
}

impl FrameSource for ProgressSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.inner.next_frame()?;
        if frame.is_some() {
            self.bar.inc(1);
        }
        Ok(frame)
    }
}

fn open_source(cfg: &RunConfig, resolution: (u32, u32)) -> Result<Box<dyn FrameSource>> {
    if cfg.capture_path.is_dir() {
        return Ok(Box::new(FrameDirSource::new(
            &cfg.capture_path,
            Some(resolution),
        )?));
    }
    #[cfg(feature = "ingest-ffmpeg")]
    {
        let path = cfg.capture_path.to_string_lossy();
        Ok(Box::new(humandet::video::FfmpegSource::new(
            &path, resolution,
        )?))
    }
    #[cfg(not(feature = "ingest-ffmpeg"))]
    {
        anyhow::bail!(
            "capture_path {} is not a frame directory; container decode requires the ingest-ffmpeg feature",
            cfg.capture_path.display()
        )
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = RunConfig::load(&args.config)?;
    let resolution = cfg.require_resolution()?;

    let source = open_source(&cfg, resolution)?;
    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {pos} frames {msg}")
            .context("bad progress template")?,
    );
    let mut source = ProgressSource { inner: source, bar };
    let mut sink = FrameDirSink::new(&cfg.output_folder)?;

    let mut detector = build_detector(&cfg.detector_config(resolution))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))
        .context("failed to install Ctrl-C handler")?;

    let controller = StreamController {
        processor: FrameProcessor::new(cfg.overlap_threshold, cfg.style),
        range: cfg.frames,
        log_progress: cfg.log_console,
    };
    let summary = controller.run(&mut source, &mut sink, detector.as_mut(), &cancel)?;

    source.bar.finish_and_clear();
    log::info!(
        "{} frames read, {} processed{}",
        summary.frames_read,
        summary.frames_processed,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}
