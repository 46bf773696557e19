//! Frame sources and sinks for video runs.
//!
//! A source yields a sequential, finite, non-restartable stream of
//! frames; a sink receives annotated frames in order and must be
//! finalized on every exit path. Available sources:
//!
//! - [`FrameDirSource`]: numbered image files in a directory
//! - [`SyntheticSource`]: pre-built frames, for tests
//! - `FfmpegSource` (feature `ingest-ffmpeg`): video container decode

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg;

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[cfg(feature = "ingest-ffmpeg")]
pub use ffmpeg::FfmpegSource;

use crate::frame::{resize_frame, Frame};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Sequential frame stream. `Ok(None)` marks end of stream; a stream is
/// never restarted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Ordered sink for output frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the sink. Runs on all exit paths, error paths
    /// included.
    fn finalize(&mut self) -> Result<()>;
}

/// Frame source over numbered image files in a directory, in file-name
/// order.
pub struct FrameDirSource {
    files: VecDeque<PathBuf>,
    resolution: Option<(u32, u32)>,
}

impl FrameDirSource {
    pub fn new(dir: &Path, resolution: Option<(u32, u32)>) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    })
            })
            .collect();
        files.sort();
        log::info!(
            "frame directory {} holds {} frames",
            dir.display(),
            files.len()
        );
        Ok(Self {
            files: files.into(),
            resolution,
        })
    }
}

impl FrameSource for FrameDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };
        let frame = image::open(&path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        let frame = match self.resolution {
            Some((w, h)) => resize_frame(&frame, w, h),
            None => frame,
        };
        Ok(Some(frame))
    }
}

/// Pre-built frames handed out in order. Test source.
pub struct SyntheticSource {
    frames: VecDeque<Frame>,
}

impl SyntheticSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

/// Writes numbered PNG frames into a directory.
pub struct FrameDirSink {
    dir: PathBuf,
    written: u64,
    finalized: bool,
}

impl FrameDirSink {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
            finalized: false,
        })
    }
}

impl FrameSink for FrameDirSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame
            .save(&path)
            .with_context(|| format!("failed to write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.finalized {
            self.finalized = true;
            log::info!("wrote {} frames to {}", self.written, self.dir.display());
        }
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct CollectSink {
    pub frames: Vec<Frame>,
    pub finalized: bool,
}

impl FrameSink for CollectSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}
