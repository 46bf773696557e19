//! Single-image detection run.
//!
//! Loads one image, runs the configured backend over it, merges the
//! overlapping boxes and writes the annotated result to
//! `<output_folder>/output.jpg`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use humandet::frame::resize_frame;
use humandet::{build_detector, FrameProcessor, RunConfig};

#[derive(Parser)]
#[command(name = "detect_image", about = "Detect humans in a single image")]
struct Args {
    /// Path to the JSON run configuration.
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = RunConfig::load(&args.config)?;

    let mut frame = image::open(&cfg.capture_path)
        .with_context(|| format!("failed to load image {}", cfg.capture_path.display()))?
        .to_rgb8();
    if let Some((width, height)) = cfg.resolution {
        frame = resize_frame(&frame, width, height);
    }

    let mut detector = build_detector(&cfg.detector_config(frame.dimensions()))?;
    let processor = FrameProcessor::new(cfg.overlap_threshold, cfg.style);

    let result = processor.process(&mut frame, detector.as_mut());
    // the backend session is freed whether or not detection succeeded
    let released = detector.release();
    let boxes = result?;
    released?;

    log::info!("{} human(s) found in {}", boxes.len(), cfg.capture_path.display());

    std::fs::create_dir_all(&cfg.output_folder).with_context(|| {
        format!(
            "failed to create output directory {}",
            cfg.output_folder.display()
        )
    })?;
    let output_path = cfg.output_folder.join("output.jpg");
    frame
        .save(&output_path)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    log::info!("annotated image written to {}", output_path.display());

    Ok(())
}
