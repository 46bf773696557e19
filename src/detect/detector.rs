use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::DetectError;
use crate::frame::Frame;
use crate::geometry::Detection;

/// Detection backend contract.
///
/// A detector is constructed once (loading its model artifact), reused
/// across frames, and released after the last frame. `detect` must not
/// mutate the caller's frame, and every returned detection carries a
/// confidence strictly greater than the backend's configured threshold.
/// Output order is unspecified.
///
/// Backends are not reentrant; a detector instance must not be shared
/// across threads without external synchronization.
pub trait Detector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError>;

    /// Free backend resources. Must be called exactly once after the last
    /// `detect` call; backends without heavyweight sessions do nothing.
    fn release(&mut self) -> Result<(), DetectError> {
        Ok(())
    }
}

/// Scan parameters for the sliding-window backends.
///
/// This replaces the original free-form parameter pass-through with an
/// explicit structure; unrecognized keys in the configuration are
/// rejected at parse time.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ScanParams {
    /// Window step in pixels, (x, y).
    pub window_stride: (u32, u32),
    /// Pyramid step between scan scales. Must be > 1.
    pub scale_factor: f32,
    /// Zero border added around the scanned raster, (x, y).
    pub padding: (u32, u32),
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            window_stride: (8, 8),
            scale_factor: 1.05,
            padding: (0, 0),
        }
    }
}

impl ScanParams {
    pub(crate) fn validate(&self) -> Result<(), DetectError> {
        if self.scale_factor <= 1.0 {
            return Err(DetectError::Configuration(format!(
                "scan scale_factor must be > 1, got {}",
                self.scale_factor
            )));
        }
        if self.window_stride.0 == 0 || self.window_stride.1 == 0 {
            return Err(DetectError::Configuration(
                "scan window_stride components must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// The closed set of detection backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Hog,
    Cascade,
    Rcnn,
}

impl FromStr for BackendKind {
    type Err = DetectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hog" => Ok(Self::Hog),
            "cascade" => Ok(Self::Cascade),
            "rcnn" => Ok(Self::Rcnn),
            other => Err(DetectError::Configuration(format!(
                "unknown detector backend '{}' (expected hog, cascade or rcnn)",
                other
            ))),
        }
    }
}

/// Backend-specific parameters, immutable once the detector is built.
#[derive(Clone, Debug)]
pub struct DetectorConfig {
    pub kind: BackendKind,
    pub model_path: PathBuf,
    /// Strict lower bound on returned confidences. The scale is
    /// backend-specific.
    pub confidence_threshold: f32,
    pub scan: ScanParams,
    /// Class id the region-proposal model assigns to humans.
    pub person_class_id: i64,
    /// Frame size the region-proposal session is planned for, (w, h).
    pub input_size: (u32, u32),
}

/// Build the configured backend.
pub fn build_detector(config: &DetectorConfig) -> Result<Box<dyn Detector>, DetectError> {
    config.scan.validate()?;
    let detector: Box<dyn Detector> = match config.kind {
        BackendKind::Hog => Box::new(super::hog::HogDetector::new(
            &config.model_path,
            config.confidence_threshold,
            config.scan,
        )?),
        BackendKind::Cascade => Box::new(super::cascade::CascadeDetector::new(
            &config.model_path,
            config.confidence_threshold,
            config.scan,
        )?),
        #[cfg(feature = "backend-tract")]
        BackendKind::Rcnn => Box::new(super::rcnn::RcnnDetector::new(
            &config.model_path,
            config.confidence_threshold,
            config.person_class_id,
            config.input_size,
        )?),
        #[cfg(not(feature = "backend-tract"))]
        BackendKind::Rcnn => {
            return Err(DetectError::Configuration(
                "rcnn backend requires the backend-tract feature".into(),
            ))
        }
    };
    log::info!(
        "detector backend '{}' loaded from {}",
        detector.name(),
        config.model_path.display()
    );
    Ok(detector)
}
