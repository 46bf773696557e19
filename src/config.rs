//! Run configuration.
//!
//! A run is described by a JSON file. Optional fields fall back to the
//! documented defaults; `capture_path` and `output_folder` are mandatory,
//! and a video run additionally requires a resolution. All validation
//! happens here, before any frame is processed; the rest of the crate
//! only sees already-defaulted values.

use std::path::{Path, PathBuf};

use image::Rgb;
use serde::Deserialize;

use crate::annotate::BoxStyle;
use crate::detect::{BackendKind, DetectorConfig, ScanParams};
use crate::error::DetectError;
use crate::stream::FrameRange;

const DEFAULT_BACKEND: BackendKind = BackendKind::Rcnn;
const DEFAULT_PERSON_CLASS_ID: i64 = 1;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.0;
const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.3;
const DEFAULT_BOX_COLOR: [u8; 3] = [0, 255, 0];
const DEFAULT_BOX_THICKNESS: u32 = 1;

#[derive(Debug, Default, Deserialize)]
struct RunConfigFile {
    capture_path: Option<PathBuf>,
    output_folder: Option<PathBuf>,
    detector: Option<DetectorFile>,
    thresholds: Option<ThresholdsFile>,
    /// `[w, h]`; an empty array means "keep the native size".
    resolution: Option<Vec<u32>>,
    frames: Option<FramesFile>,
    box_color: Option<[u8; 3]>,
    box_thickness: Option<u32>,
    logging: Option<LoggingFile>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectorFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    person_class_id: Option<i64>,
    scan: Option<ScanParams>,
}

#[derive(Debug, Default, Deserialize)]
struct ThresholdsFile {
    confidence: Option<f32>,
    overlap: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct FramesFile {
    min: Option<u64>,
    /// Negative means "to the end of the stream".
    max: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingFile {
    console: Option<bool>,
}

/// Validated, defaulted run configuration.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub capture_path: PathBuf,
    pub output_folder: PathBuf,
    pub backend: BackendKind,
    pub model_path: PathBuf,
    pub person_class_id: i64,
    pub scan: ScanParams,
    pub confidence_threshold: f32,
    pub overlap_threshold: f32,
    pub resolution: Option<(u32, u32)>,
    pub frames: FrameRange,
    pub style: BoxStyle,
    pub log_console: bool,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, DetectError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DetectError::Configuration(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let file: RunConfigFile = serde_json::from_str(&raw).map_err(|e| {
            DetectError::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })?;
        Self::from_file(file)
    }

    fn from_file(file: RunConfigFile) -> Result<Self, DetectError> {
        let capture_path = file
            .capture_path
            .ok_or_else(|| DetectError::Configuration("you must provide 'capture_path'".into()))?;
        let output_folder = file
            .output_folder
            .ok_or_else(|| DetectError::Configuration("you must provide 'output_folder'".into()))?;

        let detector = file.detector.unwrap_or_default();
        let backend = match detector.backend.as_deref() {
            Some(id) => id.parse()?,
            None => DEFAULT_BACKEND,
        };
        let model_path = detector.model_path.ok_or_else(|| {
            DetectError::Configuration("you must provide 'detector.model_path'".into())
        })?;
        let scan = detector.scan.unwrap_or_default();
        scan.validate()?;

        let thresholds = file.thresholds.unwrap_or_default();
        let frames = file.frames.unwrap_or_default();

        Ok(Self {
            capture_path,
            output_folder,
            backend,
            model_path,
            person_class_id: detector.person_class_id.unwrap_or(DEFAULT_PERSON_CLASS_ID),
            scan,
            confidence_threshold: thresholds
                .confidence
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            overlap_threshold: thresholds.overlap.unwrap_or(DEFAULT_OVERLAP_THRESHOLD),
            resolution: parse_resolution(file.resolution)?,
            frames: FrameRange {
                min: frames.min.unwrap_or(0),
                max: frames.max.and_then(|max| u64::try_from(max).ok()),
            },
            style: BoxStyle {
                color: Rgb(file.box_color.unwrap_or(DEFAULT_BOX_COLOR)),
                thickness: file.box_thickness.unwrap_or(DEFAULT_BOX_THICKNESS),
            },
            log_console: file.logging.and_then(|l| l.console).unwrap_or(true),
        })
    }

    /// A video run cannot fall back to a native size; the resolution is
    /// mandatory there.
    pub fn require_resolution(&self) -> Result<(u32, u32), DetectError> {
        self.resolution.ok_or_else(|| {
            DetectError::Configuration(
                "you must provide a resolution for video detection".into(),
            )
        })
    }

    /// Backend parameters for this run, planned for the given frame size.
    pub fn detector_config(&self, input_size: (u32, u32)) -> DetectorConfig {
        DetectorConfig {
            kind: self.backend,
            model_path: self.model_path.clone(),
            confidence_threshold: self.confidence_threshold,
            scan: self.scan,
            person_class_id: self.person_class_id,
            input_size,
        }
    }
}

fn parse_resolution(value: Option<Vec<u32>>) -> Result<Option<(u32, u32)>, DetectError> {
    match value.as_deref() {
        None | Some([]) => Ok(None),
        Some(&[w, h]) if w > 0 && h > 0 => Ok(Some((w, h))),
        Some(other) => Err(DetectError::Configuration(format!(
            "resolution must be [width, height] with non-zero values, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_json(body: serde_json::Value) -> Result<RunConfig, DetectError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.to_string().as_bytes()).unwrap();
        file.flush().unwrap();
        RunConfig::load(file.path())
    }

    fn minimal() -> serde_json::Value {
        serde_json::json!({
            "capture_path": "in.jpg",
            "output_folder": "out",
            "detector": { "model_path": "model.onnx" }
        })
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = load_json(minimal()).unwrap();
        assert_eq!(cfg.backend, BackendKind::Rcnn);
        assert_eq!(cfg.person_class_id, 1);
        assert_eq!(cfg.confidence_threshold, 0.0);
        assert_eq!(cfg.overlap_threshold, 0.3);
        assert_eq!(cfg.resolution, None);
        assert_eq!(cfg.frames.min, 0);
        assert_eq!(cfg.frames.max, None);
        assert_eq!(cfg.style.color, Rgb([0, 255, 0]));
        assert_eq!(cfg.style.thickness, 1);
        assert!(cfg.log_console);
        assert_eq!(cfg.scan, ScanParams::default());
    }

    #[test]
    fn missing_mandatory_fields_fail() {
        let err = load_json(serde_json::json!({ "output_folder": "out" })).unwrap_err();
        assert!(matches!(err, DetectError::Configuration(_)));
        assert!(err.to_string().contains("capture_path"));

        let err = load_json(serde_json::json!({
            "capture_path": "in.jpg",
            "output_folder": "out"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("model_path"));
    }

    #[test]
    fn full_config_round_trips() {
        let cfg = load_json(serde_json::json!({
            "capture_path": "clip.mp4",
            "output_folder": "out",
            "detector": {
                "backend": "cascade",
                "model_path": "cascade.json",
                "scan": { "window_stride": [4, 4], "scale_factor": 1.2 }
            },
            "thresholds": { "confidence": 0.6, "overlap": 0.45 },
            "resolution": [640, 480],
            "frames": { "min": 5, "max": 120 },
            "box_color": [255, 0, 0],
            "box_thickness": 2,
            "logging": { "console": false }
        }))
        .unwrap();

        assert_eq!(cfg.backend, BackendKind::Cascade);
        assert_eq!(cfg.confidence_threshold, 0.6);
        assert_eq!(cfg.overlap_threshold, 0.45);
        assert_eq!(cfg.resolution, Some((640, 480)));
        assert_eq!(cfg.frames.min, 5);
        assert_eq!(cfg.frames.max, Some(120));
        assert_eq!(cfg.scan.window_stride, (4, 4));
        assert_eq!(cfg.style.color, Rgb([255, 0, 0]));
        assert_eq!(cfg.style.thickness, 2);
        assert!(!cfg.log_console);
    }

    #[test]
    fn negative_frame_max_means_open_ended() {
        let mut body = minimal();
        body["frames"] = serde_json::json!({ "min": 2, "max": -1 });
        let cfg = load_json(body).unwrap();
        assert_eq!(cfg.frames.min, 2);
        assert_eq!(cfg.frames.max, None);
    }

    #[test]
    fn empty_resolution_means_native_size() {
        let mut body = minimal();
        body["resolution"] = serde_json::json!([]);
        let cfg = load_json(body).unwrap();
        assert_eq!(cfg.resolution, None);
        assert!(cfg.require_resolution().is_err());
    }

    #[test]
    fn malformed_resolution_fails() {
        let mut body = minimal();
        body["resolution"] = serde_json::json!([640]);
        assert!(load_json(body).is_err());

        let mut body = minimal();
        body["resolution"] = serde_json::json!([640, 0]);
        assert!(load_json(body).is_err());
    }

    #[test]
    fn unknown_scan_keys_are_rejected() {
        let mut body = minimal();
        body["detector"]["scan"] = serde_json::json!({ "hit_threshold": 0.5 });
        let err = load_json(body).unwrap_err();
        assert!(matches!(err, DetectError::Configuration(_)));
    }

    #[test]
    fn unknown_backend_fails() {
        let mut body = minimal();
        body["detector"]["backend"] = serde_json::json!("yolo");
        assert!(load_json(body).is_err());
    }
}
