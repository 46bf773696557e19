//! Cascade-classifier backend.
//!
//! A stage cascade over integral-image rectangle features, scanned
//! multi-scale like the gradient backend. The model artifact is a JSON
//! cascade description:
//!
//! ```json
//! {
//!   "window": [24, 24],
//!   "stages": [
//!     { "threshold": 1.0,
//!       "features": [
//!         { "rects": [ { "x": 0, "y": 0, "w": 24, "h": 12, "weight": 1.0 },
//!                      { "x": 0, "y": 12, "w": 24, "h": 12, "weight": -1.0 } ],
//!           "threshold": 40.0, "left": -0.5, "right": 0.8 }
//!       ] }
//!   ]
//! }
//! ```
//!
//! A feature's value is the weighted sum of mean gray levels over its
//! rectangles. Windows are evaluated with reject levels enabled: a window
//! that clears every stage gets a continuous score (its margin over the
//! final stage threshold), not merely pass/fail.

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;
use serde::Deserialize;

use super::detector::{Detector, ScanParams};
use super::scan::{pad_raster, window_to_frame};
use crate::error::DetectError;
use crate::frame::{to_gray, Frame};
use crate::geometry::Detection;

#[derive(Debug, Deserialize)]
struct CascadeModelFile {
    window: (u32, u32),
    stages: Vec<Stage>,
}

#[derive(Debug, Deserialize)]
struct Stage {
    threshold: f32,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    rects: Vec<FeatureRect>,
    threshold: f32,
    left: f32,
    right: f32,
}

#[derive(Debug, Deserialize)]
struct FeatureRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    weight: f32,
}

/// Multi-scale cascade detector with reject-level scores.
#[derive(Debug)]
pub struct CascadeDetector {
    window: (u32, u32),
    stages: Vec<Stage>,
    threshold: f32,
    scan: ScanParams,
}

impl CascadeDetector {
    pub fn new(
        model_path: &Path,
        confidence_threshold: f32,
        scan: ScanParams,
    ) -> Result<Self, DetectError> {
        scan.validate()?;
        let raw = fs::read_to_string(model_path)
            .map_err(|e| DetectError::model_load(model_path, e))?;
        let model: CascadeModelFile = serde_json::from_str(&raw)
            .map_err(|e| DetectError::model_load(model_path, e))?;

        if model.window.0 == 0 || model.window.1 == 0 {
            return Err(DetectError::model_load(model_path, "zero window size"));
        }
        if model.stages.is_empty() {
            return Err(DetectError::model_load(model_path, "cascade has no stages"));
        }
        for stage in &model.stages {
            for feature in &stage.features {
                for rect in &feature.rects {
                    if rect.w == 0
                        || rect.h == 0
                        || rect.x + rect.w > model.window.0
                        || rect.y + rect.h > model.window.1
                    {
                        return Err(DetectError::model_load(
                            model_path,
                            format!(
                                "feature rect {}x{}+{}+{} exceeds the {}x{} window",
                                rect.w, rect.h, rect.x, rect.y, model.window.0, model.window.1
                            ),
                        ));
                    }
                }
            }
        }

        Ok(Self {
            window: model.window,
            stages: model.stages,
            threshold: confidence_threshold,
            scan,
        })
    }

    /// Evaluate one window. `None` means a stage rejected it; `Some(score)`
    /// is the margin over the final stage threshold.
    fn evaluate_window(&self, integral: &IntegralImage, wx: u32, wy: u32) -> Option<f32> {
        let mut score = 0.0;
        for stage in &self.stages {
            let mut sum = 0.0;
            for feature in &stage.features {
                let mut value = 0.0;
                for rect in &feature.rects {
                    let mean = integral.mean(wx + rect.x, wy + rect.y, rect.w, rect.h);
                    value += rect.weight * mean;
                }
                sum += if value < feature.threshold {
                    feature.left
                } else {
                    feature.right
                };
            }
            if sum < stage.threshold {
                return None;
            }
            score = sum - stage.threshold;
        }
        Some(score)
    }
}

impl Detector for CascadeDetector {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let gray = to_gray(frame);
        let (frame_w, frame_h) = frame.dimensions();
        let (win_w, win_h) = self.window;
        let (pad_x, pad_y) = self.scan.padding;
        let (stride_x, stride_y) = self.scan.window_stride;

        let mut detections = Vec::new();
        let mut scale = 1.0f32;
        loop {
            let scaled_w = (frame_w as f32 / scale).round() as u32;
            let scaled_h = (frame_h as f32 / scale).round() as u32;
            if scaled_w == 0 || scaled_h == 0 {
                break;
            }
            if scaled_w + 2 * pad_x < win_w || scaled_h + 2 * pad_y < win_h {
                break;
            }

            let scaled = if scale == 1.0 {
                gray.clone()
            } else {
                image::imageops::resize(&gray, scaled_w, scaled_h, FilterType::Triangle)
            };
            let padded = pad_raster(&scaled, pad_x, pad_y);
            let integral = IntegralImage::build(&padded);
            let (padded_w, padded_h) = padded.dimensions();

            let mut wy = 0;
            while wy + win_h <= padded_h {
                let mut wx = 0;
                while wx + win_w <= padded_w {
                    if let Some(score) = self.evaluate_window(&integral, wx, wy) {
                        if score > self.threshold {
                            let bbox = window_to_frame(
                                (wx, wy),
                                (win_w, win_h),
                                (pad_x, pad_y),
                                scale,
                                (frame_w, frame_h),
                            );
                            detections.push(Detection {
                                bbox,
                                confidence: score,
                            });
                        }
                    }
                    wx += stride_x;
                }
                wy += stride_y;
            }

            scale *= self.scan.scale_factor;
        }

        log::debug!("cascade scan produced {} detections", detections.len());
        Ok(detections)
    }
}

/// Summed-area table over a gray raster.
struct IntegralImage {
    width: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn build(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let width = w as usize + 1;
        let height = h as usize + 1;
        let mut sums = vec![0u64; width * height];
        for y in 0..h as usize {
            let mut row = 0u64;
            for x in 0..w as usize {
                row += gray.get_pixel(x as u32, y as u32)[0] as u64;
                sums[(y + 1) * width + (x + 1)] = sums[y * width + (x + 1)] + row;
            }
        }
        Self { width, sums }
    }

    fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        let a = self.sums[y * self.width + x];
        let b = self.sums[y * self.width + (x + w)];
        let c = self.sums[(y + h) * self.width + x];
        let d = self.sums[(y + h) * self.width + (x + w)];
        d + a - b - c
    }

    fn mean(&self, x: u32, y: u32, w: u32, h: u32) -> f32 {
        self.rect_sum(x, y, w, h) as f32 / (w as f32 * h as f32)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_cascade(body: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.to_string().as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    /// One stage, one full-window feature: bright windows pass with
    /// margin 1.0, dark windows are rejected.
    fn brightness_cascade() -> serde_json::Value {
        serde_json::json!({
            "window": [4, 4],
            "stages": [
                { "threshold": 1.0,
                  "features": [
                      { "rects": [ { "x": 0, "y": 0, "w": 4, "h": 4, "weight": 1.0 } ],
                        "threshold": 128.0, "left": 0.0, "right": 2.0 }
                  ] }
            ]
        })
    }

    fn coarse_scan() -> ScanParams {
        ScanParams {
            window_stride: (4, 4),
            // a huge pyramid step keeps the scan to a single scale
            scale_factor: 100.0,
            padding: (0, 0),
        }
    }

    fn solid_frame(w: u32, h: u32, value: u8) -> Frame {
        Frame::from_pixel(w, h, image::Rgb([value, value, value]))
    }

    #[test]
    fn corrupt_artifact_is_model_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        file.flush().unwrap();
        let err = CascadeDetector::new(file.path(), 0.0, ScanParams::default()).unwrap_err();
        assert!(matches!(err, DetectError::ModelLoad { .. }));
    }

    #[test]
    fn empty_cascade_is_model_load_error() {
        let model = write_cascade(serde_json::json!({ "window": [4, 4], "stages": [] }));
        let err = CascadeDetector::new(model.path(), 0.0, ScanParams::default()).unwrap_err();
        assert!(matches!(err, DetectError::ModelLoad { .. }));
    }

    #[test]
    fn out_of_window_rect_is_model_load_error() {
        let model = write_cascade(serde_json::json!({
            "window": [4, 4],
            "stages": [
                { "threshold": 0.0,
                  "features": [
                      { "rects": [ { "x": 2, "y": 0, "w": 4, "h": 4, "weight": 1.0 } ],
                        "threshold": 0.0, "left": 0.0, "right": 1.0 }
                  ] }
            ]
        }));
        let err = CascadeDetector::new(model.path(), 0.0, ScanParams::default()).unwrap_err();
        assert!(matches!(err, DetectError::ModelLoad { .. }));
    }

    #[test]
    fn zero_stride_is_rejected_at_construction() {
        let model = write_cascade(brightness_cascade());
        let scan = ScanParams {
            window_stride: (4, 0),
            ..ScanParams::default()
        };
        let err = CascadeDetector::new(model.path(), 0.0, scan).unwrap_err();
        assert!(matches!(err, DetectError::Configuration(_)));
    }

    #[test]
    fn bright_windows_pass_with_margin() {
        let model = write_cascade(brightness_cascade());
        let mut detector = CascadeDetector::new(model.path(), 0.0, coarse_scan()).unwrap();

        let detections = detector.detect(&solid_frame(8, 8, 255)).unwrap();
        // 2x2 grid of non-overlapping windows at the single scan scale
        assert_eq!(detections.len(), 4);
        for d in &detections {
            assert!((d.confidence - 1.0).abs() < 1e-5);
            assert_eq!((d.bbox.w, d.bbox.h), (4, 4));
        }
    }

    #[test]
    fn dark_windows_are_rejected() {
        let model = write_cascade(brightness_cascade());
        let mut detector = CascadeDetector::new(model.path(), 0.0, coarse_scan()).unwrap();
        assert!(detector.detect(&solid_frame(8, 8, 0)).unwrap().is_empty());
    }

    #[test]
    fn confidence_filter_is_strict() {
        let model = write_cascade(brightness_cascade());
        // passing windows score exactly 1.0; a threshold of 1.0 must drop them
        let mut detector = CascadeDetector::new(model.path(), 1.0, coarse_scan()).unwrap();
        assert!(detector.detect(&solid_frame(8, 8, 255)).unwrap().is_empty());

        let mut detector = CascadeDetector::new(model.path(), 0.99, coarse_scan()).unwrap();
        assert!(!detector.detect(&solid_frame(8, 8, 255)).unwrap().is_empty());
    }

    #[test]
    fn black_frame_with_high_threshold_yields_nothing() {
        let model = write_cascade(brightness_cascade());
        let mut detector =
            CascadeDetector::new(model.path(), 1.0e9, ScanParams::default()).unwrap();
        assert!(detector.detect(&solid_frame(200, 200, 0)).unwrap().is_empty());
    }

    #[test]
    fn integral_image_rect_sums() {
        let mut gray = GrayImage::new(3, 2);
        // row 0: 1 2 3 / row 1: 4 5 6
        for (i, p) in gray.pixels_mut().enumerate() {
            *p = image::Luma([(i + 1) as u8]);
        }
        let integral = IntegralImage::build(&gray);
        assert_eq!(integral.rect_sum(0, 0, 3, 2), 21);
        assert_eq!(integral.rect_sum(1, 0, 2, 1), 5);
        assert_eq!(integral.rect_sum(2, 1, 1, 1), 6);
        assert!((integral.mean(0, 1, 3, 1) - 5.0).abs() < 1e-6);
    }
}
