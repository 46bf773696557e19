//! Gradient-descriptor backend.
//!
//! A linear person classifier over gradient-orientation-histogram window
//! descriptors, scanned multi-scale with a sliding window. The model
//! artifact is a JSON file carrying the trained weight vector and bias:
//!
//! ```json
//! { "window": [64, 128], "bias": -0.3, "weights": [ ... ] }
//! ```
//!
//! The weight length must match the descriptor implied by the window
//! geometry (8x8 cells, 9 unsigned orientation bins, 2x2-cell blocks at
//! single-cell stride).

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

const CELL: u32 = 8;
const BINS: usize = 9;
const BLOCK_EPS: f32 = 1e-6;

#[derive(Debug, Deserialize)]
struct HogModelFile {
    window: (u32, u32),
    bias: f32,
    weights: Vec<f32>,
}

/// Multi-scale sliding-window detector over gradient histograms.
#[derive(Debug)]
pub struct HogDetector {
    window: (u32, u32),
    bias: f32,
    weights: Vec<f32>,
    threshold: f32,
    scan: ScanParams,
}

/// Descriptor length for a window, in f32 values.
fn descriptor_len(window: (u32, u32)) -> Option<usize> {
    let cells_x = window.0 / CELL;
    let cells_y = window.1 / CELL;
    if window.0 % CELL != 0 || window.1 % CELL != 0 || cells_x < 2 || cells_y < 2 {
        return None;
    }
    Some((cells_x as usize - 1) * (cells_y as usize - 1) * 4 * BINS)
}

impl HogDetector {
    pub fn new(
        model_path: &Path,
        confidence_threshold: f32,
        scan: ScanParams,
    ) -> Result<Self, DetectError> {
        scan.validate()?;
        let raw = fs::read_to_string(model_path)
            .map_err(|e| DetectError::model_load(model_path, e))?;
        let model: HogModelFile = serde_json::from_str(&raw)
            .map_err(|e| DetectError::model_load(model_path, e))?;

        let expected = descriptor_len(model.window).ok_or_else(|| {
            DetectError::model_load(
                model_path,
                format!(
                    "window {}x{} is not a multiple of the {}px cell size",
                    model.window.0, model.window.1, CELL
                ),
            )
        })?;
        if model.weights.len() != expected {
            return Err(DetectError::model_load(
                model_path,
                format!(
                    "weight vector has {} values, window {}x{} needs {}",
                    model.weights.len(),
                    model.window.0,
                    model.window.1,
                    expected
                ),
            ));
        }

        Ok(Self {
            window: model.window,
            bias: model.bias,
            weights: model.weights,
            threshold: confidence_threshold,
            scan,
        })
    }

    /// Score one window at cell offset (cx, cy) in the histogram grid.
    fn score_window(&self, grid: &CellGrid, cx: usize, cy: usize) -> f32 {
        let win_cells_x = (self.window.0 / CELL) as usize;
        let win_cells_y = (self.window.1 / CELL) as usize;
        let mut score = self.bias;
        let mut w = self.weights.iter();
        let mut block = [0.0f32; 4 * BINS];
        for by in 0..win_cells_y - 1 {
            for bx in 0..win_cells_x - 1 {
                let mut k = 0;
                for dy in 0..2 {
                    for dx in 0..2 {
                        let cell = grid.cell(cx + bx + dx, cy + by + dy);
                        block[k..k + BINS].copy_from_slice(cell);
                        k += BINS;
                    }
                }
                let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt() + BLOCK_EPS;
                for v in &block {
                    // weight vector length was validated against the window
                    let weight = w.next().copied().unwrap_or(0.0);
                    score += weight * (v / norm);
                }
            }
        }
        score
    }
}

impl Detector for HogDetector {
    fn name(&self) -> &'static str {
        "hog"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let gray = to_gray(frame);
        let (frame_w, frame_h) = frame.dimensions();
        let (win_w, win_h) = self.window;
        let (pad_x, pad_y) = self.scan.padding;
        let stride_cells_x = ((self.scan.window_stride.0 / CELL).max(1)) as usize;
        let stride_cells_y = ((self.scan.window_stride.1 / CELL).max(1)) as usize;
        let win_cells_x = (win_w / CELL) as usize;
        let win_cells_y = (win_h / CELL) as usize;

        let mut detections = Vec::new();
        let mut scale = 1.0f32;
        loop {
            let scaled_w = (frame_w as f32 / scale).round() as u32;
            let scaled_h = (frame_h as f32 / scale).round() as u32;
            if scaled_w < CELL || scaled_h < CELL {
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
            let grid = CellGrid::build(&padded);

            if grid.width >= win_cells_x && grid.height >= win_cells_y {
                let mut cy = 0;
                while cy + win_cells_y <= grid.height {
                    let mut cx = 0;
                    while cx + win_cells_x <= grid.width {
                        let weight = self.score_window(&grid, cx, cy);
                        if weight > self.threshold {
                            let bbox = window_to_frame(
                                (cx as u32 * CELL, cy as u32 * CELL),
                                (win_w, win_h),
                                (pad_x, pad_y),
                                scale,
                                (frame_w, frame_h),
                            );
                            detections.push(Detection {
                                bbox,
                                confidence: weight,
                            });
                        }
                        cx += stride_cells_x;
                    }
                    cy += stride_cells_y;
                }
            }

            scale *= self.scan.scale_factor;
        }

        log::debug!("hog scan produced {} detections", detections.len());
        Ok(detections)
    }
}

/// Per-cell orientation histograms for one raster.
struct CellGrid {
    width: usize,
    height: usize,
    bins: Vec<f32>,
}

impl CellGrid {
    fn build(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let width = (w / CELL) as usize;
        let height = (h / CELL) as usize;
        let mut bins = vec![0.0f32; width * height * BINS];

        let px = |x: i64, y: i64| -> f32 {
            let x = x.clamp(0, w as i64 - 1) as u32;
            let y = y.clamp(0, h as i64 - 1) as u32;
            gray.get_pixel(x, y)[0] as f32
        };

        for y in 0..(height as u32 * CELL) {
            for x in 0..(width as u32 * CELL) {
                let gx = px(x as i64 + 1, y as i64) - px(x as i64 - 1, y as i64);
                let gy = px(x as i64, y as i64 + 1) - px(x as i64, y as i64 - 1);
                let magnitude = (gx * gx + gy * gy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                // unsigned orientation, 9 bins over [0, 180)
                let mut angle = gy.atan2(gx).to_degrees();
                if angle < 0.0 {
                    angle += 180.0;
                }
                if angle >= 180.0 {
                    angle -= 180.0;
                }
                let bin = ((angle / 20.0) as usize).min(BINS - 1);
                let cell_x = (x / CELL) as usize;
                let cell_y = (y / CELL) as usize;
                bins[(cell_y * width + cell_x) * BINS + bin] += magnitude;
            }
        }

        Self {
            width,
            height,
            bins,
        }
    }

    fn cell(&self, cx: usize, cy: usize) -> &[f32] {
        let start = (cy * self.width + cx) * BINS;
        &self.bins[start..start + BINS]
    }
}
