#![cfg(feature = "backend-tract")]

//! Region-proposal backend.
//!
//! Runs a frozen detection graph through tract-onnx. The model takes one
//! RGB frame as f32 NCHW in `[0,1]` and yields three tensors per forward
//! pass: box corners normalized to `[0,1]` in `[y1, x1, y2, x2]` order
//! (shape `[1, N, 4]`), confidence scores (`[1, N]`) and class ids
//! (`[1, N]`). Only candidates of the person class above the confidence
//! threshold are kept; their corners are denormalized against the frame,
//! re-ordered (the graph does not guarantee `x1 <= x2`) and clamped.
//!
//! The runnable plan is an exclusive, expensive session over a native
//! execution context. It is acquired at construction and must be released
//! exactly once via [`RcnnDetector::release`], on every exit path of a
//! run; a released detector refuses further `detect` calls instead of
//! returning stale or empty results.

use std::path::Path;

use tract_onnx::prelude::*;

use super::detector::Detector;
use crate::error::DetectError;
use crate::frame::Frame;
use crate::geometry::{BoundingBox, Detection};

type Plan = TypedSimplePlan<TypedModel>;

#[derive(Debug)]
pub struct RcnnDetector {
    plan: Option<Plan>,
    threshold: f32,
    person_class_id: i64,
    input_size: (u32, u32),
}

impl RcnnDetector {
    pub fn new(
        model_path: &Path,
        confidence_threshold: f32,
        person_class_id: i64,
        input_size: (u32, u32),
    ) -> Result<Self, DetectError> {
        let (width, height) = input_size;
        if width == 0 || height == 0 {
            return Err(DetectError::Configuration(
                "rcnn input size must be non-zero".into(),
            ));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| DetectError::model_load(model_path, e))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .map_err(|e| DetectError::model_load(model_path, e))?
            .into_optimized()
            .map_err(|e| DetectError::model_load(model_path, e))?
            .into_runnable()
            .map_err(|e| DetectError::model_load(model_path, e))?;

        Ok(Self {
            plan: Some(plan),
            threshold: confidence_threshold,
            person_class_id,
            input_size,
        })
    }

    /// Test seam: a detector whose session is already gone.
    #[cfg(test)]
    fn released_for_tests(threshold: f32) -> Self {
        Self {
            plan: None,
            threshold,
            person_class_id: 1,
            input_size: (64, 64),
        }
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor, DetectError> {
        let (width, height) = frame.dimensions();
        if (width, height) != self.input_size {
            return Err(DetectError::Inference(format!(
                "frame size {}x{} does not match model input {}x{}",
                width, height, self.input_size.0, self.input_size.1
            )));
        }

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width as usize),
            |(_, channel, y, x)| frame.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }
}

impl Detector for RcnnDetector {
    fn name(&self) -> &'static str {
        "rcnn"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| DetectError::Inference("detector session has been released".into()))?;

        let input = self.build_input(frame)?;
        let outputs = plan
            .run(tvec!(input.into()))
            .map_err(|e| DetectError::Inference(format!("forward pass failed: {e}")))?;

        let (boxes, scores, classes) = extract_outputs(&outputs)?;
        Ok(collect_detections(
            &classes,
            &scores,
            &boxes,
            self.person_class_id,
            self.threshold,
            frame.dimensions(),
        ))
    }

    fn release(&mut self) -> Result<(), DetectError> {
        match self.plan.take() {
            Some(_) => {
                log::info!("rcnn inference session released");
                Ok(())
            }
            None => Err(DetectError::Inference(
                "detector session was already released".into(),
            )),
        }
    }
}

fn extract_outputs(
    outputs: &TVec<TValue>,
) -> Result<(Vec<[f32; 4]>, Vec<f32>, Vec<f32>), DetectError> {
    if outputs.len() < 3 {
        return Err(DetectError::Inference(format!(
            "model produced {} outputs, expected boxes, scores and classes",
            outputs.len()
        )));
    }
    let boxes = outputs[0]
        .to_array_view::<f32>()
        .map_err(|e| DetectError::Inference(format!("box tensor was not f32: {e}")))?;
    let scores = outputs[1]
        .to_array_view::<f32>()
        .map_err(|e| DetectError::Inference(format!("score tensor was not f32: {e}")))?;
    let classes = outputs[2]
        .to_array_view::<f32>()
        .map_err(|e| DetectError::Inference(format!("class tensor was not f32: {e}")))?;

    let shape = boxes.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[2] != 4 {
        return Err(DetectError::Inference(format!(
            "unexpected box tensor shape {:?}",
            shape
        )));
    }
    let n = shape[1];
    if scores.len() != n || classes.len() != n {
        return Err(DetectError::Inference(format!(
            "candidate counts disagree: {} boxes, {} scores, {} classes",
            n,
            scores.len(),
            classes.len()
        )));
    }

    let mut out_boxes = Vec::with_capacity(n);
    for i in 0..n {
        out_boxes.push([
            boxes[[0, i, 0]],
            boxes[[0, i, 1]],
            boxes[[0, i, 2]],
            boxes[[0, i, 3]],
        ]);
    }
    Ok((
        out_boxes,
        scores.iter().copied().collect(),
        classes.iter().copied().collect(),
    ))
}

/// Filter candidates to the person class above the threshold and map their
/// normalized corners into frame pixels.
fn collect_detections(
    classes: &[f32],
    scores: &[f32],
    boxes: &[[f32; 4]],
    person_class_id: i64,
    threshold: f32,
    frame_size: (u32, u32),
) -> Vec<Detection> {
    let mut detections = Vec::new();
    for ((&class, &score), norm) in classes.iter().zip(scores).zip(boxes) {
        if class as i64 != person_class_id || score <= threshold {
            continue;
        }
        detections.push(Detection {
            bbox: denormalize(*norm, frame_size),
            confidence: score,
        });
    }
    detections
}

/// Denormalize `[y1, x1, y2, x2]` corners in `[0,1]` against the frame,
/// repairing corner order and clamping into the frame.
fn denormalize(norm: [f32; 4], frame_size: (u32, u32)) -> BoundingBox {
    let (width, height) = frame_size;
    let y_a = (norm[0].clamp(0.0, 1.0) * height as f32) as i32;
    let x_a = (norm[1].clamp(0.0, 1.0) * width as f32) as i32;
    let y_b = (norm[2].clamp(0.0, 1.0) * height as f32) as i32;
    let x_b = (norm[3].clamp(0.0, 1.0) * width as f32) as i32;

    let x = x_a.min(x_b);
    let y = y_a.min(y_b);
    BoundingBox {
        x,
        y,
        w: (x_a.max(x_b) - x) as u32,
        h: (y_a.max(y_b) - y) as u32,
    }
}
