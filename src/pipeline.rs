//! Per-frame orchestration: detect, merge, annotate.

use crate::annotate::{self, BoxStyle};
use crate::detect::Detector;
use crate::error::DetectError;
use crate::frame::Frame;
use crate::geometry::BoundingBox;
use crate::suppress;

/// Runs one frame through a detector, merges the overlapping boxes and
/// draws the survivors onto the frame.
///
/// Holds no per-frame state; the same processor is reused for a single
/// image and for every frame of a video stream, with the same detector
/// instance.
#[derive(Clone, Copy, Debug)]
pub struct FrameProcessor {
    pub overlap_threshold: f32,
    pub style: BoxStyle,
}

impl FrameProcessor {
    pub fn new(overlap_threshold: f32, style: BoxStyle) -> Self {
        Self {
            overlap_threshold,
            style,
        }
    }

    /// Detect, merge and annotate one frame in place. Returns the merged
    /// boxes; per-detection confidences have served their purpose inside
    /// the detector and are discarded here.
    pub fn process(
        &self,
        frame: &mut Frame,
        detector: &mut dyn Detector,
    ) -> Result<Vec<BoundingBox>, DetectError> {
        let detections = detector.detect(frame)?;
        let raw: Vec<BoundingBox> = detections.into_iter().map(|d| d.bbox).collect();
        let merged = suppress::merge(&raw, self.overlap_threshold);
        log::debug!(
            "frame {}x{}: {} raw boxes, {} after merge",
            frame.width(),
            frame.height(),
            raw.len(),
            merged.len()
        );
        for bbox in &merged {
            annotate::draw_box(frame, bbox, &self.style);
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Detection;

    /// Fixed-output detector for pipeline tests.
    pub(crate) struct FixedDetector {
        detections: Vec<Detection>,
        pub calls: usize,
    }

    impl FixedDetector {
        pub(crate) fn new(detections: Vec<Detection>) -> Self {
            Self {
                detections,
                calls: 0,
            }
        }
    }

    impl Detector for FixedDetector {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
            self.calls += 1;
            Ok(self.detections.clone())
        }
    }

    fn detection(x: i32, y: i32, w: u32, h: u32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, y, w, h),
            confidence: 0.9,
        }
    }

    #[test]
    fn overlapping_detections_merge_to_one_annotated_box() {
        let mut detector =
            FixedDetector::new(vec![detection(0, 0, 50, 50), detection(5, 5, 50, 50)]);
        let processor = FrameProcessor::new(0.3, BoxStyle::default());
        let mut frame = Frame::new(100, 100);

        let boxes = processor.process(&mut frame, &mut detector).unwrap();
        assert_eq!(boxes, vec![BoundingBox::new(5, 5, 50, 50)]);
        // the surviving box is drawn, the suppressed one is not
        assert_eq!(*frame.get_pixel(5, 5), image::Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(0, 0), image::Rgb([0, 0, 0]));
    }

    #[test]
    fn empty_detection_set_leaves_frame_untouched() {
        let mut detector = FixedDetector::new(vec![]);
        let processor = FrameProcessor::new(0.3, BoxStyle::default());
        let mut frame = Frame::new(40, 40);
        let before = frame.clone();

        let boxes = processor.process(&mut frame, &mut detector).unwrap();
        assert!(boxes.is_empty());
        assert_eq!(frame, before);
    }

    #[test]
    fn processor_is_reusable_across_frames() {
        let mut detector = FixedDetector::new(vec![detection(1, 1, 5, 5)]);
        let processor = FrameProcessor::new(0.3, BoxStyle::default());
        for _ in 0..3 {
            let mut frame = Frame::new(10, 10);
            let boxes = processor.process(&mut frame, &mut detector).unwrap();
            assert_eq!(boxes.len(), 1);
        }
        assert_eq!(detector.calls, 3);
    }
}
