//! Rendering of surviving boxes onto a frame.

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::frame::Frame;
use crate::geometry::BoundingBox;

/// Box rendering options. Defaults match the original annotator: green,
/// one pixel.
#[derive(Clone, Copy, Debug)]
pub struct BoxStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            color: Rgb([0, 255, 0]),
            thickness: 1,
        }
    }
}

/// Draw one hollow rectangle onto the frame, thickened inward.
///
/// Degenerate boxes and boxes entirely outside the frame are skipped.
pub fn draw_box(frame: &mut Frame, bbox: &BoundingBox, style: &BoxStyle) {
    for inset in 0..style.thickness.max(1) {
        let x = bbox.x + inset as i32;
        let y = bbox.y + inset as i32;
        let Some(w) = bbox.w.checked_sub(2 * inset).filter(|w| *w > 0) else {
            break;
        };
        let Some(h) = bbox.h.checked_sub(2 * inset).filter(|h| *h > 0) else {
            break;
        };
        draw_hollow_rect_mut(frame, Rect::at(x, y).of_size(w, h), style.color);
    }
}
