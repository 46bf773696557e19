//! Frame raster type and the conversions backends perform internally.
//!
//! A frame is an owned three-channel RGB raster. Backends that want a
//! single-channel view convert a copy; the caller's frame is never mutated
//! by `detect`.

use image::imageops::FilterType;
use image::{GrayImage, RgbImage};

/// Three-channel pixel raster with known width and height.
pub type Frame = RgbImage;

/// Grayscale copy of a frame, for the scan backends.
pub fn to_gray(frame: &Frame) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Resize a frame to the target resolution.
pub fn resize_frame(frame: &Frame, width: u32, height: u32) -> Frame {
    if frame.dimensions() == (width, height) {
        return frame.clone();
    }
    image::imageops::resize(frame, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_copy_leaves_frame_untouched() {
        let mut frame = Frame::new(4, 4);
        frame.put_pixel(1, 1, image::Rgb([10, 200, 30]));
        let before = frame.clone();
        let gray = to_gray(&frame);
        assert_eq!(gray.dimensions(), (4, 4));
        assert_eq!(frame, before);
    }

    #[test]
    fn resize_changes_dimensions() {
        let frame = Frame::new(8, 6);
        assert_eq!(resize_frame(&frame, 4, 3).dimensions(), (4, 3));
        assert_eq!(resize_frame(&frame, 8, 6).dimensions(), (8, 6));
    }
}
