//! Helpers shared by the sliding-window scan backends.

use image::GrayImage;

use crate::geometry::BoundingBox;

/// Map a window position in the padded, scaled raster back to the
/// original frame, clamped to the frame bounds.
pub(super) fn window_to_frame(
    origin: (u32, u32),
    window: (u32, u32),
    padding: (u32, u32),
    scale: f32,
    frame: (u32, u32),
) -> BoundingBox {
    let x = ((origin.0 as i64 - padding.0 as i64) as f32 * scale).round() as i64;
    let y = ((origin.1 as i64 - padding.1 as i64) as f32 * scale).round() as i64;
    let w = (window.0 as f32 * scale).round() as i64;
    let h = (window.1 as f32 * scale).round() as i64;

    let x1 = x.clamp(0, frame.0 as i64);
    let y1 = y.clamp(0, frame.1 as i64);
    let x2 = (x + w).clamp(0, frame.0 as i64);
    let y2 = (y + h).clamp(0, frame.1 as i64);
    BoundingBox {
        x: x1 as i32,
        y: y1 as i32,
        w: (x2 - x1) as u32,
        h: (y2 - y1) as u32,
    }
}

/// Surround a raster with a zero border.
pub(super) fn pad_raster(gray: &GrayImage, pad_x: u32, pad_y: u32) -> GrayImage {
    if pad_x == 0 && pad_y == 0 {
        return gray.clone();
    }
    let (w, h) = gray.dimensions();
    let mut padded = GrayImage::new(w + 2 * pad_x, h + 2 * pad_y);
    image::imageops::replace(&mut padded, gray, pad_x as i64, pad_y as i64);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_offsets_the_raster() {
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(0, 0, image::Luma([200]));
        let padded = pad_raster(&gray, 3, 1);
        assert_eq!(padded.dimensions(), (8, 4));
        assert_eq!(padded.get_pixel(3, 1)[0], 200);
        assert_eq!(padded.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn window_mapping_clamps_to_frame() {
        // window starts inside the left padding and extends past the frame
        let b = window_to_frame((0, 0), (16, 16), (8, 8), 1.0, (12, 12));
        let c = b.corners();
        assert!(c.x1 >= 0 && c.y1 >= 0 && c.x2 <= 12 && c.y2 <= 12);

        // upscaled window maps back through the pyramid scale
        let b = window_to_frame((4, 4), (16, 16), (0, 0), 2.0, (100, 100));
        assert_eq!(b, BoundingBox::new(8, 8, 32, 32));
    }
}
