//! Shared value types passed between detectors, the suppressor and the
//! annotation layer.

/// Axis-aligned box in pixel coordinates: upper-left corner plus extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Corner form used by the suppressor. Exact and invertible:
    /// `x2 = x + w`, `y2 = y + h`.
    pub fn corners(&self) -> Corners {
        Corners {
            x1: self.x,
            y1: self.y,
            x2: self.x + self.w as i32,
            y2: self.y + self.h as i32,
        }
    }
}

/// Corner form of a [`BoundingBox`], with `x1 <= x2` and `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Corners {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Corners {
    pub fn to_box(self) -> BoundingBox {
        BoundingBox {
            x: self.x1,
            y: self.y1,
            w: (self.x2 - self.x1) as u32,
            h: (self.y2 - self.y1) as u32,
        }
    }

    pub fn area(&self) -> u64 {
        ((self.x2 - self.x1) as i64 * (self.y2 - self.y1) as i64) as u64
    }

    /// Area of the intersection with `other`, zero when disjoint.
    pub fn intersection_area(&self, other: &Corners) -> u64 {
        let iw = self.x2.min(other.x2) as i64 - self.x1.max(other.x1) as i64;
        let ih = self.y2.min(other.y2) as i64 - self.y1.max(other.y1) as i64;
        if iw <= 0 || ih <= 0 {
            0
        } else {
            (iw * ih) as u64
        }
    }
}

/// One candidate human region with the backend's score for it.
///
/// The confidence scale is backend-specific; it is only meaningful against
/// the threshold of the backend that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_conversion_is_invertible() {
        let b = BoundingBox::new(3, -2, 17, 40);
        let c = b.corners();
        assert_eq!(c.x2, 20);
        assert_eq!(c.y2, 38);
        assert_eq!(c.to_box(), b);
    }

    #[test]
    fn intersection_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0, 0, 10, 10).corners();
        let b = BoundingBox::new(20, 20, 10, 10).corners();
        assert_eq!(a.intersection_area(&b), 0);
        // touching edges do not intersect
        let c = BoundingBox::new(10, 0, 10, 10).corners();
        assert_eq!(a.intersection_area(&c), 0);
    }

    #[test]
    fn intersection_of_nested_boxes_is_inner_area() {
        let outer = BoundingBox::new(0, 0, 100, 100).corners();
        let inner = BoundingBox::new(10, 10, 20, 20).corners();
        assert_eq!(outer.intersection_area(&inner), 400);
        assert_eq!(inner.intersection_area(&outer), 400);
    }
}
