//! Page-space geometry shared by the scanner, compositor and renderers.
//!
//! All coordinates are PDF user-space points with the origin at the bottom-left
//! of the page and y growing upwards.

use std::fmt;

/// Axis-aligned rectangle stored as its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl Rect {
    /// Builds a rectangle from two opposite corners in any order.
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { llx: x0.min(x1), lly: y0.min(y1), urx: x0.max(x1), ury: y0.max(y1) }
    }

    /// Reads a four-number PDF rectangle array (`[x0 y0 x1 y1]`), normalizing corner order.
    pub fn from_pdf_array(values: &[f32]) -> Option<Self> {
        match values {
            [x0, y0, x1, y1] => Some(Self::from_corners(*x0, *y0, *x1, *y1)),
            _ => None,
        }
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {} {}]", self.llx, self.lly, self.urx, self.ury)
    }
}

/// One `/QuadPoints` quadrilateral of a highlight, reduced to its axis-aligned bounds.
///
/// Skewed quadrilaterals (rotated text) are flattened to their bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadRegion {
    pub bounds: Rect,
}

impl QuadRegion {
    pub const COORDINATES: usize = 8;

    /// Reduces eight quad coordinates (`x1 y1 .. x4 y4`) to a region.
    ///
    /// Writers disagree on corner order (Acrobat emits upper-left, upper-right,
    /// lower-left, lower-right), so the bounds are the extremes of all four corners.
    pub fn from_quad(coords: &[f32; 8]) -> Self {
        let xs = [coords[0], coords[2], coords[4], coords[6]];
        let ys = [coords[1], coords[3], coords[5], coords[7]];
        let llx = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let urx = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let lly = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let ury = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Self { bounds: Rect { llx, lly, urx, ury } }
    }

    pub fn width(&self) -> f32 {
        self.bounds.width()
    }

    pub fn height(&self) -> f32 {
        self.bounds.height()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const US_LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_normalizes_swapped_corners() {
        let rect = Rect::from_pdf_array(&[110.0, 70.0, 10.0, 50.0]).expect("four numbers");

        assert_eq!(rect, Rect { llx: 10.0, lly: 50.0, urx: 110.0, ury: 70.0 });
        assert_eq!(rect.width(), 100.0);
        assert_eq!(rect.height(), 20.0);
    }

    #[test]
    fn rect_rejects_wrong_arity() {
        assert!(Rect::from_pdf_array(&[0.0, 0.0, 1.0]).is_none());
    }

    #[test]
    fn quad_in_acrobat_order_keeps_lower_left_and_upper_right() {
        // upper-left, upper-right, lower-left, lower-right
        let quad = QuadRegion::from_quad(&[10.0, 60.0, 90.0, 60.0, 10.0, 50.0, 90.0, 50.0]);

        assert_eq!(quad.bounds, Rect { llx: 10.0, lly: 50.0, urx: 90.0, ury: 60.0 });
    }

    #[test]
    fn quad_in_counter_clockwise_order_gives_same_bounds() {
        let quad = QuadRegion::from_quad(&[10.0, 50.0, 90.0, 50.0, 90.0, 60.0, 10.0, 60.0]);

        assert_eq!(quad.width(), 80.0);
        assert_eq!(quad.height(), 10.0);
    }

    #[test]
    fn skewed_quad_is_flattened_to_its_bounding_box() {
        // rotated line: no corner sits at the box's lower-left or upper-right
        let quad = QuadRegion::from_quad(&[12.0, 64.0, 90.0, 58.0, 10.0, 52.0, 88.0, 46.0]);

        assert_eq!(quad.bounds, Rect { llx: 10.0, lly: 46.0, urx: 90.0, ury: 64.0 });
    }
}
