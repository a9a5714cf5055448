//! Conversions between on-screen pixel rectangles and page fractions.
//!
//! Fractions describe a rectangle relative to the full page, so they survive
//! zoom changes and canvas resizes. Pixel rectangles are always relative to
//! the canvas they were measured on (canvas-local, origin top-left).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when both dimensions can be divided by.
    pub fn is_usable(&self) -> bool {
        usable(self.width) && usable(self.height)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Axis-aligned bounding box of two corners, in either drag direction.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let left = a.x.min(b.x);
        let top = a.y.min(b.y);
        Self {
            x: left,
            y: top,
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Both dimensions strictly larger than `min`.
    pub fn exceeds(&self, min: f64) -> bool {
        self.width > min && self.height > min
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Rectangle as fractions of the full page: `x_pct`/`y_pct` locate the top-left
/// corner, `w_pct`/`h_pct` give the extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FractionRect {
    pub x_pct: f64,
    pub y_pct: f64,
    pub w_pct: f64,
    pub h_pct: f64,
}

impl FractionRect {
    pub fn new(x_pct: f64, y_pct: f64, w_pct: f64, h_pct: f64) -> Self {
        Self {
            x_pct,
            y_pct,
            w_pct,
            h_pct,
        }
    }

    /// Non-degenerate: both extents are positive and finite.
    pub fn has_area(&self) -> bool {
        self.w_pct.is_finite() && self.h_pct.is_finite() && self.w_pct > 0.0 && self.h_pct > 0.0
    }
}

fn usable(dimension: f64) -> bool {
    dimension.is_finite() && dimension > 0.0
}

pub fn to_fraction(rect: &PixelRect, canvas: CanvasSize) -> FractionRect {
    if !canvas.is_usable() {
        return FractionRect::default();
    }

    FractionRect {
        x_pct: rect.x / canvas.width,
        y_pct: rect.y / canvas.height,
        w_pct: rect.width / canvas.width,
        h_pct: rect.height / canvas.height,
    }
}

pub fn to_pixels(fraction: &FractionRect, canvas: CanvasSize) -> PixelRect {
    if !canvas.is_usable() {
        return PixelRect::default();
    }

    PixelRect {
        x: fraction.x_pct * canvas.width,
        y: fraction.y_pct * canvas.height,
        width: fraction.w_pct * canvas.width,
        height: fraction.h_pct * canvas.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_close(a: &PixelRect, b: &PixelRect) {
        assert!((a.x - b.x).abs() < EPSILON, "x: {} vs {}", a.x, b.x);
        assert!((a.y - b.y).abs() < EPSILON, "y: {} vs {}", a.y, b.y);
        assert!((a.width - b.width).abs() < EPSILON, "w: {} vs {}", a.width, b.width);
        assert!((a.height - b.height).abs() < EPSILON, "h: {} vs {}", a.height, b.height);
    }

    #[test]
    fn round_trip_restores_pixels() {
        let canvases = [
            CanvasSize::new(300.0, 300.0),
            CanvasSize::new(612.0, 792.0),
            CanvasSize::new(1.5, 2049.25),
        ];
        let rects = [
            PixelRect::new(0.0, 0.0, 1.0, 1.0),
            PixelRect::new(50.0, 50.0, 100.0, 100.0),
            PixelRect::new(13.7, 201.1, 0.3, 55.5),
        ];

        for canvas in canvases {
            for rect in rects {
                let back = to_pixels(&to_fraction(&rect, canvas), canvas);
                assert_close(&back, &rect);
            }
        }
    }

    #[test]
    fn fractions_are_independent_of_zoom() {
        let base = CanvasSize::new(400.0, 600.0);
        let zoomed = base.scaled(1.5);
        let drawn_at_base = PixelRect::new(40.0, 60.0, 80.0, 120.0);
        let drawn_zoomed = PixelRect::new(60.0, 90.0, 120.0, 180.0);

        assert_eq!(
            to_fraction(&drawn_at_base, base),
            to_fraction(&drawn_zoomed, zoomed)
        );
    }

    #[test]
    fn zero_canvas_yields_empty_rects() {
        let rect = PixelRect::new(10.0, 10.0, 50.0, 50.0);
        for canvas in [
            CanvasSize::new(0.0, 300.0),
            CanvasSize::new(300.0, 0.0),
            CanvasSize::new(f64::NAN, 300.0),
            CanvasSize::new(-1.0, 300.0),
        ] {
            let fraction = to_fraction(&rect, canvas);
            assert!(!fraction.has_area());
            assert!(to_pixels(&FractionRect::new(0.1, 0.1, 0.5, 0.5), canvas).is_empty());
        }
    }

    #[test]
    fn corners_in_any_direction_give_same_box() {
        let a = Point::new(150.0, 150.0);
        let b = Point::new(50.0, 50.0);
        let expected = PixelRect::new(50.0, 50.0, 100.0, 100.0);
        assert_eq!(PixelRect::from_corners(a, b), expected);
        assert_eq!(PixelRect::from_corners(b, a), expected);
        assert_eq!(
            PixelRect::from_corners(Point::new(50.0, 150.0), Point::new(150.0, 50.0)),
            expected
        );
    }

    #[test]
    fn exceeds_requires_both_dimensions() {
        assert!(!PixelRect::new(0.0, 0.0, 2.0, 2.0).exceeds(2.0));
        assert!(!PixelRect::new(0.0, 0.0, 100.0, 2.0).exceeds(2.0));
        assert!(PixelRect::new(0.0, 0.0, 2.5, 3.0).exceeds(2.0));
    }
}
