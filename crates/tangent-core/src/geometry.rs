//! Screen/canvas coordinate transform and drag tracking
//!
//! Panel positions live in canvas space. The host applies the viewport offset
//! exactly once when drawing, so panels, connectors and the selection toolbar
//! share one transform and cannot drift relative to each other during a pan.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A 2-D point or vector. Screen and canvas points share the type; which space
/// a value lives in is carried by the name of the function that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scale(self, factor: f32) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    /// Linear interpolation from `self` (t = 0) to `other` (t = 1)
    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle (screen space for selections, canvas space for hit tests)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

/// The single global pan applied to the whole canvas
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub offset: Point,
}

impl Viewport {
    pub fn new(offset: Point) -> Self {
        Self { offset }
    }

    pub fn to_canvas(&self, screen: Point) -> Point {
        screen - self.offset
    }

    pub fn to_screen(&self, canvas: Point) -> Point {
        canvas + self.offset
    }

    /// Shift the view by `delta` screen units (keyboard panning)
    pub fn pan_by(&mut self, delta: Point) {
        self.offset = self.offset + delta;
    }
}

/// Whole-canvas drag. Captures `pointer - offset` at the start so every move
/// recomputes the offset from the anchor instead of accumulating deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanDrag {
    grab: Point,
}

impl PanDrag {
    pub fn begin(viewport: &Viewport, pointer: Point) -> Self {
        Self {
            grab: pointer - viewport.offset,
        }
    }

    pub fn update(&self, viewport: &mut Viewport, pointer: Point) {
        viewport.offset = pointer - self.grab;
    }
}

/// Single-panel drag. Keeps the grabbed point of the panel under the cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelDrag {
    grab: Point,
}

impl PanelDrag {
    pub fn begin(viewport: &Viewport, panel_position: Point, pointer: Point) -> Self {
        Self {
            grab: viewport.to_canvas(pointer) - panel_position,
        }
    }

    /// New canvas position for the dragged panel
    pub fn position_for(&self, viewport: &Viewport, pointer: Point) -> Point {
        viewport.to_canvas(pointer) - self.grab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_round_trip() {
        let viewport = Viewport::new(Point::new(37.0, -12.5));
        let screen = Point::new(100.0, 200.0);
        let canvas = viewport.to_canvas(screen);
        assert_eq!(canvas, Point::new(63.0, 212.5));
        assert_eq!(viewport.to_screen(canvas), screen);
    }

    #[test]
    fn test_pan_history_keeps_relative_offsets() {
        let a = Point::new(10.0, 20.0);
        let b = Point::new(300.0, -40.0);
        let mut viewport = Viewport::default();

        let pans = [
            (Point::new(5.0, 5.0), Point::new(80.0, 15.0)),
            (Point::new(0.0, 0.0), Point::new(-200.0, 340.0)),
            (Point::new(50.0, 50.0), Point::new(49.0, 51.0)),
        ];
        for (start, end) in pans {
            let drag = PanDrag::begin(&viewport, start);
            drag.update(&mut viewport, Point::new(start.x + 1.0, start.y));
            drag.update(&mut viewport, end);
            let shown = viewport.to_screen(b) - viewport.to_screen(a);
            assert_eq!(shown, b - a);
        }
    }

    #[test]
    fn test_pan_is_anchored_to_drag_start() {
        let mut viewport = Viewport::new(Point::new(10.0, 10.0));
        let drag = PanDrag::begin(&viewport, Point::new(100.0, 100.0));
        for x in [110.0, 130.0, 90.0, 125.0] {
            drag.update(&mut viewport, Point::new(x, 100.0));
        }
        assert_eq!(viewport.offset, Point::new(35.0, 10.0));
    }

    #[test]
    fn test_panel_drag_moves_by_pointer_delta() {
        for offset in [Point::ORIGIN, Point::new(-250.0, 75.0), Point::new(13.0, 999.0)] {
            let viewport = Viewport::new(offset);
            let start = Point::new(40.0, 60.0);
            let drag = PanelDrag::begin(&viewport, start, Point::new(400.0, 300.0));
            drag.position_for(&viewport, Point::new(420.0, 310.0));
            let end = drag.position_for(&viewport, Point::new(450.0, 280.0));
            assert_eq!(end - start, Point::new(50.0, -20.0));
        }
    }

    #[test]
    fn test_rect_contains_and_union() {
        let r = Rect::new(0.0, 0.0, 10.0, 5.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(!r.contains(Point::new(10.0, 2.0)));
        let u = r.union(&Rect::new(8.0, 4.0, 4.0, 4.0));
        assert_eq!(u, Rect::new(0.0, 0.0, 12.0, 8.0));
    }

    #[test]
    fn test_lerp() {
        let p = Point::new(0.0, 0.0).lerp(Point::new(10.0, -10.0), 0.25);
        assert_eq!(p, Point::new(2.5, -2.5));
    }
}
