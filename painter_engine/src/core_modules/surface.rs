// THEORY:
// The engine never talks to a window. Everything it paints goes through the
// small `Surface` trait: filled polygons, round-capped segments and filled
// ellipses, each with an RGBA color whose alpha is honoured. Hosts can back
// it with a GPU canvas; the crate ships a raster implementation on top of
// `image` + `imageproc`, with source-over alpha blending via `Blend`.
//
// `PaintLayer` is that raster when it is used as the persistent accumulator:
// marks stay until `clear` is called, and only the session calls it.

use crate::core_modules::brush::Mark;
use crate::core_modules::vector::Vec2;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{Blend, draw_filled_circle_mut, draw_filled_ellipse_mut, draw_polygon_mut};
use imageproc::point::Point;

/// A drawing API the brush can paint onto.
pub trait Surface {
    /// Fills the closed polygon through `outline` (the closing edge is implied).
    fn fill_polygon(&mut self, outline: &[Vec2], color: Rgba<u8>);

    /// Strokes a segment with round caps and joins.
    fn stroke_segment(&mut self, from: Vec2, to: Vec2, width: f64, color: Rgba<u8>);

    /// Fills an axis-aligned ellipse given its full width and height.
    fn fill_ellipse(&mut self, center: Vec2, width: f64, height: f64, color: Rgba<u8>);

    fn apply(&mut self, mark: &Mark) {
        match mark {
            Mark::Blot { outline, color } => self.fill_polygon(outline, *color),
            Mark::Stroke {
                from,
                to,
                width,
                color,
            } => self.stroke_segment(*from, *to, *width, *color),
            Mark::Drip {
                center,
                diameter,
                color,
            } => self.fill_ellipse(*center, *diameter, *diameter, *color),
        }
    }
}

fn to_pixel(v: Vec2) -> Point<i32> {
    Point::new(v.x.round() as i32, v.y.round() as i32)
}

/// Rounds an outline to pixels and drops the repeats `draw_polygon_mut` rejects.
fn pixel_outline(outline: &[Vec2]) -> Vec<Point<i32>> {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(outline.len());
    for p in outline.iter().copied().map(to_pixel) {
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

impl Surface for Blend<RgbaImage> {
    fn fill_polygon(&mut self, outline: &[Vec2], color: Rgba<u8>) {
        let points = pixel_outline(outline);
        if points.len() >= 3 {
            draw_polygon_mut(self, &points, color);
        }
    }

    fn stroke_segment(&mut self, from: Vec2, to: Vec2, width: f64, color: Rgba<u8>) {
        let half = (width / 2.0).max(0.5);
        let cap_radius = half.round().max(1.0) as i32;
        let (fx, fy) = (from.x.round() as i32, from.y.round() as i32);
        let (tx, ty) = (to.x.round() as i32, to.y.round() as i32);

        let along = to - from;
        if along.mag() > 0.0 {
            let normal = Vec2::new(-along.y, along.x).with_mag(half);
            let body = pixel_outline(&[from + normal, to + normal, to - normal, from - normal]);
            if body.len() >= 3 {
                draw_polygon_mut(self, &body, color);
            }
        }
        draw_filled_circle_mut(self, (fx, fy), cap_radius, color);
        if (fx, fy) != (tx, ty) {
            draw_filled_circle_mut(self, (tx, ty), cap_radius, color);
        }
    }

    fn fill_ellipse(&mut self, center: Vec2, width: f64, height: f64, color: Rgba<u8>) {
        let rx = (width / 2.0).round().max(1.0) as i32;
        let ry = (height / 2.0).round().max(1.0) as i32;
        draw_filled_ellipse_mut(
            self,
            (center.x.round() as i32, center.y.round() as i32),
            rx,
            ry,
            color,
        );
    }
}

/// The persistent, off-screen accumulator painters draw into.
pub struct PaintLayer {
    canvas: Blend<RgbaImage>,
}

impl PaintLayer {
    /// A fully transparent layer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: Blend(RgbaImage::new(width, height)),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.0.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.0.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas.0
    }

    /// Wipes every mark, back to full transparency.
    pub fn clear(&mut self) {
        for pixel in self.canvas.0.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Number of pixels carrying any paint.
    pub fn painted_pixels(&self) -> usize {
        self.canvas.0.pixels().filter(|p| p[3] > 0).count()
    }
}

impl Surface for PaintLayer {
    fn fill_polygon(&mut self, outline: &[Vec2], color: Rgba<u8>) {
        self.canvas.fill_polygon(outline, color);
    }

    fn stroke_segment(&mut self, from: Vec2, to: Vec2, width: f64, color: Rgba<u8>) {
        self.canvas.stroke_segment(from, to, width, color);
    }

    fn fill_ellipse(&mut self, center: Vec2, width: f64, height: f64, color: Rgba<u8>) {
        self.canvas.fill_ellipse(center, width, height, color);
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    /// A surface that remembers what it was asked to draw.
    #[derive(Default)]
    pub struct RecordingSurface {
        pub marks: Vec<Mark>,
    }

    impl Surface for RecordingSurface {
        fn fill_polygon(&mut self, outline: &[Vec2], color: Rgba<u8>) {
            self.marks.push(Mark::Blot {
                outline: outline.to_vec(),
                color,
            });
        }

        fn stroke_segment(&mut self, from: Vec2, to: Vec2, width: f64, color: Rgba<u8>) {
            self.marks.push(Mark::Stroke {
                from,
                to,
                width,
                color,
            });
        }

        fn fill_ellipse(&mut self, center: Vec2, width: f64, _height: f64, color: Rgba<u8>) {
            self.marks.push(Mark::Drip {
                center,
                diameter: width,
                color,
            });
        }
    }
}
