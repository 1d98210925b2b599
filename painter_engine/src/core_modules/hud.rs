// THEORY:
// The heads-up layer is what visitors see on top of the painting but never in
// it: which body part each painter follows, and a ring that fills while a
// painter holds still, announcing the blot that is about to pool. It is drawn
// onto the front buffer every frame and therefore disappears from snapshots
// the moment the painter moves on.

use crate::core_modules::painter::Painter;
use crate::core_modules::palette::Role;
use crate::core_modules::surface::Surface;
use crate::core_modules::vector::Vec2;
use image::Rgba;
use std::f64::consts::{FRAC_PI_2, TAU};

const RING_RADIUS: f64 = 12.5;
const RING_WIDTH: f64 = 3.0;
const RING_COLOR: Rgba<u8> = Rgba([255, 255, 255, 180]);
/// Angular resolution of the ring polyline.
const RING_SEGMENT: f64 = 0.2;

/// What the host should show next to an active painter.
#[derive(Debug, Clone, PartialEq)]
pub struct HudMarker {
    pub painter_id: usize,
    pub role: Role,
    pub position: Vec2,
    pub scale: f64,
    /// Stillness progress toward the blot regime, while it is filling.
    pub ring_progress: Option<f64>,
}

impl HudMarker {
    pub fn for_painter(painter: &Painter, now_ms: u64, wait_ms: u64) -> Option<HudMarker> {
        if !painter.active {
            return None;
        }
        let still = painter.time_still(now_ms);
        let ring_progress = (still > 0 && still < wait_ms).then(|| still as f64 / wait_ms as f64);
        Some(HudMarker {
            painter_id: painter.id,
            role: painter.role,
            position: painter.position,
            scale: painter.scale_factor,
            ring_progress,
        })
    }

    pub fn label(&self) -> &'static str {
        self.role.label()
    }

    /// Draws the progress ring clockwise from twelve o'clock.
    pub fn draw_ring<S: Surface + ?Sized>(&self, surface: &mut S) {
        let Some(progress) = self.ring_progress else {
            return;
        };
        let radius = RING_RADIUS * self.scale;
        let sweep = progress * TAU;
        let segments = (sweep / RING_SEGMENT).ceil().max(1.0) as usize;
        let point_at = |angle: f64| self.position + Vec2::new(radius * angle.cos(), radius * angle.sin());

        for i in 0..segments {
            let a0 = -FRAC_PI_2 + sweep * i as f64 / segments as f64;
            let a1 = -FRAC_PI_2 + sweep * (i + 1) as f64 / segments as f64;
            surface.stroke_segment(point_at(a0), point_at(a1), RING_WIDTH * self.scale, RING_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::palette::Palette;
    use crate::core_modules::surface::recording::RecordingSurface;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn active_painter(last_move_ms: u64) -> Painter {
        let mut rng = StdRng::seed_from_u64(0);
        let mut p = Painter::new(4, Vec2::new(50.0, 50.0), &Palette::default(), last_move_ms, &mut rng);
        p.active = true;
        p
    }

    #[test]
    fn ring_fills_only_during_the_wait() {
        let p = active_painter(1_000);
        assert_eq!(HudMarker::for_painter(&p, 1_000, 1_000).unwrap().ring_progress, None);
        assert_relative_eq!(
            HudMarker::for_painter(&p, 1_250, 1_000).unwrap().ring_progress.unwrap(),
            0.25,
            epsilon = 1e-9
        );
        assert_eq!(HudMarker::for_painter(&p, 2_000, 1_000).unwrap().ring_progress, None);
    }

    #[test]
    fn inactive_painters_have_no_marker() {
        let mut p = active_painter(0);
        p.active = false;
        assert!(HudMarker::for_painter(&p, 10, 1_000).is_none());
    }

    #[test]
    fn ring_is_a_chain_of_segments_on_the_circle() {
        let p = active_painter(0);
        let marker = HudMarker::for_painter(&p, 500, 1_000).unwrap();
        let mut surface = RecordingSurface::default();
        marker.draw_ring(&mut surface);

        assert!(!surface.marks.is_empty());
        for mark in &surface.marks {
            let crate::core_modules::brush::Mark::Stroke { from, to, .. } = mark else {
                panic!("ring should only stroke");
            };
            assert_relative_eq!(from.dist(p.position), 12.5, epsilon = 1e-9);
            assert_relative_eq!(to.dist(p.position), 12.5, epsilon = 1e-9);
        }
        assert_eq!(marker.label(), p.role.label());
    }
}
