// THEORY:
// The brush is the mark-making half of a painter. It reads a painter's
// kinematic state after a simulation step and decides what, if anything, the
// painter leaves behind on the persistent layer this frame.
//
// There are two mutually exclusive regimes:
// 1.  **Blot (settled)**: once the painter has been still for longer than the
//     wait time, it pools paint. A roughly circular polygon grows from a small
//     seed radius, fading in, capped at a maximum radius scaled by depth. Its
//     outline is pushed in and out by a coherent noise field keyed on the
//     painter id and the frame counter, so the shape breathes slowly instead of
//     jittering.
// 2.  **Stroke (moving)**: otherwise, if the painter actually travelled, it
//     draws the segment it travelled. Width is inversely related to speed: slow
//     deliberate motion deposits thick paint, fast gestures leave thin lines.
//     Fast strokes occasionally throw a small translucent drip.
//
// Small non-zero movement while not yet settled draws nothing at all.
//
// Planning (`plan`) is separated from drawing (`draw_paint`) so the decision
// can be tested without rasterizing anything, and the color is always handed
// in by the caller.

use crate::core_modules::noise_field::NoiseField;
use crate::core_modules::painter::Painter;
use crate::core_modules::surface::Surface;
use crate::core_modules::vector::{Vec2, map_range};
use image::Rgba;
use rand::Rng;
use std::f64::consts::TAU;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BrushConfig {
    /// Stillness (ms) after which a painter starts pooling a blot.
    pub wait_ms: u64,
    /// Time (ms) past the wait over which a blot fades in.
    pub fade_in_ms: f64,
    /// Alpha a blot holds once faded in.
    pub max_blot_alpha: f64,
    pub seed_radius: f64,
    /// Radius growth per millisecond of extra stillness.
    pub growth_per_ms: f64,
    /// Radius cap before the depth scale is applied.
    pub max_blot_radius: f64,
    /// Angular step between outline vertices, in radians.
    pub outline_step: f64,
    /// Fraction of the radius the noise may push the outline in or out.
    pub outline_jitter: f64,
    /// Noise-field distance travelled per animation frame.
    pub noise_time_step: f64,
    /// A painter must travel further than this (px) to stroke.
    pub min_stroke_distance: f64,
    /// Width at standstill speed.
    pub slow_stroke_width: f64,
    /// Width at full speed.
    pub fast_stroke_width: f64,
    pub min_stroke_width: f64,
    pub max_stroke_width: f64,
    /// Speed above which strokes may splatter.
    pub splatter_speed: f64,
    /// Chance per fast step of a drip.
    pub splatter_chance: f64,
    pub drip_alpha: u8,
    pub drip_min_size: f64,
    pub drip_max_size: f64,
    /// Maximum offset (px, before scaling) of a drip from the painter.
    pub drip_spread: f64,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            wait_ms: 1000,
            fade_in_ms: 500.0,
            max_blot_alpha: 200.0,
            seed_radius: 15.0,
            growth_per_ms: 0.15,
            max_blot_radius: 120.0,
            outline_step: 0.4,
            outline_jitter: 0.2,
            noise_time_step: 0.01,
            min_stroke_distance: 2.0,
            slow_stroke_width: 35.0,
            fast_stroke_width: 4.0,
            min_stroke_width: 4.0,
            max_stroke_width: 45.0,
            splatter_speed: 20.0,
            splatter_chance: 0.1,
            drip_alpha: 180,
            drip_min_size: 2.0,
            drip_max_size: 8.0,
            drip_spread: 30.0,
        }
    }
}

/// A single mark on the persistent layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    /// Straight round-capped segment from the previous to the current position.
    Stroke {
        from: Vec2,
        to: Vec2,
        width: f64,
        color: Rgba<u8>,
    },
    /// Closed, filled, noise-perturbed polygon.
    Blot { outline: Vec<Vec2>, color: Rgba<u8> },
    /// Small translucent splatter near a fast stroke.
    Drip {
        center: Vec2,
        diameter: f64,
        color: Rgba<u8>,
    },
}

/// Per-frame inputs the brush cannot read from the painter itself.
#[derive(Debug, Clone, Copy)]
pub struct BrushContext {
    /// Color chosen for this painter this frame.
    pub color: Rgba<u8>,
    /// Global animation frame counter.
    pub frame: u64,
    pub now_ms: u64,
    /// The painter's top speed, anchoring the speed-to-width map.
    pub max_speed: f64,
}

pub struct Brush {
    config: BrushConfig,
    noise: NoiseField,
}

impl Brush {
    pub fn new(config: BrushConfig, noise: NoiseField) -> Self {
        Self { config, noise }
    }

    pub fn config(&self) -> &BrushConfig {
        &self.config
    }

    /// Blot radius after `growth_ms` of stillness past the wait, before noise.
    /// Depth scale is applied once, to the capped radius.
    pub fn blot_radius(&self, growth_ms: f64, scale: f64) -> f64 {
        let base = self.config.seed_radius + growth_ms * self.config.growth_per_ms;
        base.min(self.config.max_blot_radius) * scale
    }

    pub fn blot_alpha(&self, growth_ms: f64) -> u8 {
        let alpha = map_range(growth_ms, 0.0, self.config.fade_in_ms, 0.0, self.config.max_blot_alpha)
            .min(self.config.max_blot_alpha)
            .max(0.0);
        alpha.round() as u8
    }

    pub fn stroke_width(&self, speed: f64, max_speed: f64, scale: f64) -> f64 {
        let width = map_range(
            speed,
            0.0,
            max_speed,
            self.config.slow_stroke_width,
            self.config.fast_stroke_width,
        );
        width.clamp(self.config.min_stroke_width, self.config.max_stroke_width) * scale
    }

    /// Decides the marks an active painter leaves this frame.
    pub fn plan<R: Rng + ?Sized>(&self, painter: &Painter, ctx: &BrushContext, rng: &mut R) -> Vec<Mark> {
        if !painter.active {
            return Vec::new();
        }

        let time_still = painter.time_still(ctx.now_ms);
        if time_still > self.config.wait_ms {
            let growth = (time_still - self.config.wait_ms) as f64;
            return vec![self.blot(painter, ctx, growth)];
        }

        if painter.distance_moved() > self.config.min_stroke_distance {
            return self.stroke(painter, ctx, rng);
        }

        Vec::new()
    }

    /// Plans and paints this frame's marks, returning how many were drawn.
    pub fn draw_paint<S, R>(&self, painter: &Painter, ctx: &BrushContext, layer: &mut S, rng: &mut R) -> usize
    where
        S: Surface + ?Sized,
        R: Rng + ?Sized,
    {
        let marks = self.plan(painter, ctx, rng);
        for mark in &marks {
            layer.apply(mark);
        }
        marks.len()
    }

    fn blot(&self, painter: &Painter, ctx: &BrushContext, growth_ms: f64) -> Mark {
        let radius = self.blot_radius(growth_ms, painter.scale_factor);
        let id = painter.id as f64;
        let t = ctx.frame as f64 * self.config.noise_time_step;
        let jitter = radius * self.config.outline_jitter;

        let steps = (TAU / self.config.outline_step).ceil() as usize;
        let outline = (0..steps)
            .map(|k| k as f64 * self.config.outline_step)
            .filter(|a| *a < TAU)
            .map(|a| {
                let (sin, cos) = a.sin_cos();
                let n = self.noise.sample(cos + 1.0 + id, sin + 1.0 + id, t);
                let r = radius + map_range(n, 0.0, 1.0, -jitter, jitter);
                painter.position + Vec2::new(r * cos, r * sin)
            })
            .collect();

        let mut color = ctx.color;
        color[3] = self.blot_alpha(growth_ms);
        Mark::Blot { outline, color }
    }

    fn stroke<R: Rng + ?Sized>(&self, painter: &Painter, ctx: &BrushContext, rng: &mut R) -> Vec<Mark> {
        let speed = painter.speed();
        let scale = painter.scale_factor;
        let mut marks = vec![Mark::Stroke {
            from: painter.previous_position,
            to: painter.position,
            width: self.stroke_width(speed, ctx.max_speed, scale),
            color: ctx.color,
        }];

        if speed > self.config.splatter_speed && rng.gen_bool(self.config.splatter_chance.clamp(0.0, 1.0)) {
            let diameter = rng.gen_range(self.config.drip_min_size..self.config.drip_max_size) * scale;
            let spread = self.config.drip_spread;
            let offset = Vec2::new(rng.gen_range(-spread..spread), rng.gen_range(-spread..spread)) * scale;
            let mut color = ctx.color;
            color[3] = self.config.drip_alpha;
            marks.push(Mark::Drip {
                center: painter.position + offset,
                diameter,
                color,
            });
        }

        marks
    }
}
