// THEORY:
// The `Painter` is the stateful heart of the engine. Where a `Skeleton` is a
// snapshot of one frame, a painter carries memory across frames: where it is,
// where it was, how fast it is going, how big it currently paints and when it
// last moved. Painters are created once per session and never destroyed; only
// their identity (role, color) and position are reset.
//
// Key principles:
// 1.  **Smoothed intent**: the raw detection is noisy, so the painter steers
//     toward an exponentially smoothed copy of it. Scale is smoothed separately
//     and more slowly, so depth changes read as gradual growth.
// 2.  **Seek with arrival**: the classic steering behaviour. Desired velocity
//     points at the target at full speed, slowing linearly inside the arrival
//     radius; the steering force is the difference to the current velocity,
//     capped at a maximum force. The result is curved, momentum-carrying paths.
// 3.  **Unit Euler step**: unit mass, unit timestep. Acceleration feeds
//     velocity, velocity feeds position, acceleration is cleared each step.
// 4.  **Stillness memory**: the timestamp of the last fast movement is what the
//     brush uses to tell a gesture from a pause.
// 5.  **Respawn is a teleport**: a tracking discontinuity snaps every
//     positional field to the new point and re-rolls the painter's identity,
//     bypassing all smoothing.

use crate::core_modules::palette::{Palette, Role};
use crate::core_modules::vector::Vec2;
use image::Rgba;
use rand::Rng;

/// Steering constants, in canvas pixels per simulation step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionConfig {
    /// Lerp factor pulling the smoothed target toward the raw target each step.
    pub target_smoothing: f64,
    /// Lerp factor pulling the displayed scale toward the target scale each step.
    pub scale_smoothing: f64,
    /// Inside this distance the desired speed ramps down to zero.
    pub arrive_radius: f64,
    pub max_speed: f64,
    pub max_force: f64,
    /// Speeds above this refresh the last-movement timestamp.
    pub move_threshold: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            target_smoothing: 0.3,
            scale_smoothing: 0.1,
            arrive_radius: 100.0,
            max_speed: 30.0,
            max_force: 0.25,
            move_threshold: 2.5,
        }
    }
}

impl MotionConfig {
    /// Seek-with-arrival speed for a given distance to the target.
    pub fn desired_speed(&self, distance: f64) -> f64 {
        if distance < self.arrive_radius {
            distance / self.arrive_radius * self.max_speed
        } else {
            self.max_speed
        }
    }
}

/// One autonomous agent of the ensemble.
#[derive(Debug, Clone)]
pub struct Painter {
    /// Stable id, also used as the painter's offset into the noise field.
    pub id: usize,
    pub role: Role,
    pub color: Rgba<u8>,
    pub position: Vec2,
    pub previous_position: Vec2,
    /// Smoothed target the painter steers toward.
    pub target: Vec2,
    /// Latest unsmoothed target handed to `update`.
    pub raw_target: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub scale_factor: f64,
    pub target_scale: f64,
    /// Milliseconds timestamp of the last step faster than the move threshold.
    pub last_move_ms: u64,
    /// Whether an update reached this painter in the current frame.
    pub active: bool,
}

impl Painter {
    pub fn new<R: Rng + ?Sized>(id: usize, start: Vec2, palette: &Palette, now_ms: u64, rng: &mut R) -> Self {
        Self {
            id,
            role: Role::random(rng),
            color: palette.random_color(rng),
            position: start,
            previous_position: start,
            target: start,
            raw_target: start,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            scale_factor: 1.0,
            target_scale: 1.0,
            last_move_ms: now_ms,
            active: false,
        }
    }

    /// Picks a fresh role and color. Motion state is untouched.
    pub fn assign_random_role<R: Rng + ?Sized>(&mut self, palette: &Palette, rng: &mut R) {
        self.role = Role::random(rng);
        self.color = palette.random_color(rng);
    }

    /// Teleports the painter to `point` and re-rolls its identity.
    pub fn respawn<R: Rng + ?Sized>(&mut self, point: Vec2, palette: &Palette, now_ms: u64, rng: &mut R) {
        self.position = point;
        self.previous_position = point;
        self.target = point;
        self.raw_target = point;
        self.last_move_ms = now_ms;
        self.assign_random_role(palette, rng);
    }

    /// Advances the painter one simulation step toward `raw_target`.
    pub fn update(&mut self, raw_target: Vec2, new_scale: Option<f64>, now_ms: u64, config: &MotionConfig) {
        self.active = true;

        self.raw_target = raw_target;
        self.target = self.target.lerp(self.raw_target, config.target_smoothing);

        if let Some(scale) = new_scale {
            self.target_scale = scale;
        }
        self.scale_factor += (self.target_scale - self.scale_factor) * config.scale_smoothing;

        let to_target = self.target - self.position;
        let desired = to_target.with_mag(config.desired_speed(to_target.mag()));
        let steer = (desired - self.velocity).limit(config.max_force);

        self.acceleration += steer;
        self.velocity += self.acceleration;
        self.previous_position = self.position;
        self.position += self.velocity;
        self.acceleration = Vec2::ZERO;

        if self.speed() > config.move_threshold {
            self.last_move_ms = now_ms;
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.mag()
    }

    /// Length of the segment travelled during the last step.
    pub fn distance_moved(&self) -> f64 {
        self.previous_position.dist(self.position)
    }

    /// Milliseconds since the painter last moved faster than the threshold.
    pub fn time_still(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_move_ms)
    }
}
