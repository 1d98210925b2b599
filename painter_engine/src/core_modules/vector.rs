// THEORY:
// `Vec2` is the "dumb" data container for every 2D quantity in the engine:
// positions, targets, velocities and forces all share it. It knows the handful
// of operations a steering model needs (magnitude, set-magnitude, limit, lerp)
// and nothing about painters or canvases.

use std::ops::{Add, AddAssign, Mul, Sub};

/// A 2D vector in canvas (or estimator) pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn mag(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dist(&self, other: Vec2) -> f64 {
        (*self - other).mag()
    }

    /// Returns this vector rescaled to `magnitude`. A zero vector stays zero.
    pub fn with_mag(self, magnitude: f64) -> Self {
        let m = self.mag();
        if m == 0.0 {
            return Vec2::ZERO;
        }
        self * (magnitude / m)
    }

    /// Caps the magnitude at `max`, keeping the direction.
    pub fn limit(self, max: f64) -> Self {
        if self.mag() > max {
            self.with_mag(max)
        } else {
            self
        }
    }

    /// Linear interpolation toward `other` by `amount` (0 = self, 1 = other).
    pub fn lerp(self, other: Vec2, amount: f64) -> Self {
        Vec2 {
            x: self.x + (other.x - self.x) * amount,
            y: self.y + (other.y - self.y) * amount,
        }
    }

    /// Component-wise scaling, used for estimator-to-canvas mapping.
    pub fn scale_xy(self, sx: f64, sy: f64) -> Self {
        Vec2 {
            x: self.x * sx,
            y: self.y * sy,
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(f64, f64)> for Vec2 {
    fn from((x, y): (f64, f64)) -> Self {
        Vec2::new(x, y)
    }
}

/// Re-maps `value` from `[in_min, in_max]` to `[out_min, out_max]` without clamping.
pub fn map_range(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    out_min + (value - in_min) * (out_max - out_min) / (in_max - in_min)
}

/// Like [`map_range`], but the result is held inside the output range.
pub fn map_range_clamped(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let mapped = map_range(value, in_min, in_max, out_min, out_max);
    let (lo, hi) = if out_min <= out_max {
        (out_min, out_max)
    } else {
        (out_max, out_min)
    };
    mapped.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn limit_keeps_direction_and_caps_magnitude() {
        let v = Vec2::new(3.0, 4.0).limit(1.0);
        assert_relative_eq!(v.mag(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(v.x, 0.6, epsilon = 1e-9);
        assert_relative_eq!(v.y, 0.8, epsilon = 1e-9);

        let short = Vec2::new(0.1, 0.0).limit(1.0);
        assert_eq!(short, Vec2::new(0.1, 0.0));
    }

    #[test]
    fn with_mag_leaves_zero_vector_alone() {
        assert_eq!(Vec2::ZERO.with_mag(30.0), Vec2::ZERO);
    }

    #[test]
    fn clamped_map_handles_descending_output() {
        assert_relative_eq!(map_range_clamped(0.0, 0.0, 30.0, 35.0, 4.0), 35.0, epsilon = 1e-9);
        assert_relative_eq!(map_range_clamped(60.0, 0.0, 30.0, 35.0, 4.0), 4.0, epsilon = 1e-9);
        assert_relative_eq!(map_range_clamped(15.0, 0.0, 30.0, 35.0, 4.0), 19.5, epsilon = 1e-9);
    }
}
