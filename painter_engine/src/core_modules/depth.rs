// THEORY:
// A monocular camera has no depth, but the pixel distance between the two
// shoulders is a good enough proxy: the closer the subject, the wider they
// appear. The estimator maps that distance linearly onto a bounded size
// multiplier, so painters driven by someone near the camera paint bigger.
//
// No estimate is better than a wrong one: if either shoulder is unclear the
// estimator returns `None` and the painter keeps the scale it already had.

use crate::core_modules::palette::{LEFT_SHOULDER, RIGHT_SHOULDER};
use crate::core_modules::skeleton::Skeleton;
use crate::core_modules::vector::map_range_clamped;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DepthConfig {
    /// Both shoulders must score above this for an estimate.
    pub min_shoulder_score: f64,
    /// Shoulder separation (estimator pixels) of a far subject.
    pub far_separation: f64,
    /// Shoulder separation (estimator pixels) of a close subject.
    pub near_separation: f64,
    /// Scale produced at (or beyond) the far separation.
    pub min_scale: f64,
    /// Scale produced at (or beyond) the near separation.
    pub max_scale: f64,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            min_shoulder_score: 0.15,
            far_separation: 40.0,
            near_separation: 200.0,
            min_scale: 0.4,
            max_scale: 2.0,
        }
    }
}

/// Estimates a painter size multiplier from shoulder separation.
pub fn estimate_depth_scale(skeleton: &Skeleton, config: &DepthConfig) -> Option<f64> {
    let left = skeleton.keypoint(LEFT_SHOULDER)?;
    let right = skeleton.keypoint(RIGHT_SHOULDER)?;
    if left.score <= config.min_shoulder_score || right.score <= config.min_shoulder_score {
        return None;
    }
    let separation = left.position.dist(right.position);
    Some(map_range_clamped(
        separation,
        config.far_separation,
        config.near_separation,
        config.min_scale,
        config.max_scale,
    ))
}
