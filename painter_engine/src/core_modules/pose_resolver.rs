// THEORY:
// The pose resolver turns "a person" into "a point for this painter". Given a
// usable skeleton and the role a painter is assigned, it produces a target in
// canvas pixels, a confidence, and the role that was actually used.
//
// Key principles:
// 1.  **Closed dispatch**: roles are an enum, so resolution is a `match`, not a
//     lookup by name. Torso is computed (shoulder midpoint), every other role
//     reads one keypoint.
// 2.  **Graceful degradation**: a weak limb never blocks a painter. When the
//     resolved score is below the fallback threshold the resolver retries with
//     the torso midpoint and relabels the result, so a hidden ankle quietly
//     becomes torso tracking.
// 3.  **Coordinate mapping**: keypoints live in the estimator's fixed working
//     resolution; the output is rescaled to the canvas with independent X/Y
//     factors as the very last step.

use crate::core_modules::palette::{LEFT_SHOULDER, RIGHT_SHOULDER, Role};
use crate::core_modules::skeleton::Skeleton;
use crate::core_modules::vector::Vec2;

/// Confidence gates for skeletons and keypoints.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolverConfig {
    /// Minimum overall skeleton score for the validity gate.
    pub min_pose_score: f64,
    /// Overall score a skeleton needs to count as a detected subject.
    pub presence_score: f64,
    /// A head or shoulder must score above this for the skeleton to be usable.
    pub min_anchor_score: f64,
    /// Both shoulders must score above this for a torso midpoint.
    pub min_shoulder_score: f64,
    /// Resolved scores below this fall back to the torso midpoint.
    pub fallback_score: f64,
    /// Painters are only driven by targets scoring above this.
    pub min_target_score: f64,
    /// Width of the estimator's working resolution.
    pub estimator_width: f64,
    /// Height of the estimator's working resolution.
    pub estimator_height: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_pose_score: 0.2,
            presence_score: 0.5,
            min_anchor_score: 0.3,
            min_shoulder_score: 0.1,
            fallback_score: 0.2,
            min_target_score: 0.2,
            estimator_width: 640.0,
            estimator_height: 480.0,
        }
    }
}

impl ResolverConfig {
    /// Per-axis factors mapping estimator pixels onto a canvas of the given size.
    pub fn canvas_scale(&self, canvas_width: u32, canvas_height: u32) -> Vec2 {
        Vec2::new(
            canvas_width as f64 / self.estimator_width,
            canvas_height as f64 / self.estimator_height,
        )
    }
}

/// Where a painter should head this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTarget {
    /// Target in canvas pixels.
    pub position: Vec2,
    pub score: f64,
    /// The role that produced the position; `TorsoCentroid` after a fallback.
    pub label: Role,
}

impl ResolvedTarget {
    /// Whether the target is strong enough to drive a painter.
    pub fn is_trackable(&self, config: &ResolverConfig) -> bool {
        self.score > config.min_target_score
    }
}

/// Midpoint of the shoulders and their mean score, when both are visible enough.
pub fn torso_centroid(skeleton: &Skeleton, min_shoulder_score: f64) -> Option<(Vec2, f64)> {
    let left = skeleton.keypoint(LEFT_SHOULDER)?;
    let right = skeleton.keypoint(RIGHT_SHOULDER)?;
    if left.score > min_shoulder_score && right.score > min_shoulder_score {
        Some((
            left.position.lerp(right.position, 0.5),
            (left.score + right.score) / 2.0,
        ))
    } else {
        None
    }
}

/// Resolves `role` against `skeleton`, scaling the result by `canvas_scale`.
pub fn resolve_target(
    skeleton: &Skeleton,
    role: Role,
    config: &ResolverConfig,
    canvas_scale: Vec2,
) -> ResolvedTarget {
    let (mut position, mut score) = match role.keypoint_index() {
        None => torso_centroid(skeleton, config.min_shoulder_score).unwrap_or((Vec2::ZERO, 0.0)),
        Some(index) => skeleton
            .keypoint(index)
            .map_or((Vec2::ZERO, 0.0), |k| (k.position, k.score)),
    };
    let mut label = role;

    if score < config.fallback_score {
        if let Some((torso, torso_score)) = torso_centroid(skeleton, config.min_shoulder_score) {
            position = torso;
            score = torso_score;
            label = Role::TorsoCentroid;
        }
    }

    ResolvedTarget {
        position: position.scale_xy(canvas_scale.x, canvas_scale.y),
        score,
        label,
    }
}
