// THEORY:
// `Skeleton` and `Keypoint` are the read-only view of what the external pose
// estimator produced for one person in one frame. They are "dumb" data
// containers: an overall confidence plus an ordered list of keypoints whose
// identity is their position in the list (0 = head, 5/6 = shoulders,
// 13/14 = ankles).
//
// The only judgement made at this level is the validity gate, which rejects
// the low-confidence "ghost" detections estimators tend to emit at the edges of
// the frame before any painter is allowed to see them.

use crate::core_modules::palette::{HEAD, LEFT_SHOULDER, RIGHT_SHOULDER};
use crate::core_modules::pose_resolver::ResolverConfig;
use crate::core_modules::vector::Vec2;

/// A single detected body landmark.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keypoint {
    /// Position in the estimator's working resolution.
    pub position: Vec2,
    /// Detection confidence in `[0, 1]`.
    pub score: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, score: f64) -> Self {
        Self {
            position: Vec2::new(x, y),
            score,
        }
    }
}

/// One detected person.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Skeleton {
    /// Overall detection confidence.
    pub score: f64,
    pub keypoints: Vec<Keypoint>,
}

impl Skeleton {
    pub fn new(score: f64, keypoints: Vec<Keypoint>) -> Self {
        Self { score, keypoints }
    }

    pub fn keypoint(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// Score of a keypoint, treating a missing one as undetected.
    pub fn keypoint_score(&self, index: usize) -> f64 {
        self.keypoint(index).map_or(0.0, |k| k.score)
    }

    /// A skeleton is usable when its overall score reaches the pose gate and at
    /// least one structural anchor (head or either shoulder) is clearly seen.
    pub fn is_usable(&self, config: &ResolverConfig) -> bool {
        if self.score < config.min_pose_score {
            return false;
        }
        [HEAD, LEFT_SHOULDER, RIGHT_SHOULDER]
            .iter()
            .any(|&i| self.keypoint_score(i) > config.min_anchor_score)
    }

    /// Whether this skeleton counts as a detected subject: usable, and with an
    /// overall score at or above the presence bar.
    pub fn is_present(&self, config: &ResolverConfig) -> bool {
        self.score >= config.presence_score && self.is_usable(config)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn low_overall_score_fails_the_gate_even_with_strong_keypoints() {
        let mut skeleton = uniform(0.9, 100.0, 100.0);
        skeleton.score = 0.1;
        assert!(!skeleton.is_usable(&ResolverConfig::default()));
    }

    #[test]
    fn one_clear_anchor_is_enough() {
        let mut skeleton = uniform(0.05, 0.0, 0.0);
        skeleton.score = 0.5;
        assert!(!skeleton.is_usable(&ResolverConfig::default()));

        let skeleton = with_keypoint(skeleton, RIGHT_SHOULDER, 10.0, 10.0, 0.31);
        assert!(skeleton.is_usable(&ResolverConfig::default()));
    }

    #[test]
    fn missing_keypoints_count_as_undetected() {
        let skeleton = Skeleton::new(0.8, vec![Keypoint::new(1.0, 1.0, 0.9)]);
        assert_eq!(skeleton.keypoint_score(LEFT_SHOULDER), 0.0);
        assert!(skeleton.is_usable(&ResolverConfig::default()));
    }

    #[test]
    fn faint_subjects_paint_without_counting_as_present() {
        let config = ResolverConfig::default();
        let mut skeleton = uniform(0.9, 50.0, 50.0);
        skeleton.score = 0.3;
        assert!(skeleton.is_usable(&config));
        assert!(!skeleton.is_present(&config));

        skeleton.score = 0.5;
        assert!(skeleton.is_present(&config));
    }
}
