// THEORY:
// Blots get their organic outline from a coherent noise field: nearby inputs
// give nearby outputs, so a blot's silhouette drifts slowly from frame to frame
// instead of flickering. The field is a seeded 3D Perlin function; the brush
// samples it around a circle (x, y) offset by the painter id and moves along
// the third axis with the animation frame counter.
//
// Determinism matters here. The same seed and the same coordinates always give
// the same value, which is what lets the brush be tested.

use noise::{NoiseFn, Perlin};

/// Seeded coherent noise mapped into `[0, 1]`.
#[derive(Clone)]
pub struct NoiseField {
    perlin: Perlin,
    seed: u32,
}

impl std::fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseField").field("seed", &self.seed).finish()
    }
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn sample(&self, x: f64, y: f64, t: f64) -> f64 {
        let raw = self.perlin.get([x, y, t]);
        ((raw + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}
