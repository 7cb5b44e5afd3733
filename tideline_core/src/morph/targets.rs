// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Morph target generation.
//!
//! Every shape is a flat `count × 3` array of `xyz` positions in a unit-ish
//! cube centred on the origin. Generation is deterministic for a given
//! `(count, seed)`, and the output is immutable and shared through `Arc`, so
//! the renderer and any debug view can hold the same buffers.

use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The three morph targets, in cycle order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Fibonacci-distributed sphere shell.
    Sphere,
    /// Torus around the vertical axis.
    Torus,
    /// Two interleaved helical strands.
    DoubleHelix,
}

/// The fixed cyclic order shapes are visited in.
pub const SHAPE_ORDER: [ShapeKind; 3] = [ShapeKind::Sphere, ShapeKind::Torus, ShapeKind::DoubleHelix];

impl ShapeKind {
    /// Position of this shape in [`SHAPE_ORDER`].
    #[must_use]
    pub const fn order_index(self) -> usize {
        match self {
            Self::Sphere => 0,
            Self::Torus => 1,
            Self::DoubleHelix => 2,
        }
    }
}

/// Small positional jitter so shapes read as clouds, not lattices.
const JITTER: f32 = 0.02;
const GOLDEN_ANGLE: f32 = 2.399_963_2;

/// The two targets being interpolated plus per-particle seeds.
///
/// `shape_a` and `shape_b` always come from the same generation, so their
/// lengths match.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphTargetSet {
    /// Shape the cycle is morphing from.
    pub current: ShapeKind,
    /// Shape the cycle is morphing to.
    pub next: ShapeKind,
    /// `count × 3` positions of `current`.
    pub shape_a: Arc<[f32]>,
    /// `count × 3` positions of `next`.
    pub shape_b: Arc<[f32]>,
    /// `count` seeds in `[0, 1)`.
    pub random_seeds: Arc<[f32]>,
}

/// All three shapes for one particle count.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphShapes {
    count: usize,
    seed: u64,
    shapes: [Arc<[f32]>; 3],
    random_seeds: Arc<[f32]>,
}

impl MorphShapes {
    /// Particle count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Seed the shapes were generated from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Positions of one shape.
    #[must_use]
    pub fn shape(&self, kind: ShapeKind) -> &Arc<[f32]> {
        &self.shapes[kind.order_index()]
    }

    /// Per-particle seeds.
    #[must_use]
    pub fn random_seeds(&self) -> &Arc<[f32]> {
        &self.random_seeds
    }

    /// The target set for morphing from `current` to `next`.
    #[must_use]
    pub fn pair(&self, current: ShapeKind, next: ShapeKind) -> MorphTargetSet {
        MorphTargetSet {
            current,
            next,
            shape_a: Arc::clone(self.shape(current)),
            shape_b: Arc::clone(self.shape(next)),
            random_seeds: Arc::clone(&self.random_seeds),
        }
    }
}

/// Generates and caches morph targets.
///
/// Shapes are regenerated only when the particle count changes (a tier
/// change), never per frame.
#[derive(Clone, Debug, Default)]
pub struct MorphTargetLibrary {
    cached: Option<MorphShapes>,
}

impl MorphTargetLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns shapes for `count`, generating them on first use or when the
    /// count or seed changed.
    pub fn shapes(&mut self, count: usize, seed: u64) -> MorphShapes {
        match &self.cached {
            Some(shapes) if shapes.count == count && shapes.seed == seed => shapes.clone(),
            _ => {
                let shapes = Self::generate(count, seed);
                self.cached = Some(shapes.clone());
                shapes
            }
        }
    }

    /// Pure generator: same `(count, seed)`, same floats.
    #[must_use]
    pub fn generate(count: usize, seed: u64) -> MorphShapes {
        let mut rng = StdRng::seed_from_u64(seed);
        let sphere = sphere(count, &mut rng);
        let torus = torus(count, &mut rng);
        let helix = double_helix(count, &mut rng);
        let random_seeds: Vec<f32> = (0..count).map(|_| rng.gen_range(0.0..1.0)).collect();
        tracing::debug!(count, seed, "morph targets generated");
        MorphShapes {
            count,
            seed,
            shapes: [sphere.into(), torus.into(), helix.into()],
            random_seeds: random_seeds.into(),
        }
    }
}

fn jitter(rng: &mut StdRng) -> f32 {
    rng.gen_range(-JITTER..JITTER)
}

fn push_point(out: &mut Vec<f32>, rng: &mut StdRng, x: f32, y: f32, z: f32) {
    out.push(x + jitter(rng));
    out.push(y + jitter(rng));
    out.push(z + jitter(rng));
}

fn sphere(count: usize, rng: &mut StdRng) -> Vec<f32> {
    const RADIUS: f32 = 1.0;
    let mut out = Vec::with_capacity(count * 3);
    let n = count.max(1) as f32;
    for i in 0..count {
        let y = 1.0 - 2.0 * (i as f32 + 0.5) / n;
        let ring = (1.0 - y * y).max(0.0).sqrt();
        let theta = GOLDEN_ANGLE * i as f32;
        push_point(
            &mut out,
            rng,
            RADIUS * ring * theta.cos(),
            RADIUS * y,
            RADIUS * ring * theta.sin(),
        );
    }
    out
}

fn torus(count: usize, rng: &mut StdRng) -> Vec<f32> {
    const MAJOR: f32 = 0.8;
    const MINOR: f32 = 0.3;
    let mut out = Vec::with_capacity(count * 3);
    let n = count.max(1) as f32;
    for i in 0..count {
        let u = TAU * i as f32 / n;
        let v = GOLDEN_ANGLE * i as f32;
        let r = MAJOR + MINOR * v.cos();
        push_point(&mut out, rng, r * u.cos(), MINOR * v.sin(), r * u.sin());
    }
    out
}

fn double_helix(count: usize, rng: &mut StdRng) -> Vec<f32> {
    const RADIUS: f32 = 0.45;
    const HEIGHT: f32 = 2.2;
    const TURNS: f32 = 2.5;
    let mut out = Vec::with_capacity(count * 3);
    let per_strand = count.div_ceil(2).max(1) as f32;
    for i in 0..count {
        let strand = (i % 2) as f32;
        let t = (i / 2) as f32 / per_strand;
        let angle = TAU * TURNS * t + PI * strand;
        push_point(
            &mut out,
            rng,
            RADIUS * angle.cos(),
            HEIGHT * (t - 0.5),
            RADIUS * angle.sin(),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let a = MorphTargetLibrary::generate(180, 7);
        let b = MorphTargetLibrary::generate(180, 7);
        assert_eq!(a, b);
        let c = MorphTargetLibrary::generate(180, 8);
        assert_ne!(a.shape(ShapeKind::Sphere), c.shape(ShapeKind::Sphere));
    }

    #[test]
    fn buffer_sizes_match_count() {
        for count in [1, 100, 180] {
            let shapes = MorphTargetLibrary::generate(count, 1);
            for kind in SHAPE_ORDER {
                assert_eq!(shapes.shape(kind).len(), count * 3, "{kind:?}");
            }
            assert_eq!(shapes.random_seeds().len(), count);
        }
    }

    #[test]
    fn seeds_are_in_unit_interval() {
        let shapes = MorphTargetLibrary::generate(500, 3);
        assert!(shapes.random_seeds().iter().all(|s| (0.0..1.0).contains(s)));
    }

    #[test]
    fn shapes_are_bounded_and_distinct() {
        let shapes = MorphTargetLibrary::generate(180, 11);
        for kind in SHAPE_ORDER {
            assert!(shapes.shape(kind).iter().all(|v| v.abs() <= 1.2), "{kind:?}");
        }
        assert_ne!(shapes.shape(ShapeKind::Sphere), shapes.shape(ShapeKind::Torus));
        assert_ne!(shapes.shape(ShapeKind::Torus), shapes.shape(ShapeKind::DoubleHelix));
    }

    #[test]
    fn library_reuses_until_count_changes() {
        let mut lib = MorphTargetLibrary::new();
        let a = lib.shapes(180, 1);
        let b = lib.shapes(180, 1);
        assert!(Arc::ptr_eq(a.shape(ShapeKind::Torus), b.shape(ShapeKind::Torus)));
        let c = lib.shapes(100, 1);
        assert_eq!(c.count(), 100);
    }

    #[test]
    fn pair_shares_buffers() {
        let shapes = MorphTargetLibrary::generate(50, 2);
        let set = shapes.pair(ShapeKind::Torus, ShapeKind::DoubleHelix);
        assert!(Arc::ptr_eq(&set.shape_a, shapes.shape(ShapeKind::Torus)));
        assert!(Arc::ptr_eq(&set.shape_b, shapes.shape(ShapeKind::DoubleHelix)));
        assert_eq!(set.shape_a.len(), set.shape_b.len());
    }
}
