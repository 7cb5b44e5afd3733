// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The particle morph hero.
//!
//! A point cloud holds on one shape, morphs to the next, and repeats over
//! [`SHAPE_ORDER`]. The pieces are split so that everything except the draw
//! call is testable without a GPU:
//!
//! - [`MorphTargetLibrary`] generates the three shapes once per particle
//!   count.
//! - [`MorphCycle`] owns the hold/transition timing and hands back the pair
//!   and progress together.
//! - [`MorphUniforms`] is the per-frame block the shader reads.
//! - [`ParticleMorphRenderer`] drives a [`ParticleBackend`] and fails closed
//!   to the static gradient on any backend error.

mod cycle;
mod renderer;
mod targets;
mod uniforms;

pub use cycle::{CycleStep, MorphCycle};
pub use renderer::{FrameOutcome, MorphConfig, ParticleBackend, ParticleMorphRenderer};
pub use targets::{MorphShapes, MorphTargetLibrary, MorphTargetSet, SHAPE_ORDER, ShapeKind};
pub use uniforms::{MorphUniforms, POINTER_NONE};
