// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! wgpu particle backend for the tideline morph hero.
//!
//! [`WgpuParticleBackend`] implements
//! [`ParticleBackend`](tideline_core::morph::ParticleBackend): one instanced
//! quad per particle, interpolated on the GPU between two of the three
//! uploaded shapes and blended additively.
//!
//! The shader's uniform block mirrors
//! [`MorphUniforms`](tideline_core::morph::MorphUniforms) field for field.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod backend;
mod pipeline;

pub use backend::WgpuParticleBackend;
pub use pipeline::{SHADER, additive_blend};
