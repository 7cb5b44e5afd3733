// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shader uniform block.
//!
//! Field order and padding follow WGSL uniform layout rules: `vec2<f32>`
//! members sit on 8-byte boundaries and the block size is a multiple of 16.
//! Any shader implementing the particle morph must accept exactly this
//! block.

use bytemuck::{Pod, Zeroable};

/// Pointer position meaning "no pointer": far enough outside clip space that
/// no particle falls within the repulsion radius.
pub const POINTER_NONE: [f32; 2] = [8.0, 8.0];

/// Per-frame uniforms for the particle shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MorphUniforms {
    /// Seconds since mount, for per-particle drift.
    pub time: f32,
    /// Smoothstepped interpolation factor between the active pair.
    pub morph_progress: f32,
    /// Scroll progress hint in `[0, 1]`; drives outward spread and fade.
    pub scroll_progress: f32,
    /// Device pixel ratio.
    pub pixel_ratio: f32,
    /// Pointer in viewport-normalised coordinates, `[-1, 1]`, y up.
    pub pointer: [f32; 2],
    /// Canvas size in physical pixels.
    pub resolution: [f32; 2],
    /// Drift amplitude in model units.
    pub drift_amplitude: f32,
    /// Maximum outward spread factor at full scroll progress.
    pub spread: f32,
    /// Pointer repulsion radius in clip units.
    pub repulsion_radius: f32,
    /// Pointer repulsion displacement at distance zero.
    pub repulsion_strength: f32,
    /// Point sprite size in CSS pixels.
    pub point_size: f32,
    pub(crate) pad: [f32; 3],
}

impl Default for MorphUniforms {
    fn default() -> Self {
        Self {
            time: 0.0,
            morph_progress: 0.0,
            scroll_progress: 0.0,
            pixel_ratio: 1.0,
            pointer: POINTER_NONE,
            resolution: [1.0, 1.0],
            drift_amplitude: 0.0,
            spread: 0.0,
            repulsion_radius: 0.0,
            repulsion_strength: 0.0,
            point_size: 1.0,
            pad: [0.0; 3],
        }
    }
}

impl MorphUniforms {
    /// Size of the block in bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// The block as bytes, ready for a buffer write.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use super::*;

    #[test]
    fn layout_matches_wgsl_block() {
        assert_eq!(MorphUniforms::SIZE, 64);
        assert_eq!(MorphUniforms::SIZE % 16, 0);
        assert_eq!(offset_of!(MorphUniforms, pointer), 16);
        assert_eq!(offset_of!(MorphUniforms, resolution), 24);
        assert_eq!(offset_of!(MorphUniforms, drift_amplitude), 32);
        assert_eq!(offset_of!(MorphUniforms, point_size), 48);
    }

    #[test]
    fn default_pointer_is_out_of_reach() {
        let u = MorphUniforms::default();
        assert!(u.pointer[0] > 1.0 + u.repulsion_radius);
        assert_eq!(u.as_bytes().len(), 64);
    }
}
