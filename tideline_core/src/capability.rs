// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render path selection.
//!
//! Whether the particle hero runs on the GPU is decided once, before
//! anything mounts, from a [`DeviceProbe`] and the current
//! [`MotionPreference`]. The answer is a tagged [`RenderPath`]: the host
//! mounts whichever branch it names instead of trying the GPU and catching
//! whatever goes wrong.
//!
//! The decision is only revisited when the user toggles the motion
//! preference; the runtime then tears down and remounts.

use std::fmt;

use crate::error::GpuError;
use crate::motion::MotionPreference;

/// Thresholds and particle budgets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapabilityConfig {
    /// Narrowest viewport (CSS px) that gets the GPU path.
    pub gpu_min_viewport_width: f64,
    /// Devices reporting fewer logical cores get the reduced budget.
    pub low_core_threshold: u32,
    /// Particle count on capable devices.
    pub full_particle_count: usize,
    /// Particle count on constrained devices.
    pub reduced_particle_count: usize,
}

impl CapabilityConfig {
    /// Defaults for the marketing hero: 768 px, 4 cores, 180 / 100 points.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            gpu_min_viewport_width: 768.0,
            low_core_threshold: 4,
            full_particle_count: 180,
            reduced_particle_count: 100,
        }
    }
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// What the host measured about the device at mount.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceProbe {
    /// Viewport width in CSS pixels.
    pub viewport_width: f64,
    /// `navigator.hardwareConcurrency`, if reported.
    pub logical_cores: Option<u32>,
    /// Whether a GPU-capable canvas context could be created.
    pub gpu_available: bool,
}

/// Particle budget class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityTier {
    /// Capable device: full particle count.
    Full,
    /// Few cores: reduced particle count.
    Constrained,
}

/// Why the static fallback is shown.
#[derive(Clone, Debug, PartialEq)]
pub enum FallbackReason {
    /// The user or OS asked for reduced motion.
    ReducedMotion,
    /// The viewport is narrower than the GPU breakpoint.
    SmallViewport {
        /// Measured width.
        width: f64,
        /// Configured breakpoint.
        breakpoint: f64,
    },
    /// The probe could not create a GPU context.
    NoGpuContext,
    /// The GPU path failed after it was chosen.
    GpuFailed(GpuError),
    /// The GPU path panicked; caught as a last resort.
    Panicked(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReducedMotion => f.write_str("reduced motion"),
            Self::SmallViewport { width, breakpoint } => {
                write!(f, "viewport {width}px below {breakpoint}px")
            }
            Self::NoGpuContext => f.write_str("no GPU context"),
            Self::GpuFailed(err) => write!(f, "{err}"),
            Self::Panicked(msg) => write!(f, "GPU path panicked: {msg}"),
        }
    }
}

/// Which hero rendering to mount.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderPath {
    /// Particle morph on the GPU.
    Gpu {
        /// Particles to generate.
        particle_count: usize,
        /// Budget class the count came from.
        tier: CapabilityTier,
    },
    /// Static gradient.
    Fallback {
        /// Why.
        reason: FallbackReason,
    },
}

/// Flat form of a [`RenderPath`] for hosts that only need the two facts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderDecision {
    /// Whether to mount the GPU renderer.
    pub use_gpu: bool,
    /// Particle count (0 on the fallback path).
    pub particle_count: usize,
}

impl RenderPath {
    /// Flattens to a [`RenderDecision`].
    #[must_use]
    pub fn decision(&self) -> RenderDecision {
        match self {
            Self::Gpu { particle_count, .. } => RenderDecision {
                use_gpu: true,
                particle_count: *particle_count,
            },
            Self::Fallback { .. } => RenderDecision {
                use_gpu: false,
                particle_count: 0,
            },
        }
    }

    /// Returns `true` for the GPU path.
    #[must_use]
    pub fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu { .. })
    }
}

/// Decides the hero render path.
///
/// Checked in order: reduced motion, viewport width, GPU availability, then
/// the core count picks the particle budget. An unknown core count is
/// treated as capable.
#[must_use]
pub fn decide_render_path(
    probe: &DeviceProbe,
    preference: &MotionPreference,
    config: &CapabilityConfig,
) -> RenderPath {
    let path = if preference.prefers_reduced {
        RenderPath::Fallback {
            reason: FallbackReason::ReducedMotion,
        }
    } else if probe.viewport_width < config.gpu_min_viewport_width {
        RenderPath::Fallback {
            reason: FallbackReason::SmallViewport {
                width: probe.viewport_width,
                breakpoint: config.gpu_min_viewport_width,
            },
        }
    } else if !probe.gpu_available {
        RenderPath::Fallback {
            reason: FallbackReason::NoGpuContext,
        }
    } else {
        match probe.logical_cores {
            Some(cores) if cores < config.low_core_threshold => RenderPath::Gpu {
                particle_count: config.reduced_particle_count,
                tier: CapabilityTier::Constrained,
            },
            _ => RenderPath::Gpu {
                particle_count: config.full_particle_count,
                tier: CapabilityTier::Full,
            },
        }
    };
    tracing::info!(?probe, ?path, "render path decided");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP: DeviceProbe = DeviceProbe {
        viewport_width: 1440.0,
        logical_cores: Some(8),
        gpu_available: true,
    };

    fn decide(probe: DeviceProbe, reduced: bool) -> RenderPath {
        let pref = MotionPreference {
            prefers_reduced: reduced,
            source_is_manual_override: false,
        };
        decide_render_path(&probe, &pref, &CapabilityConfig::web())
    }

    #[test]
    fn capable_desktop_gets_full_budget() {
        assert_eq!(
            decide(DESKTOP, false).decision(),
            RenderDecision {
                use_gpu: true,
                particle_count: 180,
            }
        );
    }

    #[test]
    fn few_cores_get_reduced_budget() {
        let probe = DeviceProbe {
            logical_cores: Some(2),
            ..DESKTOP
        };
        assert_eq!(
            decide(probe, false),
            RenderPath::Gpu {
                particle_count: 100,
                tier: CapabilityTier::Constrained,
            }
        );
    }

    #[test]
    fn unknown_core_count_is_capable() {
        let probe = DeviceProbe {
            logical_cores: None,
            ..DESKTOP
        };
        assert_eq!(decide(probe, false).decision().particle_count, 180);
    }

    #[test]
    fn reduced_motion_beats_everything() {
        assert_eq!(
            decide(DESKTOP, true),
            RenderPath::Fallback {
                reason: FallbackReason::ReducedMotion,
            }
        );
    }

    #[test]
    fn narrow_viewport_and_missing_gpu_fall_back() {
        let phone = DeviceProbe {
            viewport_width: 390.0,
            ..DESKTOP
        };
        assert!(matches!(
            decide(phone, false),
            RenderPath::Fallback {
                reason: FallbackReason::SmallViewport { .. }
            }
        ));

        let no_gpu = DeviceProbe {
            gpu_available: false,
            ..DESKTOP
        };
        assert_eq!(
            decide(no_gpu, false),
            RenderPath::Fallback {
                reason: FallbackReason::NoGpuContext,
            }
        );
        assert!(!decide(no_gpu, false).decision().use_gpu);
    }
}
