// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Virtual scroll state.
//!
//! [`ScrollState`] is owned exclusively by the
//! [`FrameClock`](crate::clock::FrameClock). Native scroll events and wheel
//! deltas are buffered as [`ScrollInput`] and ingested at the start of each
//! frame; the smoothed offset then follows the raw offset with exponential
//! damping:
//!
//! ```text
//! smoothed += (raw - smoothed) * lerp_factor
//! ```
//!
//! With `0 < lerp_factor <= 1` the error shrinks by a constant factor every
//! frame, so the smoothed offset converges without overshoot. Everything
//! else reads a [`ScrollSnapshot`] copy.

/// Smoothing parameters for the frame clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockConfig {
    /// Fraction of the remaining distance covered per frame (0, 1].
    pub lerp_factor: f64,
    /// Velocity (px/s) that maps to a normalised velocity of ±1.
    pub max_velocity: f64,
    /// Distance (px) under which the smoothed offset snaps to the raw one.
    pub settle_epsilon: f64,
    /// Largest frame delta (s) fed to consumers; longer gaps (tab switches)
    /// are clamped.
    pub max_delta: f64,
}

impl ClockConfig {
    /// Default configuration for browser pages.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            lerp_factor: 0.1,
            max_velocity: 3000.0,
            settle_epsilon: 0.1,
            max_delta: 0.1,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Raw scroll input buffered between frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollInput {
    /// A relative wheel or touch delta in pixels.
    Delta(f64),
    /// An absolute native scroll position in pixels.
    Absolute(f64),
}

/// Read-only copy of the scroll state for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollSnapshot {
    /// Latest target offset.
    pub raw_offset: f64,
    /// Damped offset used by every consumer this frame.
    pub smoothed_offset: f64,
    /// Smoothed velocity in px/s.
    pub velocity: f64,
    /// Maximum scroll offset of the document.
    pub limit: f64,
    /// Viewport height in pixels.
    pub viewport_height: f64,
    /// Velocity (px/s) that normalises to ±1.
    pub max_velocity: f64,
}

impl ScrollSnapshot {
    /// Velocity normalised to `[-1, 1]` (for grain/texture intensity).
    #[must_use]
    pub fn normalized_velocity(&self) -> f64 {
        if self.max_velocity <= 0.0 {
            return 0.0;
        }
        (self.velocity / self.max_velocity).clamp(-1.0, 1.0)
    }

    /// Scroll depth through the whole document, `[0, 1]`.
    #[must_use]
    pub fn depth(&self) -> f64 {
        ratio(self.smoothed_offset, self.limit)
    }

    /// Progress through the first viewport, `[0, 1]`.
    ///
    /// This is the timeline-independent hint the particle renderer uses for
    /// its spread/fade effect.
    #[must_use]
    pub fn viewport_progress(&self) -> f64 {
        ratio(self.smoothed_offset, self.viewport_height)
    }
}

fn ratio(value: f64, span: f64) -> f64 {
    if span <= 0.0 {
        0.0
    } else {
        (value / span).clamp(0.0, 1.0)
    }
}

/// The single authoritative scroll state.
#[derive(Clone, Debug)]
pub struct ScrollState {
    raw_offset: f64,
    smoothed_offset: f64,
    velocity: f64,
    limit: f64,
    viewport_height: f64,
    pending_delta: f64,
    pending_absolute: Option<f64>,
    config: ClockConfig,
}

impl ScrollState {
    /// Creates a state at offset zero.
    #[must_use]
    pub fn new(config: ClockConfig) -> Self {
        Self {
            raw_offset: 0.0,
            smoothed_offset: 0.0,
            velocity: 0.0,
            limit: f64::INFINITY,
            viewport_height: 0.0,
            pending_delta: 0.0,
            pending_absolute: None,
            config,
        }
    }

    /// Buffers raw input until the next [`ingest`](Self::ingest).
    ///
    /// An absolute position discards deltas buffered before it.
    pub fn push(&mut self, input: ScrollInput) {
        match input {
            ScrollInput::Delta(d) => self.pending_delta += d,
            ScrollInput::Absolute(offset) => {
                self.pending_absolute = Some(offset);
                self.pending_delta = 0.0;
            }
        }
    }

    /// Updates the document bounds used for clamping and normalisation.
    pub fn set_bounds(&mut self, limit: f64, viewport_height: f64) {
        self.limit = limit.max(0.0);
        self.viewport_height = viewport_height.max(0.0);
        self.raw_offset = self.raw_offset.clamp(0.0, self.limit);
    }

    /// Folds buffered input into the raw offset, clamped to `[0, limit]`.
    pub fn ingest(&mut self) {
        let mut raw = self.raw_offset;
        if let Some(abs) = self.pending_absolute.take() {
            raw = abs;
        }
        raw += std::mem::take(&mut self.pending_delta);
        self.raw_offset = raw.clamp(0.0, self.limit);
    }

    /// Advances the smoothed offset by one frame of `delta` seconds.
    pub fn smooth(&mut self, delta: f64) {
        let prev = self.smoothed_offset;
        let error = self.raw_offset - self.smoothed_offset;
        if error.abs() <= self.config.settle_epsilon {
            self.smoothed_offset = self.raw_offset;
        } else {
            self.smoothed_offset += error * self.config.lerp_factor;
        }
        self.velocity = if delta > 0.0 {
            (self.smoothed_offset - prev) / delta
        } else {
            0.0
        };
    }

    /// Moves both offsets at once, without smoothing.
    ///
    /// Used under reduced motion and for anchor jumps.
    pub fn jump_to(&mut self, offset: f64) {
        self.pending_absolute = None;
        self.pending_delta = 0.0;
        self.raw_offset = offset.clamp(0.0, self.limit);
        self.smoothed_offset = self.raw_offset;
        self.velocity = 0.0;
    }

    /// Returns `true` when there is no buffered input and the smoothed
    /// offset has reached the raw one.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending_absolute.is_none()
            && self.pending_delta == 0.0
            && self.smoothed_offset == self.raw_offset
    }

    /// Returns a copy for consumers.
    #[must_use]
    pub fn snapshot(&self) -> ScrollSnapshot {
        ScrollSnapshot {
            raw_offset: self.raw_offset,
            smoothed_offset: self.smoothed_offset,
            velocity: self.velocity,
            limit: self.limit,
            viewport_height: self.viewport_height,
            max_velocity: self.config.max_velocity,
        }
    }

    /// Pending input or an unsettled offset that requires pushing through
    /// [`ingest`](Self::ingest) and [`smooth`](Self::smooth).
    #[must_use]
    pub fn has_pending_input(&self) -> bool {
        self.pending_absolute.is_some() || self.pending_delta != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f64 = 1.0 / 60.0;

    #[test]
    fn converges_monotonically_without_overshoot() {
        for &target in &[1.0, 250.0, 12_345.6] {
            let mut s = ScrollState::new(ClockConfig::web());
            s.push(ScrollInput::Absolute(target));
            s.ingest();

            let mut prev_error = f64::INFINITY;
            for _ in 0..400 {
                s.smooth(FRAME);
                let snap = s.snapshot();
                let error = target - snap.smoothed_offset;
                assert!(error >= 0.0, "overshoot at target {target}: {error}");
                if prev_error > 0.0 {
                    assert!(error < prev_error, "error must strictly decrease");
                }
                prev_error = error;
            }
            assert!(s.is_settled(), "should settle for target {target}");
        }
    }

    #[test]
    fn deltas_accumulate_and_clamp_to_limit() {
        let mut s = ScrollState::new(ClockConfig::web());
        s.set_bounds(500.0, 800.0);
        s.push(ScrollInput::Delta(300.0));
        s.push(ScrollInput::Delta(400.0));
        s.ingest();
        assert_eq!(s.snapshot().raw_offset, 500.0);

        s.push(ScrollInput::Delta(-900.0));
        s.ingest();
        assert_eq!(s.snapshot().raw_offset, 0.0);
    }

    #[test]
    fn absolute_replaces_earlier_deltas() {
        let mut s = ScrollState::new(ClockConfig::web());
        s.push(ScrollInput::Delta(50.0));
        s.push(ScrollInput::Absolute(10.0));
        s.push(ScrollInput::Delta(5.0));
        s.ingest();
        assert_eq!(s.snapshot().raw_offset, 15.0);
    }

    #[test]
    fn velocity_normalises_into_unit_range() {
        let mut s = ScrollState::new(ClockConfig::web());
        s.push(ScrollInput::Absolute(100_000.0));
        s.ingest();
        s.smooth(FRAME);
        let snap = s.snapshot();
        assert!(snap.velocity > 0.0);
        assert_eq!(snap.normalized_velocity(), 1.0);
    }

    #[test]
    fn depth_and_viewport_progress_are_clamped() {
        let mut s = ScrollState::new(ClockConfig::web());
        s.set_bounds(2000.0, 1000.0);
        s.jump_to(1500.0);
        let snap = s.snapshot();
        assert_eq!(snap.depth(), 0.75);
        assert_eq!(snap.viewport_progress(), 1.0);
        assert_eq!(snap.velocity, 0.0);
    }
}
