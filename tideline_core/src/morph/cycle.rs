// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hold/transition shape cycle.

use super::targets::{SHAPE_ORDER, ShapeKind};
use crate::timeline::smoothstep;

/// Result of one [`MorphCycle::advance`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleStep {
    /// Interpolation factor between `current` and `next`, in `[0, 1]`.
    pub morph_progress: f64,
    /// Shape being morphed from.
    pub current: ShapeKind,
    /// Shape being morphed to.
    pub next: ShapeKind,
    /// Whether the shape index advanced during this step.
    pub advanced: bool,
}

/// Shape-cycle state: hold on a shape, smoothstep to the next, advance.
///
/// The index advance and the elapsed-time reset happen inside the same
/// [`advance`](Self::advance) call, and the returned [`CycleStep`] carries the
/// pair together with the progress, so no caller can observe progress from
/// one pair applied to another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphCycle {
    current_shape_index: usize,
    cycle_elapsed: f64,
    hold_duration: f64,
    transition_duration: f64,
}

impl MorphCycle {
    /// Starts on the first shape. Negative durations are treated as zero.
    #[must_use]
    pub fn new(hold_duration: f64, transition_duration: f64) -> Self {
        Self {
            current_shape_index: 0,
            cycle_elapsed: 0.0,
            hold_duration: hold_duration.max(0.0),
            transition_duration: transition_duration.max(0.0),
        }
    }

    /// Index into [`SHAPE_ORDER`] of the shape being morphed from.
    #[must_use]
    pub fn current_shape_index(&self) -> usize {
        self.current_shape_index
    }

    /// Seconds since the current shape became current.
    #[must_use]
    pub fn cycle_elapsed(&self) -> f64 {
        self.cycle_elapsed
    }

    /// The `(current, next)` shapes.
    #[must_use]
    pub fn active_pair(&self) -> (ShapeKind, ShapeKind) {
        (
            SHAPE_ORDER[self.current_shape_index],
            SHAPE_ORDER[(self.current_shape_index + 1) % SHAPE_ORDER.len()],
        )
    }

    /// Morph progress at the current elapsed time.
    #[must_use]
    pub fn morph_progress(&self) -> f64 {
        if self.cycle_elapsed < self.hold_duration {
            0.0
        } else if self.transition_duration <= 0.0 {
            1.0
        } else {
            smoothstep((self.cycle_elapsed - self.hold_duration) / self.transition_duration)
        }
    }

    /// Advances by `delta` seconds.
    pub fn advance(&mut self, delta: f64) -> CycleStep {
        self.cycle_elapsed += delta.max(0.0);
        let period = self.hold_duration + self.transition_duration;
        let mut advanced = false;
        if period > 0.0 {
            while self.cycle_elapsed >= period {
                self.cycle_elapsed -= period;
                self.current_shape_index = (self.current_shape_index + 1) % SHAPE_ORDER.len();
                advanced = true;
            }
        }
        let morph_progress = if advanced { 0.0 } else { self.morph_progress() };
        let (current, next) = self.active_pair();
        if advanced {
            tracing::trace!(?current, ?next, "morph shape advanced");
        }
        CycleStep {
            morph_progress,
            current,
            next,
            advanced,
        }
    }
}
