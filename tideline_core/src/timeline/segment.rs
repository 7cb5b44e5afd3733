// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Segments and their evaluation.
//!
//! A [`Segment`] covers a sub-range of timeline progress and maps it onto
//! one or more [`LayerTarget`]s. Evaluation is a pure function of `p`: for
//! every `(layer, property)` pair the value comes from the last segment that
//! has started, held at its end value once that segment is over. Before any
//! segment touching the pair has started, the first such segment's `from`
//! value applies. Scrolling back therefore undoes a forward scroll exactly.

use crate::error::TimelineError;
use crate::layer::{LayerId, LayerProperty, LayerStore};

/// Easing curve applied to a segment's local progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ease {
    /// `t`
    #[default]
    Linear,
    /// `3t² − 2t³`
    SmoothStep,
    /// `1 − (1 − t)³`
    OutCubic,
    /// Cubic ease-in for the first half, ease-out for the second.
    InOutCubic,
}

impl Ease {
    /// Applies the curve to `t`, clamped to `[0, 1]` first.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::SmoothStep => smoothstep(t),
            Self::OutCubic => {
                let u = 1.0 - t;
                1.0 - u * u * u
            }
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u * u / 2.0
                }
            }
        }
    }
}

/// Hermite smoothstep on `[0, 1]`; exactly 0.5 at 0.5.
#[must_use]
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Linear interpolation between `a` and `b`, exact at both ends.
#[must_use]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// One property of one layer driven by a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTarget {
    /// Layer to write.
    pub layer: LayerId,
    /// Property to write.
    pub property: LayerProperty,
    /// Value at the segment's start.
    pub from: f64,
    /// Value at the segment's end.
    pub to: f64,
    /// Mapping from local progress to the interpolation factor.
    pub curve: Ease,
}

impl LayerTarget {
    /// A linear target.
    #[must_use]
    pub fn linear(layer: LayerId, property: LayerProperty, from: f64, to: f64) -> Self {
        Self {
            layer,
            property,
            from,
            to,
            curve: Ease::Linear,
        }
    }

    /// Returns the same target with a different curve.
    #[must_use]
    pub fn with_curve(mut self, curve: Ease) -> Self {
        self.curve = curve;
        self
    }

    /// Value at local progress `t`.
    #[must_use]
    pub fn value_at(&self, t: f64) -> f64 {
        lerp(self.from, self.to, self.curve.apply(t))
    }
}

/// A sub-range of timeline progress and what it drives.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Progress where the segment begins, in `[0, 1]`.
    pub range_start: f64,
    /// Progress where the segment ends, in `(range_start, 1]`.
    pub range_end: f64,
    /// Properties driven by this segment.
    pub targets: Vec<LayerTarget>,
}

impl Segment {
    /// Creates a segment.
    #[must_use]
    pub fn new(range_start: f64, range_end: f64, targets: Vec<LayerTarget>) -> Self {
        Self {
            range_start,
            range_end,
            targets,
        }
    }

    /// A segment spanning the whole timeline.
    #[must_use]
    pub fn full(targets: Vec<LayerTarget>) -> Self {
        Self::new(0.0, 1.0, targets)
    }

    /// Local progress within this segment, clamped to `[0, 1]`.
    #[must_use]
    pub fn local_progress(&self, p: f64) -> f64 {
        ((p - self.range_start) / (self.range_end - self.range_start)).clamp(0.0, 1.0)
    }
}

/// Sorts segments by start and checks they lie in `[0, 1]` without
/// overlapping. Touching segments are fine.
pub(crate) fn normalize(segments: &mut [Segment]) -> Result<(), TimelineError> {
    segments.sort_by(|a, b| a.range_start.total_cmp(&b.range_start));
    for (index, s) in segments.iter().enumerate() {
        let valid = s.range_start >= 0.0 && s.range_end <= 1.0 && s.range_end > s.range_start;
        if !valid {
            return Err(TimelineError::InvalidSegment {
                index,
                start: s.range_start,
                end: s.range_end,
            });
        }
    }
    for (first, pair) in segments.windows(2).enumerate() {
        if pair[1].range_start < pair[0].range_end {
            return Err(TimelineError::OverlappingSegments {
                first,
                second: first + 1,
            });
        }
    }
    Ok(())
}

/// The value every driven `(layer, property)` pair takes at progress `p`.
///
/// Segments must already be sorted (see the module docs for the rule).
#[must_use]
pub fn resolve(segments: &[Segment], p: f64) -> Vec<(LayerId, LayerProperty, f64)> {
    let mut out: Vec<(LayerId, LayerProperty, f64)> = Vec::new();
    for segment in segments {
        let started = p >= segment.range_start;
        let t = segment.local_progress(p);
        for target in &segment.targets {
            let slot = out
                .iter_mut()
                .find(|(l, prop, _)| *l == target.layer && *prop == target.property);
            match (slot, started) {
                (Some(slot), true) => slot.2 = target.value_at(t),
                (Some(_), false) => {}
                (None, true) => out.push((target.layer, target.property, target.value_at(t))),
                (None, false) => out.push((target.layer, target.property, target.from)),
            }
        }
    }
    out
}

/// Writes the values for progress `p` into the store.
pub fn apply(segments: &[Segment], p: f64, store: &mut LayerStore) {
    for (layer, property, value) in resolve(segments, p) {
        store.set_property(layer, property, value);
    }
}

/// One layer of a parallax group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParallaxLayer {
    /// Layer to move.
    pub layer: LayerId,
    /// Fraction of the group distance this layer travels (e.g. 0.7, 1.0).
    pub rate: f64,
}

/// Builds one full-range segment moving every layer vertically by
/// `rate × distance` over the same progress.
///
/// All layers share one `p`, so they stay phase-locked.
#[must_use]
pub fn parallax_segment(layers: &[ParallaxLayer], distance: f64) -> Segment {
    Segment::full(
        layers
            .iter()
            .map(|l| LayerTarget::linear(l.layer, LayerProperty::TranslateY, 0.0, l.rate * distance))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothstep_midpoint_is_exact() {
        assert_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(2.0), 1.0);
    }

    #[test]
    fn eases_hit_endpoints() {
        for ease in [Ease::Linear, Ease::SmoothStep, Ease::OutCubic, Ease::InOutCubic] {
            assert_eq!(ease.apply(0.0), 0.0, "{ease:?}");
            assert_eq!(ease.apply(1.0), 1.0, "{ease:?}");
        }
    }

    #[test]
    fn normalize_sorts_and_rejects_overlap() {
        let mut segs = vec![
            Segment::new(0.5, 1.0, vec![]),
            Segment::new(0.0, 0.5, vec![]),
        ];
        normalize(&mut segs).unwrap();
        assert_eq!(segs[0].range_start, 0.0);

        let mut overlapping = vec![
            Segment::new(0.0, 0.6, vec![]),
            Segment::new(0.5, 1.0, vec![]),
        ];
        assert_eq!(
            normalize(&mut overlapping),
            Err(TimelineError::OverlappingSegments {
                first: 0,
                second: 1
            })
        );

        let mut out_of_range = vec![Segment::new(0.2, 1.2, vec![])];
        assert!(matches!(
            normalize(&mut out_of_range),
            Err(TimelineError::InvalidSegment { index: 0, .. })
        ));
    }

    #[test]
    fn later_segment_wins_and_earlier_holds_end() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        let segs = vec![
            Segment::new(0.0, 0.4, vec![LayerTarget::linear(id, LayerProperty::Opacity, 0.0, 1.0)]),
            Segment::new(0.6, 1.0, vec![LayerTarget::linear(id, LayerProperty::Opacity, 1.0, 0.2)]),
        ];

        assert_eq!(resolve(&segs, 0.2), [(id, LayerProperty::Opacity, 0.5)]);
        assert_eq!(resolve(&segs, 0.5), [(id, LayerProperty::Opacity, 1.0)]);
        assert_eq!(resolve(&segs, 1.0), [(id, LayerProperty::Opacity, 0.2)]);
    }

    #[test]
    fn before_first_segment_uses_its_from_value() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        let segs = vec![Segment::new(
            0.5,
            1.0,
            vec![LayerTarget::linear(id, LayerProperty::TranslateY, 40.0, 0.0)],
        )];
        apply(&segs, 0.1, &mut store);
        assert_eq!(store.property(id, LayerProperty::TranslateY), Some(40.0));
    }

    #[test]
    fn parallax_layers_are_phase_locked() {
        let mut store = LayerStore::new();
        let bg = store.create_layer();
        let cta = store.create_layer();
        let seg = parallax_segment(
            &[
                ParallaxLayer { layer: bg, rate: 0.7 },
                ParallaxLayer { layer: cta, rate: 1.0 },
            ],
            -200.0,
        );
        apply(std::slice::from_ref(&seg), 0.5, &mut store);
        let y_bg = store.property(bg, LayerProperty::TranslateY).unwrap();
        let y_cta = store.property(cta, LayerProperty::TranslateY).unwrap();
        assert!((y_bg - -70.0).abs() < 1e-9);
        assert_eq!(y_cta, -100.0);
        assert!((y_bg / y_cta - 0.7).abs() < 1e-12, "ratio holds at every p");
    }
}
