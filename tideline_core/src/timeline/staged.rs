// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Staged reveals.
//!
//! A staged reveal partitions timeline progress into *hold* bands, in which
//! exactly one step is fully visible, separated by *transition* bands that
//! crossfade between neighbouring steps. Boundaries are fractions of
//! progress, not times, so a connector line drawn from the same `p` can
//! never drift out of step with the visible stage.
//!
//! The bands tile `[0, 1]`: the first starts at exactly 0, each band starts
//! at exactly the previous band's end, and the last ends at exactly 1.

use super::segment::{LayerTarget, Segment};
use crate::error::TimelineError;
use crate::layer::{LayerId, LayerProperty};

/// What happens inside a band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BandKind {
    /// One step is fully visible.
    Hold(usize),
    /// Crossfade from one step to the next.
    Transition {
        /// Step fading out.
        from: usize,
        /// Step fading in.
        to: usize,
    },
}

/// A contiguous sub-range of progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Band {
    /// Inclusive start.
    pub start: f64,
    /// Exclusive end (inclusive for the last band).
    pub end: f64,
    /// Band behaviour.
    pub kind: BandKind,
}

impl Band {
    /// Width of the band.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

/// An SVG connector whose dash offset tracks the same progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Connector {
    /// The path layer.
    pub layer: LayerId,
    /// Total path length (the dash array length).
    pub length: f64,
}

/// Stroke dash offset that draws `p` of a path of `length`.
#[must_use]
pub fn connector_offset(length: f64, p: f64) -> f64 {
    length * (1.0 - p.clamp(0.0, 1.0))
}

/// A tiling of `[0, 1]` into hold and transition bands.
#[derive(Clone, Debug, PartialEq)]
pub struct StagePartition {
    steps: usize,
    bands: Vec<Band>,
}

impl StagePartition {
    /// Equal hold bands separated by transitions of `transition_width`.
    pub fn even(steps: usize, transition_width: f64) -> Result<Self, TimelineError> {
        let weights: Vec<f64> = std::iter::repeat_n(1.0, steps).collect();
        Self::from_fractions(&weights, transition_width)
    }

    /// Hold bands sized by relative `weights`, separated by transitions of
    /// `transition_width`.
    ///
    /// The weights are scaled to fill whatever the transitions leave over,
    /// so `[1.0, 1.2, 1.0]` makes the middle step hold 20% longer.
    pub fn from_fractions(weights: &[f64], transition_width: f64) -> Result<Self, TimelineError> {
        let steps = weights.len();
        if steps < 2 {
            return Err(TimelineError::InvalidConfig("staged reveal needs at least two steps"));
        }
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(TimelineError::InvalidConfig("stage weights must be positive"));
        }
        if !transition_width.is_finite() || transition_width < 0.0 {
            return Err(TimelineError::InvalidConfig(
                "transition width must be non-negative",
            ));
        }
        let transitions = transition_width * (steps - 1) as f64;
        if transitions >= 1.0 {
            return Err(TimelineError::InvalidConfig(
                "transitions leave no room for hold bands",
            ));
        }

        let hold_total = 1.0 - transitions;
        let weight_sum: f64 = weights.iter().sum();
        let mut bands = Vec::with_capacity(steps * 2 - 1);
        let mut cursor = 0.0;
        for (step, weight) in weights.iter().enumerate() {
            let last = step + 1 == steps;
            let end = if last {
                1.0
            } else {
                cursor + hold_total * weight / weight_sum
            };
            bands.push(Band {
                start: cursor,
                end,
                kind: BandKind::Hold(step),
            });
            cursor = end;
            if !last && transition_width > 0.0 {
                let end = cursor + transition_width;
                bands.push(Band {
                    start: cursor,
                    end,
                    kind: BandKind::Transition {
                        from: step,
                        to: step + 1,
                    },
                });
                cursor = end;
            }
        }
        Ok(Self { steps, bands })
    }

    /// Number of steps.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The bands, in order.
    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// The band containing `p` (clamped to `[0, 1]`).
    #[must_use]
    pub fn band_at(&self, p: f64) -> &Band {
        let p = p.clamp(0.0, 1.0);
        let last = self.bands.len() - 1;
        let idx = self.bands[..last]
            .iter()
            .position(|b| p < b.end)
            .unwrap_or(last);
        &self.bands[idx]
    }

    /// Opacity of every step at progress `p`.
    ///
    /// Inside a hold band exactly one step is 1 and the rest are 0; inside a
    /// transition band the two neighbours crossfade linearly.
    #[must_use]
    pub fn step_opacities(&self, p: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.steps];
        let band = self.band_at(p);
        match band.kind {
            BandKind::Hold(step) => out[step] = 1.0,
            BandKind::Transition { from, to } => {
                let t = ((p - band.start) / band.width()).clamp(0.0, 1.0);
                out[from] = 1.0 - t;
                out[to] = t;
            }
        }
        out
    }

    /// Builds one timeline segment per band.
    ///
    /// `step_layers[i]` receives step `i`'s opacity; the optional connector
    /// is mapped linearly across every band so its dash offset equals
    /// [`connector_offset`] at any `p`.
    pub fn segments(
        &self,
        step_layers: &[LayerId],
        connector: Option<Connector>,
    ) -> Result<Vec<Segment>, TimelineError> {
        if step_layers.len() != self.steps {
            return Err(TimelineError::InvalidConfig(
                "one layer per stage step is required",
            ));
        }
        Ok(self
            .bands
            .iter()
            .map(|band| {
                let mut targets: Vec<LayerTarget> = step_layers
                    .iter()
                    .enumerate()
                    .map(|(step, &layer)| {
                        let (from, to) = match band.kind {
                            BandKind::Hold(s) => {
                                let v = if s == step { 1.0 } else { 0.0 };
                                (v, v)
                            }
                            BandKind::Transition { from, .. } if step == from => (1.0, 0.0),
                            BandKind::Transition { to, .. } if step == to => (0.0, 1.0),
                            BandKind::Transition { .. } => (0.0, 0.0),
                        };
                        LayerTarget::linear(layer, LayerProperty::Opacity, from, to)
                    })
                    .collect();
                if let Some(c) = connector {
                    targets.push(LayerTarget::linear(
                        c.layer,
                        LayerProperty::StrokeOffset,
                        connector_offset(c.length, band.start),
                        connector_offset(c.length, band.end),
                    ));
                }
                Segment::new(band.start, band.end, targets)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerStore;
    use crate::timeline::segment;

    fn assert_tiles_unit_interval(partition: &StagePartition) {
        let bands = partition.bands();
        assert_eq!(bands[0].start, 0.0);
        assert_eq!(bands[bands.len() - 1].end, 1.0);
        for pair in bands.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "bands must be contiguous");
        }
        for b in bands {
            assert!(b.width() > 0.0, "empty band {b:?}");
        }
        let sum: f64 = bands.iter().map(Band::width).sum();
        assert!((sum - 1.0).abs() < 1e-12, "widths sum to {sum}");
    }

    #[test]
    fn partitions_tile_for_any_step_count() {
        for steps in 2..=12 {
            for tw in [0.0, 0.01, 0.05, 0.08] {
                if tw * (steps - 1) as f64 >= 1.0 {
                    continue;
                }
                let p = StagePartition::even(steps, tw).unwrap();
                assert_tiles_unit_interval(&p);
                let expected = if tw > 0.0 { 2 * steps - 1 } else { steps };
                assert_eq!(p.bands().len(), expected);
            }
        }
    }

    #[test]
    fn tuned_fractions_still_tile() {
        let p = StagePartition::from_fractions(&[0.3, 0.25, 0.35], 0.05).unwrap();
        assert_tiles_unit_interval(&p);
        assert_eq!(p.steps(), 3);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(StagePartition::even(1, 0.1).is_err());
        assert!(StagePartition::even(3, 0.5).is_err());
        assert!(StagePartition::from_fractions(&[1.0, 0.0], 0.1).is_err());
        assert!(StagePartition::even(3, -0.1).is_err());
    }

    #[test]
    fn hold_bands_show_one_step() {
        let p = StagePartition::even(3, 0.1).unwrap();
        assert_eq!(p.step_opacities(0.0), [1.0, 0.0, 0.0]);
        assert_eq!(p.step_opacities(0.5), [0.0, 1.0, 0.0]);
        assert_eq!(p.step_opacities(1.0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn transition_bands_crossfade() {
        let p = StagePartition::even(3, 0.1).unwrap();
        let t = p.bands()[1];
        let mid = (t.start + t.end) / 2.0;
        let o = p.step_opacities(mid);
        assert!((o[0] - 0.5).abs() < 1e-9);
        assert!((o[1] - 0.5).abs() < 1e-9);
        assert_eq!(o[2], 0.0);
    }

    #[test]
    fn segments_agree_with_step_opacities_and_connector() {
        let mut store = LayerStore::new();
        let steps = [store.create_layer(), store.create_layer(), store.create_layer()];
        let line = store.create_layer();
        let partition = StagePartition::even(3, 0.06).unwrap();
        let segs = partition
            .segments(
                &steps,
                Some(Connector {
                    layer: line,
                    length: 600.0,
                }),
            )
            .unwrap();

        for i in 0..=20 {
            let p = f64::from(i) / 20.0;
            segment::apply(&segs, p, &mut store);
            let expected = partition.step_opacities(p);
            for (step, layer) in steps.iter().enumerate() {
                let got = store.opacity(*layer).unwrap();
                assert!((got - expected[step]).abs() < 1e-9, "p={p} step={step}");
            }
            let dash = store.stroke_offset(line).unwrap();
            assert!((dash - connector_offset(600.0, p)).abs() < 1e-9, "p={p}");
        }
    }
}
