// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage.

use kurbo::Vec2;
use understory_dirty::{CycleHandling, DirtyTracker};

use super::id::LayerId;
use crate::dirty;

/// A single animatable scalar on a layer.
///
/// Timeline segments target one property each; the store routes the write
/// to the matching dirty channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerProperty {
    /// Horizontal translation in CSS pixels.
    TranslateX,
    /// Vertical translation in CSS pixels.
    TranslateY,
    /// Uniform scale factor.
    Scale,
    /// Opacity, clamped to `[0, 1]`.
    Opacity,
    /// SVG `stroke-dashoffset` in user units.
    StrokeOffset,
}

impl LayerProperty {
    /// The value a fresh layer holds for this property.
    #[must_use]
    pub const fn resting_value(self) -> f64 {
        match self {
            Self::TranslateX | Self::TranslateY | Self::StrokeOffset => 0.0,
            Self::Scale | Self::Opacity => 1.0,
        }
    }
}

/// Translation and scale of a layer, composed as `translate(..) scale(..)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTransform {
    /// Translation in CSS pixels.
    pub translation: Vec2,
    /// Uniform scale factor.
    pub scale: f64,
}

impl LayerTransform {
    /// No translation, unit scale.
    pub const IDENTITY: Self = Self {
        translation: Vec2::ZERO,
        scale: 1.0,
    };
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Struct-of-arrays storage for all animated layers.
///
/// Destroyed slots are recycled through a free list; generation counters make
/// old handles fail [`is_alive`](Self::is_alive). Unlike most stores, writes
/// through a stale handle are silently dropped rather than panicking: the
/// scheduler may still hold handles for a section whose DOM is already gone.
#[derive(Debug)]
pub struct LayerStore {
    // -- Properties --
    pub(crate) translation: Vec<Vec2>,
    pub(crate) scale: Vec<f64>,
    pub(crate) opacity: Vec<f64>,
    pub(crate) stroke_offset: Vec<f64>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Lifecycle tracking --
    pub(crate) pending_added: Vec<u32>,
    pub(crate) pending_removed: Vec<u32>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            translation: Vec::new(),
            scale: Vec::new(),
            opacity: Vec::new(),
            stroke_offset: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
        }
    }

    /// Creates a layer at its resting state and returns its handle.
    pub fn create_layer(&mut self) -> LayerId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.translation[i] = Vec2::ZERO;
            self.scale[i] = 1.0;
            self.opacity[i] = 1.0;
            self.stroke_offset[i] = 0.0;
            self.alive[i] = true;
            idx
        } else {
            let idx = u32::try_from(self.alive.len()).unwrap_or(u32::MAX);
            self.translation.push(Vec2::ZERO);
            self.scale.push(1.0);
            self.opacity.push(1.0);
            self.stroke_offset.push(0.0);
            self.generation.push(0);
            self.alive.push(true);
            idx
        };
        self.pending_added.push(idx);
        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a layer, freeing its slot. Returns `false` for stale handles.
    pub fn destroy_layer(&mut self, id: LayerId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.idx;
        self.dirty.remove_key(idx);
        self.alive[idx as usize] = false;
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
        self.pending_added.retain(|&i| i != idx);
        self.pending_removed.push(idx);
        true
    }

    /// Returns whether the handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        let i = id.idx as usize;
        i < self.alive.len() && self.alive[i] && self.generation[i] == id.generation
    }

    /// Number of live layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Returns `true` when no layers are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Getters --

    /// Reads one property, or `None` for a stale handle.
    #[must_use]
    pub fn property(&self, id: LayerId, property: LayerProperty) -> Option<f64> {
        if !self.is_alive(id) {
            return None;
        }
        let i = id.idx as usize;
        Some(match property {
            LayerProperty::TranslateX => self.translation[i].x,
            LayerProperty::TranslateY => self.translation[i].y,
            LayerProperty::Scale => self.scale[i],
            LayerProperty::Opacity => self.opacity[i],
            LayerProperty::StrokeOffset => self.stroke_offset[i],
        })
    }

    /// Reads the transform, or `None` for a stale handle.
    #[must_use]
    pub fn transform(&self, id: LayerId) -> Option<LayerTransform> {
        self.is_alive(id).then(|| self.transform_at(id.idx))
    }

    /// Reads the opacity, or `None` for a stale handle.
    #[must_use]
    pub fn opacity(&self, id: LayerId) -> Option<f64> {
        self.property(id, LayerProperty::Opacity)
    }

    /// Reads the stroke dash offset, or `None` for a stale handle.
    #[must_use]
    pub fn stroke_offset(&self, id: LayerId) -> Option<f64> {
        self.property(id, LayerProperty::StrokeOffset)
    }

    // -- Mutation (marks dirty only on change) --

    /// Writes one property. Stale handles are ignored.
    pub fn set_property(&mut self, id: LayerId, property: LayerProperty, value: f64) {
        if !self.is_alive(id) {
            tracing::trace!(?id, ?property, "write to stale layer ignored");
            return;
        }
        let i = id.idx as usize;
        match property {
            LayerProperty::TranslateX => {
                let t = Vec2::new(value, self.translation[i].y);
                self.write_translation(id.idx, t);
            }
            LayerProperty::TranslateY => {
                let t = Vec2::new(self.translation[i].x, value);
                self.write_translation(id.idx, t);
            }
            LayerProperty::Scale => {
                if self.scale[i] != value {
                    self.scale[i] = value;
                    self.dirty.mark(id.idx, dirty::TRANSFORM);
                }
            }
            LayerProperty::Opacity => {
                let value = value.clamp(0.0, 1.0);
                if self.opacity[i] != value {
                    self.opacity[i] = value;
                    self.dirty.mark(id.idx, dirty::OPACITY);
                }
            }
            LayerProperty::StrokeOffset => {
                if self.stroke_offset[i] != value {
                    self.stroke_offset[i] = value;
                    self.dirty.mark(id.idx, dirty::STROKE);
                }
            }
        }
    }

    /// Sets the translation. Stale handles are ignored.
    pub fn set_translation(&mut self, id: LayerId, translation: Vec2) {
        if self.is_alive(id) {
            self.write_translation(id.idx, translation);
        }
    }

    /// Sets the scale. Stale handles are ignored.
    pub fn set_scale(&mut self, id: LayerId, scale: f64) {
        self.set_property(id, LayerProperty::Scale, scale);
    }

    /// Sets the opacity, clamped to `[0, 1]`. Stale handles are ignored.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f64) {
        self.set_property(id, LayerProperty::Opacity, opacity);
    }

    /// Sets the stroke dash offset. Stale handles are ignored.
    pub fn set_stroke_offset(&mut self, id: LayerId, offset: f64) {
        self.set_property(id, LayerProperty::StrokeOffset, offset);
    }

    // -- Raw slot access for presenters --

    /// Returns the transform at a raw slot index.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn transform_at(&self, idx: u32) -> LayerTransform {
        LayerTransform {
            translation: self.translation[idx as usize],
            scale: self.scale[idx as usize],
        }
    }

    /// Returns the opacity at a raw slot index.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn opacity_at(&self, idx: u32) -> f64 {
        self.opacity[idx as usize]
    }

    /// Returns the stroke dash offset at a raw slot index.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn stroke_offset_at(&self, idx: u32) -> f64 {
        self.stroke_offset[idx as usize]
    }

    fn write_translation(&mut self, idx: u32, translation: Vec2) {
        let slot = &mut self.translation[idx as usize];
        if *slot != translation {
            *slot = translation;
            self.dirty.mark(idx, dirty::TRANSFORM);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_destroy() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        assert!(store.is_alive(id));
        assert!(store.destroy_layer(id));
        assert!(!store.is_alive(id));
        assert!(!store.destroy_layer(id), "second destroy is a no-op");
    }

    #[test]
    fn reused_slot_rejects_old_handle() {
        let mut store = LayerStore::new();
        let old = store.create_layer();
        store.destroy_layer(old);
        let new = store.create_layer();
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());

        store.set_opacity(old, 0.25);
        assert_eq!(store.opacity(new), Some(1.0), "stale write must not land");
        assert_eq!(store.opacity(old), None);
    }

    #[test]
    fn properties_round_trip_through_setters() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        store.set_property(id, LayerProperty::TranslateY, -40.0);
        store.set_property(id, LayerProperty::TranslateX, 12.0);
        store.set_scale(id, 1.5);
        store.set_stroke_offset(id, 300.0);

        assert_eq!(
            store.transform(id),
            Some(LayerTransform {
                translation: Vec2::new(12.0, -40.0),
                scale: 1.5,
            })
        );
        assert_eq!(store.stroke_offset(id), Some(300.0));
    }

    #[test]
    fn opacity_is_clamped() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        store.set_opacity(id, 1.7);
        assert_eq!(store.opacity(id), Some(1.0));
        store.set_opacity(id, -0.2);
        assert_eq!(store.opacity(id), Some(0.0));
    }

    #[test]
    fn resting_values_match_fresh_layer() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        for p in [
            LayerProperty::TranslateX,
            LayerProperty::TranslateY,
            LayerProperty::Scale,
            LayerProperty::Opacity,
            LayerProperty::StrokeOffset,
        ] {
            assert_eq!(store.property(id, p), Some(p.resting_value()), "{p:?}");
        }
    }
}
