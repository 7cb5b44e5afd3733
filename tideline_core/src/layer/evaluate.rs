// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change collection.
//!
//! [`FrameChanges`] uses raw slot indices rather than [`LayerId`] handles so
//! presenters can index straight into the store through the `*_at()`
//! accessors (e.g. [`opacity_at`](super::LayerStore::opacity_at)).
//!
//! [`LayerId`]: super::LayerId

use super::store::LayerStore;
use crate::dirty;

/// The set of changes produced by one [`LayerStore::evaluate`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameChanges {
    /// Layers whose translation or scale changed.
    pub transforms: Vec<u32>,
    /// Layers whose opacity changed.
    pub opacities: Vec<u32>,
    /// Layers whose stroke dash offset changed.
    pub strokes: Vec<u32>,
    /// Layers created since the last evaluate.
    pub added: Vec<u32>,
    /// Layers destroyed since the last evaluate.
    pub removed: Vec<u32>,
}

impl FrameChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.transforms.clear();
        self.opacities.clear();
        self.strokes.clear();
        self.added.clear();
        self.removed.clear();
    }

    /// Returns `true` when the presenter has nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
            && self.opacities.is_empty()
            && self.strokes.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
    }
}

impl LayerStore {
    /// Drains every dirty channel and returns what changed.
    pub fn evaluate(&mut self) -> FrameChanges {
        let mut changes = FrameChanges::default();
        self.evaluate_into(&mut changes);
        changes
    }

    /// Like [`evaluate`](Self::evaluate), but reuses a caller-provided buffer.
    pub fn evaluate_into(&mut self, changes: &mut FrameChanges) {
        changes.clear();
        changes
            .transforms
            .extend(self.dirty.drain(dirty::TRANSFORM).deterministic().run());
        changes
            .opacities
            .extend(self.dirty.drain(dirty::OPACITY).deterministic().run());
        changes
            .strokes
            .extend(self.dirty.drain(dirty::STROKE).deterministic().run());

        std::mem::swap(&mut self.pending_added, &mut changes.added);
        std::mem::swap(&mut self.pending_removed, &mut changes.removed);
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Vec2;

    use super::*;
    use crate::layer::LayerProperty;

    #[test]
    fn first_evaluate_reports_additions() {
        let mut store = LayerStore::new();
        let a = store.create_layer();
        let b = store.create_layer();
        let changes = store.evaluate();
        assert_eq!(changes.added, [a.index(), b.index()]);
        assert!(changes.transforms.is_empty());
    }

    #[test]
    fn unchanged_writes_produce_no_changes() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        store.set_translation(id, Vec2::new(0.0, 10.0));
        let _ = store.evaluate();

        store.set_translation(id, Vec2::new(0.0, 10.0));
        store.set_opacity(id, 1.0);
        store.set_stroke_offset(id, 0.0);
        let changes = store.evaluate();
        assert!(changes.is_empty(), "{changes:?}");
    }

    #[test]
    fn each_property_lands_in_its_channel() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        let _ = store.evaluate();

        store.set_property(id, LayerProperty::Scale, 0.5);
        store.set_property(id, LayerProperty::Opacity, 0.5);
        store.set_property(id, LayerProperty::StrokeOffset, 10.0);
        let changes = store.evaluate();
        assert_eq!(changes.transforms, [id.index()]);
        assert_eq!(changes.opacities, [id.index()]);
        assert_eq!(changes.strokes, [id.index()]);
    }

    #[test]
    fn destroyed_layer_is_reported_and_not_written() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        let _ = store.evaluate();

        store.set_opacity(id, 0.3);
        store.destroy_layer(id);
        let changes = store.evaluate();
        assert_eq!(changes.removed, [id.index()]);
        assert!(changes.opacities.is_empty());
    }

    #[test]
    fn create_then_destroy_before_evaluate_is_invisible_to_added() {
        let mut store = LayerStore::new();
        let id = store.create_layer();
        store.destroy_layer(id);
        let changes = store.evaluate();
        assert!(changes.added.is_empty());
        assert_eq!(changes.removed, [id.index()]);
    }
}
