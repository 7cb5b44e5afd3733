// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOM presentation of the layer store.
//!
//! Unlike a compositor, the page already owns its elements: layers are bound
//! to existing nodes with [`DomPresenter::bind`], and the presenter only
//! writes inline `transform`, `opacity` and `stroke-dashoffset` for the
//! channels that changed this frame.

use tideline_core::backend::Presenter;
use tideline_core::layer::{FrameChanges, LayerId, LayerStore, LayerTransform};
use web_sys::{CssStyleDeclaration, Element};
use wasm_bindgen::JsCast as _;

/// Writes layer changes to bound DOM elements.
pub struct DomPresenter {
    /// Indexed by layer slot; the id guards against recycled slots.
    elements: Vec<Option<(LayerId, CssStyleDeclaration)>>,
    writes: u64,
}

impl std::fmt::Debug for DomPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomPresenter")
            .field("bound", &self.bound_count())
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl Default for DomPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl DomPresenter {
    /// Creates a presenter with nothing bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            writes: 0,
        }
    }

    /// Binds `layer` to `element`, replacing any previous binding.
    ///
    /// Elements without an inline style (anything that is neither HTML nor
    /// SVG) are ignored. Returns whether the binding was made.
    pub fn bind(&mut self, layer: LayerId, element: &Element) -> bool {
        let Some(style) = inline_style(element) else {
            tracing::warn!(?layer, tag = %element.tag_name(), "element has no inline style");
            return false;
        };
        let slot = layer.index() as usize;
        if self.elements.len() <= slot {
            self.elements.resize_with(slot + 1, || None);
        }
        self.elements[slot] = Some((layer, style));
        true
    }

    /// Removes the binding for `layer` and clears the inline styles the
    /// presenter wrote.
    pub fn unbind(&mut self, layer: LayerId) {
        if let Some(entry) = self.elements.get_mut(layer.index() as usize)
            && entry.as_ref().is_some_and(|(id, _)| *id == layer)
            && let Some((_, style)) = entry.take()
        {
            for property in ["transform", "opacity", "stroke-dashoffset"] {
                let _ = style.remove_property(property);
            }
        }
    }

    /// Number of bound layers.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.elements.iter().flatten().count()
    }

    /// Style writes issued so far.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn style(&self, idx: u32) -> Option<&CssStyleDeclaration> {
        self.elements
            .get(idx as usize)
            .and_then(Option::as_ref)
            .map(|(_, style)| style)
    }

    fn write(&mut self, idx: u32, property: &str, value: &str) {
        if let Some(style) = self.style(idx) {
            let _ = style.set_property(property, value);
            self.writes += 1;
        }
    }
}

impl Presenter for DomPresenter {
    fn apply(&mut self, store: &LayerStore, changes: &FrameChanges) {
        for &idx in &changes.removed {
            if let Some(slot) = self.elements.get_mut(idx as usize) {
                *slot = None;
            }
        }

        // Freshly created layers get every channel written once.
        for &idx in &changes.added {
            self.write(idx, "transform", &transform_css(store.transform_at(idx)));
            self.write(idx, "opacity", &number_css(store.opacity_at(idx)));
        }

        for &idx in &changes.transforms {
            self.write(idx, "transform", &transform_css(store.transform_at(idx)));
        }
        for &idx in &changes.opacities {
            self.write(idx, "opacity", &number_css(store.opacity_at(idx)));
        }
        for &idx in &changes.strokes {
            self.write(idx, "stroke-dashoffset", &number_css(store.stroke_offset_at(idx)));
        }
    }
}

fn inline_style(element: &Element) -> Option<CssStyleDeclaration> {
    if let Some(html) = element.dyn_ref::<web_sys::HtmlElement>() {
        return Some(html.style());
    }
    // SVG elements expose `style` through ElementCSSInlineStyle too.
    js_sys::Reflect::get(element, &"style".into())
        .ok()
        .and_then(|style| style.dyn_into::<CssStyleDeclaration>().ok())
}

/// CSS `transform` for a layer transform.
pub(crate) fn transform_css(transform: LayerTransform) -> String {
    let LayerTransform { translation, scale } = transform;
    if scale == 1.0 {
        format!(
            "translate3d({}px, {}px, 0)",
            round3(translation.x),
            round3(translation.y)
        )
    } else {
        format!(
            "translate3d({}px, {}px, 0) scale({})",
            round3(translation.x),
            round3(translation.y),
            round3(scale)
        )
    }
}

pub(crate) fn number_css(value: f64) -> String {
    format!("{}", round3(value))
}

/// Rounds to three decimals; sub-thousandth changes are invisible.
fn round3(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    // Avoid "-0" in style strings.
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;

    #[test]
    fn translation_only_omits_scale() {
        let css = transform_css(LayerTransform {
            translation: Vec2::new(12.0, -40.5),
            scale: 1.0,
        });
        assert_eq!(css, "translate3d(12px, -40.5px, 0)");
    }

    #[test]
    fn scale_is_appended() {
        let css = transform_css(LayerTransform {
            translation: Vec2::ZERO,
            scale: 1.5,
        });
        assert_eq!(css, "translate3d(0px, 0px, 0) scale(1.5)");
    }

    #[test]
    fn numbers_are_rounded_without_negative_zero() {
        assert_eq!(number_css(0.123_456), "0.123");
        assert_eq!(number_css(-0.000_1), "0");
        assert_eq!(number_css(1.0), "1");
    }
}
