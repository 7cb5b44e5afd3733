// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small DOM adapters for core traits.

use kurbo::Rect;
use tideline_core::ambient::StyleSink;
use tideline_core::backend::HeroSurface;
use tideline_core::capability::{DeviceProbe, RenderPath};
use tideline_core::timeline::TriggerSource;
use wasm_bindgen::JsCast as _;
use web_sys::{CssStyleDeclaration, Element, HtmlCanvasElement, HtmlElement, Window};

/// [`StyleSink`] writing custom properties on `<html>`.
#[derive(Debug)]
pub struct CssPropertySink {
    style: Option<CssStyleDeclaration>,
}

impl CssPropertySink {
    /// Targets the document element's inline style.
    #[must_use]
    pub fn document_root() -> Self {
        let style = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.document_element())
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
            .map(|e| e.style());
        Self { style }
    }

    /// Targets `element`'s inline style.
    #[must_use]
    pub fn for_element(element: &HtmlElement) -> Self {
        Self {
            style: Some(element.style()),
        }
    }
}

impl StyleSink for CssPropertySink {
    fn set_property(&mut self, name: &str, value: &str) {
        if let Some(style) = &self.style {
            let _ = style.set_property(name, value);
        }
    }
}

/// Attribute on the hero container naming the active path.
pub const RENDER_PATH_ATTRIBUTE: &str = "data-render-path";

pub(crate) fn path_attribute(path: &RenderPath) -> &'static str {
    if path.is_gpu() { "gpu" } else { "fallback" }
}

/// [`HeroSurface`] toggling a canvas and a static gradient element.
#[derive(Debug)]
pub struct CanvasSurface {
    canvas: HtmlElement,
    fallback: HtmlElement,
}

impl CanvasSurface {
    /// Shows one of `canvas` and `fallback` at a time.
    #[must_use]
    pub fn new(canvas: HtmlElement, fallback: HtmlElement) -> Self {
        Self { canvas, fallback }
    }
}

impl HeroSurface for CanvasSurface {
    fn show(&mut self, path: &RenderPath) {
        let (shown, hidden) = if path.is_gpu() {
            (&self.canvas, &self.fallback)
        } else {
            (&self.fallback, &self.canvas)
        };
        let _ = shown.style().remove_property("display");
        let _ = hidden.style().set_property("display", "none");
        if let Some(parent) = self.canvas.parent_element() {
            let _ = parent.set_attribute(RENDER_PATH_ATTRIBUTE, path_attribute(path));
        }
        tracing::info!(?path, "hero surface switched");
    }
}

/// [`TriggerSource`] over a DOM element.
#[derive(Debug, Clone)]
pub struct DomTrigger {
    element: Element,
}

impl DomTrigger {
    /// Measures `element`.
    #[must_use]
    pub fn new(element: Element) -> Self {
        Self { element }
    }
}

impl TriggerSource for DomTrigger {
    fn measure(&self) -> Option<Rect> {
        let scroll_y = web_sys::window()?.scroll_y().ok()?;
        let rect = self.element.get_bounding_client_rect();
        Some(document_rect(
            rect.left(),
            rect.top(),
            rect.width(),
            rect.height(),
            scroll_y,
        ))
    }

    fn is_connected(&self) -> bool {
        self.element.is_connected()
    }
}

/// Converts viewport-relative bounds to document coordinates.
pub(crate) fn document_rect(left: f64, top: f64, width: f64, height: f64, scroll_y: f64) -> Rect {
    Rect::new(left, top + scroll_y, left + width, top + scroll_y + height)
}

pub(crate) fn logical_cores(reported: f64) -> Option<u32> {
    if !(reported.is_finite() && reported >= 1.0) {
        return None;
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "core counts are small positive integers"
    )]
    let cores = reported as u32;
    Some(cores)
}

/// WebGPU wins when present; WebGL2 is only probed without it, since
/// creating a throwaway context is not free.
pub(crate) fn gpu_context_available(webgpu: bool, webgl2: impl FnOnce() -> bool) -> bool {
    webgpu || webgl2()
}

fn has_webgl2(window: &Window) -> bool {
    window
        .document()
        .and_then(|d| d.create_element("canvas").ok())
        .and_then(|e| e.dyn_into::<HtmlCanvasElement>().ok())
        .and_then(|canvas| canvas.get_context("webgl2").ok().flatten())
        .is_some()
}

/// Measures what the capability decision needs.
///
/// A GPU context is available when `navigator.gpu` is present or a scratch
/// canvas hands out a `webgl2` context; wgpu picks the matching backend.
/// Adapter creation may still fail later, which the runtime handles as a
/// GPU failure.
#[must_use]
pub fn probe_device(window: &Window) -> DeviceProbe {
    let viewport_width = window
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .unwrap_or(0.0);
    let navigator = window.navigator();
    let webgpu = js_sys::Reflect::get(&navigator, &"gpu".into())
        .is_ok_and(|gpu| !gpu.is_undefined() && !gpu.is_null());
    let gpu_available = gpu_context_available(webgpu, || has_webgl2(window));
    let probe = DeviceProbe {
        viewport_width,
        logical_cores: logical_cores(navigator.hardware_concurrency()),
        gpu_available,
    };
    tracing::debug!(?probe, "device probed");
    probe
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::capability::{CapabilityTier, FallbackReason};

    #[test]
    fn client_rect_is_shifted_by_scroll() {
        let rect = document_rect(10.0, -50.0, 300.0, 200.0, 1000.0);
        assert_eq!(rect, Rect::new(10.0, 950.0, 310.0, 1150.0));
    }

    #[test]
    fn zero_or_missing_core_count_is_unknown() {
        assert_eq!(logical_cores(8.0), Some(8));
        assert_eq!(logical_cores(0.0), None);
        assert_eq!(logical_cores(f64::NAN), None);
    }

    #[test]
    fn webgl2_is_probed_only_without_webgpu() {
        let probed = std::cell::Cell::new(0);
        let webgl2 = |answer| {
            probed.set(probed.get() + 1);
            answer
        };
        assert!(gpu_context_available(true, || webgl2(false)));
        assert_eq!(probed.get(), 0);
        assert!(gpu_context_available(false, || webgl2(true)));
        assert!(!gpu_context_available(false, || webgl2(false)));
        assert_eq!(probed.get(), 2);
    }

    #[test]
    fn render_path_attribute_names_the_path() {
        let gpu = RenderPath::Gpu {
            particle_count: 180,
            tier: CapabilityTier::Full,
        };
        let fallback = RenderPath::Fallback {
            reason: FallbackReason::ReducedMotion,
        };
        assert_eq!(path_attribute(&gpu), "gpu");
        assert_eq!(path_attribute(&fallback), "fallback");
    }
}
