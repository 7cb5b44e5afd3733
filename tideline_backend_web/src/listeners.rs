// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOM event listeners that feed the runtime.

use std::rc::Weak;

use kurbo::Point;
use tideline_core::effect::RippleTrigger;
use tideline_core::morph::ParticleBackend;
use tideline_core::runtime::MotionRuntime;
use tideline_core::scroll::ScrollInput;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast as _, JsValue};
use web_sys::{AddEventListenerOptions, Event, EventTarget, MouseEvent, Window};

/// Selector of elements that enlarge the cursor ring on hover.
pub const INTERACTIVE_SELECTOR: &str = "a, button, [role=button], input, textarea, select";

/// An event listener that is removed on drop.
pub struct EventListener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl EventListener {
    /// Adds a passive listener for `kind` on `target`.
    pub fn passive(
        target: &EventTarget,
        kind: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        let options = AddEventListenerOptions::new();
        options.set_passive(true);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            kind,
            closure.as_ref().unchecked_ref(),
            &options,
        )?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
    }
}

fn client_point(event: &Event) -> Option<Point> {
    let mouse = event.dyn_ref::<MouseEvent>()?;
    Some(Point::new(f64::from(mouse.client_x()), f64::from(mouse.client_y())))
}

/// Fires `trigger` at every press on an interactive element.
pub(crate) fn ripple(window: &Window, trigger: RippleTrigger) -> Result<EventListener, JsValue> {
    EventListener::passive(window, "pointerdown", move |event| {
        let interactive = event
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
            .and_then(|el| el.closest(INTERACTIVE_SELECTOR).ok().flatten())
            .is_some();
        if interactive && let Some(point) = client_point(&event) {
            trigger.fire(point);
        }
    })
}

pub(crate) fn viewport_size(window: &Window) -> (f64, f64) {
    let width = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let height = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    (width, height)
}

pub(crate) fn document_height(window: &Window) -> f64 {
    window
        .document()
        .and_then(|d| d.document_element())
        .map_or(0.0, |root| f64::from(root.scroll_height()))
}

/// Re-measures the viewport and document and forwards them to `runtime`.
pub fn sync_layout<B: ParticleBackend + 'static>(window: &Window, runtime: &MotionRuntime<B>) {
    let (width, height) = viewport_size(window);
    runtime.resize(
        kurbo::Size::new(width, height),
        document_height(window),
        window.device_pixel_ratio(),
    );
}

/// Registers scroll, resize and pointer listeners forwarding to `runtime`.
///
/// Listeners hold the runtime weakly and go quiet once it is dropped.
pub fn install<B: ParticleBackend + 'static>(
    window: &Window,
    runtime: Weak<MotionRuntime<B>>,
) -> Result<Vec<EventListener>, JsValue> {
    let mut listeners = Vec::with_capacity(5);

    let scroll_runtime = runtime.clone();
    let scroll_window = window.clone();
    listeners.push(EventListener::passive(window, "scroll", move |_| {
        if let Some(runtime) = scroll_runtime.upgrade()
            && let Ok(offset) = scroll_window.scroll_y()
        {
            runtime.push_scroll(ScrollInput::Absolute(offset));
        }
    })?);

    let resize_runtime = runtime.clone();
    let resize_window = window.clone();
    listeners.push(EventListener::passive(window, "resize", move |_| {
        if let Some(runtime) = resize_runtime.upgrade() {
            sync_layout(&resize_window, &runtime);
        }
    })?);

    let move_runtime = runtime.clone();
    listeners.push(EventListener::passive(window, "pointermove", move |event| {
        if let Some(runtime) = move_runtime.upgrade()
            && let Some(point) = client_point(&event)
        {
            runtime.set_pointer(Some(point));
        }
    })?);

    let over_runtime = runtime.clone();
    listeners.push(EventListener::passive(window, "pointerover", move |event| {
        if let Some(runtime) = over_runtime.upgrade() {
            let hovering = event
                .target()
                .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                .and_then(|el| el.closest(INTERACTIVE_SELECTOR).ok().flatten())
                .is_some();
            runtime.set_hovering(hovering);
        }
    })?);

    let document: EventTarget = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?
        .into();
    listeners.push(EventListener::passive(&document, "pointerleave", move |_| {
        if let Some(runtime) = runtime.upgrade() {
            runtime.set_pointer(None);
            runtime.set_hovering(false);
        }
    })?);

    Ok(listeners)
}
