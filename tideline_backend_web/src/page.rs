// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Page-level mounting.
//!
//! [`mount`] builds a [`MotionRuntime`] from browser collaborators, binds
//! the standard page elements (hero, reveal sections, cursor, ripple) and starts
//! listening to scroll, resize, pointer and preference changes.

use std::cell::RefCell;
use std::rc::Rc;

use tideline_core::backend::Presenter;
use tideline_core::effect::{
    CursorConfig, CursorFollower, Effect, Ripple, RippleConfig, RippleTrigger,
};
use tideline_core::layer::{LayerId, LayerProperty};
use tideline_core::motion::MotionPolicy;
use tideline_core::runtime::{MotionRuntime, RuntimeConfig, RuntimeParts};
use tideline_core::scroll::ScrollInput;
use tideline_core::session::{Entrance, Session};
use tideline_core::timeline::{LayerTarget, Segment, TimelineConfig, TimelineHandle, TimelineMode};
use tideline_render::WgpuParticleBackend;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlCanvasElement, HtmlElement, Window};

use crate::dom::{CanvasSurface, CssPropertySink, DomTrigger, probe_device};
use crate::gpu::WgpuFactory;
use crate::idle::BrowserIdle;
use crate::listeners::{self, EventListener};
use crate::preference::{
    DocumentAttribute, LocalStoragePreferences, MediaQueryListener, MediaQuerySignal,
};
use crate::presenter::DomPresenter;
use crate::raf::RafLoop;

/// The runtime type a browser page uses.
pub type WebRuntime = MotionRuntime<WgpuParticleBackend>;

/// Attribute on `<html>` set to `initial` or `navigation` at mount.
pub const ENTRANCE_ATTRIBUTE: &str = "data-entrance";

/// Where to find the page's animated elements.
#[derive(Clone, Debug, PartialEq)]
pub struct PageOptions {
    /// Runtime tunables.
    pub config: RuntimeConfig,
    /// Id of the hero `<canvas>`.
    pub hero_canvas_id: String,
    /// Id of the static gradient shown instead of the canvas.
    pub hero_fallback_id: String,
    /// Elements that fade and rise in once when scrolled into view.
    pub reveal_selector: String,
    /// Seconds each reveal plays for.
    pub reveal_duration: f64,
    /// Pixels a reveal rises by.
    pub reveal_rise: f64,
    /// Id of the cursor dot, if the page has a custom cursor.
    pub cursor_dot_id: String,
    /// Id of the lagging cursor ring.
    pub cursor_ring_id: String,
    /// Id of the ring spawned where the pointer presses.
    pub ripple_id: String,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            config: RuntimeConfig::web(),
            hero_canvas_id: "hero-canvas".into(),
            hero_fallback_id: "hero-fallback".into(),
            reveal_selector: "[data-reveal]".into(),
            reveal_duration: 0.8,
            reveal_rise: 24.0,
            cursor_dot_id: "cursor-dot".into(),
            cursor_ring_id: "cursor-ring".into(),
            ripple_id: "press-ripple".into(),
        }
    }
}

/// A mounted page. Dropping it tears everything down.
pub struct Page {
    window: Window,
    runtime: Rc<WebRuntime>,
    presenter: Rc<RefCell<DomPresenter>>,
    entrance: Entrance,
    reveals: Vec<TimelineHandle>,
    _listeners: Vec<EventListener>,
    _media: Option<MediaQueryListener>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("runtime", &self.runtime)
            .field("entrance", &self.entrance)
            .field("reveals", &self.reveals.len())
            .finish_non_exhaustive()
    }
}

fn element_by_id<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("#{id} not found")))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("#{id} has the wrong element type")))
}

fn query_all(document: &Document, selector: &str) -> Result<Vec<Element>, JsValue> {
    let list = document.query_selector_all(selector)?;
    Ok((0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect())
}

pub(crate) fn entrance_value(entrance: Entrance) -> &'static str {
    match entrance {
        Entrance::Initial => "initial",
        Entrance::Navigation => "navigation",
    }
}

/// Segments of a fade-and-rise reveal on `layer`.
pub(crate) fn reveal_segments(layer: LayerId, rise: f64) -> Vec<Segment> {
    vec![Segment::full(vec![
        LayerTarget::linear(layer, LayerProperty::Opacity, 0.0, 1.0),
        LayerTarget::linear(layer, LayerProperty::TranslateY, rise, 0.0),
    ])]
}

/// Builds the runtime for the current document and mounts it.
///
/// `session` outlives single pages: pass the same one to every mount of a
/// page load so only the first reports [`Entrance::Initial`].
pub fn mount(options: PageOptions, session: Rc<Session>) -> Result<Page, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let signal = MediaQuerySignal::new();
    let policy = MotionPolicy::new(
        Box::new(LocalStoragePreferences::new()),
        &signal,
        Box::new(DocumentAttribute),
    );

    let canvas: HtmlCanvasElement = element_by_id(&document, &options.hero_canvas_id)?;
    let fallback: HtmlElement = element_by_id(&document, &options.hero_fallback_id)?;
    let (width, height) = listeners::viewport_size(&window);

    let presenter = Rc::new(RefCell::new(DomPresenter::new()));
    let shared_presenter: Rc<RefCell<dyn Presenter>> = presenter.clone();
    let runtime = Rc::new(MotionRuntime::new(RuntimeParts {
        config: options.config,
        timebase: crate::timebase(),
        policy: Rc::clone(&policy),
        probe: probe_device(&window),
        viewport: kurbo::Size::new(width, height),
        presenter: shared_presenter,
        style: Box::new(CssPropertySink::document_root()),
        surface: Box::new(CanvasSurface::new(canvas.clone().into(), fallback)),
        backends: Box::new(WgpuFactory::new(canvas)),
        idle: Box::new(BrowserIdle::new(window.clone())),
        session,
    }));
    runtime
        .clock()
        .attach_source(Box::new(RafLoop::for_clock(runtime.clock())));

    listeners::sync_layout(&window, &runtime);
    let offset = window.scroll_y().unwrap_or(0.0);
    runtime.clock().jump_to(offset);
    runtime.push_scroll(ScrollInput::Absolute(offset));

    let mut page = Page {
        window: window.clone(),
        runtime: Rc::clone(&runtime),
        presenter,
        entrance: Entrance::Initial,
        reveals: Vec::new(),
        _listeners: Vec::new(),
        _media: signal.listen(&policy),
    };

    for element in query_all(&document, &options.reveal_selector)? {
        page.add_reveal(element, options.reveal_duration, options.reveal_rise);
    }
    page.add_cursor(&document, &options);
    page.add_ripple(&document, &options)?;

    page.entrance = runtime.mount();
    if let Some(root) = document.document_element() {
        let _ = root.set_attribute(ENTRANCE_ATTRIBUTE, entrance_value(page.entrance));
    }
    page._listeners
        .extend(listeners::install(&window, Rc::downgrade(&runtime))?);
    tracing::info!(entrance = ?page.entrance, path = ?runtime.render_path(), "page mounted");
    Ok(page)
}

impl Page {
    /// The runtime, for adding timelines and effects.
    #[must_use]
    pub fn runtime(&self) -> &Rc<WebRuntime> {
        &self.runtime
    }

    /// How this mount was reached within the session.
    #[must_use]
    pub fn entrance(&self) -> Entrance {
        self.entrance
    }

    /// Creates a layer presented on `element`.
    pub fn bind(&self, element: &Element) -> LayerId {
        let layer = self.runtime.layers().borrow_mut().create_layer();
        self.presenter.borrow_mut().bind(layer, element);
        layer
    }

    /// Adds a play-once fade-and-rise reveal for `element`.
    ///
    /// Returns `None` if the element cannot drive a timeline; the reason is
    /// logged and the element is left as authored.
    pub fn add_reveal(&mut self, element: Element, duration: f64, rise: f64) -> Option<TimelineHandle> {
        let layer = self.bind(&element);
        let config = TimelineConfig::play_once(
            reveal_segments(layer, rise),
            TimelineMode::reveal(duration),
        );
        match self
            .runtime
            .create_timeline(config, Box::new(DomTrigger::new(element)))
        {
            Ok(handle) => {
                self.reveals.push(handle);
                Some(handle)
            }
            Err(_) => {
                self.presenter.borrow_mut().unbind(layer);
                self.runtime.layers().borrow_mut().destroy_layer(layer);
                None
            }
        }
    }

    fn add_cursor(&self, document: &Document, options: &PageOptions) {
        let (Some(dot), Some(ring)) = (
            document.get_element_by_id(&options.cursor_dot_id),
            document.get_element_by_id(&options.cursor_ring_id),
        ) else {
            return;
        };
        let dot = self.bind(&dot);
        let ring = self.bind(&ring);
        self.runtime.add_effect(move |pointer| -> Box<dyn Effect> {
            Box::new(CursorFollower::new(dot, ring, CursorConfig::web(), pointer.clone()))
        });
    }

    fn add_ripple(&mut self, document: &Document, options: &PageOptions) -> Result<(), JsValue> {
        let Some(element) = document.get_element_by_id(&options.ripple_id) else {
            return Ok(());
        };
        let layer = self.bind(&element);
        let trigger = RippleTrigger::default();
        let effect_trigger = trigger.clone();
        self.runtime.add_effect(move |_| -> Box<dyn Effect> {
            Box::new(Ripple::new(layer, RippleConfig::web(), effect_trigger.clone()))
        });
        self._listeners.push(listeners::ripple(&self.window, trigger)?);
        Ok(())
    }

    /// Re-measures layout; call after content above a trigger changed size.
    pub fn relayout(&self) {
        listeners::sync_layout(&self.window, &self.runtime);
    }

    /// Unregisters every frame callback and releases the GPU.
    pub fn unmount(&self) {
        self.runtime.unmount();
    }
}

/// JavaScript handle to the page-load session.
///
/// Create one when the application boots and pass it to every
/// [`TidelinePage`].
#[wasm_bindgen]
#[derive(Debug, Default)]
pub struct TidelineSession {
    session: Rc<Session>,
}

#[wasm_bindgen]
impl TidelineSession {
    /// Starts a session; its first page mount is the initial entrance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next mount an initial entrance again.
    pub fn reset(&self) {
        self.session.reset();
    }
}

impl TidelineSession {
    /// The shared session, for [`mount`].
    #[must_use]
    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }
}

/// JavaScript handle to a mounted page.
#[wasm_bindgen]
#[derive(Debug)]
pub struct TidelinePage {
    page: Page,
}

#[wasm_bindgen]
impl TidelinePage {
    /// Mounts the current document with default element ids.
    #[wasm_bindgen(constructor)]
    pub fn new(session: &TidelineSession) -> Result<Self, JsValue> {
        mount(PageOptions::default(), Rc::clone(&session.session)).map(|page| Self { page })
    }

    /// `"initial"` or `"navigation"`.
    pub fn entrance(&self) -> String {
        entrance_value(self.page.entrance).into()
    }

    /// Records the user's motion toggle; persists it and remounts.
    #[wasm_bindgen(js_name = setReducedMotion)]
    pub fn set_reduced_motion(&self, reduced: bool) {
        self.page.runtime.set_reduced_motion(reduced);
    }

    /// Forgets the user's toggle and follows the OS setting again.
    #[wasm_bindgen(js_name = followSystemMotion)]
    pub fn follow_system_motion(&self) {
        self.page.runtime.policy().clear_manual_preference();
    }

    /// `"gpu"` or `"fallback"`.
    #[wasm_bindgen(js_name = renderPath)]
    pub fn render_path(&self) -> String {
        crate::dom::path_attribute(&self.page.runtime.render_path()).into()
    }

    /// Re-measures layout.
    pub fn relayout(&self) {
        self.page.relayout();
    }

    /// Tears the page's motion down.
    pub fn unmount(&self) {
        self.page.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::layer::LayerStore;

    #[test]
    fn reveal_fades_and_rises_into_place() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let segments = reveal_segments(layer, 24.0);
        tideline_core::timeline::apply(&segments, 0.0, &mut store);
        assert_eq!(store.opacity(layer), Some(0.0));
        assert_eq!(store.property(layer, LayerProperty::TranslateY), Some(24.0));
        tideline_core::timeline::apply(&segments, 1.0, &mut store);
        assert_eq!(store.opacity(layer), Some(1.0));
        assert_eq!(store.property(layer, LayerProperty::TranslateY), Some(0.0));
    }

    #[test]
    fn page_sessions_report_navigation_after_the_first_mount() {
        let js = TidelineSession::new();
        let session = js.session();
        assert_eq!(entrance_value(session.entrance()), "initial");
        assert_eq!(entrance_value(session.entrance()), "navigation");
        js.reset();
        assert_eq!(entrance_value(session.entrance()), "initial");
    }

    #[test]
    fn entrance_attribute_values() {
        assert_eq!(entrance_value(Entrance::Initial), "initial");
        assert_eq!(entrance_value(Entrance::Navigation), "navigation");
    }
}
