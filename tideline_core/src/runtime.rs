// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The top-level motion runtime.
//!
//! [`MotionRuntime`] is the one object a page creates. It owns the layer
//! store, the timeline scheduler, the particle renderer and the ambient
//! publisher, and wires them to the shared [`FrameClock`]:
//!
//! ```text
//! MotionPolicy ──► decide_render_path ──► FrameClock registrations
//!                                          ├─ Timeline: scheduler.update
//!                                          ├─ Effect:   attached effects
//!                                          ├─ Render:   renderer.tick
//!                                          └─ Present:  presenter.apply, ambient
//! ```
//!
//! Under reduced motion nothing is registered: timelines are laid out once
//! at their static progress, the hero shows the static gradient and the
//! clock stays stopped. A manual preference toggle tears everything down
//! and mounts the other path. An OS-level change only updates the document
//! attribute; the mounted path stays until the next mount or toggle.
//!
//! The [`Session`] is supplied by the host so that every runtime created
//! during one page load agrees on which mount was the first.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use kurbo::{Point, Size};

use crate::ambient::{AmbientConfig, AmbientPublisher, StyleSink};
use crate::backend::{BackendDelivery, BackendFactory, HeroSurface, Presenter};
use crate::capability::{
    CapabilityConfig, CapabilityTier, DeviceProbe, FallbackReason, RenderPath, decide_render_path,
};
use crate::clock::{FrameClock, FrameContext, TickGuard, TickPhase};
use crate::effect::{Effect, EffectHandle, EffectHost, PointerTarget};
use crate::error::{GpuError, TickError, TimelineError};
use crate::idle::{DeferredInit, IdleConfig, IdleScheduler};
use crate::layer::{FrameChanges, LayerStore};
use crate::morph::{FrameOutcome, MorphConfig, ParticleBackend, ParticleMorphRenderer};
use crate::motion::{ChangeSource, MotionPolicy, MotionPreference, Subscription};
use crate::scroll::{ClockConfig, ScrollInput};
use crate::session::{Entrance, Session};
use crate::time::Timebase;
use crate::timeline::{ScrollTimelineScheduler, TimelineConfig, TimelineHandle, TriggerSource};

/// Every tunable of the runtime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Scroll smoothing.
    pub clock: ClockConfig,
    /// GPU breakpoints and particle budgets.
    pub capability: CapabilityConfig,
    /// Particle hero timing and look.
    pub morph: MorphConfig,
    /// CSS property throttling.
    pub ambient: AmbientConfig,
    /// GPU init deferral.
    pub idle: IdleConfig,
}

impl RuntimeConfig {
    /// Defaults for a marketing page in a browser.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            clock: ClockConfig::web(),
            capability: CapabilityConfig::web(),
            morph: MorphConfig::hero(),
            ambient: AmbientConfig::web(),
            idle: IdleConfig::web(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Host collaborators handed to [`MotionRuntime::new`].
pub struct RuntimeParts<B> {
    /// Tunables.
    pub config: RuntimeConfig,
    /// Unit of the host's [`HostTime`](crate::time::HostTime) values.
    pub timebase: Timebase,
    /// The page's motion preference.
    pub policy: Rc<MotionPolicy>,
    /// Device facts measured at startup.
    pub probe: DeviceProbe,
    /// Viewport size in CSS pixels.
    pub viewport: Size,
    /// Writes layer changes to the page.
    pub presenter: Rc<RefCell<dyn Presenter>>,
    /// Receives the ambient CSS properties.
    pub style: Box<dyn StyleSink>,
    /// Swaps the hero between canvas and gradient.
    pub surface: Box<dyn HeroSurface>,
    /// Creates GPU backends.
    pub backends: Box<dyn BackendFactory<B>>,
    /// Idle and timeout scheduling.
    pub idle: Box<dyn IdleScheduler>,
    /// Shared by every runtime of the page load.
    pub session: Rc<Session>,
}

impl<B> fmt::Debug for RuntimeParts<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeParts")
            .field("config", &self.config)
            .field("probe", &self.probe)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

type EffectFactory = Box<dyn Fn(&PointerTarget) -> Box<dyn Effect>>;

#[derive(Default)]
struct Active {
    guards: Vec<TickGuard>,
    effects: Vec<EffectHandle>,
    deferred: Option<DeferredInit>,
}

struct Shared<B: ParticleBackend> {
    config: RuntimeConfig,
    policy: Rc<MotionPolicy>,
    clock: Rc<FrameClock>,
    store: Rc<RefCell<LayerStore>>,
    changes: RefCell<FrameChanges>,
    scheduler: RefCell<ScrollTimelineScheduler>,
    renderer: RefCell<ParticleMorphRenderer<B>>,
    presenter: Rc<RefCell<dyn Presenter>>,
    ambient: RefCell<AmbientPublisher>,
    surface: RefCell<Box<dyn HeroSurface>>,
    backends: RefCell<Box<dyn BackendFactory<B>>>,
    idle: RefCell<Box<dyn IdleScheduler>>,
    probe: Cell<DeviceProbe>,
    pointer: PointerTarget,
    effects: RefCell<Vec<EffectFactory>>,
    session: Rc<Session>,
    active: RefCell<Option<Active>>,
    /// Whether the mounted path is the reduced-motion one.
    reduced: Cell<bool>,
    generation: Cell<u64>,
    path: RefCell<RenderPath>,
    subscription: RefCell<Option<Subscription>>,
}

/// Owns and drives every animated part of a page.
pub struct MotionRuntime<B: ParticleBackend + 'static> {
    shared: Rc<Shared<B>>,
}

impl<B: ParticleBackend + 'static> fmt::Debug for MotionRuntime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionRuntime")
            .field("mounted", &self.is_mounted())
            .field("path", &*self.shared.path.borrow())
            .field("clock", &self.shared.clock)
            .finish_non_exhaustive()
    }
}

impl<B: ParticleBackend + 'static> MotionRuntime<B> {
    /// Builds an unmounted runtime.
    ///
    /// The host attaches its frame source to [`clock`](Self::clock).
    #[must_use]
    pub fn new(parts: RuntimeParts<B>) -> Self {
        let RuntimeParts {
            config,
            timebase,
            policy,
            probe,
            viewport,
            presenter,
            style,
            surface,
            backends,
            idle,
            session,
        } = parts;
        let reduced = policy.prefers_reduced();
        let clock = FrameClock::new(config.clock, timebase, Rc::clone(&policy));
        let mut renderer = ParticleMorphRenderer::new(config.morph);
        renderer.set_viewport(viewport);
        Self {
            shared: Rc::new(Shared {
                config,
                policy,
                clock,
                store: Rc::new(RefCell::new(LayerStore::new())),
                changes: RefCell::new(FrameChanges::default()),
                scheduler: RefCell::new(ScrollTimelineScheduler::new(viewport.height)),
                renderer: RefCell::new(renderer),
                presenter,
                ambient: RefCell::new(AmbientPublisher::new(config.ambient, style)),
                surface: RefCell::new(surface),
                backends: RefCell::new(backends),
                idle: RefCell::new(idle),
                probe: Cell::new(probe),
                pointer: PointerTarget::default(),
                effects: RefCell::new(Vec::new()),
                session,
                active: RefCell::new(None),
                reduced: Cell::new(reduced),
                generation: Cell::new(0),
                path: RefCell::new(RenderPath::Fallback {
                    reason: FallbackReason::NoGpuContext,
                }),
                subscription: RefCell::new(None),
            }),
        }
    }

    /// Mounts the path the current preference and device call for, and
    /// follows manual preference toggles until [`unmount`](Self::unmount).
    ///
    /// Returns how this mount was reached within the session.
    pub fn mount(&self) -> Entrance {
        self.unmount();
        let entrance = self.shared.session.entrance();
        let weak = Rc::downgrade(&self.shared);
        let subscription = self.shared.policy.on_change(move |preference, source| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match source {
                ChangeSource::Manual => shared.remount(preference),
                ChangeSource::System => {
                    tracing::debug!(?preference, "OS motion change; mounted path kept");
                }
            }
        });
        *self.shared.subscription.borrow_mut() = Some(subscription);
        self.shared.activate();
        tracing::debug!(?entrance, "motion runtime mounted");
        entrance
    }

    /// Unregisters everything synchronously and releases the GPU.
    ///
    /// Timelines stay registered with the scheduler; they are evaluated
    /// again on the next mount.
    pub fn unmount(&self) {
        drop(self.shared.subscription.borrow_mut().take());
        if self.shared.active.borrow().is_some() {
            self.shared.deactivate();
            tracing::debug!("motion runtime unmounted");
        }
    }

    /// Whether the runtime is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.shared.active.borrow().is_some()
    }

    /// Registers a scroll timeline.
    ///
    /// Under reduced motion its static state is applied immediately.
    pub fn create_timeline(
        &self,
        config: TimelineConfig,
        trigger: Box<dyn TriggerSource>,
    ) -> Result<TimelineHandle, TimelineError> {
        let handle = self
            .shared
            .scheduler
            .borrow_mut()
            .create_timeline(config, trigger)
            .inspect_err(|err| tracing::warn!(error = %err, "timeline skipped"))?;
        if self.is_mounted() && self.shared.reduced.get() {
            self.shared
                .scheduler
                .borrow_mut()
                .apply_static(handle, &mut self.shared.store.borrow_mut())?;
            self.shared.present_now();
        }
        Ok(handle)
    }

    /// Removes a timeline. Its layers keep their last values.
    pub fn destroy_timeline(&self, handle: TimelineHandle) -> Result<(), TimelineError> {
        self.shared.scheduler.borrow_mut().destroy(handle)
    }

    /// Adds an imperative effect, built from the shared pointer target.
    ///
    /// The factory runs on every full-motion mount; effects are not
    /// attached under reduced motion.
    pub fn add_effect(&self, factory: impl Fn(&PointerTarget) -> Box<dyn Effect> + 'static) {
        let factory: EffectFactory = Box::new(factory);
        let attach_now = self.is_mounted() && !self.shared.reduced.get();
        if attach_now {
            let handle = self.shared.attach_effect(&factory);
            if let Some(active) = self.shared.active.borrow_mut().as_mut() {
                active.effects.push(handle);
            }
        }
        self.shared.effects.borrow_mut().push(factory);
    }

    /// Feeds native scroll input.
    pub fn push_scroll(&self, input: ScrollInput) {
        self.shared.clock.push_scroll(input);
        if self.shared.reduced.get() {
            let depth = self.shared.clock.snapshot().depth();
            self.shared.ambient.borrow_mut().settle(depth);
        }
    }

    /// Updates the viewport (CSS pixels), the document height and the
    /// device pixel ratio, and re-measures every trigger.
    pub fn resize(&self, viewport: Size, document_height: f64, pixel_ratio: f64) {
        let shared = &self.shared;
        let limit = (document_height - viewport.height).max(0.0);
        shared.clock.set_scroll_bounds(limit, viewport.height);
        shared.scheduler.borrow_mut().set_viewport(viewport.height);
        {
            let mut renderer = shared.renderer.borrow_mut();
            renderer.set_viewport(viewport);
            renderer.set_pixel_ratio(pixel_ratio);
        }
        let mut probe = shared.probe.get();
        probe.viewport_width = viewport.width;
        shared.probe.set(probe);

        if self.is_mounted() && shared.reduced.get() {
            shared
                .scheduler
                .borrow_mut()
                .apply_static_all(&mut shared.store.borrow_mut());
            shared.present_now();
        }
    }

    /// Reports the pointer in viewport pixels, or `None` when it left.
    pub fn set_pointer(&self, pointer: Option<Point>) {
        self.shared.renderer.borrow_mut().set_pointer(pointer);
        self.shared.pointer.set(pointer);
    }

    /// Reports whether the pointer is over an interactive element.
    pub fn set_hovering(&self, hovering: bool) {
        self.shared.pointer.set_hovering(hovering);
    }

    /// Records an explicit motion toggle; the runtime remounts if the
    /// effective preference changed.
    pub fn set_reduced_motion(&self, reduced: bool) {
        self.shared.policy.set_manual_preference(reduced);
    }

    /// The current hero path. A GPU path turns into a fallback if the
    /// backend fails.
    #[must_use]
    pub fn render_path(&self) -> RenderPath {
        self.shared.path.borrow().clone()
    }

    /// The page clock.
    #[must_use]
    pub fn clock(&self) -> &Rc<FrameClock> {
        &self.shared.clock
    }

    /// The layer store, for creating layers and binding them to elements.
    #[must_use]
    pub fn layers(&self) -> &Rc<RefCell<LayerStore>> {
        &self.shared.store
    }

    /// The motion policy.
    #[must_use]
    pub fn policy(&self) -> &Rc<MotionPolicy> {
        &self.shared.policy
    }

    /// Session-scoped state.
    #[must_use]
    pub fn session(&self) -> &Rc<Session> {
        &self.shared.session
    }

    /// Runs `f` against the timeline scheduler.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&ScrollTimelineScheduler) -> R) -> R {
        f(&self.shared.scheduler.borrow())
    }

    /// Runs `f` against the particle renderer.
    pub fn with_renderer<R>(&self, f: impl FnOnce(&ParticleMorphRenderer<B>) -> R) -> R {
        f(&self.shared.renderer.borrow())
    }
}

impl<B: ParticleBackend + 'static> Drop for MotionRuntime<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<B: ParticleBackend + 'static> Shared<B> {
    fn activate(self: &Rc<Self>) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let preference = self.policy.preference();
        self.reduced.set(preference.prefers_reduced);
        let path = decide_render_path(&self.probe.get(), &preference, &self.config.capability);
        *self.path.borrow_mut() = path.clone();
        let mut active = Active::default();

        if preference.prefers_reduced {
            self.scheduler
                .borrow_mut()
                .apply_static_all(&mut self.store.borrow_mut());
            self.present_now();
            self.ambient
                .borrow_mut()
                .settle(self.clock.snapshot().depth());
            self.surface.borrow_mut().show(&path);
            tracing::info!("reduced motion: static layout, no frame callbacks");
            *self.active.borrow_mut() = Some(active);
            return;
        }

        active.guards.push(self.register(TickPhase::Timeline, |shared, frame| {
            shared
                .scheduler
                .borrow_mut()
                .update(frame, &mut shared.store.borrow_mut());
            Ok(())
        }));
        active.guards.push(self.register(TickPhase::Present, |shared, frame| {
            shared.present_now();
            shared.ambient.borrow_mut().publish(frame);
            Ok(())
        }));
        for factory in self.effects.borrow().iter() {
            active.effects.push(self.attach_effect(factory));
        }

        match path {
            RenderPath::Gpu {
                particle_count,
                tier,
            } => {
                active.guards.push(self.register(TickPhase::Render, |shared, frame| {
                    let outcome = shared
                        .renderer
                        .borrow_mut()
                        .tick(frame.delta, frame.scroll.viewport_progress());
                    if let FrameOutcome::FellBack(reason) = outcome {
                        shared.set_path(RenderPath::Fallback { reason });
                    }
                    Ok(())
                }));
                let weak = Rc::downgrade(self);
                let job = move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.request_backend(generation, particle_count, tier);
                    }
                };
                let deferred = DeferredInit::schedule(&mut **self.idle.borrow_mut(), self.config.idle, job);
                active.deferred = Some(deferred);
            }
            RenderPath::Fallback { .. } => self.surface.borrow_mut().show(&path),
        }
        *self.active.borrow_mut() = Some(active);
    }

    fn deactivate(&self) {
        self.generation.set(self.generation.get() + 1);
        let active = self.active.borrow_mut().take();
        if let Some(active) = active {
            if let Some(deferred) = &active.deferred {
                deferred.cancel();
            }
            // Guards unregister and effects dispose on drop.
            drop(active);
        }
        self.renderer.borrow_mut().unmount();
        self.present_now();
    }

    fn remount(self: &Rc<Self>, preference: MotionPreference) {
        if self.active.borrow().is_none() {
            return;
        }
        tracing::info!(?preference, "motion preference changed; remounting");
        self.deactivate();
        self.activate();
    }

    fn register(
        self: &Rc<Self>,
        phase: TickPhase,
        f: impl Fn(&Self, &FrameContext) -> Result<(), TickError> + 'static,
    ) -> TickGuard {
        let weak: Weak<Self> = Rc::downgrade(self);
        self.clock.register_tick_in(phase, move |frame| match weak.upgrade() {
            Some(shared) => f(&shared, frame),
            None => Ok(()),
        })
    }

    fn attach_effect(&self, factory: &EffectFactory) -> EffectHandle {
        let host = EffectHost::new(Rc::clone(&self.clock), Rc::clone(&self.store));
        host.attach(factory(&self.pointer))
    }

    fn request_backend(self: &Rc<Self>, generation: u64, particle_count: usize, tier: CapabilityTier) {
        if self.generation.get() != generation {
            return;
        }
        let weak = Rc::downgrade(self);
        let deliver: BackendDelivery<B> = Box::new(move |result| match weak.upgrade() {
            Some(shared) => shared.deliver(generation, result, particle_count, tier),
            None => {
                if let Ok(mut backend) = result {
                    backend.release();
                }
            }
        });
        tracing::debug!(particle_count, "requesting GPU backend");
        self.backends.borrow_mut().create(particle_count, deliver);
    }

    fn deliver(
        &self,
        generation: u64,
        result: Result<B, GpuError>,
        particle_count: usize,
        tier: CapabilityTier,
    ) {
        if self.generation.get() != generation {
            tracing::debug!("stale GPU backend discarded");
            if let Ok(mut backend) = result {
                backend.release();
            }
            return;
        }
        let path = match result {
            Ok(backend) => self
                .renderer
                .borrow_mut()
                .mount(backend, particle_count, tier),
            Err(err) => {
                let reason = FallbackReason::GpuFailed(err);
                self.renderer.borrow_mut().fail(reason.clone());
                RenderPath::Fallback { reason }
            }
        };
        self.set_path(path);
    }

    fn set_path(&self, path: RenderPath) {
        self.surface.borrow_mut().show(&path);
        *self.path.borrow_mut() = path;
    }

    fn present_now(&self) {
        let Ok(mut store) = self.store.try_borrow_mut() else {
            return;
        };
        let mut changes = self.changes.borrow_mut();
        store.evaluate_into(&mut changes);
        if !changes.is_empty() {
            self.presenter.borrow_mut().apply(&store, &changes);
        }
    }
}
