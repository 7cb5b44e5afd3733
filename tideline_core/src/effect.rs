// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Imperative effects on the shared clock.
//!
//! Some visuals do not fit the declarative timeline model: a cursor
//! follower, a press ripple, anything driven by input other than scroll. They
//! implement [`Effect`] and are attached through an [`EffectHost`], which
//! registers each one as a single [`TickPhase::Effect`] callback on the page
//! clock. Effects never own a frame loop.
//!
//! Lifecycle:
//!
//! ```text
//! attach ──► mount ──► update (every frame) ──► dispose
//! ```
//!
//! `dispose` runs when the [`EffectHandle`] is dropped, after the callback
//! has been unregistered.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use kurbo::{Point, Vec2};

use crate::clock::{FrameClock, FrameContext, TickGuard, TickPhase};
use crate::error::TickError;
use crate::layer::{LayerId, LayerStore};
use crate::timeline::Ease;

/// An imperative per-frame visual.
pub trait Effect {
    /// Sets initial layer state. Called once, before the first update.
    fn mount(&mut self, store: &mut LayerStore);

    /// Advances one frame.
    fn update(&mut self, frame: &FrameContext, store: &mut LayerStore) -> Result<(), TickError>;

    /// Returns layers to rest. Called once; the effect is dropped afterwards.
    fn dispose(&mut self, store: &mut LayerStore);
}

impl<E: Effect + ?Sized> Effect for Box<E> {
    fn mount(&mut self, store: &mut LayerStore) {
        (**self).mount(store);
    }

    fn update(&mut self, frame: &FrameContext, store: &mut LayerStore) -> Result<(), TickError> {
        (**self).update(frame, store)
    }

    fn dispose(&mut self, store: &mut LayerStore) {
        (**self).dispose(store);
    }
}

/// Attaches effects to a clock and a layer store.
#[derive(Clone)]
pub struct EffectHost {
    clock: Rc<FrameClock>,
    store: Rc<RefCell<LayerStore>>,
}

impl fmt::Debug for EffectHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHost")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl EffectHost {
    /// Creates a host writing into `store`.
    #[must_use]
    pub fn new(clock: Rc<FrameClock>, store: Rc<RefCell<LayerStore>>) -> Self {
        Self { clock, store }
    }

    /// Mounts `effect` and registers its update on the clock.
    pub fn attach(&self, effect: impl Effect + 'static) -> EffectHandle {
        let effect: Rc<RefCell<dyn Effect>> = Rc::new(RefCell::new(effect));
        effect.borrow_mut().mount(&mut self.store.borrow_mut());

        let store = Rc::clone(&self.store);
        let target = Rc::clone(&effect);
        let guard = self
            .clock
            .register_tick_in(TickPhase::Effect, move |frame| {
                let mut store = store
                    .try_borrow_mut()
                    .map_err(|_| TickError::Other("layer store busy".into()))?;
                target.borrow_mut().update(frame, &mut store)
            });

        EffectHandle {
            guard: Some(guard),
            effect,
            store: Rc::clone(&self.store),
        }
    }
}

/// Keeps an effect attached; dropping it disposes the effect.
#[must_use = "dropping an EffectHandle disposes the effect immediately"]
pub struct EffectHandle {
    guard: Option<TickGuard>,
    effect: Rc<RefCell<dyn Effect>>,
    store: Rc<RefCell<LayerStore>>,
}

impl EffectHandle {
    /// Disposes the effect now.
    pub fn dispose(self) {}

    /// Whether the effect's callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.guard.as_ref().is_some_and(TickGuard::is_active)
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl Drop for EffectHandle {
    fn drop(&mut self) {
        drop(self.guard.take());
        let (Ok(mut effect), Ok(mut store)) = (self.effect.try_borrow_mut(), self.store.try_borrow_mut())
        else {
            tracing::warn!("effect disposed while busy; layers left as-is");
            return;
        };
        effect.dispose(&mut store);
    }
}

/// Tuning for [`CursorFollower`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorConfig {
    /// Fraction of the remaining distance the ring covers per 60 Hz frame.
    pub ring_lerp: f64,
    /// Ring scale while the pointer is over an interactive element.
    pub hover_scale: f64,
}

impl CursorConfig {
    /// A ring that trails noticeably behind the dot.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            ring_lerp: 0.15,
            hover_scale: 1.5,
        }
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Where the host reports the pointer.
///
/// Cloned into the input listener; the effect reads it once per frame.
#[derive(Clone, Debug, Default)]
pub struct PointerTarget {
    position: Rc<Cell<Option<Point>>>,
    hovering: Rc<Cell<bool>>,
}

impl PointerTarget {
    /// Records the pointer position in page pixels, or `None` when it left.
    pub fn set(&self, position: Option<Point>) {
        self.position.set(position);
    }

    /// Records whether the pointer is over an interactive element.
    pub fn set_hovering(&self, hovering: bool) {
        self.hovering.set(hovering);
    }

    /// The last reported position.
    #[must_use]
    pub fn get(&self) -> Option<Point> {
        self.position.get()
    }
}

/// Dot that tracks the pointer exactly and a ring that lags behind it.
#[derive(Debug)]
pub struct CursorFollower {
    dot: LayerId,
    ring: LayerId,
    config: CursorConfig,
    target: PointerTarget,
    ring_position: Option<Point>,
}

impl CursorFollower {
    /// Drives the two host-created layers `dot` and `ring`.
    #[must_use]
    pub fn new(dot: LayerId, ring: LayerId, config: CursorConfig, target: PointerTarget) -> Self {
        Self {
            dot,
            ring,
            config,
            target,
            ring_position: None,
        }
    }

    fn hide(&self, store: &mut LayerStore) {
        store.set_opacity(self.dot, 0.0);
        store.set_opacity(self.ring, 0.0);
    }
}

impl Effect for CursorFollower {
    fn mount(&mut self, store: &mut LayerStore) {
        self.hide(store);
    }

    fn update(&mut self, frame: &FrameContext, store: &mut LayerStore) -> Result<(), TickError> {
        let Some(pointer) = self.target.get() else {
            self.ring_position = None;
            self.hide(store);
            return Ok(());
        };
        // Frame-rate independent damping, calibrated at 60 Hz.
        let blend = 1.0 - (1.0 - self.config.ring_lerp).powf(frame.delta * 60.0);
        let ring = match self.ring_position {
            Some(prev) => prev.lerp(pointer, blend),
            None => pointer,
        };
        self.ring_position = Some(ring);

        store.set_translation(self.dot, pointer.to_vec2());
        store.set_opacity(self.dot, 1.0);
        store.set_translation(self.ring, ring.to_vec2());
        store.set_opacity(self.ring, 1.0);
        let scale = if self.target.hovering.get() {
            self.config.hover_scale
        } else {
            1.0
        };
        store.set_scale(self.ring, scale);
        Ok(())
    }

    fn dispose(&mut self, store: &mut LayerStore) {
        self.hide(store);
        store.set_translation(self.dot, Vec2::ZERO);
        store.set_translation(self.ring, Vec2::ZERO);
        store.set_scale(self.ring, 1.0);
    }
}

/// Tuning for [`Ripple`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RippleConfig {
    /// Seconds from press to fully faded.
    pub duration: f64,
    /// Scale reached at the end of the ripple.
    pub max_scale: f64,
}

impl RippleConfig {
    /// A short press ripple.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            duration: 0.6,
            max_scale: 4.0,
        }
    }
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Where the host reports presses for a [`Ripple`].
#[derive(Clone, Debug, Default)]
pub struct RippleTrigger {
    pending: Rc<Cell<Option<Point>>>,
}

impl RippleTrigger {
    /// Starts a ripple at `position` on the next frame, restarting any
    /// ripple in flight.
    pub fn fire(&self, position: Point) {
        self.pending.set(Some(position));
    }
}

/// A ring that expands from a press point and fades out.
#[derive(Debug)]
pub struct Ripple {
    layer: LayerId,
    config: RippleConfig,
    trigger: RippleTrigger,
    /// Origin and seconds since the press.
    active: Option<(Point, f64)>,
}

impl Ripple {
    /// Drives the host-created `layer`.
    #[must_use]
    pub fn new(layer: LayerId, config: RippleConfig, trigger: RippleTrigger) -> Self {
        Self {
            layer,
            config,
            trigger,
            active: None,
        }
    }

    /// Whether a ripple is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Effect for Ripple {
    fn mount(&mut self, store: &mut LayerStore) {
        store.set_opacity(self.layer, 0.0);
        store.set_scale(self.layer, 0.0);
    }

    fn update(&mut self, frame: &FrameContext, store: &mut LayerStore) -> Result<(), TickError> {
        if let Some(origin) = self.trigger.pending.take() {
            self.active = Some((origin, 0.0));
            store.set_translation(self.layer, origin.to_vec2());
        } else if let Some((_, elapsed)) = self.active.as_mut() {
            *elapsed += frame.delta;
        }
        let Some((_, elapsed)) = self.active else {
            return Ok(());
        };

        let t = if self.config.duration > 0.0 {
            (elapsed / self.config.duration).min(1.0)
        } else {
            1.0
        };
        let spread = Ease::OutCubic.apply(t);
        store.set_scale(self.layer, self.config.max_scale * spread);
        store.set_opacity(self.layer, 1.0 - t);
        if t >= 1.0 {
            self.active = None;
        }
        Ok(())
    }

    fn dispose(&mut self, store: &mut LayerStore) {
        self.active = None;
        store.set_opacity(self.layer, 0.0);
        store.set_scale(self.layer, 1.0);
        store.set_translation(self.layer, Vec2::ZERO);
    }
}
