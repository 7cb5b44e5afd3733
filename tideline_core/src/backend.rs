// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for host integrations.
//!
//! The core never touches a browser API. A backend crate supplies:
//!
//! - **Frame source**: a [`FrameSource`](crate::clock::FrameSource) that
//!   calls [`FrameClock::tick`](crate::clock::FrameClock::tick) once per
//!   display frame while started.
//! - **Time**: a `now() -> HostTime` free function reading the host's
//!   monotonic clock, plus the matching [`Timebase`](crate::time::Timebase).
//! - **Presenter**: implements [`Presenter`] to turn layer changes into
//!   style writes on the bound elements.
//! - **Preference plumbing**: a
//!   [`PreferenceStore`](crate::motion::PreferenceStore), a
//!   [`MotionSignal`](crate::motion::MotionSignal) and an
//!   [`AttributeSink`](crate::motion::AttributeSink).
//! - **Measurement**: one [`TriggerSource`](crate::timeline::TriggerSource)
//!   per scroll-linked section and a
//!   [`DeviceProbe`](crate::capability::DeviceProbe) filled in at mount.
//! - **Deferred work**: an [`IdleScheduler`](crate::idle::IdleScheduler).
//! - **GPU**: a [`BackendFactory`] that asynchronously produces a
//!   [`ParticleBackend`](crate::morph::ParticleBackend) (usually from
//!   `tideline_render`), and a [`HeroSurface`] that swaps between the canvas
//!   and the static gradient.
//!
//! # Frame pseudocode
//!
//! ```rust,ignore
//! fn on_frame(tick: FrameTick) {
//!     // Smooth scroll, then run Scroll/Timeline/Effect/Render lanes.
//!     clock.tick(tick);
//!     // Present lane: drain dirty channels and write styles.
//!     let changes = store.evaluate();
//!     presenter.apply(&store, &changes);
//! }
//! ```

use crate::capability::RenderPath;
use crate::error::GpuError;
use crate::layer::{FrameChanges, LayerStore};

/// Applies evaluated layer changes to the host's presentation tree.
///
/// The DOM presenter and test doubles both implement this trait.
pub trait Presenter {
    /// Applies `changes`, reading current values from `store` as needed.
    fn apply(&mut self, store: &LayerStore, changes: &FrameChanges);
}

/// Receives the outcome of a backend request. Call at most once.
pub type BackendDelivery<B> = Box<dyn FnOnce(Result<B, GpuError>)>;

/// Creates GPU backends.
///
/// Context creation is asynchronous in browsers; implementations may call
/// `deliver` synchronously or from a later task.
pub trait BackendFactory<B> {
    /// Requests a backend sized for `particle_count` particles.
    fn create(&mut self, particle_count: usize, deliver: BackendDelivery<B>);
}

/// The part of the page that shows the hero.
pub trait HeroSurface {
    /// Shows the canvas for [`RenderPath::Gpu`] or the static gradient for
    /// [`RenderPath::Fallback`].
    fn show(&mut self, path: &RenderPath);
}
