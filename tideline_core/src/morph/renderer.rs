// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The particle morph renderer.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use kurbo::{Point, Size};

use super::cycle::{CycleStep, MorphCycle};
use super::targets::{MorphShapes, MorphTargetLibrary, MorphTargetSet, ShapeKind};
use super::uniforms::{MorphUniforms, POINTER_NONE};
use crate::capability::{CapabilityTier, FallbackReason, RenderPath};
use crate::error::GpuError;

/// Timing and look of the particle hero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphConfig {
    /// Seconds spent on each shape before morphing.
    pub hold_duration: f64,
    /// Seconds each morph takes.
    pub transition_duration: f64,
    /// Drift amplitude in model units.
    pub drift_amplitude: f32,
    /// Outward spread factor at full scroll progress.
    pub spread: f32,
    /// Pointer repulsion radius in clip units.
    pub repulsion_radius: f32,
    /// Pointer repulsion displacement at distance zero.
    pub repulsion_strength: f32,
    /// Point sprite size in CSS pixels.
    pub point_size: f32,
    /// Seed for target jitter and per-particle seeds.
    pub seed: u64,
}

impl MorphConfig {
    /// The landing-page hero: 8 s hold, 2 s morph.
    #[must_use]
    pub const fn hero() -> Self {
        Self {
            hold_duration: 8.0,
            transition_duration: 2.0,
            drift_amplitude: 0.035,
            spread: 1.6,
            repulsion_radius: 0.25,
            repulsion_strength: 0.18,
            point_size: 3.0,
            seed: 0x7D1E_11E5,
        }
    }
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self::hero()
    }
}

/// GPU side of the particle renderer.
///
/// Context creation is asynchronous on most hosts, so a backend value only
/// exists once a context was obtained; everything after that is
/// synchronous and may still fail.
pub trait ParticleBackend {
    /// Allocates per-particle buffers for `particle_count` particles.
    fn prepare(&mut self, particle_count: usize) -> Result<(), GpuError>;

    /// Uploads all three shapes and the seeds. Called once per mount.
    fn upload_shapes(&mut self, shapes: &MorphShapes) -> Result<(), GpuError>;

    /// Writes `uniforms` and draws, interpolating from `pair.0` to `pair.1`.
    ///
    /// The pair and the progress inside `uniforms` always come from the
    /// same cycle step.
    fn draw(&mut self, uniforms: &MorphUniforms, pair: (ShapeKind, ShapeKind)) -> Result<(), GpuError>;

    /// Resizes the drawing surface, in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    /// Releases GPU resources. The backend is dropped afterwards.
    fn release(&mut self);
}

/// What one renderer tick did.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// A frame was drawn.
    Rendered(CycleStep),
    /// Nothing is mounted (or the renderer already fell back).
    Inactive,
    /// The backend failed this frame; the renderer is now on the fallback
    /// path and will not draw again.
    FellBack(FallbackReason),
}

struct Running<B> {
    backend: B,
    shapes: MorphShapes,
    cycle: MorphCycle,
    elapsed: f64,
    tier: CapabilityTier,
    uniforms: MorphUniforms,
}

enum State<B> {
    Idle,
    Running(Running<B>),
    Failed(FallbackReason),
}

/// Cycles a point cloud between morph targets on the GPU.
///
/// Any backend failure, at mount or mid-run, fails closed: the backend is
/// released, [`path`](Self::path) turns into [`RenderPath::Fallback`], and
/// the host swaps in the static gradient. Nothing propagates to the caller.
pub struct ParticleMorphRenderer<B: ParticleBackend> {
    config: MorphConfig,
    library: MorphTargetLibrary,
    state: State<B>,
    viewport: Size,
    pixel_ratio: f64,
    pointer: Option<Point>,
}

impl<B: ParticleBackend> fmt::Debug for ParticleMorphRenderer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Idle => "idle",
            State::Running(_) => "running",
            State::Failed(_) => "failed",
        };
        f.debug_struct("ParticleMorphRenderer")
            .field("config", &self.config)
            .field("state", &state)
            .field("viewport", &self.viewport)
            .field("pixel_ratio", &self.pixel_ratio)
            .finish_non_exhaustive()
    }
}

impl<B: ParticleBackend> ParticleMorphRenderer<B> {
    /// Creates an unmounted renderer.
    #[must_use]
    pub fn new(config: MorphConfig) -> Self {
        Self {
            config,
            library: MorphTargetLibrary::new(),
            state: State::Idle,
            viewport: Size::new(1.0, 1.0),
            pixel_ratio: 1.0,
            pointer: None,
        }
    }

    /// Generates targets for `particle_count`, uploads them and starts the
    /// cycle on the first shape pair.
    pub fn mount(&mut self, mut backend: B, particle_count: usize, tier: CapabilityTier) -> RenderPath {
        self.unmount();
        let shapes = self.library.shapes(particle_count, self.config.seed);
        let (width, height) = self.physical_size();

        let result = catch_unwind(AssertUnwindSafe(|| {
            backend.prepare(particle_count)?;
            backend.resize(width, height);
            backend.upload_shapes(&shapes)?;
            Ok::<(), GpuError>(())
        }));
        match result {
            Ok(Ok(())) => {
                tracing::info!(particle_count, ?tier, "particle renderer mounted");
                let uniforms = self.base_uniforms();
                self.state = State::Running(Running {
                    backend,
                    shapes,
                    cycle: MorphCycle::new(self.config.hold_duration, self.config.transition_duration),
                    elapsed: 0.0,
                    tier,
                    uniforms,
                });
            }
            Ok(Err(err)) => {
                backend.release();
                self.fail(FallbackReason::GpuFailed(err));
            }
            Err(payload) => {
                self.fail(FallbackReason::Panicked(panic_text(payload.as_ref())));
            }
        }
        self.path()
    }

    /// Records a failure that happened before a backend existed (context
    /// creation) or while running.
    pub fn fail(&mut self, reason: FallbackReason) {
        if let State::Running(running) = &mut self.state {
            running.backend.release();
        }
        tracing::warn!(%reason, "particle renderer fell back to static gradient");
        self.state = State::Failed(reason);
    }

    /// Advances the cycle and draws one frame.
    pub fn tick(&mut self, delta: f64, scroll_progress_hint: f64) -> FrameOutcome {
        let pointer = self.normalized_pointer();
        let base = self.base_uniforms();
        let State::Running(running) = &mut self.state else {
            return FrameOutcome::Inactive;
        };

        let step = running.cycle.advance(delta);
        running.elapsed += delta.max(0.0);
        running.uniforms = MorphUniforms {
            time: running.elapsed as f32,
            morph_progress: step.morph_progress as f32,
            scroll_progress: scroll_progress_hint.clamp(0.0, 1.0) as f32,
            pointer,
            ..base
        };

        let uniforms = running.uniforms;
        let pair = (step.current, step.next);
        let backend = &mut running.backend;
        let err = match catch_unwind(AssertUnwindSafe(|| backend.draw(&uniforms, pair))) {
            Ok(Ok(())) => return FrameOutcome::Rendered(step),
            Ok(Err(err)) => FallbackReason::GpuFailed(err),
            Err(payload) => FallbackReason::Panicked(panic_text(payload.as_ref())),
        };
        self.fail(err.clone());
        FrameOutcome::FellBack(err)
    }

    /// Releases the backend (if any) and returns to the idle state.
    pub fn unmount(&mut self) {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Running(mut running) => {
                running.backend.release();
                tracing::debug!("particle renderer unmounted");
            }
            State::Idle | State::Failed(_) => {}
        }
    }

    /// Sets the pointer in CSS pixels relative to the canvas, or `None`
    /// when it leaves.
    pub fn set_pointer(&mut self, pointer: Option<Point>) {
        self.pointer = pointer;
    }

    /// Sets the canvas size in CSS pixels.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.resize_backend();
    }

    /// Sets the device pixel ratio.
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.pixel_ratio = if pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
        self.resize_backend();
    }

    /// The current render path.
    #[must_use]
    pub fn path(&self) -> RenderPath {
        match &self.state {
            State::Running(r) => RenderPath::Gpu {
                particle_count: r.shapes.count(),
                tier: r.tier,
            },
            State::Failed(reason) => RenderPath::Fallback {
                reason: reason.clone(),
            },
            State::Idle => RenderPath::Fallback {
                reason: FallbackReason::NoGpuContext,
            },
        }
    }

    /// Returns `true` while a backend is mounted and drawing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// The cycle state while running.
    #[must_use]
    pub fn cycle(&self) -> Option<&MorphCycle> {
        match &self.state {
            State::Running(r) => Some(&r.cycle),
            _ => None,
        }
    }

    /// The pair currently being interpolated while running.
    #[must_use]
    pub fn active_targets(&self) -> Option<MorphTargetSet> {
        match &self.state {
            State::Running(r) => {
                let (current, next) = r.cycle.active_pair();
                Some(r.shapes.pair(current, next))
            }
            _ => None,
        }
    }

    /// The uniforms uploaded by the last tick while running.
    #[must_use]
    pub fn uniforms(&self) -> Option<&MorphUniforms> {
        match &self.state {
            State::Running(r) => Some(&r.uniforms),
            _ => None,
        }
    }

    /// The mounted backend, for hosts that need to reach it.
    pub fn backend_mut(&mut self) -> Option<&mut B> {
        match &mut self.state {
            State::Running(r) => Some(&mut r.backend),
            _ => None,
        }
    }

    fn base_uniforms(&self) -> MorphUniforms {
        let (width, height) = self.physical_size();
        let mut u = MorphUniforms::default();
        u.pixel_ratio = self.pixel_ratio as f32;
        u.resolution = [width as f32, height as f32];
        u.drift_amplitude = self.config.drift_amplitude;
        u.spread = self.config.spread;
        u.repulsion_radius = self.config.repulsion_radius;
        u.repulsion_strength = self.config.repulsion_strength;
        u.point_size = self.config.point_size;
        u
    }

    fn normalized_pointer(&self) -> [f32; 2] {
        let Some(p) = self.pointer else {
            return POINTER_NONE;
        };
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return POINTER_NONE;
        }
        let x = 2.0 * p.x / self.viewport.width - 1.0;
        let y = 1.0 - 2.0 * p.y / self.viewport.height;
        [x as f32, y as f32]
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "canvas sizes fit in u32 after rounding"
    )]
    fn physical_size(&self) -> (u32, u32) {
        let w = (self.viewport.width * self.pixel_ratio).round().max(1.0);
        let h = (self.viewport.height * self.pixel_ratio).round().max(1.0);
        (w as u32, h as u32)
    }

    fn resize_backend(&mut self) {
        let (width, height) = self.physical_size();
        if let State::Running(r) = &mut self.state {
            r.backend.resize(width, height);
        }
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Log {
        prepared: Option<usize>,
        uploads: usize,
        draws: Vec<(MorphUniforms, (ShapeKind, ShapeKind))>,
        sizes: Vec<(u32, u32)>,
        released: bool,
    }

    #[derive(Clone, Default)]
    struct FakeBackend {
        log: Rc<RefCell<Log>>,
        fail_prepare: bool,
        fail_draw_after: Option<usize>,
        panic_on_draw: bool,
    }

    impl ParticleBackend for FakeBackend {
        fn prepare(&mut self, particle_count: usize) -> Result<(), GpuError> {
            if self.fail_prepare {
                return Err(GpuError::ContextLost);
            }
            self.log.borrow_mut().prepared = Some(particle_count);
            Ok(())
        }

        fn upload_shapes(&mut self, shapes: &MorphShapes) -> Result<(), GpuError> {
            assert_eq!(Some(shapes.count()), self.log.borrow().prepared);
            self.log.borrow_mut().uploads += 1;
            Ok(())
        }

        fn draw(&mut self, uniforms: &MorphUniforms, pair: (ShapeKind, ShapeKind)) -> Result<(), GpuError> {
            assert!(!self.panic_on_draw, "device exploded");
            let mut log = self.log.borrow_mut();
            if self.fail_draw_after.is_some_and(|n| log.draws.len() >= n) {
                return Err(GpuError::ContextLost);
            }
            log.draws.push((*uniforms, pair));
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.log.borrow_mut().sizes.push((width, height));
        }

        fn release(&mut self) {
            self.log.borrow_mut().released = true;
        }
    }

    const STEP: f64 = 1.0 / 64.0;

    #[test]
    fn mounts_full_tier_and_uploads_once() {
        let backend = FakeBackend::default();
        let log = Rc::clone(&backend.log);
        let mut renderer = ParticleMorphRenderer::new(MorphConfig::hero());
        let path = renderer.mount(backend, 180, CapabilityTier::Full);
        assert_eq!(
            path,
            RenderPath::Gpu {
                particle_count: 180,
                tier: CapabilityTier::Full,
            }
        );
        for _ in 0..10 {
            renderer.tick(STEP, 0.0);
        }
        assert_eq!(log.borrow().uploads, 1);
        assert_eq!(log.borrow().draws.len(), 10);
        let targets = renderer.active_targets().unwrap();
        assert_eq!(targets.shape_a.len(), 540);
    }

    #[test]
    fn hold_then_morph_then_advance() {
        let backend = FakeBackend::default();
        let log = Rc::clone(&backend.log);
        let mut renderer = ParticleMorphRenderer::new(MorphConfig::hero());
        renderer.mount(backend, 180, CapabilityTier::Full);

        let mut last = FrameOutcome::Inactive;
        for _ in 0..(9 * 64) {
            last = renderer.tick(STEP, 0.0);
        }
        let FrameOutcome::Rendered(step) = last else {
            panic!("expected a frame, got {last:?}");
        };
        assert_eq!(step.morph_progress, 0.5);
        assert_eq!((step.current, step.next), (ShapeKind::Sphere, ShapeKind::Torus));

        for _ in 0..64 {
            last = renderer.tick(STEP, 0.0);
        }
        let FrameOutcome::Rendered(step) = last else {
            panic!("expected a frame, got {last:?}");
        };
        assert!(step.advanced);
        assert_eq!(step.morph_progress, 0.0);

        let draws = &log.borrow().draws;
        let (uniforms, pair) = draws.last().unwrap();
        assert_eq!(uniforms.morph_progress, 0.0);
        assert_eq!(*pair, (ShapeKind::Torus, ShapeKind::DoubleHelix));
    }

    #[test]
    fn prepare_failure_falls_back_and_releases() {
        let backend = FakeBackend {
            fail_prepare: true,
            ..FakeBackend::default()
        };
        let log = Rc::clone(&backend.log);
        let mut renderer = ParticleMorphRenderer::new(MorphConfig::hero());
        let path = renderer.mount(backend, 180, CapabilityTier::Full);
        assert_eq!(
            path,
            RenderPath::Fallback {
                reason: FallbackReason::GpuFailed(GpuError::ContextLost),
            }
        );
        assert!(log.borrow().released);
        assert_eq!(renderer.tick(STEP, 0.0), FrameOutcome::Inactive);
    }

    #[test]
    fn draw_failure_mid_run_fails_closed() {
        let backend = FakeBackend {
            fail_draw_after: Some(3),
            ..FakeBackend::default()
        };
        let log = Rc::clone(&backend.log);
        let mut renderer = ParticleMorphRenderer::new(MorphConfig::hero());
        renderer.mount(backend, 100, CapabilityTier::Constrained);
        for _ in 0..3 {
            assert!(matches!(renderer.tick(STEP, 0.0), FrameOutcome::Rendered(_)));
        }
        assert!(matches!(renderer.tick(STEP, 0.0), FrameOutcome::FellBack(_)));
        assert!(log.borrow().released);
        assert!(!renderer.is_running());
        assert!(!renderer.path().is_gpu());
        assert_eq!(renderer.tick(STEP, 0.0), FrameOutcome::Inactive);
    }

    #[test]
    fn panicking_draw_is_contained() {
        let backend = FakeBackend {
            panic_on_draw: true,
            ..FakeBackend::default()
        };
        let mut renderer = ParticleMorphRenderer::new(MorphConfig::hero());
        renderer.mount(backend, 100, CapabilityTier::Full);
        let outcome = renderer.tick(STEP, 0.0);
        assert!(matches!(outcome, FrameOutcome::FellBack(FallbackReason::Panicked(_))));
    }

    #[test]
    fn pointer_is_normalized_with_y_up() {
        let backend = FakeBackend::default();
        let log = Rc::clone(&backend.log);
        let mut renderer = ParticleMorphRenderer::new(MorphConfig::hero());
        renderer.set_viewport(Size::new(800.0, 600.0));
        renderer.set_pixel_ratio(2.0);
        renderer.mount(backend, 100, CapabilityTier::Full);

        renderer.set_pointer(Some(Point::new(600.0, 150.0)));
        renderer.tick(STEP, 0.25);
        renderer.set_pointer(None);
        renderer.tick(STEP, 2.0);

        let log = log.borrow();
        assert_eq!(log.sizes.last(), Some(&(1600, 1200)));
        let (first, _) = log.draws[0];
        assert_eq!(first.pointer, [0.5, 0.5]);
        assert_eq!(first.scroll_progress, 0.25);
        assert_eq!(first.resolution, [1600.0, 1200.0]);
        let (second, _) = log.draws[1];
        assert_eq!(second.pointer, POINTER_NONE);
        assert_eq!(second.scroll_progress, 1.0);
    }

    #[test]
    fn unmount_releases_and_goes_idle() {
        let backend = FakeBackend::default();
        let log = Rc::clone(&backend.log);
        let mut renderer = ParticleMorphRenderer::new(MorphConfig::hero());
        renderer.mount(backend, 100, CapabilityTier::Full);
        renderer.unmount();
        assert!(log.borrow().released);
        assert!(renderer.cycle().is_none());
        assert_eq!(renderer.tick(STEP, 0.0), FrameOutcome::Inactive);
    }
}
