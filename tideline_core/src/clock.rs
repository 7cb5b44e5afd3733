// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The page-wide frame clock.
//!
//! [`FrameClock`] owns the only animation-frame loop on the page. Every
//! animated component registers a callback instead of running its own loop,
//! and each [`tick`](FrameClock::tick) runs in a fixed order:
//!
//! 1. Ingest buffered raw scroll input.
//! 2. Update the smoothed offset and velocity.
//! 3. Invoke callbacks by [`TickPhase`], then by registration order within a
//!    phase, handing each the same [`FrameContext`].
//!
//! Callbacks only ever see a [`ScrollSnapshot`] copy, so the scroll state has
//! exactly one writer. A callback that returns an error or panics is logged
//! and skipped for that frame; the clock and the other callbacks keep going.
//!
//! The platform loop is abstracted as a [`FrameSource`] so the same clock is
//! driven by `requestAnimationFrame` in the browser and by hand in tests.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use crate::error::TickError;
use crate::motion::MotionPolicy;
use crate::scroll::{ClockConfig, ScrollInput, ScrollSnapshot, ScrollState};
use crate::time::{FrameTick, HostTime, Timebase};

/// A platform frame loop that the clock can start and stop.
///
/// Implementations call [`FrameClock::tick`] once per frame while started.
pub trait FrameSource {
    /// Begins delivering ticks. Must be idempotent.
    fn start(&mut self);

    /// Stops delivering ticks. Must be idempotent.
    fn stop(&mut self);
}

/// Ordering lane for frame callbacks.
///
/// Lanes run in declaration order; the order is what guarantees that
/// timelines read this frame's scroll state and that the renderer uploads
/// uniforms after timelines have been applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TickPhase {
    /// Writes the smoothed offset back to the host (virtual scroll).
    Scroll,
    /// Scroll timelines.
    #[default]
    Timeline,
    /// Imperative effects (cursor followers and the like).
    Effect,
    /// GPU uniform upload and draw.
    Render,
    /// DOM presentation of the layer store.
    Present,
}

/// Everything a frame callback is allowed to know about the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    /// Seconds since the previous tick (clamped; zero on the first tick).
    pub delta: f64,
    /// Seconds accumulated over all ticks.
    pub elapsed: f64,
    /// Frame counter from the originating [`FrameTick`].
    pub frame_index: u64,
    /// This frame's scroll state.
    pub scroll: ScrollSnapshot,
}

type TickCallback = dyn FnMut(&FrameContext) -> Result<(), TickError>;

struct Entry {
    id: u64,
    phase: TickPhase,
    active: Cell<bool>,
    callback: RefCell<Box<TickCallback>>,
}

/// The single frame loop for the page.
///
/// Always held as `Rc<FrameClock>`; registration hands out [`TickGuard`]s
/// that hold a weak reference back.
pub struct FrameClock {
    config: ClockConfig,
    timebase: Timebase,
    policy: Rc<MotionPolicy>,
    scroll: RefCell<ScrollState>,
    entries: RefCell<Vec<Rc<Entry>>>,
    source: RefCell<Option<Box<dyn FrameSource>>>,
    running: Cell<bool>,
    in_tick: Cell<bool>,
    last_tick: Cell<Option<HostTime>>,
    elapsed: Cell<f64>,
    next_id: Cell<u64>,
    total_registrations: Cell<u64>,
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClock")
            .field("config", &self.config)
            .field("running", &self.running.get())
            .field("registrations", &self.entries.borrow().len())
            .field("elapsed", &self.elapsed.get())
            .finish_non_exhaustive()
    }
}

impl FrameClock {
    /// Creates a stopped clock with no frame source.
    #[must_use]
    pub fn new(config: ClockConfig, timebase: Timebase, policy: Rc<MotionPolicy>) -> Rc<Self> {
        Rc::new(Self {
            config,
            timebase,
            policy,
            scroll: RefCell::new(ScrollState::new(config)),
            entries: RefCell::new(Vec::new()),
            source: RefCell::new(None),
            running: Cell::new(false),
            in_tick: Cell::new(false),
            last_tick: Cell::new(None),
            elapsed: Cell::new(0.0),
            next_id: Cell::new(0),
            total_registrations: Cell::new(0),
        })
    }

    /// Installs the platform frame loop, starting it if work is pending.
    pub fn attach_source(&self, source: Box<dyn FrameSource>) {
        if let Some(mut old) = self.source.borrow_mut().replace(source) {
            old.stop();
        }
        self.running.set(false);
        if self.wants_frames() {
            self.start();
        }
    }

    /// Registers a callback in the default [`TickPhase::Timeline`] lane.
    pub fn register_tick(
        self: &Rc<Self>,
        callback: impl FnMut(&FrameContext) -> Result<(), TickError> + 'static,
    ) -> TickGuard {
        self.register_tick_in(TickPhase::default(), callback)
    }

    /// Registers a callback in a specific lane.
    ///
    /// The callback first runs on the next tick. Starts the frame loop if it
    /// was stopped.
    pub fn register_tick_in(
        self: &Rc<Self>,
        phase: TickPhase,
        callback: impl FnMut(&FrameContext) -> Result<(), TickError> + 'static,
    ) -> TickGuard {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.total_registrations
            .set(self.total_registrations.get() + 1);

        let entry = Rc::new(Entry {
            id,
            phase,
            active: Cell::new(true),
            callback: RefCell::new(Box::new(callback)),
        });
        {
            let mut entries = self.entries.borrow_mut();
            let pos = entries.partition_point(|e| e.phase <= phase);
            entries.insert(pos, entry);
        }
        tracing::trace!(id, ?phase, "frame callback registered");
        self.start();

        TickGuard {
            clock: Rc::downgrade(self),
            id,
        }
    }

    /// Buffers raw scroll input for the next tick.
    ///
    /// Under reduced motion the input is applied immediately and unsmoothed,
    /// and the frame loop is not started.
    pub fn push_scroll(&self, input: ScrollInput) {
        let mut scroll = self.scroll.borrow_mut();
        scroll.push(input);
        if self.policy.prefers_reduced() {
            scroll.ingest();
            let raw = scroll.snapshot().raw_offset;
            scroll.jump_to(raw);
            return;
        }
        drop(scroll);
        self.start();
    }

    /// Moves the scroll position without smoothing.
    pub fn jump_to(&self, offset: f64) {
        self.scroll.borrow_mut().jump_to(offset);
    }

    /// Updates the document scroll limit and viewport height.
    pub fn set_scroll_bounds(&self, limit: f64, viewport_height: f64) {
        self.scroll.borrow_mut().set_bounds(limit, viewport_height);
    }

    /// Returns the current scroll state.
    #[must_use]
    pub fn snapshot(&self) -> ScrollSnapshot {
        self.scroll.borrow().snapshot()
    }

    /// Returns `true` while the frame source is started.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of live registrations.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Number of registrations ever made on this clock.
    #[must_use]
    pub fn total_registrations(&self) -> u64 {
        self.total_registrations.get()
    }

    /// Seconds accumulated over all ticks.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed.get()
    }

    /// Advances one frame.
    pub fn tick(&self, tick: FrameTick) {
        if self.in_tick.replace(true) {
            tracing::warn!(frame = tick.frame_index, "re-entrant tick ignored");
            return;
        }

        let delta = match self.last_tick.replace(Some(tick.now)) {
            Some(prev) => (tick.now - prev)
                .as_secs_f64(self.timebase)
                .min(self.config.max_delta),
            None => 0.0,
        };
        let elapsed = self.elapsed.get() + delta;
        self.elapsed.set(elapsed);

        let scroll = {
            let mut state = self.scroll.borrow_mut();
            state.ingest();
            if self.policy.prefers_reduced() {
                let raw = state.snapshot().raw_offset;
                state.jump_to(raw);
            } else {
                state.smooth(delta);
            }
            state.snapshot()
        };

        let frame = FrameContext {
            delta,
            elapsed,
            frame_index: tick.frame_index,
            scroll,
        };
        let _span = tracing::trace_span!("frame", index = tick.frame_index).entered();

        // Snapshot so callbacks may register or unregister during the tick.
        let entries: Vec<Rc<Entry>> = self.entries.borrow().clone();
        for entry in entries {
            if !entry.active.get() {
                continue;
            }
            let Ok(mut callback) = entry.callback.try_borrow_mut() else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| callback(&frame))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(id = entry.id, phase = ?entry.phase, error = %err, "frame callback failed");
                }
                Err(payload) => {
                    let err = TickError::Panicked(panic_message(payload.as_ref()));
                    tracing::warn!(id = entry.id, phase = ?entry.phase, error = %err, "frame callback panicked");
                }
            }
        }

        self.in_tick.set(false);
        if !self.wants_frames() {
            self.stop();
        }
    }

    fn wants_frames(&self) -> bool {
        if !self.entries.borrow().is_empty() {
            return true;
        }
        if self.policy.prefers_reduced() {
            return false;
        }
        let scroll = self.scroll.borrow();
        scroll.has_pending_input() || !scroll.is_settled()
    }

    fn start(&self) {
        if self.running.get() {
            return;
        }
        if let Some(source) = self.source.borrow_mut().as_mut() {
            tracing::debug!("frame loop started");
            source.start();
            self.running.set(true);
        }
    }

    fn stop(&self) {
        if !self.running.get() {
            return;
        }
        if let Some(source) = self.source.borrow_mut().as_mut() {
            source.stop();
        }
        self.running.set(false);
        // The next start measures its first delta from scratch.
        self.last_tick.set(None);
        tracing::debug!("frame loop stopped");
    }

    fn unregister(&self, id: u64) {
        {
            let mut entries = self.entries.borrow_mut();
            let Some(pos) = entries.iter().position(|e| e.id == id) else {
                return;
            };
            entries[pos].active.set(false);
            entries.remove(pos);
        }
        tracing::trace!(id, "frame callback unregistered");
        if !self.in_tick.get() && !self.wants_frames() {
            self.stop();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Keeps a frame callback registered.
///
/// Dropping the guard (or calling [`unregister`](Self::unregister))
/// removes the callback synchronously: it will not run again, not even later
/// in a tick that is currently in progress.
#[must_use = "dropping a TickGuard unregisters the callback immediately"]
pub struct TickGuard {
    clock: Weak<FrameClock>,
    id: u64,
}

impl TickGuard {
    /// Unregisters the callback now.
    pub fn unregister(self) {}

    /// Returns `true` while the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.clock
            .upgrade()
            .is_some_and(|c| c.entries.borrow().iter().any(|e| e.id == self.id))
    }
}

impl fmt::Debug for TickGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickGuard")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        if let Some(clock) = self.clock.upgrade() {
            clock.unregister(self.id);
        }
    }
}

/// A [`FrameSource`] that only records start/stop calls.
///
/// Useful for hosts that step the clock manually (tests, offline capture).
#[derive(Clone, Debug, Default)]
pub struct ManualSource {
    state: Rc<ManualSourceState>,
}

#[derive(Debug, Default)]
struct ManualSourceState {
    running: Cell<bool>,
    starts: Cell<u32>,
}

impl ManualSource {
    /// Creates a stopped source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the clock currently wants frames.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    /// How many times the clock started this source.
    #[must_use]
    pub fn start_count(&self) -> u32 {
        self.state.starts.get()
    }
}

impl FrameSource for ManualSource {
    fn start(&mut self) {
        if !self.state.running.replace(true) {
            self.state.starts.set(self.state.starts.get() + 1);
        }
    }

    fn stop(&mut self) {
        self.state.running.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{FixedSignal, MemoryPreferenceStore, NoAttribute};

    fn clock(reduced: bool) -> (Rc<FrameClock>, ManualSource) {
        let policy = MotionPolicy::new(
            Box::new(MemoryPreferenceStore::default()),
            &FixedSignal(reduced),
            Box::new(NoAttribute),
        );
        let clock = FrameClock::new(ClockConfig::web(), Timebase::MICROS, policy);
        let source = ManualSource::new();
        clock.attach_source(Box::new(source.clone()));
        (clock, source)
    }

    fn tick_at(clock: &FrameClock, index: u64) {
        clock.tick(FrameTick {
            now: HostTime(index * 16_000),
            frame_index: index,
        });
    }

    #[test]
    fn starts_on_first_registration_and_stops_when_empty() {
        let (clock, source) = clock(true);
        assert!(!source.is_running());

        let guard = clock.register_tick(|_| Ok(()));
        assert!(source.is_running());
        tick_at(&clock, 0);
        assert!(source.is_running());

        drop(guard);
        assert!(!source.is_running(), "reduced motion and no callbacks: stop");
    }

    #[test]
    fn phases_run_in_order_then_registration_order() {
        let (clock, _source) = clock(false);
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut guards = Vec::new();
        for (phase, name) in [
            (TickPhase::Render, "render"),
            (TickPhase::Timeline, "timeline-a"),
            (TickPhase::Present, "present"),
            (TickPhase::Timeline, "timeline-b"),
            (TickPhase::Scroll, "scroll"),
        ] {
            let log = Rc::clone(&log);
            guards.push(clock.register_tick_in(phase, move |_| {
                log.borrow_mut().push(name);
                Ok(())
            }));
        }
        tick_at(&clock, 0);
        assert_eq!(
            *log.borrow(),
            ["scroll", "timeline-a", "timeline-b", "render", "present"]
        );
    }

    #[test]
    fn callbacks_observe_this_frames_smoothed_offset() {
        let (clock, _source) = clock(false);
        let seen = Rc::new(Cell::new(0.0));
        let seen_cb = Rc::clone(&seen);
        let _guard = clock.register_tick(move |frame| {
            seen_cb.set(frame.scroll.smoothed_offset);
            Ok(())
        });

        clock.push_scroll(ScrollInput::Absolute(1000.0));
        tick_at(&clock, 0);
        assert_eq!(seen.get(), 100.0, "one lerp step of 0.1 this frame");
        assert_eq!(clock.snapshot().smoothed_offset, 100.0);
    }

    #[test]
    fn failing_callback_does_not_stop_others() {
        let (clock, source) = clock(false);
        let count = Rc::new(Cell::new(0));

        let _bad = clock.register_tick(|_| Err(TickError::Other("boom".into())));
        let _panicky = clock.register_tick(|_| panic!("callback exploded"));
        let count_cb = Rc::clone(&count);
        let _good = clock.register_tick(move |_| {
            count_cb.set(count_cb.get() + 1);
            Ok(())
        });

        for i in 0..3 {
            tick_at(&clock, i);
        }
        assert_eq!(count.get(), 3);
        assert!(source.is_running());
    }

    #[test]
    fn unregister_mid_tick_prevents_later_callback() {
        let (clock, _source) = clock(false);
        let ran = Rc::new(Cell::new(false));
        let victim: Rc<RefCell<Option<TickGuard>>> = Rc::new(RefCell::new(None));

        let victim_cb = Rc::clone(&victim);
        let _killer = clock.register_tick_in(TickPhase::Timeline, move |_| {
            victim_cb.borrow_mut().take();
            Ok(())
        });
        let ran_cb = Rc::clone(&ran);
        *victim.borrow_mut() = Some(clock.register_tick_in(TickPhase::Render, move |_| {
            ran_cb.set(true);
            Ok(())
        }));

        tick_at(&clock, 0);
        assert!(!ran.get(), "unregistered callback must not run");
        assert_eq!(clock.registration_count(), 1);
    }

    #[test]
    fn delta_is_clamped_and_first_tick_is_zero() {
        let (clock, _source) = clock(false);
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let deltas_cb = Rc::clone(&deltas);
        let _g = clock.register_tick(move |frame| {
            deltas_cb.borrow_mut().push(frame.delta);
            Ok(())
        });

        clock.tick(FrameTick {
            now: HostTime(1_000_000),
            frame_index: 0,
        });
        clock.tick(FrameTick {
            now: HostTime(1_016_000),
            frame_index: 1,
        });
        clock.tick(FrameTick {
            now: HostTime(9_000_000),
            frame_index: 2,
        });
        let d = deltas.borrow();
        assert_eq!(d[0], 0.0);
        assert!((d[1] - 0.016).abs() < 1e-12);
        assert_eq!(d[2], 0.1);
    }

    #[test]
    fn reduced_motion_scroll_is_immediate_and_does_not_start_loop() {
        let (clock, source) = clock(true);
        clock.push_scroll(ScrollInput::Absolute(420.0));
        assert!(!source.is_running());
        assert_eq!(clock.snapshot().smoothed_offset, 420.0);
    }

    #[test]
    fn scroll_input_keeps_loop_alive_until_settled() {
        let (clock, source) = clock(false);
        clock.push_scroll(ScrollInput::Absolute(50.0));
        assert!(source.is_running());
        let mut i = 0;
        while source.is_running() {
            tick_at(&clock, i);
            i += 1;
            assert!(i < 200, "scroll never settled");
        }
        assert_eq!(clock.snapshot().smoothed_offset, 50.0);
    }
}
