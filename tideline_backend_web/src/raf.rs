// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `requestAnimationFrame` frame source.
//!
//! [`RafLoop`] calls its callback once per animation frame with a
//! [`FrameTick`] whose time is the rAF [`DOMHighResTimeStamp`][mdn]
//! converted to microsecond [`HostTime`] ticks.
//!
//! [mdn]: https://developer.mozilla.org/en-US/docs/Web/API/DOMHighResTimeStamp

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use tideline_core::clock::{FrameClock, FrameSource};
use tideline_core::time::{FrameTick, HostTime};

// Direct global bindings instead of `web_sys::Window` methods; avoids
// fetching the Window/Performance objects on every frame.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

/// Converts a millisecond timestamp to microsecond ticks.
pub(crate) fn ms_to_host_time(ms: f64) -> HostTime {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "page-lifetime timestamps in µs fit in u64; negatives saturate to 0"
    )]
    let us = (ms * 1000.0) as u64;
    HostTime(us)
}

type RafClosure = Closure<dyn FnMut(f64)>;

struct RafInner {
    /// Created on first start and reused, so stop-then-start from inside a
    /// frame never drops the closure that is running.
    closure: RefCell<Option<RafClosure>>,
    callback: RefCell<Box<dyn FnMut(FrameTick)>>,
    frame_counter: Cell<u64>,
    running: Cell<bool>,
    /// Id of the pending request, if one is queued.
    pending: Cell<Option<i32>>,
}

impl RafInner {
    fn request(&self) {
        if self.pending.get().is_some() {
            return;
        }
        if let Some(closure) = self.closure.borrow().as_ref() {
            let id = request_animation_frame(closure.as_ref().unchecked_ref());
            self.pending.set(Some(id));
        }
    }

    fn on_frame(&self, timestamp_ms: f64) {
        self.pending.set(None);
        if !self.running.get() {
            return;
        }
        let frame_index = self.frame_counter.get();
        self.frame_counter.set(frame_index + 1);
        let tick = FrameTick {
            now: ms_to_host_time(timestamp_ms),
            frame_index,
        };

        // The callback may stop (and restart) the loop; `request` is a no-op
        // if a restart already queued the next frame.
        self.callback.borrow_mut()(tick);

        if self.running.get() {
            self.request();
        }
    }
}

/// A `requestAnimationFrame` loop.
///
/// Installed on a [`FrameClock`] with [`FrameClock::attach_source`], which
/// then starts and stops it as work appears and disappears.
pub struct RafLoop {
    inner: Rc<RafInner>,
}

impl RafLoop {
    /// Creates a stopped loop that calls `callback` every frame once started.
    pub fn new(callback: impl FnMut(FrameTick) + 'static) -> Self {
        Self {
            inner: Rc::new(RafInner {
                closure: RefCell::new(None),
                callback: RefCell::new(Box::new(callback)),
                frame_counter: Cell::new(0),
                running: Cell::new(false),
                pending: Cell::new(None),
            }),
        }
    }

    /// Creates a stopped loop that ticks `clock`.
    ///
    /// Holds the clock weakly; the loop does nothing once the clock is gone.
    pub fn for_clock(clock: &Rc<FrameClock>) -> Self {
        let clock = Rc::downgrade(clock);
        Self::new(move |tick| {
            if let Some(clock) = clock.upgrade() {
                clock.tick(tick);
            }
        })
    }

    /// Starts the loop. No-op if running.
    pub fn start(&self) {
        if self.inner.running.replace(true) {
            return;
        }
        if self.inner.closure.borrow().is_none() {
            let weak = Rc::downgrade(&self.inner);
            let closure = Closure::wrap(Box::new(move |timestamp_ms: f64| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_frame(timestamp_ms);
                }
            }) as Box<dyn FnMut(f64)>);
            *self.inner.closure.borrow_mut() = Some(closure);
        }
        self.inner.request();
    }

    /// Stops the loop and cancels the pending frame. Can be restarted.
    pub fn stop(&self) {
        if !self.inner.running.replace(false) {
            return;
        }
        if let Some(id) = self.inner.pending.take() {
            cancel_animation_frame(id);
        }
    }

    /// Returns `true` if the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Frames delivered so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.inner.frame_counter.get()
    }
}

impl FrameSource for RafLoop {
    fn start(&mut self) {
        Self::start(self);
    }

    fn stop(&mut self) {
        Self::stop(self);
    }
}

impl Drop for RafLoop {
    fn drop(&mut self) {
        self.stop();
        // Drop the JS closure so it doesn't leak.
        self.inner.closure.borrow_mut().take();
    }
}

impl std::fmt::Debug for RafLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RafLoop")
            .field("running", &self.inner.running.get())
            .field("frame_counter", &self.inner.frame_counter.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_become_microsecond_ticks() {
        assert_eq!(ms_to_host_time(16.5), HostTime(16_500));
        assert_eq!(ms_to_host_time(0.0), HostTime(0));
        assert_eq!(ms_to_host_time(-3.0), HostTime(0), "saturates");
    }
}
