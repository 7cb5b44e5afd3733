// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `requestIdleCallback` and `setTimeout` scheduling.

use tideline_core::idle::{IdleCallback, IdleScheduler};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast as _, JsValue};
use web_sys::Window;

/// [`IdleScheduler`] over the window's timers.
///
/// Safari has no `requestIdleCallback`; [`request_idle`](IdleScheduler::request_idle)
/// hands the callback back there and the caller relies on the timeout.
#[derive(Debug)]
pub struct BrowserIdle {
    window: Window,
    supports_idle: bool,
}

impl BrowserIdle {
    /// Detects idle-callback support on `window`.
    #[must_use]
    pub fn new(window: Window) -> Self {
        let supports_idle = js_sys::Reflect::has(&window, &JsValue::from_str("requestIdleCallback"))
            .unwrap_or(false);
        Self {
            window,
            supports_idle,
        }
    }

    /// Whether `requestIdleCallback` is available.
    #[must_use]
    pub fn supports_idle(&self) -> bool {
        self.supports_idle
    }
}

pub(crate) fn delay_ms(delay: f64) -> i32 {
    let ms = (delay * 1000.0).round();
    if ms.is_nan() || ms <= 0.0 {
        0
    } else if ms >= f64::from(i32::MAX) {
        i32::MAX
    } else {
        #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
        let ms = ms as i32;
        ms
    }
}

impl IdleScheduler for BrowserIdle {
    fn request_idle(&mut self, callback: IdleCallback) -> Result<(), IdleCallback> {
        if !self.supports_idle {
            return Err(callback);
        }
        // `once_into_js` frees the closure after its single call.
        let function = Closure::once_into_js(callback);
        if let Err(err) = self.window.request_idle_callback(function.unchecked_ref()) {
            // The callback is gone with the closure; the timeout still runs.
            tracing::warn!(error = ?err, "requestIdleCallback failed");
        }
        Ok(())
    }

    fn set_timeout(&mut self, delay: f64, callback: IdleCallback) {
        let function = Closure::once_into_js(callback);
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(function.unchecked_ref(), delay_ms(delay))
        {
            tracing::warn!(error = ?err, "setTimeout failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_convert_to_whole_milliseconds() {
        assert_eq!(delay_ms(0.3), 300);
        assert_eq!(delay_ms(-1.0), 0);
        assert_eq!(delay_ms(f64::NAN), 0);
        assert_eq!(delay_ms(1e12), i32::MAX);
    }
}
