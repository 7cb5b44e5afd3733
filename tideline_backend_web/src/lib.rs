// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Browser backend for tideline.
//!
//! This crate implements the core's host traits with browser APIs:
//!
//! - [`RafLoop`]: `requestAnimationFrame` frame source
//! - [`DomPresenter`]: inline style writes on bound elements
//! - [`LocalStoragePreferences`], [`MediaQuerySignal`],
//!   [`DocumentAttribute`]: reduced-motion plumbing
//! - [`CssPropertySink`], [`CanvasSurface`], [`DomTrigger`],
//!   [`BrowserIdle`], [`WgpuFactory`] and [`probe_device`]
//!
//! [`mount`] puts them together for a whole page; [`TidelinePage`] exposes
//! the result to JavaScript, sharing one [`TidelineSession`] across the
//! pages of a page load.

mod dom;
mod gpu;
mod idle;
mod listeners;
mod page;
mod preference;
mod presenter;
mod raf;

pub use dom::{CanvasSurface, CssPropertySink, DomTrigger, RENDER_PATH_ATTRIBUTE, probe_device};
pub use gpu::WgpuFactory;
pub use idle::BrowserIdle;
pub use listeners::{EventListener, INTERACTIVE_SELECTOR, install, sync_layout};
pub use page::{
    ENTRANCE_ATTRIBUTE, Page, PageOptions, TidelinePage, TidelineSession, WebRuntime, mount,
};
pub use preference::{
    DocumentAttribute, LocalStoragePreferences, MediaQueryListener, MediaQuerySignal,
    REDUCED_MOTION_ATTRIBUTE, REDUCED_MOTION_QUERY, STORAGE_KEY,
};
pub use presenter::DomPresenter;
pub use raf::RafLoop;
pub use tideline_core::backend::Presenter;

use tideline_core::time::{HostTime, Timebase};

/// Returns the current host time from `performance.now()`, in microsecond
/// ticks of [`timebase`].
#[must_use]
pub fn now() -> HostTime {
    raf::ms_to_host_time(raf::performance_now())
}

/// Returns the web [`Timebase`]: 1 tick = 1 µs.
#[must_use]
pub fn timebase() -> Timebase {
    Timebase::MICROS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timebase_is_microsecond() {
        let tb = timebase();
        assert_eq!(tb.ticks_to_nanos(1), 1000, "1 tick = 1 µs");
        assert_eq!(tb.ticks_to_secs(16_000), 0.016);
    }
}
