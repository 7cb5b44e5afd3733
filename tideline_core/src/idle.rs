// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred initialisation.
//!
//! GPU canvas creation is pushed off the first-paint path: it runs when the
//! host reports idle time, or after a hard timeout, whichever comes first.
//! Hosts without idle callbacks go straight to the timeout.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Deferral timing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdleConfig {
    /// Seconds after which the job runs even if no idle time was reported.
    pub timeout: f64,
}

impl IdleConfig {
    /// 300 ms hard fallback.
    #[must_use]
    pub const fn web() -> Self {
        Self { timeout: 0.3 }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// A one-shot callback handed to the host.
pub type IdleCallback = Box<dyn FnOnce()>;

/// Host scheduling primitives.
pub trait IdleScheduler {
    /// Queues `callback` for the next idle period.
    ///
    /// Returns the callback back if idle callbacks are not supported.
    fn request_idle(&mut self, callback: IdleCallback) -> Result<(), IdleCallback>;

    /// Runs `callback` after `delay` seconds.
    fn set_timeout(&mut self, delay: f64, callback: IdleCallback);
}

type Job = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

/// A job that runs at most once, on idle or on timeout.
pub struct DeferredInit {
    job: Job,
    fired: Rc<Cell<bool>>,
}

impl fmt::Debug for DeferredInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredInit")
            .field("pending", &self.is_pending())
            .field("fired", &self.fired.get())
            .finish_non_exhaustive()
    }
}

impl DeferredInit {
    /// Schedules `job` through both the idle callback and the timeout.
    pub fn schedule(
        scheduler: &mut dyn IdleScheduler,
        config: IdleConfig,
        job: impl FnOnce() + 'static,
    ) -> Self {
        let slot: Job = Rc::new(RefCell::new(Some(Box::new(job))));
        let fired = Rc::new(Cell::new(false));

        let idle = trigger(&slot, &fired, "idle");
        if scheduler.request_idle(idle).is_err() {
            tracing::debug!("idle callbacks unsupported; using timeout only");
        }
        scheduler.set_timeout(config.timeout, trigger(&slot, &fired, "timeout"));

        Self { job: slot, fired }
    }

    /// Drops the job if it has not run yet.
    pub fn cancel(&self) {
        self.job.borrow_mut().take();
    }

    /// Whether the job is still waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.job.borrow().is_some()
    }

    /// Whether the job has run.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }
}

fn trigger(slot: &Job, fired: &Rc<Cell<bool>>, via: &'static str) -> IdleCallback {
    let slot = Rc::clone(slot);
    let fired = Rc::clone(fired);
    Box::new(move || {
        // Take before running so a job that re-enters the scheduler cannot
        // see itself still pending.
        let job = slot.borrow_mut().take();
        if let Some(job) = job {
            tracing::debug!(via, "deferred init running");
            fired.set(true);
            job();
        }
    })
}

/// An [`IdleScheduler`] driven by hand, for tests and headless hosts.
///
/// Clones share the same queues, so one clone can be handed to a runtime
/// while another runs the callbacks.
#[derive(Clone, Default)]
pub struct ManualIdle {
    state: Rc<ManualIdleState>,
}

#[derive(Default)]
struct ManualIdleState {
    supports_idle: Cell<bool>,
    idle: RefCell<Vec<IdleCallback>>,
    timeouts: RefCell<Vec<(f64, IdleCallback)>>,
}

impl fmt::Debug for ManualIdle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualIdle")
            .field("supports_idle", &self.state.supports_idle.get())
            .field("idle", &self.state.idle.borrow().len())
            .field("timeouts", &self.state.timeouts.borrow().len())
            .finish_non_exhaustive()
    }
}

impl ManualIdle {
    /// Creates a scheduler; `supports_idle` controls whether idle requests
    /// are accepted.
    #[must_use]
    pub fn new(supports_idle: bool) -> Self {
        let idle = Self::default();
        idle.state.supports_idle.set(supports_idle);
        idle
    }

    /// Runs every queued idle callback.
    pub fn run_idle(&self) {
        let queued = std::mem::take(&mut *self.state.idle.borrow_mut());
        for callback in queued {
            callback();
        }
    }

    /// Runs every timeout whose delay is at most `elapsed` seconds.
    pub fn advance(&self, elapsed: f64) {
        let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut *self.state.timeouts.borrow_mut())
            .into_iter()
            .partition(|(delay, _)| *delay <= elapsed);
        self.state.timeouts.borrow_mut().extend(rest);
        for (_, callback) in due {
            callback();
        }
    }

    /// Number of callbacks still queued (idle plus timeouts).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.idle.borrow().len() + self.state.timeouts.borrow().len()
    }
}

impl IdleScheduler for ManualIdle {
    fn request_idle(&mut self, callback: IdleCallback) -> Result<(), IdleCallback> {
        if !self.state.supports_idle.get() {
            return Err(callback);
        }
        self.state.idle.borrow_mut().push(callback);
        Ok(())
    }

    fn set_timeout(&mut self, delay: f64, callback: IdleCallback) {
        self.state.timeouts.borrow_mut().push((delay, callback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, move || c.set(c.get() + 1))
    }

    #[test]
    fn idle_runs_first_and_timeout_is_a_no_op() {
        let mut host = ManualIdle::new(true);
        let (count, job) = counter();
        let init = DeferredInit::schedule(&mut host, IdleConfig::web(), job);
        assert!(init.is_pending());
        host.run_idle();
        assert_eq!(count.get(), 1);
        host.advance(1.0);
        assert_eq!(count.get(), 1);
        assert!(init.has_fired());
    }

    #[test]
    fn timeout_runs_when_idle_never_comes() {
        let mut host = ManualIdle::new(true);
        let (count, job) = counter();
        let init = DeferredInit::schedule(&mut host, IdleConfig::web(), job);
        host.advance(0.2);
        assert_eq!(count.get(), 0);
        host.advance(0.3);
        assert_eq!(count.get(), 1);
        host.run_idle();
        assert_eq!(count.get(), 1);
        assert!(!init.is_pending());
    }

    #[test]
    fn unsupported_idle_still_initialises() {
        let mut host = ManualIdle::new(false);
        let (count, job) = counter();
        DeferredInit::schedule(&mut host, IdleConfig::web(), job);
        host.advance(0.3);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cancelled_job_never_runs() {
        let mut host = ManualIdle::new(true);
        let (count, job) = counter();
        let init = DeferredInit::schedule(&mut host, IdleConfig::web(), job);
        init.cancel();
        host.run_idle();
        host.advance(1.0);
        assert_eq!(count.get(), 0);
        assert!(!init.has_fired());
    }
}
