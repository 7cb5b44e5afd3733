// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reduced-motion preference.
//!
//! [`MotionPolicy`] is the single process-wide answer to "should this page
//! animate?". It is initialised once from a persisted manual choice if one
//! exists, otherwise from the OS-level signal, and every frame-producing
//! component reads it before registering work.
//!
//! The three host collaborators are traits so the policy can be driven by
//! `localStorage` + `matchMedia` in the browser and by plain values in tests:
//!
//! - [`PreferenceStore`] persists the manual choice.
//! - [`MotionSignal`] queries the OS-level `prefers-reduced-motion` signal.
//! - [`AttributeSink`] mirrors the effective preference onto the document
//!   (for CSS-only consumers).
//!
//! Once a manual override exists, OS signal changes are recorded but never
//! change the effective preference. Subscribers learn which side caused a
//! change through [`ChangeSource`], so a mounted render path can be kept
//! across OS changes and swapped only on a user toggle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{SignalError, StorageError};

/// The effective motion preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MotionPreference {
    /// Whether animated work should be skipped.
    pub prefers_reduced: bool,
    /// Whether the value came from an explicit user toggle rather than the
    /// OS signal.
    pub source_is_manual_override: bool,
}

/// What caused a preference change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// [`MotionPolicy::set_manual_preference`] or
    /// [`MotionPolicy::clear_manual_preference`].
    Manual,
    /// [`MotionPolicy::on_system_change`].
    System,
}

/// Persists the user's manual motion choice.
pub trait PreferenceStore {
    /// Loads the persisted choice; `Ok(None)` when nothing was stored.
    fn load(&self) -> Result<Option<bool>, StorageError>;

    /// Persists a manual choice.
    fn save(&mut self, prefers_reduced: bool) -> Result<(), StorageError>;

    /// Removes any persisted choice.
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Queries the OS-level reduced-motion signal.
pub trait MotionSignal {
    /// Returns `true` when the OS asks for reduced motion.
    fn query(&self) -> Result<bool, SignalError>;
}

/// Mirrors the effective preference onto the document.
pub trait AttributeSink {
    /// Called whenever the effective preference is (re)computed.
    fn set_reduced_motion(&mut self, reduced: bool);
}

type Listener = dyn Fn(MotionPreference, ChangeSource);

struct ListenerEntry {
    id: u64,
    active: Cell<bool>,
    callback: Box<Listener>,
}

/// Process-wide reduced-motion policy.
///
/// Shared as `Rc<MotionPolicy>`; all methods take `&self`.
pub struct MotionPolicy {
    preference: Cell<MotionPreference>,
    /// Last OS signal value, kept so clearing a manual choice can fall back.
    system_reduced: Cell<bool>,
    store: RefCell<Box<dyn PreferenceStore>>,
    attribute: RefCell<Box<dyn AttributeSink>>,
    listeners: RefCell<Vec<Rc<ListenerEntry>>>,
    next_listener: Cell<u64>,
}

impl fmt::Debug for MotionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionPolicy")
            .field("preference", &self.preference.get())
            .field("system_reduced", &self.system_reduced.get())
            .field("listeners", &self.listeners.borrow().len())
            .finish_non_exhaustive()
    }
}

impl MotionPolicy {
    /// Initialises the policy from the persisted choice or the OS signal.
    ///
    /// A storage read failure falls back to the OS signal; an OS query
    /// failure falls back to "full motion".
    pub fn new(
        store: Box<dyn PreferenceStore>,
        signal: &dyn MotionSignal,
        attribute: Box<dyn AttributeSink>,
    ) -> Rc<Self> {
        let system_reduced = signal.query().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "reduced-motion query failed; assuming full motion");
            false
        });

        let persisted = store.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "motion preference read failed; using OS signal");
            None
        });

        let preference = match persisted {
            Some(prefers_reduced) => MotionPreference {
                prefers_reduced,
                source_is_manual_override: true,
            },
            None => MotionPreference {
                prefers_reduced: system_reduced,
                source_is_manual_override: false,
            },
        };
        tracing::debug!(?preference, "motion policy initialised");

        let policy = Rc::new(Self {
            preference: Cell::new(preference),
            system_reduced: Cell::new(system_reduced),
            store: RefCell::new(store),
            attribute: RefCell::new(attribute),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        });
        policy
            .attribute
            .borrow_mut()
            .set_reduced_motion(preference.prefers_reduced);
        policy
    }

    /// Returns the current effective preference.
    #[must_use]
    pub fn preference(&self) -> MotionPreference {
        self.preference.get()
    }

    /// Shorthand for `preference().prefers_reduced`.
    #[must_use]
    pub fn prefers_reduced(&self) -> bool {
        self.preference.get().prefers_reduced
    }

    /// Records an explicit user toggle, persists it and notifies subscribers.
    ///
    /// A persistence failure is logged; the in-memory preference still
    /// changes for this session.
    pub fn set_manual_preference(&self, prefers_reduced: bool) {
        if let Err(err) = self.store.borrow_mut().save(prefers_reduced) {
            tracing::warn!(error = %err, "failed to persist motion preference");
        }
        let next = MotionPreference {
            prefers_reduced,
            source_is_manual_override: true,
        };
        self.update(next, ChangeSource::Manual);
    }

    /// Forgets the manual choice and returns to the OS signal.
    pub fn clear_manual_preference(&self) {
        if let Err(err) = self.store.borrow_mut().clear() {
            tracing::warn!(error = %err, "failed to clear motion preference");
        }
        let next = MotionPreference {
            prefers_reduced: self.system_reduced.get(),
            source_is_manual_override: false,
        };
        self.update(next, ChangeSource::Manual);
    }

    /// Feeds a change of the OS-level signal.
    ///
    /// Ignored (apart from being remembered) while a manual override exists.
    pub fn on_system_change(&self, prefers_reduced: bool) {
        self.system_reduced.set(prefers_reduced);
        if self.preference.get().source_is_manual_override {
            tracing::debug!(prefers_reduced, "OS motion change ignored: manual override");
            return;
        }
        let next = MotionPreference {
            prefers_reduced,
            source_is_manual_override: false,
        };
        self.update(next, ChangeSource::System);
    }

    /// Subscribes to future preference changes.
    ///
    /// The callback runs after the preference has changed. Dropping the
    /// returned [`Subscription`] unsubscribes.
    pub fn on_change(
        self: &Rc<Self>,
        callback: impl Fn(MotionPreference, ChangeSource) + 'static,
    ) -> Subscription {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push(Rc::new(ListenerEntry {
            id,
            active: Cell::new(true),
            callback: Box::new(callback),
        }));
        Subscription {
            policy: Rc::downgrade(self),
            id,
        }
    }

    fn update(&self, next: MotionPreference, source: ChangeSource) {
        let prev = self.preference.replace(next);
        self.attribute
            .borrow_mut()
            .set_reduced_motion(next.prefers_reduced);
        if prev == next {
            return;
        }
        tracing::info!(?prev, ?next, ?source, "motion preference changed");

        // Snapshot so listeners may subscribe/unsubscribe while being notified.
        let listeners: Vec<Rc<ListenerEntry>> = self.listeners.borrow().clone();
        for entry in listeners {
            if entry.active.get() {
                (entry.callback)(next, source);
            }
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(pos) = listeners.iter().position(|l| l.id == id) {
            listeners[pos].active.set(false);
            listeners.remove(pos);
        }
    }
}

/// Keeps a [`MotionPolicy::on_change`] callback registered.
///
/// Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    policy: Weak<MotionPolicy>,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(policy) = self.policy.upgrade() {
            policy.unsubscribe(self.id);
        }
    }
}

/// In-memory [`PreferenceStore`], for hosts without persistent storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryPreferenceStore {
    value: Option<bool>,
}

impl MemoryPreferenceStore {
    /// Creates a store that already holds `value`.
    #[must_use]
    pub fn with_value(value: Option<bool>) -> Self {
        Self { value }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<bool>, StorageError> {
        Ok(self.value)
    }

    fn save(&mut self, prefers_reduced: bool) -> Result<(), StorageError> {
        self.value = Some(prefers_reduced);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.value = None;
        Ok(())
    }
}

/// A [`MotionSignal`] with a fixed answer.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedSignal(pub bool);

impl MotionSignal for FixedSignal {
    fn query(&self) -> Result<bool, SignalError> {
        Ok(self.0)
    }
}

/// An [`AttributeSink`] that discards updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAttribute;

impl AttributeSink for NoAttribute {
    fn set_reduced_motion(&mut self, _reduced: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl PreferenceStore for FailingStore {
        fn load(&self) -> Result<Option<bool>, StorageError> {
            Err(StorageError::Unavailable)
        }
        fn save(&mut self, _: bool) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
        fn clear(&mut self) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
    }

    struct FailingSignal;

    impl MotionSignal for FailingSignal {
        fn query(&self) -> Result<bool, SignalError> {
            Err(SignalError("matchMedia missing".to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingAttribute(Rc<RefCell<Vec<bool>>>);

    impl AttributeSink for RecordingAttribute {
        fn set_reduced_motion(&mut self, reduced: bool) {
            self.0.borrow_mut().push(reduced);
        }
    }

    fn policy(stored: Option<bool>, system: bool) -> Rc<MotionPolicy> {
        MotionPolicy::new(
            Box::new(MemoryPreferenceStore::with_value(stored)),
            &FixedSignal(system),
            Box::new(NoAttribute),
        )
    }

    #[test]
    fn persisted_choice_wins_over_os_signal() {
        let p = policy(Some(false), true);
        assert_eq!(
            p.preference(),
            MotionPreference {
                prefers_reduced: false,
                source_is_manual_override: true,
            }
        );
    }

    #[test]
    fn os_signal_used_without_persisted_choice() {
        let p = policy(None, true);
        assert!(p.prefers_reduced());
        assert!(!p.preference().source_is_manual_override);
    }

    #[test]
    fn storage_failure_falls_back_to_os_signal() {
        let p = MotionPolicy::new(Box::new(FailingStore), &FixedSignal(true), Box::new(NoAttribute));
        assert!(p.prefers_reduced());

        // Write failure still updates the session preference.
        p.set_manual_preference(false);
        assert!(!p.prefers_reduced());
    }

    #[test]
    fn signal_failure_defaults_to_full_motion() {
        let p = MotionPolicy::new(
            Box::new(MemoryPreferenceStore::default()),
            &FailingSignal,
            Box::new(NoAttribute),
        );
        assert!(!p.prefers_reduced());
    }

    #[test]
    fn manual_override_is_not_silently_replaced_by_os_changes() {
        let p = policy(None, false);
        p.set_manual_preference(false);
        p.on_system_change(true);
        assert!(!p.prefers_reduced(), "manual choice must stick");

        p.clear_manual_preference();
        assert!(p.prefers_reduced(), "clearing returns to the latest OS value");
    }

    #[test]
    fn subscribers_see_changes_until_dropped() {
        let p = policy(None, false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_cb = Rc::clone(&seen);
        let sub = p.on_change(move |pref, source| {
            seen_cb.borrow_mut().push((pref.prefers_reduced, source));
        });

        p.on_system_change(true);
        p.on_system_change(true); // no change, no notification
        p.set_manual_preference(false);
        drop(sub);
        p.set_manual_preference(true);

        assert_eq!(
            *seen.borrow(),
            [(true, ChangeSource::System), (false, ChangeSource::Manual)]
        );
    }

    #[test]
    fn attribute_mirrors_effective_preference() {
        let attr = RecordingAttribute::default();
        let log = Rc::clone(&attr.0);
        let p = MotionPolicy::new(
            Box::new(MemoryPreferenceStore::default()),
            &FixedSignal(false),
            Box::new(attr),
        );
        p.set_manual_preference(true);
        assert_eq!(*log.borrow(), [false, true]);
    }
}
