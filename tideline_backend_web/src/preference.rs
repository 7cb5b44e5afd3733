// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Browser plumbing for the reduced-motion preference.
//!
//! - [`LocalStoragePreferences`]: the persisted manual choice.
//! - [`MediaQuerySignal`]: `prefers-reduced-motion: reduce`, plus a change
//!   listener feeding [`MotionPolicy::on_system_change`].
//! - [`DocumentAttribute`]: mirrors the effective preference as
//!   `data-reduced-motion` on `<html>` so CSS can react.

use std::rc::{Rc, Weak};

use tideline_core::error::{SignalError, StorageError};
use tideline_core::motion::{AttributeSink, MotionPolicy, MotionSignal, PreferenceStore};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast as _, JsValue};
use web_sys::{MediaQueryList, MediaQueryListEvent, Storage};

/// `localStorage` key of the persisted choice.
pub const STORAGE_KEY: &str = "tideline:motion";

const REDUCE: &str = "reduce";
const NO_PREFERENCE: &str = "no-preference";

/// Media query for the OS-level preference.
pub const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

fn js_message(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| "unknown".into())
}

pub(crate) fn parse_stored(value: Option<&str>) -> Result<Option<bool>, StorageError> {
    match value {
        None => Ok(None),
        Some(REDUCE) => Ok(Some(true)),
        Some(NO_PREFERENCE) => Ok(Some(false)),
        Some(other) => Err(StorageError::Corrupt(other.into())),
    }
}

pub(crate) fn stored_value(prefers_reduced: bool) -> &'static str {
    if prefers_reduced { REDUCE } else { NO_PREFERENCE }
}

/// [`PreferenceStore`] over `window.localStorage`.
///
/// Storage can be missing or throw (private browsing, sandboxed frames);
/// every such case surfaces as [`StorageError`].
#[derive(Debug, Default)]
pub struct LocalStoragePreferences {
    key: Option<String>,
}

impl LocalStoragePreferences {
    /// Uses [`STORAGE_KEY`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom key.
    #[must_use]
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }

    fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(STORAGE_KEY)
    }

    fn storage() -> Result<Storage, StorageError> {
        let window = web_sys::window().ok_or(StorageError::Unavailable)?;
        window
            .local_storage()
            .map_err(|e| StorageError::Backend(js_message(&e)))?
            .ok_or(StorageError::Unavailable)
    }
}

impl PreferenceStore for LocalStoragePreferences {
    fn load(&self) -> Result<Option<bool>, StorageError> {
        let value = Self::storage()?
            .get_item(self.key())
            .map_err(|e| StorageError::Backend(js_message(&e)))?;
        parse_stored(value.as_deref())
    }

    fn save(&mut self, prefers_reduced: bool) -> Result<(), StorageError> {
        Self::storage()?
            .set_item(self.key(), stored_value(prefers_reduced))
            .map_err(|e| StorageError::Backend(js_message(&e)))
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        Self::storage()?
            .remove_item(self.key())
            .map_err(|e| StorageError::Backend(js_message(&e)))
    }
}

/// [`MotionSignal`] over `matchMedia`.
#[derive(Debug, Clone)]
pub struct MediaQuerySignal {
    list: Option<MediaQueryList>,
}

impl MediaQuerySignal {
    /// Evaluates [`REDUCED_MOTION_QUERY`] against the current window.
    #[must_use]
    pub fn new() -> Self {
        let list = web_sys::window()
            .and_then(|window| window.match_media(REDUCED_MOTION_QUERY).ok().flatten());
        Self { list }
    }

    /// Forwards OS preference changes to `policy` until the returned
    /// listener is dropped.
    ///
    /// Returns `None` when `matchMedia` is unavailable.
    #[must_use]
    pub fn listen(&self, policy: &Rc<MotionPolicy>) -> Option<MediaQueryListener> {
        let list = self.list.clone()?;
        let policy: Weak<MotionPolicy> = Rc::downgrade(policy);
        let closure = Closure::<dyn FnMut(MediaQueryListEvent)>::new(move |event: MediaQueryListEvent| {
            if let Some(policy) = policy.upgrade() {
                tracing::debug!(reduced = event.matches(), "OS motion preference changed");
                policy.on_system_change(event.matches());
            }
        });
        list.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref())
            .ok()?;
        Some(MediaQueryListener { list, closure })
    }
}

impl Default for MediaQuerySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionSignal for MediaQuerySignal {
    fn query(&self) -> Result<bool, SignalError> {
        self.list
            .as_ref()
            .map(MediaQueryList::matches)
            .ok_or_else(|| SignalError("matchMedia unavailable".into()))
    }
}

/// Keeps a `matchMedia` change listener registered.
pub struct MediaQueryListener {
    list: MediaQueryList,
    closure: Closure<dyn FnMut(MediaQueryListEvent)>,
}

impl std::fmt::Debug for MediaQueryListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaQueryListener")
            .field("media", &self.list.media())
            .finish_non_exhaustive()
    }
}

impl Drop for MediaQueryListener {
    fn drop(&mut self) {
        let _ = self
            .list
            .remove_event_listener_with_callback("change", self.closure.as_ref().unchecked_ref());
    }
}

/// [`AttributeSink`] that sets `data-reduced-motion` on `<html>`.
#[derive(Debug, Default)]
pub struct DocumentAttribute;

/// Attribute written by [`DocumentAttribute`].
pub const REDUCED_MOTION_ATTRIBUTE: &str = "data-reduced-motion";

impl AttributeSink for DocumentAttribute {
    fn set_reduced_motion(&mut self, reduced: bool) {
        let Some(root) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.document_element())
        else {
            return;
        };
        let value = if reduced { "true" } else { "false" };
        if let Err(err) = root.set_attribute(REDUCED_MOTION_ATTRIBUTE, value) {
            tracing::warn!(error = %js_message(&err), "could not set reduced-motion attribute");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_values_round_trip_and_reject_garbage() {
        assert_eq!(parse_stored(None), Ok(None));
        assert_eq!(parse_stored(Some(stored_value(true))), Ok(Some(true)));
        assert_eq!(parse_stored(Some(stored_value(false))), Ok(Some(false)));
        assert_eq!(
            parse_stored(Some("yes")),
            Err(StorageError::Corrupt("yes".into()))
        );
    }

    #[test]
    fn custom_key_overrides_default() {
        assert_eq!(LocalStoragePreferences::new().key(), STORAGE_KEY);
        assert_eq!(LocalStoragePreferences::with_key("k").key(), "k");
    }
}
