// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session-scoped state.
//!
//! Entrance animations differ between the very first mount of a page load
//! and later in-app navigations. The distinction lives in a [`Session`]
//! that the host creates once per page load and hands to every runtime it
//! builds as `Rc<Session>`. Nothing is global: two tests with their own
//! sessions never see each other's mounts.

use std::cell::Cell;

/// How a mounted view was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entrance {
    /// First mount since the session started: full entrance choreography.
    Initial,
    /// A later navigation within the same session: short entrance.
    Navigation,
}

/// Per-session state.
#[derive(Debug, Default)]
pub struct Session {
    mounted_once: Cell<bool>,
}

impl Session {
    /// A fresh session; the next [`entrance`](Self::entrance) is
    /// [`Entrance::Initial`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports how the current mount was reached and records that a mount
    /// happened. Returns [`Entrance::Initial`] exactly once until
    /// [`reset`](Self::reset).
    pub fn entrance(&self) -> Entrance {
        if self.mounted_once.replace(true) {
            Entrance::Navigation
        } else {
            Entrance::Initial
        }
    }

    /// Peeks without recording a mount.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        !self.mounted_once.get()
    }

    /// Starts a new session (full page load, or between tests).
    pub fn reset(&self) {
        self.mounted_once.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_exactly_once_until_reset() {
        let session = Session::new();
        assert!(session.is_initial());
        assert_eq!(session.entrance(), Entrance::Initial);
        assert_eq!(session.entrance(), Entrance::Navigation);
        assert_eq!(session.entrance(), Entrance::Navigation);
        session.reset();
        assert_eq!(session.entrance(), Entrance::Initial);
    }

    #[test]
    fn sessions_do_not_leak_into_each_other() {
        let a = Session::new();
        let b = Session::new();
        a.entrance();
        assert_eq!(b.entrance(), Entrance::Initial);
    }
}
