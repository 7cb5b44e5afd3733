// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time and frame ticks.
//!
//! [`HostTime`] is a point in time as platform-native monotonic ticks (on the
//! web, microseconds derived from `performance.now()`). [`Timebase`] carries
//! the rational conversion from ticks to nanoseconds, so frame deltas can be
//! expressed in seconds regardless of where the ticks came from.
//!
//! [`FrameTick`] is the single value a frame source hands to the
//! [`FrameClock`](crate::clock::FrameClock) on every animation frame.

use std::fmt;
use std::ops::Sub;

/// A point in time expressed as platform-native monotonic ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// Rational conversion factor from ticks to nanoseconds.
///
/// `nanoseconds = ticks * numer / denom`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// A timebase where ticks are already nanoseconds.
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// A timebase where one tick is one microsecond (the web timebase).
    pub const MICROS: Self = Self {
        numer: 1000,
        denom: 1,
    };

    /// Creates a new timebase.
    ///
    /// # Panics
    ///
    /// Panics if `denom` is zero.
    #[inline]
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        assert!(denom != 0, "timebase denominator must not be zero");
        Self { numer, denom }
    }

    /// Converts a tick count to nanoseconds.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn ticks_to_nanos(self, ticks: u64) -> u64 {
        let wide = ticks as u128 * self.numer as u128 / self.denom as u128;
        wide as u64
    }

    /// Converts a tick count to fractional seconds.
    #[inline]
    #[must_use]
    pub fn ticks_to_secs(self, ticks: u64) -> f64 {
        self.ticks_to_nanos(ticks) as f64 / 1_000_000_000.0
    }

    /// Converts fractional seconds to a tick count, saturating at zero.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "negative input saturates to zero; frame-scale values fit in u64"
    )]
    pub fn secs_to_ticks(self, secs: f64) -> u64 {
        let nanos = (secs.max(0.0) * 1_000_000_000.0) as u128;
        (nanos * self.denom as u128 / self.numer as u128) as u64
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::NANOS
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}

/// A duration in the same tick units as [`HostTime`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Converts this duration to fractional seconds.
    #[inline]
    #[must_use]
    pub fn as_secs_f64(self, timebase: Timebase) -> f64 {
        timebase.ticks_to_secs(self.0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({})", self.0)
    }
}

/// A frame opportunity delivered by a frame source.
///
/// On the web this comes from `requestAnimationFrame`; in tests it is built
/// by hand to step the clock deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameTick {
    /// Host time when the tick was generated.
    pub now: HostTime,
    /// Monotonically increasing frame counter.
    pub frame_index: u64,
}
