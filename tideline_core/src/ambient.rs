// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ambient CSS custom properties.
//!
//! Stylesheets that only want a hint of scroll activity (film grain, a
//! background hue shift) read two custom properties instead of registering
//! with the scheduler:
//!
//! - [`VELOCITY_PROPERTY`]: normalised velocity in `[-1, 1]`.
//! - [`WARMTH_PROPERTY`]: scroll depth in `[0, 1]`.
//!
//! Writes are throttled in time and by magnitude, since each one invalidates
//! style for the whole document.

use std::fmt;

use crate::clock::FrameContext;

/// Name of the normalised velocity property.
pub const VELOCITY_PROPERTY: &str = "--scroll-velocity";
/// Name of the scroll depth property.
pub const WARMTH_PROPERTY: &str = "--scroll-warmth";

/// Throttling for ambient properties.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientConfig {
    /// Minimum seconds between two writes.
    pub min_interval: f64,
    /// Smallest change worth writing.
    pub epsilon: f64,
    /// Fraction of document depth over which warmth goes from 0 to 1.
    pub warmth_span: f64,
}

impl AmbientConfig {
    /// About 30 writes per second, three decimal places, whole document.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            min_interval: 1.0 / 30.0,
            epsilon: 0.005,
            warmth_span: 1.0,
        }
    }
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Where ambient properties are written (the document root's style).
pub trait StyleSink {
    /// Sets a custom property.
    fn set_property(&mut self, name: &str, value: &str);
}

/// Publishes scroll velocity and warmth as CSS custom properties.
pub struct AmbientPublisher {
    config: AmbientConfig,
    sink: Box<dyn StyleSink>,
    last_write: Option<f64>,
    velocity: Option<f64>,
    warmth: Option<f64>,
}

impl fmt::Debug for AmbientPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientPublisher")
            .field("config", &self.config)
            .field("velocity", &self.velocity)
            .field("warmth", &self.warmth)
            .finish_non_exhaustive()
    }
}

impl AmbientPublisher {
    /// Creates a publisher that has not written anything yet.
    #[must_use]
    pub fn new(config: AmbientConfig, sink: Box<dyn StyleSink>) -> Self {
        Self {
            config,
            sink,
            last_write: None,
            velocity: None,
            warmth: None,
        }
    }

    /// The values last written, `(velocity, warmth)`.
    #[must_use]
    pub fn published(&self) -> (Option<f64>, Option<f64>) {
        (self.velocity, self.warmth)
    }

    /// Considers one frame. Returns `true` if anything was written.
    pub fn publish(&mut self, frame: &FrameContext) -> bool {
        if let Some(last) = self.last_write
            && frame.elapsed - last < self.config.min_interval
        {
            return false;
        }
        let velocity = frame.scroll.normalized_velocity();
        let warmth = self.warmth_of(frame.scroll.depth());
        let mut wrote = false;
        if changed(self.velocity, velocity, self.config.epsilon) {
            self.sink
                .set_property(VELOCITY_PROPERTY, &format!("{velocity:.3}"));
            self.velocity = Some(velocity);
            wrote = true;
        }
        if changed(self.warmth, warmth, self.config.epsilon) {
            self.sink.set_property(WARMTH_PROPERTY, &format!("{warmth:.3}"));
            self.warmth = Some(warmth);
            wrote = true;
        }
        if wrote {
            self.last_write = Some(frame.elapsed);
            tracing::trace!(velocity, warmth, "ambient properties written");
        }
        wrote
    }

    /// Writes resting values (zero velocity, the given depth) immediately.
    ///
    /// Used when the loop stops or under reduced motion, where no frames
    /// arrive to bring the velocity back to zero.
    pub fn settle(&mut self, depth: f64) {
        let warmth = self.warmth_of(depth);
        self.sink.set_property(VELOCITY_PROPERTY, "0.000");
        self.sink.set_property(WARMTH_PROPERTY, &format!("{warmth:.3}"));
        self.velocity = Some(0.0);
        self.warmth = Some(warmth);
    }

    fn warmth_of(&self, depth: f64) -> f64 {
        if self.config.warmth_span <= 0.0 {
            return 1.0;
        }
        (depth / self.config.warmth_span).clamp(0.0, 1.0)
    }
}

/// A value moving onto exactly zero is always written, however close the
/// last write was, so a settled page never keeps a stale residue.
fn changed(previous: Option<f64>, next: f64, epsilon: f64) -> bool {
    previous.is_none_or(|p| (next - p).abs() > epsilon || (next == 0.0 && p != 0.0))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::scroll::ScrollSnapshot;

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<(String, String)>>>);

    impl StyleSink for RecordingSink {
        fn set_property(&mut self, name: &str, value: &str) {
            self.0.borrow_mut().push((name.to_string(), value.to_string()));
        }
    }

    fn frame(elapsed: f64, velocity: f64, offset: f64) -> FrameContext {
        FrameContext {
            delta: 1.0 / 60.0,
            elapsed,
            frame_index: 0,
            scroll: ScrollSnapshot {
                raw_offset: offset,
                smoothed_offset: offset,
                velocity,
                limit: 1000.0,
                viewport_height: 800.0,
                max_velocity: 3000.0,
            },
        }
    }

    #[test]
    fn first_frame_writes_both_properties() {
        let sink = RecordingSink::default();
        let log = Rc::clone(&sink.0);
        let mut publisher = AmbientPublisher::new(AmbientConfig::web(), Box::new(sink));
        assert!(publisher.publish(&frame(0.0, 1500.0, 250.0)));
        assert_eq!(
            *log.borrow(),
            [
                (VELOCITY_PROPERTY.to_string(), "0.500".to_string()),
                (WARMTH_PROPERTY.to_string(), "0.250".to_string()),
            ]
        );
    }

    #[test]
    fn writes_are_throttled_in_time() {
        let sink = RecordingSink::default();
        let log = Rc::clone(&sink.0);
        let mut publisher = AmbientPublisher::new(AmbientConfig::web(), Box::new(sink));
        publisher.publish(&frame(0.0, 0.0, 0.0));
        assert!(!publisher.publish(&frame(0.01, 3000.0, 900.0)));
        assert_eq!(log.borrow().len(), 2);
        assert!(publisher.publish(&frame(0.05, 3000.0, 900.0)));
        assert_eq!(publisher.published(), (Some(1.0), Some(0.9)));
    }

    #[test]
    fn small_changes_are_not_written() {
        let sink = RecordingSink::default();
        let log = Rc::clone(&sink.0);
        let mut publisher = AmbientPublisher::new(AmbientConfig::web(), Box::new(sink));
        publisher.publish(&frame(0.0, 300.0, 500.0));
        assert!(!publisher.publish(&frame(1.0, 303.0, 501.0)));
        assert!(publisher.publish(&frame(2.0, 303.0, 520.0)));
        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].0, WARMTH_PROPERTY);
    }

    #[test]
    fn velocity_reaching_rest_is_written_even_within_epsilon() {
        let sink = RecordingSink::default();
        let log = Rc::clone(&sink.0);
        let mut publisher = AmbientPublisher::new(AmbientConfig::web(), Box::new(sink));
        publisher.publish(&frame(0.0, 300.0, 500.0));
        assert!(publisher.publish(&frame(1.0, 12.0, 500.0)));
        assert_eq!(publisher.published().0, Some(0.004));

        assert!(publisher.publish(&frame(2.0, 0.0, 500.0)));
        assert_eq!(publisher.published().0, Some(0.0));
        let log = log.borrow();
        assert_eq!(log.last(), Some(&(VELOCITY_PROPERTY.to_string(), "0.000".to_string())));

        drop(log);
        assert!(!publisher.publish(&frame(3.0, 0.0, 500.0)), "rest is written once");
    }

    #[test]
    fn settle_zeroes_velocity() {
        let sink = RecordingSink::default();
        let log = Rc::clone(&sink.0);
        let config = AmbientConfig {
            warmth_span: 0.5,
            ..AmbientConfig::web()
        };
        let mut publisher = AmbientPublisher::new(config, Box::new(sink));
        publisher.settle(0.2);
        assert_eq!(log.borrow()[1].1, "0.400");
        assert_eq!(publisher.published(), (Some(0.0), Some(0.4)));
    }
}
