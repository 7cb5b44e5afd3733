// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The timeline scheduler.

use std::fmt;

use super::segment::{self, Ease, Segment};
use super::trigger::{ScrollRange, TriggerEdge, TriggerSource};
use crate::clock::FrameContext;
use crate::error::TimelineError;
use crate::layer::{LayerId, LayerProperty, LayerStore};

/// Identity of a timeline, unique for the scheduler's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimelineId(pub u64);

/// Returned by [`ScrollTimelineScheduler::create_timeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimelineHandle {
    id: TimelineId,
}

impl TimelineHandle {
    /// The timeline's identity.
    #[must_use]
    pub fn id(self) -> TimelineId {
        self.id
    }
}

/// How progress turns into layer values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimelineMode {
    /// Values are a pure function of scroll progress.
    Scrub,
    /// A one-shot reveal.
    PlayOnce {
        /// Progress at which the reveal starts.
        threshold: f64,
        /// Length of the reveal in seconds.
        duration: f64,
        /// Curve applied to the reveal's local time.
        ease: Ease,
    },
}

impl TimelineMode {
    /// A reveal that starts as soon as the trigger range is entered.
    #[must_use]
    pub const fn reveal(duration: f64) -> Self {
        Self::PlayOnce {
            threshold: 0.0,
            duration,
            ease: Ease::OutCubic,
        }
    }
}

/// Keeps a section visually fixed while the timeline runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pin {
    /// Layer translated to cancel out the scroll.
    pub layer: LayerId,
    /// Scroll distance, in pixels, over which the section stays pinned.
    ///
    /// Replaces the end edge: the range runs from the start edge to
    /// `start + distance`.
    pub distance: f64,
}

/// Everything a content section supplies to create a timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineConfig {
    /// Where progress is 0.
    pub start: TriggerEdge,
    /// Where progress is 1 (ignored when pinned).
    pub end: TriggerEdge,
    /// Scrub or play once.
    pub mode: TimelineMode,
    /// Optional pinning.
    pub pin: Option<Pin>,
    /// Layer mappings.
    pub segments: Vec<Segment>,
    /// Progress applied by [`ScrollTimelineScheduler::apply_static`] when
    /// motion is reduced.
    pub static_progress: f64,
}

impl TimelineConfig {
    /// A scrub timeline over the trigger's pass through the viewport.
    ///
    /// The static state is the start of the timeline.
    #[must_use]
    pub fn scrub(segments: Vec<Segment>) -> Self {
        Self {
            start: TriggerEdge::TOP_BOTTOM,
            end: TriggerEdge::BOTTOM_TOP,
            mode: TimelineMode::Scrub,
            pin: None,
            segments,
            static_progress: 0.0,
        }
    }

    /// A play-once reveal; the static state is fully revealed.
    #[must_use]
    pub fn play_once(segments: Vec<Segment>, mode: TimelineMode) -> Self {
        Self {
            start: TriggerEdge::TOP_BOTTOM,
            end: TriggerEdge::BOTTOM_TOP,
            mode,
            pin: None,
            segments,
            static_progress: 1.0,
        }
    }

    /// A scrub timeline pinned from "top meets top" for `distance` pixels.
    #[must_use]
    pub fn pinned(segments: Vec<Segment>, layer: LayerId, distance: f64) -> Self {
        Self {
            start: TriggerEdge::TOP_TOP,
            end: TriggerEdge::TOP_TOP.with_offset(distance),
            mode: TimelineMode::Scrub,
            pin: Some(Pin { layer, distance }),
            segments,
            static_progress: 0.0,
        }
    }
}

/// Progress of a play-once timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayState {
    /// Threshold not yet crossed.
    Waiting,
    /// Running; seconds since the threshold was crossed.
    Playing(f64),
    /// Finished; never replays.
    Complete,
}

struct Timeline {
    id: TimelineId,
    trigger: Box<dyn TriggerSource>,
    config: TimelineConfig,
    range: Result<ScrollRange, TimelineError>,
    progress: f64,
    play: PlayState,
    skip_logged: bool,
}

impl Timeline {
    fn measure(&mut self, viewport_height: f64) {
        self.range = match self.trigger.measure() {
            None => Err(TimelineError::MissingTrigger),
            Some(bounds) => {
                let start = self.config.start.scroll_offset(bounds, viewport_height);
                match self.config.pin {
                    Some(pin) => ScrollRange::new(start, start + pin.distance),
                    None => ScrollRange::resolve(
                        bounds,
                        viewport_height,
                        &self.config.start,
                        &self.config.end,
                    ),
                }
            }
        };
        if self.range.is_ok() {
            self.skip_logged = false;
        }
    }

    fn write_pin(&self, range: &ScrollRange, offset: f64, store: &mut LayerStore) {
        if let Some(pin) = self.config.pin {
            let pinned = (offset - range.start).clamp(0.0, pin.distance);
            store.set_property(pin.layer, LayerProperty::TranslateY, pinned);
        }
    }
}

/// Owns every live timeline and applies them once per frame.
pub struct ScrollTimelineScheduler {
    timelines: Vec<Timeline>,
    next_id: u64,
    viewport_height: f64,
}

impl fmt::Debug for ScrollTimelineScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollTimelineScheduler")
            .field("timelines", &self.timelines.len())
            .field("next_id", &self.next_id)
            .field("viewport_height", &self.viewport_height)
            .finish()
    }
}

impl ScrollTimelineScheduler {
    /// Creates an empty scheduler for a viewport of the given height.
    #[must_use]
    pub fn new(viewport_height: f64) -> Self {
        Self {
            timelines: Vec::new(),
            next_id: 0,
            viewport_height,
        }
    }

    /// Registers a timeline.
    ///
    /// Fails if the trigger is not in the document or the segments are
    /// invalid. A degenerate range is not an error here: the timeline is
    /// kept but skipped until a later layout makes the range valid.
    pub fn create_timeline(
        &mut self,
        mut config: TimelineConfig,
        trigger: Box<dyn TriggerSource>,
    ) -> Result<TimelineHandle, TimelineError> {
        if !trigger.is_connected() {
            return Err(TimelineError::MissingTrigger);
        }
        segment::normalize(&mut config.segments)?;
        if let TimelineMode::PlayOnce {
            threshold,
            duration,
            ..
        } = config.mode
        {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(TimelineError::InvalidConfig(
                    "play-once threshold must be within [0, 1]",
                ));
            }
            if !duration.is_finite() || duration <= 0.0 {
                return Err(TimelineError::InvalidConfig(
                    "play-once duration must be positive",
                ));
            }
        }
        if let Some(pin) = config.pin
            && (!pin.distance.is_finite() || pin.distance <= 0.0)
        {
            return Err(TimelineError::InvalidConfig("pin distance must be positive"));
        }

        let id = TimelineId(self.next_id);
        self.next_id += 1;
        let mut timeline = Timeline {
            id,
            trigger,
            config,
            range: Err(TimelineError::MissingTrigger),
            progress: 0.0,
            play: PlayState::Waiting,
            skip_logged: false,
        };
        timeline.measure(self.viewport_height);
        tracing::debug!(timeline = ?id, range = ?timeline.range, "timeline created");
        self.timelines.push(timeline);
        Ok(TimelineHandle { id })
    }

    /// Removes a timeline. Its layers keep their last applied values.
    pub fn destroy(&mut self, handle: TimelineHandle) -> Result<(), TimelineError> {
        let pos = self.position(handle)?;
        self.timelines.remove(pos);
        tracing::debug!(timeline = ?handle.id, "timeline destroyed");
        Ok(())
    }

    /// Re-measures every trigger. Call on resize and layout changes only.
    pub fn invalidate_layout(&mut self) {
        let viewport_height = self.viewport_height;
        for timeline in &mut self.timelines {
            timeline.measure(viewport_height);
        }
    }

    /// Updates the viewport height and re-measures.
    pub fn set_viewport(&mut self, viewport_height: f64) {
        self.viewport_height = viewport_height;
        self.invalidate_layout();
    }

    /// Evaluates every live timeline for one frame.
    pub fn update(&mut self, frame: &FrameContext, store: &mut LayerStore) {
        let offset = frame.scroll.smoothed_offset;
        self.timelines.retain_mut(|timeline| {
            if !timeline.trigger.is_connected() {
                tracing::debug!(
                    timeline = ?timeline.id,
                    progress = timeline.progress,
                    "trigger removed; timeline torn down"
                );
                return false;
            }

            let range = match &timeline.range {
                Ok(range) => *range,
                Err(err) => {
                    if !timeline.skip_logged {
                        tracing::warn!(timeline = ?timeline.id, error = %err, "timeline skipped");
                        timeline.skip_logged = true;
                    }
                    return true;
                }
            };

            let p = range.progress(offset);
            timeline.progress = p;
            timeline.write_pin(&range, offset, store);

            match timeline.config.mode {
                TimelineMode::Scrub => segment::apply(&timeline.config.segments, p, store),
                TimelineMode::PlayOnce {
                    threshold,
                    duration,
                    ease,
                } => {
                    let local = match timeline.play {
                        PlayState::Waiting if p >= threshold => {
                            timeline.play = PlayState::Playing(0.0);
                            Some(0.0)
                        }
                        PlayState::Waiting => Some(0.0),
                        PlayState::Playing(elapsed) => {
                            let elapsed = elapsed + frame.delta;
                            if elapsed >= duration {
                                timeline.play = PlayState::Complete;
                                tracing::trace!(timeline = ?timeline.id, "reveal complete");
                                Some(1.0)
                            } else {
                                timeline.play = PlayState::Playing(elapsed);
                                Some(ease.apply(elapsed / duration))
                            }
                        }
                        PlayState::Complete => None,
                    };
                    if let Some(local) = local {
                        segment::apply(&timeline.config.segments, local, store);
                    }
                }
            }
            true
        });
    }

    /// Applies a timeline's static state once, without the clock.
    ///
    /// Used when motion is reduced: the section is laid out at
    /// [`TimelineConfig::static_progress`] and never animates.
    pub fn apply_static(
        &mut self,
        handle: TimelineHandle,
        store: &mut LayerStore,
    ) -> Result<(), TimelineError> {
        let pos = self.position(handle)?;
        let timeline = &mut self.timelines[pos];
        let p = timeline.config.static_progress.clamp(0.0, 1.0);
        segment::apply(&timeline.config.segments, p, store);
        timeline.progress = p;
        if matches!(timeline.config.mode, TimelineMode::PlayOnce { .. }) && p >= 1.0 {
            timeline.play = PlayState::Complete;
        }
        Ok(())
    }

    /// Applies the static state of every timeline.
    pub fn apply_static_all(&mut self, store: &mut LayerStore) {
        let handles: Vec<TimelineHandle> = self.handles().collect();
        for handle in handles {
            // Handles come from the live list, so this cannot fail.
            let _ = self.apply_static(handle, store);
        }
    }

    /// Last computed progress.
    pub fn progress(&self, handle: TimelineHandle) -> Result<f64, TimelineError> {
        Ok(self.timelines[self.position(handle)?].progress)
    }

    /// Play state of a play-once timeline (`None` for scrub timelines).
    pub fn play_state(&self, handle: TimelineHandle) -> Result<Option<PlayState>, TimelineError> {
        let timeline = &self.timelines[self.position(handle)?];
        Ok(match timeline.config.mode {
            TimelineMode::Scrub => None,
            TimelineMode::PlayOnce { .. } => Some(timeline.play),
        })
    }

    /// The measured range, or why the timeline is being skipped.
    pub fn range(&self, handle: TimelineHandle) -> Result<ScrollRange, TimelineError> {
        self.timelines[self.position(handle)?].range.clone()
    }

    /// Whether the handle refers to a live timeline.
    #[must_use]
    pub fn contains(&self, handle: TimelineHandle) -> bool {
        self.position(handle).is_ok()
    }

    /// Handles of every live timeline, in creation order.
    pub fn handles(&self) -> impl Iterator<Item = TimelineHandle> + '_ {
        self.timelines.iter().map(|t| TimelineHandle { id: t.id })
    }

    /// Number of live timelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    /// Returns `true` when no timelines are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    fn position(&self, handle: TimelineHandle) -> Result<usize, TimelineError> {
        self.timelines
            .iter()
            .position(|t| t.id == handle.id)
            .ok_or(TimelineError::UnknownTimeline(handle.id))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use kurbo::Rect;

    use super::*;
    use crate::scroll::ScrollSnapshot;
    use crate::timeline::LayerTarget;

    #[derive(Clone)]
    struct FakeTrigger {
        bounds: Rc<Cell<Option<Rect>>>,
        connected: Rc<Cell<bool>>,
    }

    impl FakeTrigger {
        fn at(y0: f64, y1: f64) -> Self {
            Self {
                bounds: Rc::new(Cell::new(Some(Rect::new(0.0, y0, 1000.0, y1)))),
                connected: Rc::new(Cell::new(true)),
            }
        }
    }

    impl TriggerSource for FakeTrigger {
        fn measure(&self) -> Option<Rect> {
            self.bounds.get()
        }
        fn is_connected(&self) -> bool {
            self.connected.get()
        }
    }

    fn frame(offset: f64, delta: f64) -> FrameContext {
        FrameContext {
            delta,
            elapsed: 0.0,
            frame_index: 0,
            scroll: ScrollSnapshot {
                raw_offset: offset,
                smoothed_offset: offset,
                ..ScrollSnapshot::default()
            },
        }
    }

    fn fade(layer: LayerId) -> Vec<Segment> {
        vec![Segment::full(vec![LayerTarget::linear(
            layer,
            LayerProperty::Opacity,
            0.0,
            1.0,
        )])]
    }

    #[test]
    fn scrub_is_reversible() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let mut sched = ScrollTimelineScheduler::new(800.0);
        // top/bottom at 1200, bottom/top at 2600.
        sched
            .create_timeline(
                TimelineConfig::scrub(fade(layer)),
                Box::new(FakeTrigger::at(2000.0, 2600.0)),
            )
            .unwrap();

        sched.update(&frame(1550.0, 0.016), &mut store);
        let forward = store.opacity(layer).unwrap();
        sched.update(&frame(2500.0, 0.016), &mut store);
        sched.update(&frame(1550.0, 0.016), &mut store);
        let back = store.opacity(layer).unwrap();
        assert_eq!(forward.to_bits(), back.to_bits());
        assert_eq!(forward, 0.25);
    }

    #[test]
    fn removed_trigger_freezes_values() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let trigger = FakeTrigger::at(2000.0, 2600.0);
        let mut sched = ScrollTimelineScheduler::new(800.0);
        let h = sched
            .create_timeline(TimelineConfig::scrub(fade(layer)), Box::new(trigger.clone()))
            .unwrap();

        // p = 0.4 at 1200 + 0.4 * 1400.
        sched.update(&frame(1760.0, 0.016), &mut store);
        assert_eq!(sched.progress(h), Ok(0.4));
        let frozen = store.opacity(layer).unwrap();

        trigger.connected.set(false);
        sched.update(&frame(2400.0, 0.016), &mut store);
        assert!(!sched.contains(h));
        assert_eq!(store.opacity(layer), Some(frozen));
    }

    #[test]
    fn degenerate_range_is_skipped_until_layout_fixes_it() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let trigger = FakeTrigger::at(0.0, 300.0);
        let mut sched = ScrollTimelineScheduler::new(800.0);
        let mut config = TimelineConfig::scrub(fade(layer));
        config.start = TriggerEdge::TOP_TOP;
        config.end = TriggerEdge::BOTTOM_BOTTOM;
        let h = sched.create_timeline(config, Box::new(trigger.clone())).unwrap();

        assert!(matches!(sched.range(h), Err(TimelineError::Degenerate { .. })));
        sched.update(&frame(100.0, 0.016), &mut store);
        assert_eq!(store.opacity(layer), Some(1.0), "skipped: untouched");

        trigger.bounds.set(Some(Rect::new(0.0, 0.0, 1000.0, 1800.0)));
        sched.invalidate_layout();
        sched.update(&frame(500.0, 0.016), &mut store);
        assert_eq!(store.opacity(layer), Some(0.5));
    }

    #[test]
    fn missing_trigger_is_rejected() {
        let trigger = FakeTrigger::at(0.0, 100.0);
        trigger.connected.set(false);
        let mut sched = ScrollTimelineScheduler::new(800.0);
        let err = sched
            .create_timeline(TimelineConfig::scrub(vec![]), Box::new(trigger))
            .unwrap_err();
        assert_eq!(err, TimelineError::MissingTrigger);
    }

    #[test]
    fn play_once_runs_then_never_replays() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let mut sched = ScrollTimelineScheduler::new(800.0);
        let mode = TimelineMode::PlayOnce {
            threshold: 0.2,
            duration: 0.5,
            ease: Ease::Linear,
        };
        let h = sched
            .create_timeline(
                TimelineConfig::play_once(fade(layer), mode),
                Box::new(FakeTrigger::at(2000.0, 2600.0)),
            )
            .unwrap();

        sched.update(&frame(1200.0, 0.1), &mut store);
        assert_eq!(store.opacity(layer), Some(0.0), "primed at rest");
        assert_eq!(sched.play_state(h), Ok(Some(PlayState::Waiting)));

        // Cross the threshold (p = 0.3).
        sched.update(&frame(1620.0, 0.1), &mut store);
        assert_eq!(sched.play_state(h), Ok(Some(PlayState::Playing(0.0))));
        sched.update(&frame(1620.0, 0.25), &mut store);
        assert_eq!(store.opacity(layer), Some(0.5));
        sched.update(&frame(1620.0, 0.25), &mut store);
        assert_eq!(store.opacity(layer), Some(1.0));
        assert_eq!(sched.play_state(h), Ok(Some(PlayState::Complete)));

        // Scroll back above the trigger: no replay, no reset.
        sched.update(&frame(0.0, 0.1), &mut store);
        sched.update(&frame(1620.0, 0.1), &mut store);
        assert_eq!(store.opacity(layer), Some(1.0));
        assert_eq!(sched.play_state(h), Ok(Some(PlayState::Complete)));
    }

    #[test]
    fn pinned_section_cancels_scroll_over_distance() {
        let mut store = LayerStore::new();
        let section = store.create_layer();
        let step = store.create_layer();
        let mut sched = ScrollTimelineScheduler::new(800.0);
        let h = sched
            .create_timeline(
                TimelineConfig::pinned(fade(step), section, 1600.0),
                Box::new(FakeTrigger::at(3000.0, 3800.0)),
            )
            .unwrap();
        assert_eq!(sched.range(h), Ok(ScrollRange { start: 3000.0, end: 4600.0 }));

        sched.update(&frame(2900.0, 0.016), &mut store);
        assert_eq!(store.property(section, LayerProperty::TranslateY), Some(0.0));
        sched.update(&frame(3400.0, 0.016), &mut store);
        assert_eq!(store.property(section, LayerProperty::TranslateY), Some(400.0));
        assert_eq!(sched.progress(h), Ok(0.25));
        sched.update(&frame(9000.0, 0.016), &mut store);
        assert_eq!(store.property(section, LayerProperty::TranslateY), Some(1600.0));
    }

    #[test]
    fn apply_static_uses_configured_progress() {
        let mut store = LayerStore::new();
        let layer = store.create_layer();
        let mut sched = ScrollTimelineScheduler::new(800.0);
        let h = sched
            .create_timeline(
                TimelineConfig::play_once(fade(layer), TimelineMode::reveal(0.6)),
                Box::new(FakeTrigger::at(2000.0, 2600.0)),
            )
            .unwrap();
        sched.apply_static(h, &mut store).unwrap();
        assert_eq!(store.opacity(layer), Some(1.0));
        assert_eq!(sched.play_state(h), Ok(Some(PlayState::Complete)));
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let mut sched = ScrollTimelineScheduler::new(800.0);
        let h = sched
            .create_timeline(
                TimelineConfig::scrub(vec![]),
                Box::new(FakeTrigger::at(0.0, 2000.0)),
            )
            .unwrap();
        sched.destroy(h).unwrap();
        assert_eq!(sched.destroy(h), Err(TimelineError::UnknownTimeline(h.id())));
    }
}
