// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scroll-linked timelines.
//!
//! A timeline maps the page's smoothed scroll offset onto layer properties.
//! Each one owns:
//!
//! - A trigger element ([`TriggerSource`]) and two [`TriggerEdge`]s that
//!   resolve to a [`ScrollRange`] when layout is measured.
//! - A progress value `p ∈ [0, 1]` recomputed every frame from the
//!   [`FrameContext`](crate::clock::FrameContext) scroll snapshot.
//! - Sorted, non-overlapping [`Segment`]s that turn `p` into layer values.
//! - A [`TimelineMode`]: *scrub* (values are a pure function of `p`) or
//!   *play once* (a fixed-duration eased run, started when `p` crosses a
//!   threshold, that never replays).
//! - Optionally a [`Pin`], which keeps its section visually fixed while
//!   progress advances over the pin distance.
//!
//! [`parallax_segment`] and [`StagePartition`] build segments for the two
//! common section patterns.

mod scheduler;
mod segment;
mod staged;
mod trigger;

pub use scheduler::{
    Pin, PlayState, ScrollTimelineScheduler, TimelineConfig, TimelineHandle, TimelineId,
    TimelineMode,
};
pub use segment::{
    Ease, LayerTarget, ParallaxLayer, Segment, apply, lerp, parallax_segment, resolve, smoothstep,
};
pub use staged::{Band, BandKind, Connector, StagePartition, connector_offset};
pub use trigger::{Anchor, ScrollRange, TriggerEdge, TriggerSource};
