// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scroll-synchronized animation orchestration.
//!
//! `tideline_core` turns one page-wide frame loop into smoothed scroll,
//! scroll-driven timelines, imperative effects and a GPU particle hero, and
//! degrades to a static page for reduced-motion and low-capability clients.
//! It never touches a browser API; hosts implement the traits in
//! [`backend`] and friends.
//!
//! # Architecture
//!
//! ```text
//!   MotionPolicy ──► decide_render_path() ──► RenderPath
//!        │                                       │
//!        ▼                                       ▼
//!   FrameSource ──► FrameClock::tick()    Gpu: deferred backend init
//!                       │
//!                       ├─ ingest + smooth ScrollState
//!                       ├─ Timeline: ScrollTimelineScheduler ──► LayerStore
//!                       ├─ Effect:   CursorFollower, ...      ──► LayerStore
//!                       ├─ Render:   ParticleMorphRenderer ──► ParticleBackend
//!                       └─ Present:  LayerStore::evaluate() ──► Presenter
//!                                    AmbientPublisher ──► StyleSink
//! ```
//!
//! **[`motion`]**: the effective reduced-motion preference, persisted
//! override first, OS signal second.
//!
//! **[`scroll`]** and **[`clock`]**: the single scroll state and the single
//! frame loop. Callbacks run in [`TickPhase`](clock::TickPhase) order and are
//! isolated from one another's failures.
//!
//! **[`layer`]** and **[`dirty`]**: struct-of-arrays store of animated
//! element properties with per-channel dirty tracking, so each frame writes
//! only what changed.
//!
//! **[`timeline`]**: scroll ranges, segments, staged reveals, play-once
//! reveals and pinned sections.
//!
//! **[`morph`]**: target generation, the shape cycle and the GPU renderer
//! driver.
//!
//! **[`capability`]**: the tagged GPU-or-gradient decision.
//!
//! **[`runtime`]**: [`MotionRuntime`](runtime::MotionRuntime), which wires
//! all of the above together.
//!
//! The crate needs `std`: frame callbacks and GPU calls are isolated with
//! `std::panic::catch_unwind`.

pub mod ambient;
pub mod backend;
pub mod capability;
pub mod clock;
pub mod dirty;
pub mod effect;
pub mod error;
pub mod idle;
pub mod layer;
pub mod morph;
pub mod motion;
pub mod runtime;
pub mod scroll;
pub mod session;
pub mod time;
pub mod timeline;
