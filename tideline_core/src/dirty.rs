// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The layer store uses multi-channel dirty tracking (via
//! [`understory_dirty`]) so that a frame in which a timeline re-applies the
//! same values produces no DOM writes at all. Each channel is one category
//! of style write the presenter performs.
//!
//! Layers are bound to elements that already sit in the document, so there
//! is no inheritance between layers and every channel is local-only: only
//! the explicitly marked layer appears in the drain output.
//!
//! Callers never query dirty state directly. Each
//! [`LayerStore::evaluate`](crate::layer::LayerStore::evaluate) call drains
//! all channels into [`FrameChanges`](crate::layer::FrameChanges), which
//! backends [consume](crate::backend::Presenter::apply).

use understory_dirty::Channel;

/// Translation or scale changed; the presenter rewrites `transform`.
pub const TRANSFORM: Channel = Channel::new(0);

/// Opacity changed; the presenter rewrites `opacity`.
pub const OPACITY: Channel = Channel::new(1);

/// SVG stroke dash offset changed; the presenter rewrites
/// `stroke-dashoffset`.
pub const STROKE: Channel = Channel::new(2);
