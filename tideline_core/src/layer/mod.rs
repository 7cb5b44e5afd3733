// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visual layer store.
//!
//! A *layer* is the write model for one DOM element that a timeline or an
//! effect animates. Each layer has:
//!
//! - An identity ([`LayerId`]), a generational handle that goes stale when
//!   the layer is destroyed. Writes through a stale handle are ignored, so a
//!   timeline that outlives its section cannot touch a reused slot.
//! - **Properties** set by timelines and effects: translation, scale,
//!   opacity and SVG stroke dash offset (see [`LayerProperty`]).
//!
//! Layers live in struct-of-arrays storage. Setters mark a dirty channel
//! only when the value actually changes; [`evaluate`](LayerStore::evaluate)
//! drains the channels into a [`FrameChanges`] that a
//! [`Presenter`](crate::backend::Presenter) turns into style writes.

mod evaluate;
mod id;
mod store;

pub use evaluate::FrameChanges;
pub use id::LayerId;
pub use store::{LayerProperty, LayerStore, LayerTransform};
