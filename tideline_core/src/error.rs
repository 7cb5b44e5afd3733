// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Every error here has a defined, visually inert recovery path; callers log
//! and fall back rather than propagate to the page.

use crate::timeline::TimelineId;

/// A scroll timeline could not be created or evaluated.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TimelineError {
    /// The trigger element is not (or no longer) in the document.
    #[error("trigger element is not attached to the document")]
    MissingTrigger,
    /// The trigger's scroll range is empty or inverted.
    #[error("degenerate trigger range: start {start} >= end {end}")]
    Degenerate {
        /// Scroll offset where progress starts.
        start: f64,
        /// Scroll offset where progress ends.
        end: f64,
    },
    /// A segment lies outside `[0, 1]` or has `range_end <= range_start`.
    #[error("segment {index} has invalid range [{start}, {end}]")]
    InvalidSegment {
        /// Index of the offending segment after sorting.
        index: usize,
        /// Segment start.
        start: f64,
        /// Segment end.
        end: f64,
    },
    /// Two segments overlap.
    #[error("segments {first} and {second} overlap")]
    OverlappingSegments {
        /// Index of the earlier segment.
        first: usize,
        /// Index of the later segment.
        second: usize,
    },
    /// A play-once or staged-reveal parameter is out of range.
    #[error("invalid timeline configuration: {0}")]
    InvalidConfig(&'static str),
    /// The handle does not refer to a live timeline.
    #[error("unknown timeline {0:?}")]
    UnknownTimeline(TimelineId),
}

/// The GPU path failed; the renderer falls back to the static gradient.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GpuError {
    /// No adapter, device or surface could be created.
    #[error("GPU context unavailable: {0}")]
    ContextUnavailable(String),
    /// The context was lost after initialisation.
    #[error("GPU context lost")]
    ContextLost,
    /// Uploaded buffers do not match the mounted particle count.
    #[error("buffer size mismatch: expected {expected} floats, got {actual}")]
    BufferMismatch {
        /// Expected float count.
        expected: usize,
        /// Supplied float count.
        actual: usize,
    },
    /// A frame could not be acquired or submitted.
    #[error("frame submission failed: {0}")]
    Submit(String),
}

/// Reading or writing the persisted motion preference failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Storage is not available (private mode, disabled, sandboxed).
    #[error("preference storage unavailable")]
    Unavailable,
    /// The stored value is not a recognised preference.
    #[error("unrecognised stored preference {0:?}")]
    Corrupt(String),
    /// The backend rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Querying the OS-level reduced-motion signal failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("reduced-motion signal unavailable: {0}")]
pub struct SignalError(pub String);

/// A frame callback failed.
///
/// The clock logs the error and keeps running the remaining callbacks.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TickError {
    /// A timeline failed while being evaluated.
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    /// The GPU path failed while rendering.
    #[error(transparent)]
    Gpu(#[from] GpuError),
    /// The callback panicked; the payload message if one was available.
    #[error("frame callback panicked: {0}")]
    Panicked(String),
    /// Any other callback-specific failure.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let e = TimelineError::Degenerate {
            start: 10.0,
            end: 10.0,
        };
        assert_eq!(e.to_string(), "degenerate trigger range: start 10 >= end 10");

        let e: TickError = GpuError::ContextLost.into();
        assert_eq!(e.to_string(), "GPU context lost");
    }
}
