// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trigger elements and scroll ranges.
//!
//! A timeline's progress is driven by where its trigger element sits
//! relative to the viewport. Each boundary is a [`TriggerEdge`]: "this point
//! of the element meets that point of the viewport". Resolving both edges
//! against measured bounds yields a [`ScrollRange`] in document scroll
//! offsets, and progress is then a clamped linear map of the smoothed offset.

use kurbo::Rect;

use crate::error::TimelineError;

/// Host access to a trigger element.
pub trait TriggerSource {
    /// Element bounds in document coordinates (`y0` is the distance from the
    /// top of the document), or `None` if the element cannot be measured.
    ///
    /// Only called on creation and on layout invalidation.
    fn measure(&self) -> Option<Rect>;

    /// Whether the element is still attached to the document.
    ///
    /// Called every frame, so it must be cheap.
    fn is_connected(&self) -> bool;
}

/// A point along an element or the viewport, top to bottom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Anchor {
    /// The top edge.
    Top,
    /// The vertical centre.
    Center,
    /// The bottom edge.
    Bottom,
    /// A fraction of the height from the top.
    Fraction(f64),
}

impl Anchor {
    /// The anchor as a fraction of the height.
    #[must_use]
    pub fn fraction(self) -> f64 {
        match self {
            Self::Top => 0.0,
            Self::Center => 0.5,
            Self::Bottom => 1.0,
            Self::Fraction(f) => f,
        }
    }
}

/// The moment an element anchor meets a viewport anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerEdge {
    /// Point on the trigger element.
    pub element: Anchor,
    /// Point on the viewport.
    pub viewport: Anchor,
    /// Extra scroll distance added to the resolved offset, in pixels.
    pub offset: f64,
}

impl TriggerEdge {
    /// Element top meets viewport bottom (the element starts to enter).
    pub const TOP_BOTTOM: Self = Self::new(Anchor::Top, Anchor::Bottom);
    /// Element top meets viewport top.
    pub const TOP_TOP: Self = Self::new(Anchor::Top, Anchor::Top);
    /// Element bottom meets viewport bottom.
    pub const BOTTOM_BOTTOM: Self = Self::new(Anchor::Bottom, Anchor::Bottom);
    /// Element bottom meets viewport top (the element has left).
    pub const BOTTOM_TOP: Self = Self::new(Anchor::Bottom, Anchor::Top);

    /// Creates an edge with no extra offset.
    #[must_use]
    pub const fn new(element: Anchor, viewport: Anchor) -> Self {
        Self {
            element,
            viewport,
            offset: 0.0,
        }
    }

    /// Returns the same edge shifted by `offset` pixels.
    #[must_use]
    pub const fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// The document scroll offset at which this edge is reached.
    #[must_use]
    pub fn scroll_offset(&self, bounds: Rect, viewport_height: f64) -> f64 {
        bounds.y0 + bounds.height() * self.element.fraction()
            - viewport_height * self.viewport.fraction()
            + self.offset
    }
}

/// The scroll offsets over which a timeline's progress runs from 0 to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollRange {
    /// Offset where progress is 0.
    pub start: f64,
    /// Offset where progress is 1.
    pub end: f64,
}

impl ScrollRange {
    /// Creates a range, rejecting empty or inverted ones.
    pub fn new(start: f64, end: f64) -> Result<Self, TimelineError> {
        if start.is_nan() || end.is_nan() || end <= start {
            return Err(TimelineError::Degenerate { start, end });
        }
        Ok(Self { start, end })
    }

    /// Resolves two edges against measured bounds.
    pub fn resolve(
        bounds: Rect,
        viewport_height: f64,
        start: &TriggerEdge,
        end: &TriggerEdge,
    ) -> Result<Self, TimelineError> {
        Self::new(
            start.scroll_offset(bounds, viewport_height),
            end.scroll_offset(bounds, viewport_height),
        )
    }

    /// Length of the range in pixels.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Progress in `[0, 1]` at a scroll offset.
    #[must_use]
    pub fn progress(&self, offset: f64) -> f64 {
        ((offset - self.start) / self.length()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_resolve_against_viewport() {
        let bounds = Rect::new(0.0, 2000.0, 1200.0, 2600.0);
        assert_eq!(TriggerEdge::TOP_BOTTOM.scroll_offset(bounds, 800.0), 1200.0);
        assert_eq!(TriggerEdge::TOP_TOP.scroll_offset(bounds, 800.0), 2000.0);
        assert_eq!(TriggerEdge::BOTTOM_TOP.scroll_offset(bounds, 800.0), 2600.0);
        assert_eq!(
            TriggerEdge::new(Anchor::Center, Anchor::Center)
                .with_offset(-50.0)
                .scroll_offset(bounds, 800.0),
            1850.0
        );
    }

    #[test]
    fn progress_is_clamped_linear_map() {
        let range = ScrollRange::new(100.0, 300.0).unwrap();
        assert_eq!(range.progress(0.0), 0.0);
        assert_eq!(range.progress(200.0), 0.5);
        assert_eq!(range.progress(1000.0), 1.0);
    }

    #[test]
    fn short_content_is_degenerate() {
        // Content shorter than the viewport: bottom/bottom precedes top/top.
        let bounds = Rect::new(0.0, 0.0, 1200.0, 300.0);
        let err = ScrollRange::resolve(
            bounds,
            800.0,
            &TriggerEdge::TOP_TOP,
            &TriggerEdge::BOTTOM_BOTTOM,
        )
        .unwrap_err();
        assert!(matches!(err, TimelineError::Degenerate { .. }));
        assert!(ScrollRange::new(f64::NAN, 1.0).is_err());
    }
}
