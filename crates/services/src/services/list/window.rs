//! Windowing math and fetch state for a virtualized list.
//!
//! The renderer only decides *which* indices need backing rows; fetching is
//! left to the paginator so either side can change independently.

use std::ops::Range;

use strum_macros::Display;
use tracing::debug;

use super::error::ListError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RenderState {
    Idle,
    Fetching,
    Error,
    Resetting,
}

/// Scroll position and height, both in rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub scroll_offset: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(scroll_offset: usize, height: usize) -> Self {
        Self {
            scroll_offset,
            height,
        }
    }

    /// Indices the viewport covers, ignoring how many rows exist.
    pub fn visible_range(&self) -> Range<usize> {
        self.scroll_offset..self.scroll_offset.saturating_add(self.height)
    }
}

#[derive(Debug, Clone)]
pub struct WindowedRenderer {
    state: RenderState,
    overscan: usize,
    last_error: Option<ListError>,
}

impl WindowedRenderer {
    pub fn new(overscan: usize) -> Self {
        Self {
            state: RenderState::Idle,
            overscan,
            last_error: None,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn last_error(&self) -> Option<&ListError> {
        self.last_error.as_ref()
    }

    /// Indices that lack backing rows for `range` plus overscan.
    ///
    /// Always starts at `loaded`: rows are only ever fetched forward.
    /// `None` when the range is covered or the source is exhausted.
    pub fn missing(
        &self,
        range: Range<usize>,
        loaded: usize,
        has_more: bool,
    ) -> Result<Option<Range<usize>>, ListError> {
        if range.start > range.end {
            return Err(ListError::InvalidArgument(format!(
                "range start {} is past end {}",
                range.start, range.end
            )));
        }
        let wanted_end = range.end.saturating_add(self.overscan);
        if !has_more || loaded >= wanted_end {
            return Ok(None);
        }
        Ok(Some(loaded..wanted_end))
    }

    /// Rows of `viewport` that can be drawn right now.
    pub fn render_range(&self, viewport: Viewport, loaded: usize) -> Range<usize> {
        let range = viewport.visible_range();
        let end = range.end.min(loaded);
        range.start.min(end)..end
    }

    fn transition(&mut self, allowed_from: &[RenderState], to: RenderState) -> bool {
        if !allowed_from.contains(&self.state) {
            debug!(from = %self.state, to = %to, "Ignoring render state transition");
            return false;
        }
        self.state = to;
        true
    }

    pub fn begin_fetch(&mut self) -> bool {
        self.transition(&[RenderState::Idle], RenderState::Fetching)
    }

    pub fn finish_fetch(&mut self) -> bool {
        self.transition(&[RenderState::Fetching], RenderState::Idle)
    }

    pub fn fail_fetch(&mut self, error: ListError) -> bool {
        let moved = self.transition(&[RenderState::Fetching], RenderState::Error);
        if moved {
            self.last_error = Some(error);
        }
        moved
    }

    /// Leave `Error` so a retry can start.
    pub fn acknowledge_error(&mut self) -> bool {
        let moved = self.transition(&[RenderState::Error], RenderState::Idle);
        if moved {
            self.last_error = None;
        }
        moved
    }

    pub fn begin_reset(&mut self) {
        // Reset wins from any state; in-flight fetches are discarded.
        self.state = RenderState::Resetting;
        self.last_error = None;
    }

    pub fn finish_reset(&mut self) -> bool {
        self.transition(&[RenderState::Resetting], RenderState::Idle)
    }
}

impl Default for WindowedRenderer {
    fn default() -> Self {
        Self::new(5)
    }
}
