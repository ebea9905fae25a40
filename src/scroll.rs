//! Scroll state: extent, viewport, clamped offset and the layout anchor.
//!
//! The anchor pins layout to the first visible item instead of to the
//! pixel offset, so estimate corrections above the viewport do not move
//! what the user is looking at. Observers fire synchronously at the
//! mutation point; the list is cloned before invocation so an observer
//! may add or remove observers without invalidating the iteration.

use std::rc::Rc;

use crate::geometry::Size;

/// Offset changes smaller than this are ignored.
pub const SCROLL_EPSILON: f32 = 0.001;

/// First visible item and how much of it is clipped above the viewport.
///
/// `clip_ratio` is in `[0, 1)`: 0 means the item's top edge is exactly at
/// the viewport top, 0.5 means its upper half is scrolled out of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub index: usize,
    pub clip_ratio: f32,
}

impl Anchor {
    pub const TOP: Anchor = Anchor {
        index: 0,
        clip_ratio: 0.0,
    };

    pub fn new(index: usize, clip_ratio: f32) -> Self {
        Self { index, clip_ratio }
    }
}

pub struct ScrollState {
    extent: Size,
    viewport: Size,
    offset: f32,
    anchor: Option<Anchor>,
    observers: Vec<(u64, Rc<dyn Fn()>)>,
    next_observer_id: u64,
}

impl ScrollState {
    pub fn new() -> Self {
        Self {
            extent: Size::ZERO,
            viewport: Size::ZERO,
            offset: 0.0,
            anchor: Some(Anchor::TOP),
            observers: Vec::new(),
            next_observer_id: 0,
        }
    }

    pub fn extent(&self) -> Size {
        self.extent
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn set_anchor(&mut self, anchor: Option<Anchor>) {
        self.anchor = anchor;
    }

    fn clamp(&self, offset: f32) -> f32 {
        if offset < 0.0 || self.viewport.height >= self.extent.height {
            0.0
        } else {
            offset.min(self.extent.height - self.viewport.height)
        }
    }

    /// Clamps and applies a new offset. Returns whether the stored offset
    /// actually moved (changes under [`SCROLL_EPSILON`] are dropped).
    pub fn set_offset(&mut self, offset: f32) -> bool {
        let clamped = self.clamp(offset);
        if (clamped - self.offset).abs() <= SCROLL_EPSILON {
            return false;
        }
        self.offset = clamped;
        self.notify();
        true
    }

    /// Publishes the extent and viewport computed by a measure pass.
    /// Returns whether either changed; the offset is re-clamped against
    /// the new geometry.
    pub fn update_scroll_info(&mut self, viewport: Size, total_height: f32) -> bool {
        let extent = Size::new(viewport.width, total_height);
        if extent == self.extent && viewport == self.viewport {
            return false;
        }
        self.extent = extent;
        self.viewport = viewport;
        self.offset = self.clamp(self.offset);
        self.notify();
        true
    }

    pub fn add_observer(&mut self, observer: Rc<dyn Fn()>) -> u64 {
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn remove_observer(&mut self, id: u64) {
        self.observers.retain(|(observer_id, _)| *observer_id != id);
    }

    fn notify(&self) {
        let observers: Vec<_> = self
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer();
        }
    }
}

impl Default for ScrollState {
    fn default() -> Self {
        Self::new()
    }
}
