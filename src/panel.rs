//! The panel: layout entry points and the scrolling surface.
//!
//! `SmoothPanel` owns the scroll state, the child table and the template
//! table, and exposes the two-phase layout protocol (measure, then
//! arrange) plus the host-facing scroll API. It never schedules work
//! itself: mutations that require a new layout raise an invalidation
//! flag the host polls each frame via [`take_layout_invalidation`].
//!
//! [`take_layout_invalidation`]: SmoothPanel::take_layout_invalidation

use std::collections::VecDeque;
use std::rc::Rc;

use log::warn;

use crate::children::PanelChildren;
use crate::element::ElementId;
use crate::geometry::{Rect, Size};
use crate::item::ItemSource;
use crate::measure::PanelMeasurer;
use crate::scroll::{Anchor, ScrollState};
use crate::template::{TemplateRegistry, ViewTemplate};

/// Substitute for a non-finite measure constraint.
const FALLBACK_CONSTRAINT: f32 = 100.0;

/// Offset delta for one line-scroll step (arrow keys).
pub const LINE_SCROLL: f32 = 32.0;

/// Offset delta for one mouse-wheel notch.
pub const WHEEL_SCROLL: f32 = 64.0;

type AfterLayout = Box<dyn FnOnce(ElementId)>;

pub struct SmoothPanel {
    scroll: ScrollState,
    children: PanelChildren,
    registry: TemplateRegistry,
    source: Option<Rc<dyn ItemSource>>,
    /// Callbacks waiting for an item to come into existence; drained after
    /// each completed layout cycle.
    after_layout: VecDeque<(usize, AfterLayout)>,
    layout_invalidated: bool,
    /// `(item index, arranged top)` for the children placed by the last
    /// arrange pass, in item order.
    arranged: Vec<(usize, f32)>,
}

impl SmoothPanel {
    pub fn new(templates: Vec<ViewTemplate>) -> Self {
        Self {
            scroll: ScrollState::new(),
            children: PanelChildren::new(),
            registry: TemplateRegistry::new(templates),
            source: None,
            after_layout: VecDeque::new(),
            layout_invalidated: true,
            arranged: Vec::new(),
        }
    }

    /// Replaces the item sequence. The slot table is rebuilt; the anchor
    /// is kept and recovered on the next pass if it is now out of range.
    pub fn set_item_source(&mut self, source: Rc<dyn ItemSource>) {
        self.children.reset(source.item_count());
        self.source = Some(source);
        self.layout_invalidated = true;
    }

    /// Replaces the template table. Every view, realized or pooled, was
    /// built against the old table; the slot table is rebuilt and the
    /// pool dropped.
    pub fn set_templates(&mut self, templates: Vec<ViewTemplate>) {
        self.registry = TemplateRegistry::new(templates);
        let count = self.source.as_ref().map_or(0, |source| source.item_count());
        self.children.reset(count);
        self.children.invalidate_pool();
        self.layout_invalidated = true;
    }

    /// Measures one layout pass and returns the size the panel takes.
    pub fn measure(&mut self, available: Size) -> Size {
        let available = sanitize_constraint(available);

        let Some(source) = self.source.clone() else {
            self.scroll.update_scroll_info(available, 0.0);
            return available;
        };

        self.children.set_available_width(available.width);
        let count = source.item_count();
        self.children.sync_len(count);

        if let Some(anchor) = self.scroll.anchor() {
            if anchor.index >= count && count > 0 {
                warn!(
                    "anchor index {} out of range (count {}), snapping to top",
                    anchor.index, count
                );
                self.scroll.set_anchor(Some(Anchor::TOP));
            }
        }

        let mut measurer = PanelMeasurer {
            scroll: &mut self.scroll,
            children: &mut self.children,
            source: source.as_ref(),
            registry: &self.registry,
            available,
        };
        measurer.measure();

        self.children.end_pass();
        available
    }

    /// Places the realized children top to bottom from the anchor, the
    /// first one shifted up by its clipped portion.
    pub fn arrange(&mut self, final_size: Size) -> Size {
        self.arranged.clear();

        let anchor = self.scroll.anchor().unwrap_or(Anchor::TOP);
        let len = self.children.len();
        let mut top = 0.0;
        let mut placed_first = false;

        for index in anchor.index..len {
            let Some(height) = self.children.desired_height(index) else {
                continue;
            };
            if !placed_first {
                top = -height * anchor.clip_ratio;
                placed_first = true;
            }
            self.children
                .arrange_child(index, Rect::new(0.0, top, final_size.width, height));
            self.arranged.push((index, top));
            top += height;
            if top >= final_size.height {
                break;
            }
        }

        self.drain_after_layout();
        final_size
    }

    /// Sets the scroll offset directly. With `invalidate_layout` the
    /// anchor is discarded and re-derived from the new offset on the next
    /// pass; without it, the host is only syncing a value layout already
    /// produced.
    pub fn set_vertical_offset(&mut self, offset: f32, invalidate_layout: bool) {
        let changed = self.scroll.set_offset(offset);
        if changed && invalidate_layout {
            self.scroll.set_anchor(None);
            self.layout_invalidated = true;
        }
    }

    /// Scrolls by whole lines (negative is up).
    pub fn scroll_lines(&mut self, lines: f32) {
        self.set_vertical_offset(self.scroll.offset() + lines * LINE_SCROLL, true);
    }

    /// Scrolls by mouse-wheel notches (negative is up).
    pub fn scroll_wheel(&mut self, notches: f32) {
        self.set_vertical_offset(self.scroll.offset() + notches * WHEEL_SCROLL, true);
    }

    /// Brings the item at `index` fully into view, then runs `on_done`
    /// with its element. If the item is already laid out, the offset is
    /// nudged by the smallest delta and the callback runs synchronously;
    /// otherwise the item becomes the anchor and the callback waits for
    /// the next completed layout cycle.
    pub fn scroll_into_view<F>(&mut self, index: usize, on_done: F)
    where
        F: FnOnce(ElementId) + 'static,
    {
        let count = self.source.as_ref().map_or(0, |source| source.item_count());
        if index >= count {
            return;
        }

        let arranged_top = self
            .arranged
            .iter()
            .find(|(arranged, _)| *arranged == index)
            .map(|&(_, top)| top);

        if let (Some(top), Some(id)) = (arranged_top, self.children.element(index)) {
            let height = self.children.desired_height(index).unwrap_or(0.0);
            if top < 0.0 {
                self.set_vertical_offset(self.scroll.offset() + top, true);
            } else {
                let bottom_delta = top + height - self.scroll.viewport().height;
                if bottom_delta > 0.0 {
                    self.set_vertical_offset(self.scroll.offset() + bottom_delta, true);
                }
            }
            on_done(id);
            return;
        }

        self.scroll.set_anchor(Some(Anchor::new(index, 0.0)));
        self.layout_invalidated = true;
        self.after_layout.push_back((index, Box::new(on_done)));
    }

    fn drain_after_layout(&mut self) {
        while let Some((index, on_done)) = self.after_layout.pop_front() {
            // The source may have shrunk while the callback was queued.
            let id = (index < self.children.len()).then(|| self.children.element(index)).flatten();
            match id {
                Some(id) => on_done(id),
                None => warn!("item {} still unrealized after layout", index),
            }
        }
    }

    /// Whether a mutation since the last call requires a new layout pass.
    pub fn take_layout_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.layout_invalidated)
    }

    pub fn offset(&self) -> f32 {
        self.scroll.offset()
    }

    pub fn extent(&self) -> Size {
        self.scroll.extent()
    }

    pub fn viewport(&self) -> Size {
        self.scroll.viewport()
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.scroll.anchor()
    }

    pub fn add_scroll_observer(&mut self, observer: Rc<dyn Fn()>) -> u64 {
        self.scroll.add_observer(observer)
    }

    pub fn remove_scroll_observer(&mut self, id: u64) {
        self.scroll.remove_observer(id)
    }

    #[cfg(test)]
    pub(crate) fn arranged_top(&self, index: usize) -> Option<f32> {
        self.arranged
            .iter()
            .find(|(arranged, _)| *arranged == index)
            .map(|&(_, top)| top)
    }

    #[cfg(test)]
    pub(crate) fn children(&self) -> &PanelChildren {
        &self.children
    }
}

fn sanitize_constraint(available: Size) -> Size {
    let width = if available.width.is_finite() && available.width >= 0.0 {
        available.width
    } else {
        warn!(
            "unusable width constraint {}, substituting {}",
            available.width, FALLBACK_CONSTRAINT
        );
        FALLBACK_CONSTRAINT
    };
    let height = if available.height.is_finite() && available.height >= 0.0 {
        available.height
    } else {
        warn!(
            "unusable height constraint {}, substituting {}",
            available.height, FALLBACK_CONSTRAINT
        );
        FALLBACK_CONSTRAINT
    };
    Size::new(width, height)
}
