//! Anchor-based measurement of the visible window.
//!
//! One measure pass resolves three things from the scroll state and the
//! item heights: the total content height, the anchor (first visible
//! item and its clip ratio), and the realized window of children. Item
//! heights are estimates until an element is realized, so the resolution
//! runs as a bounded fixed point: any step that invalidates an earlier
//! result re-runs the pipeline at most once more, and a third attempt is
//! flagged as a defect and accepted as-is.

use log::warn;

use crate::children::PanelChildren;
use crate::geometry::Size;
use crate::item::ItemSource;
use crate::scroll::{Anchor, ScrollState};
use crate::template::TemplateRegistry;

/// Hard cap on children realized in one forward generation pass.
const MAX_GENERATED_ITEMS: usize = 10_000;

/// Extent/viewport differences below this are treated as equal.
const EXTENT_SLACK: f32 = 0.5;

/// Result of one forward generation pass.
struct Generated {
    /// Last item realized (or accounted for, when its template is missing).
    last_index: usize,
    /// Fraction of the last item below the viewport bottom.
    last_clip: f32,
    /// Whether generation reached the viewport bottom.
    crossed: bool,
    /// Bottom edge of the generated run, viewport-relative.
    bottom: f32,
}

pub(crate) struct PanelMeasurer<'a> {
    pub scroll: &'a mut ScrollState,
    pub children: &'a mut PanelChildren,
    pub source: &'a dyn ItemSource,
    pub registry: &'a TemplateRegistry,
    pub available: Size,
}

impl<'a> PanelMeasurer<'a> {
    pub fn measure(&mut self) {
        let count = self.source.item_count();
        if count == 0 {
            self.scroll.update_scroll_info(self.available, 0.0);
            self.scroll.set_anchor(Some(Anchor::TOP));
            return;
        }

        self.children
            .create_topmost(self.available, self.source, self.registry);

        let mut keep_first = self.scroll.anchor().is_some();
        let mut last_chance = false;

        let window = loop {
            let last_visible = self.resolve_extent(keep_first);
            if !keep_first {
                if let Some((last_index, last_clip)) = last_visible {
                    let anchor = self.derive_first_item(last_index, last_clip);
                    self.scroll.set_anchor(Some(anchor));
                }
            }

            let anchor = match self.scroll.anchor() {
                Some(anchor) => anchor,
                None => {
                    debug_assert!(false, "no anchor after extent resolution");
                    warn!("no anchor after extent resolution, snapping to top");
                    self.scroll.set_anchor(Some(Anchor::TOP));
                    self.scroll.set_offset(0.0);
                    Anchor::TOP
                }
            };

            let generated = self.generate_children(anchor);
            let window = (anchor.index, generated.last_index);

            let extent = self.scroll.extent();
            let mut changed = false;

            if extent.height < self.available.height {
                // Content fits; the scroll position is meaningless.
                if anchor != Anchor::TOP || self.scroll.offset() != 0.0 {
                    self.scroll.set_anchor(Some(Anchor::TOP));
                    self.scroll.set_offset(0.0);
                    keep_first = true;
                    changed = true;
                }
            } else if !generated.crossed && extent.height - self.available.height >= EXTENT_SLACK {
                // Real heights came up short of the viewport even though the
                // estimated extent says there is enough content. Re-anchor to
                // the very bottom and resolve again.
                self.set_reverse_offset(0.0);
                self.scroll.set_anchor(None);
                keep_first = false;
                changed = true;
            } else if keep_first {
                // The anchor is authoritative; rewrite the offset it implies
                // so the scrollbar tracks the anchor, not a stale number.
                let mut reverse = 0.0;
                if generated.last_index < count {
                    reverse += generated.last_clip
                        * self.children.estimated_height(
                            generated.last_index,
                            self.source,
                            self.registry,
                        );
                    for index in generated.last_index + 1..count {
                        reverse +=
                            self.children
                                .estimated_height(index, self.source, self.registry);
                    }
                }
                changed = self.set_reverse_offset(reverse);
            }

            if !changed {
                break window;
            }
            last_chance = !last_chance;
            debug_assert!(last_chance, "panel measuring failed to converge");
            if !last_chance {
                warn!("panel measuring failed to converge, accepting current layout");
                break window;
            }
        };

        self.children.trim(window.0, window.1);
    }

    /// Computes the total content height and, when the anchor is lost,
    /// finds the last visible item by scanning backward against the
    /// reverse scroll offset.
    fn resolve_extent(&mut self, keep_first: bool) -> Option<(usize, f32)> {
        let count = self.source.item_count();

        if keep_first {
            let mut total = 0.0;
            for index in 0..count {
                total += self
                    .children
                    .estimated_height(index, self.source, self.registry);
            }
            self.scroll.update_scroll_info(self.available, total);
            return None;
        }

        let mut last_chance = false;
        loop {
            let reverse =
                self.scroll.extent().height - self.available.height - self.scroll.offset();
            let mut total = 0.0;
            let mut last_visible = None;
            for index in (0..count).rev() {
                let height = self
                    .children
                    .estimated_height(index, self.source, self.registry);
                total += height;
                if last_visible.is_none() && total > reverse {
                    let clip = if height > 0.0 {
                        (1.0 - (total - reverse) / height).max(0.0)
                    } else {
                        0.0
                    };
                    last_visible = Some((index, clip));
                }
            }
            let last_visible = last_visible.unwrap_or((count - 1, 0.0));

            // Refining the extent may re-clamp the offset, which moves the
            // reverse offset the scan above was based on.
            let old_offset = self.scroll.offset();
            self.scroll.update_scroll_info(self.available, total);
            if self.scroll.offset() == old_offset {
                return Some(last_visible);
            }
            last_chance = !last_chance;
            debug_assert!(last_chance, "total height is not determined");
            if !last_chance {
                warn!("total height is not determined, accepting current offset");
                return Some(last_visible);
            }
        }
    }

    /// Walks backward from the last visible item until the accumulated
    /// heights fill the viewport; that item becomes the anchor.
    fn derive_first_item(&mut self, last_index: usize, last_clip: f32) -> Anchor {
        let mut bottom_height = 0.0;
        for index in (0..=last_index).rev() {
            let height = self
                .children
                .estimated_height(index, self.source, self.registry);
            if index == last_index {
                bottom_height = -height * last_clip;
            }
            bottom_height += height;
            if bottom_height >= self.available.height {
                let clip = if height > 0.0 {
                    (bottom_height - self.available.height) / height
                } else {
                    0.0
                };
                return Anchor::new(index, clip);
            }
        }
        Anchor::TOP
    }

    /// Realizes children forward from the anchor with real measured
    /// heights until the run crosses the viewport bottom. This pass is
    /// authoritative for arrangement.
    fn generate_children(&mut self, anchor: Anchor) -> Generated {
        let count = self.source.item_count();
        let mut top = 0.0;
        let mut index = anchor.index;
        let mut generated = 0usize;

        while index < count {
            if generated >= MAX_GENERATED_ITEMS {
                warn!("generated {} children without filling the viewport", generated);
                break;
            }
            let height = match self.children.measured_child(index, self.source, self.registry) {
                Ok(desired) => desired.height,
                Err(err) => {
                    // The index stays unrendered; layout continues with the
                    // estimate so neighbors keep their positions.
                    warn!("{} at index {}", err, index);
                    self.children
                        .estimated_height(index, self.source, self.registry)
                }
            };
            if index == anchor.index {
                top = -height * anchor.clip_ratio;
            }
            top += height;
            generated += 1;
            if top >= self.available.height {
                let clip = if height > 0.0 {
                    (top - self.available.height) / height
                } else {
                    0.0
                };
                return Generated {
                    last_index: index,
                    last_clip: clip,
                    crossed: true,
                    bottom: top,
                };
            }
            index += 1;
        }

        Generated {
            last_index: index.min(count.saturating_sub(1)),
            last_clip: 0.0,
            crossed: false,
            bottom: top,
        }
    }

    /// Writes the offset implied by a distance from the content bottom to
    /// the viewport bottom. Returns whether the offset moved.
    fn set_reverse_offset(&mut self, reverse: f32) -> bool {
        let offset = self.scroll.extent().height - self.available.height - reverse;
        self.scroll.set_offset(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{test_registry, KindedItems};

    struct Harness {
        scroll: ScrollState,
        children: PanelChildren,
        source: KindedItems,
        registry: TemplateRegistry,
        available: Size,
    }

    impl Harness {
        fn new(heights: Vec<f32>, viewport: Size) -> Self {
            let source = KindedItems::uniform(heights);
            let mut children = PanelChildren::new();
            children.reset(source.item_count());
            children.set_available_width(viewport.width);
            Self {
                scroll: ScrollState::new(),
                children,
                source,
                registry: test_registry(),
                available: viewport,
            }
        }

        fn measure(&mut self) {
            let mut measurer = PanelMeasurer {
                scroll: &mut self.scroll,
                children: &mut self.children,
                source: &self.source,
                registry: &self.registry,
                available: self.available,
            };
            measurer.measure();
        }
    }

    #[test]
    fn test_empty_source_zeroes_extent() {
        let mut harness = Harness::new(vec![], Size::new(100.0, 200.0));
        harness.measure();

        assert_eq!(harness.scroll.extent().height, 0.0);
        assert_eq!(harness.scroll.anchor(), Some(Anchor::TOP));
    }

    #[test]
    fn test_content_fits_forces_top_anchor() {
        let mut harness = Harness::new(vec![30.0, 40.0], Size::new(100.0, 200.0));
        harness.measure();

        assert_eq!(harness.scroll.extent().height, 70.0);
        assert_eq!(harness.scroll.offset(), 0.0);
        assert_eq!(harness.scroll.anchor(), Some(Anchor::TOP));
    }

    #[test]
    fn test_lost_anchor_is_derived_from_offset() {
        let mut harness = Harness::new(vec![50.0; 100], Size::new(100.0, 200.0));
        harness.measure();
        harness.scroll.set_offset(1000.0);
        harness.scroll.set_anchor(None);

        harness.measure();

        assert_eq!(harness.scroll.anchor(), Some(Anchor::new(20, 0.0)));
    }

    #[test]
    fn test_derived_anchor_carries_partial_clip() {
        let mut harness = Harness::new(vec![50.0; 100], Size::new(100.0, 200.0));
        harness.measure();
        harness.scroll.set_offset(1025.0);
        harness.scroll.set_anchor(None);

        harness.measure();

        let anchor = harness.scroll.anchor().unwrap();
        assert_eq!(anchor.index, 20);
        assert!((anchor.clip_ratio - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_kept_anchor_rewrites_stale_offset() {
        let mut harness = Harness::new(vec![50.0; 20], Size::new(100.0, 200.0));
        harness.measure();
        // Anchor pinned at item 10 while the numeric offset says something else.
        harness.scroll.set_anchor(Some(Anchor::new(10, 0.0)));
        harness.scroll.set_offset(123.0);

        harness.measure();

        assert_eq!(harness.scroll.anchor(), Some(Anchor::new(10, 0.0)));
        assert_eq!(harness.scroll.offset(), 500.0);
    }

    #[test]
    fn test_underfilled_viewport_reanchors_to_bottom() {
        let mut harness = Harness::new(vec![50.0; 10], Size::new(100.0, 300.0));
        harness.measure();
        // An anchor too close to the end leaves the viewport under-filled.
        harness.scroll.set_anchor(Some(Anchor::new(8, 0.0)));
        harness.scroll.set_offset(400.0);

        harness.measure();

        // 500 total, 300 viewport: the window settles against the bottom.
        assert_eq!(harness.scroll.anchor(), Some(Anchor::new(4, 0.0)));
        assert_eq!(harness.scroll.offset(), 200.0);
    }

    #[test]
    fn test_measure_is_idempotent() {
        let mut harness = Harness::new(vec![50.0; 100], Size::new(100.0, 200.0));
        harness.measure();
        harness.scroll.set_offset(1025.0);
        harness.scroll.set_anchor(None);
        harness.measure();

        let anchor = harness.scroll.anchor();
        let offset = harness.scroll.offset();
        harness.measure();

        assert_eq!(harness.scroll.anchor(), anchor);
        assert_eq!(harness.scroll.offset(), offset);
    }

    #[test]
    fn test_window_is_trimmed_to_visible_range() {
        let mut harness = Harness::new(vec![50.0; 100], Size::new(100.0, 200.0));
        harness.measure();
        harness.scroll.set_offset(1000.0);
        harness.scroll.set_anchor(None);
        harness.measure();

        // Items 20..=23 are visible; everything else outside the topmost
        // window is recycled.
        for index in 20..=23 {
            assert!(harness.children.is_attached(index));
        }
        assert!(!harness.children.is_attached(19));
        assert!(!harness.children.is_attached(24));
        assert!(harness.children.element(50).is_none());
    }
}
