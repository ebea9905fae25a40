//! Sparse slot table mapping item indices to realized elements.
//!
//! One slot per item; almost all slots are empty at any time. Attached
//! slots (those participating in the current layout) are tracked in a
//! sorted index list so arrangement walks children in item order. The
//! leading "topmost" window is kept realized across passes so that
//! backward height scans near the top of the list run against real
//! measured heights instead of estimates.

use log::warn;
use smallvec::SmallVec;

use crate::element::{ElementArena, ElementId};
use crate::error::PanelError;
use crate::geometry::{Rect, Size};
use crate::item::ItemSource;
use crate::pool::ViewPool;
use crate::template::{TemplateRegistry, DEFAULT_ITEM_HEIGHT};

/// Pooled elements idle for this many layout passes are reclaimed.
pub(crate) const POOL_SWEEP_AGE: u64 = 64;

pub struct PanelChildren {
    arena: ElementArena,
    pool: ViewPool,
    slots: Vec<Option<ElementId>>,
    /// Item indices of attached slots, ascending.
    order: SmallVec<[usize; 32]>,
    topmost_count: usize,
    available_width: f32,
    pass: u64,
}

impl PanelChildren {
    pub fn new() -> Self {
        Self {
            arena: ElementArena::new(),
            pool: ViewPool::new(),
            slots: Vec::new(),
            order: SmallVec::new(),
            topmost_count: 0,
            available_width: 0.0,
            pass: 0,
        }
    }

    pub fn set_available_width(&mut self, width: f32) {
        self.available_width = width;
    }

    pub fn topmost_count(&self) -> usize {
        self.topmost_count
    }

    /// Returns every realized element to its pool bucket and rebuilds the
    /// slot table for a new item sequence.
    pub fn reset(&mut self, count: usize) {
        for index in 0..self.slots.len() {
            if let Some(id) = self.slots[index].take() {
                self.pool.release(id, &mut self.arena, self.pass);
            }
        }
        self.order.clear();
        self.topmost_count = 0;
        self.slots.clear();
        self.slots.resize(count, None);
    }

    /// Re-syncs the slot table to the source's current length. Slots past
    /// the new end are detached and their elements returned to the pool.
    pub fn sync_len(&mut self, count: usize) {
        if count < self.slots.len() {
            for index in count..self.slots.len() {
                if let Some(id) = self.slots[index].take() {
                    self.pool.release(id, &mut self.arena, self.pass);
                }
            }
            self.order.retain(|&mut index| index < count);
            self.topmost_count = self.topmost_count.min(count);
        }
        self.slots.resize(count, None);
    }

    /// The realized element at `index`, if any.
    pub fn element(&self, index: usize) -> Option<ElementId> {
        match self.slots.get(index) {
            Some(slot) => *slot,
            None => {
                debug_assert!(false, "child index {index} out of range");
                warn!(
                    "child index {} out of range (len {})",
                    index,
                    self.slots.len()
                );
                None
            }
        }
    }

    /// Number of slots, equal to the item count of the last synced source.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_attached(&self, index: usize) -> bool {
        self.order.binary_search(&index).is_ok()
    }

    fn attach(&mut self, index: usize) {
        // Forward generation appends in order; anything else falls back to
        // a sorted insert.
        if self.order.last().map_or(true, |&last| last < index) {
            self.order.push(index);
        } else if let Err(slot) = self.order.binary_search(&index) {
            self.order.insert(slot, index);
        }
    }

    fn detach(&mut self, index: usize) {
        if let Ok(slot) = self.order.binary_search(&index) {
            self.order.remove(slot);
        }
    }

    /// Realizes, binds and measures the item at `index`, returning its
    /// desired size. Already-realized slots are re-measured at the
    /// current width without rebinding.
    pub fn measured_child(
        &mut self,
        index: usize,
        source: &dyn ItemSource,
        registry: &TemplateRegistry,
    ) -> Result<Size, PanelError> {
        let id = match self.slots[index] {
            Some(id) if self.arena.contains(id) => id,
            _ => {
                let kind = source.kind(index);
                let id = self.pool.acquire(kind, registry, &mut self.arena)?;
                self.arena.bind(id, source.item(index));
                self.slots[index] = Some(id);
                id
            }
        };
        self.attach(index);
        let desired = self
            .arena
            .measure(id, self.available_width)
            .unwrap_or(Size::ZERO);
        Ok(desired)
    }

    /// The height used for layout math at `index` without forcing
    /// realization. Topmost slots report their real measured height; all
    /// other indices fall back to the kind's estimator, then to
    /// [`DEFAULT_ITEM_HEIGHT`].
    pub fn estimated_height(
        &self,
        index: usize,
        source: &dyn ItemSource,
        registry: &TemplateRegistry,
    ) -> f32 {
        if index < self.topmost_count {
            if let Some(desired) = self.slots[index].and_then(|id| self.arena.desired(id)) {
                return desired.height;
            }
        }
        registry
            .estimated_height(source.kind(index), source.item(index), self.available_width)
            .unwrap_or(DEFAULT_ITEM_HEIGHT)
    }

    /// Realizes the leading run of items whose accumulated height covers
    /// one viewport. These stay realized until the next reset.
    pub fn create_topmost(
        &mut self,
        available: Size,
        source: &dyn ItemSource,
        registry: &TemplateRegistry,
    ) {
        let count = source.item_count();
        let mut total = 0.0f32;
        let mut index = 0;
        while index < count && total < available.height {
            match self.measured_child(index, source, registry) {
                Ok(desired) => total += desired.height,
                Err(err) => {
                    warn!("topmost realization stopped at {}: {}", index, err);
                    break;
                }
            }
            index += 1;
        }
        self.topmost_count = index;
    }

    /// Detaches every slot outside `[first, last]`. Non-topmost slots are
    /// released to the pool; topmost slots stay realized but leave the
    /// attached set.
    pub fn trim(&mut self, first: usize, last: usize) {
        let order = std::mem::take(&mut self.order);
        for &index in &order {
            if index >= first && index <= last {
                continue;
            }
            if index >= self.topmost_count {
                if let Some(id) = self.slots[index].take() {
                    self.pool.release(id, &mut self.arena, self.pass);
                }
            }
        }
        self.order = order;
        self.order
            .retain(|&mut index| index >= first && index <= last);
    }

    pub fn desired_height(&self, index: usize) -> Option<f32> {
        self.element(index)
            .and_then(|id| self.arena.desired(id))
            .map(|desired| desired.height)
    }

    pub fn arrange_child(&mut self, index: usize, rect: Rect) {
        if let Some(id) = self.element(index) {
            self.arena.arrange(id, rect);
        }
    }

    /// Ends a layout pass: advances the pass counter and reclaims
    /// long-idle pooled elements.
    pub fn end_pass(&mut self) {
        self.pass += 1;
        self.arena.sweep(self.pass, POOL_SWEEP_AGE);
    }

    /// Drops all pooled elements after a template table change.
    pub fn invalidate_pool(&mut self) {
        self.pool.invalidate(&mut self.arena);
    }

    #[cfg(test)]
    pub(crate) fn attached_indices(&self) -> Vec<usize> {
        self.order.to_vec()
    }

    #[cfg(test)]
    pub(crate) fn realized_count(&self) -> usize {
        self.arena.len()
    }
}

impl Default for PanelChildren {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{test_registry, KindedItems, TEST_KIND};

    fn children_for(source: &KindedItems, width: f32) -> PanelChildren {
        let mut children = PanelChildren::new();
        children.reset(source.item_count());
        children.set_available_width(width);
        children
    }

    #[test]
    fn test_attach_keeps_indices_ordered() {
        let source = KindedItems::uniform(vec![10.0; 6]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);

        children.measured_child(3, &source, &registry).unwrap();
        children.measured_child(1, &source, &registry).unwrap();
        children.measured_child(4, &source, &registry).unwrap();

        assert_eq!(children.attached_indices(), vec![1, 3, 4]);
    }

    #[test]
    fn test_measured_child_returns_bound_height() {
        let source = KindedItems::uniform(vec![10.0, 25.0, 40.0]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);

        let desired = children.measured_child(1, &source, &registry).unwrap();
        assert_eq!(desired.height, 25.0);
        assert_eq!(children.desired_height(1), Some(25.0));
    }

    #[test]
    fn test_create_topmost_covers_one_viewport() {
        let source = KindedItems::uniform(vec![40.0; 10]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);

        children.create_topmost(Size::new(100.0, 100.0), &source, &registry);

        // 40 + 40 < 100, third child crosses.
        assert_eq!(children.topmost_count(), 3);
        assert!(children.element(0).is_some());
        assert!(children.element(2).is_some());
        assert!(children.element(3).is_none());
    }

    #[test]
    fn test_estimated_height_prefers_real_topmost_measurements() {
        let source = KindedItems::uniform(vec![40.0, 55.0, 40.0, 40.0]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);
        children.create_topmost(Size::new(100.0, 90.0), &source, &registry);

        // Index 1 is topmost and realized, so the measured 55 wins over
        // the estimator.
        assert_eq!(children.estimated_height(1, &source, &registry), 55.0);
        // Index 3 is not realized; the estimator answers.
        assert_eq!(children.estimated_height(3, &source, &registry), 40.0);
    }

    #[test]
    fn test_estimated_height_defaults_without_estimator() {
        let source = KindedItems::uniform(vec![40.0; 3]);
        let registry = crate::template::TemplateRegistry::new(vec![
            crate::template::ViewTemplate::new(TEST_KIND, || {
                Box::new(crate::tests::fixtures::FixedView::new())
            }),
        ]);
        let children = children_for(&source, 100.0);

        assert_eq!(
            children.estimated_height(0, &source, &registry),
            DEFAULT_ITEM_HEIGHT
        );
    }

    #[test]
    fn test_trim_releases_non_topmost_and_keeps_topmost_realized() {
        let source = KindedItems::uniform(vec![30.0; 10]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);
        children.create_topmost(Size::new(100.0, 60.0), &source, &registry);
        for index in 5..8 {
            children.measured_child(index, &source, &registry).unwrap();
        }

        children.trim(6, 7);

        // 5 left the window and was pooled; 6 and 7 stay attached.
        assert!(children.element(5).is_none());
        assert_eq!(children.attached_indices(), vec![6, 7]);
        // Topmost slots detach but remain realized.
        assert!(children.element(0).is_some());
        assert!(!children.is_attached(0));
    }

    #[test]
    fn test_trimmed_elements_are_recycled() {
        let source = KindedItems::uniform(vec![30.0; 10]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);

        children.measured_child(2, &source, &registry).unwrap();
        let before = children.realized_count();
        children.trim(5, 6);
        children.measured_child(5, &source, &registry).unwrap();

        assert_eq!(children.realized_count(), before);
    }

    #[test]
    fn test_create_topmost_shrinks_with_the_viewport() {
        let source = KindedItems::uniform(vec![40.0; 10]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);

        children.create_topmost(Size::new(100.0, 100.0), &source, &registry);
        assert_eq!(children.topmost_count(), 3);

        children.create_topmost(Size::new(100.0, 60.0), &source, &registry);
        assert_eq!(children.topmost_count(), 2);
    }

    #[test]
    fn test_reset_returns_elements_to_the_pool() {
        let source = KindedItems::uniform(vec![30.0; 3]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);
        children.measured_child(0, &source, &registry).unwrap();
        let before = children.element(0).unwrap();

        children.reset(3);
        assert!(children.element(0).is_none());

        children.measured_child(0, &source, &registry).unwrap();
        assert_eq!(children.element(0), Some(before));
    }

    #[test]
    fn test_sync_len_shrink_drops_out_of_range_slots() {
        let source = KindedItems::uniform(vec![30.0; 6]);
        let registry = test_registry();
        let mut children = children_for(&source, 100.0);
        children.measured_child(2, &source, &registry).unwrap();
        children.measured_child(5, &source, &registry).unwrap();

        children.sync_len(4);

        assert_eq!(children.attached_indices(), vec![2]);
        assert!(children.element(2).is_some());
    }

    #[test]
    fn test_missing_template_leaves_slot_untouched() {
        let source = KindedItems::uniform(vec![30.0; 3]);
        let registry = crate::template::TemplateRegistry::default();
        let mut children = children_for(&source, 100.0);

        assert!(children.measured_child(1, &source, &registry).is_err());
        assert!(children.element(1).is_none());
        assert!(!children.is_attached(1));
    }
}
