//! Per-kind recycling pool of idle elements.
//!
//! Released elements queue by item kind and are handed back out on the
//! next realization of that kind. Pool entries hold arena handles, not
//! elements: a handle whose slot was reclaimed by the arena sweep is
//! simply skipped on acquire. That miss is part of normal operation and
//! is never logged or surfaced.

use std::collections::{HashMap, VecDeque};

use crate::element::{ElementArena, ElementId};
use crate::error::PanelError;
use crate::item::ItemKind;
use crate::template::TemplateRegistry;

#[derive(Default)]
pub struct ViewPool {
    buckets: HashMap<ItemKind, VecDeque<ElementId>>,
}

impl ViewPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an idle element of `kind`, reviving a pooled one when a
    /// live handle is available and building a fresh view otherwise.
    ///
    /// The returned element is unbound; the caller binds it.
    pub fn acquire(
        &mut self,
        kind: ItemKind,
        registry: &TemplateRegistry,
        arena: &mut ElementArena,
    ) -> Result<ElementId, PanelError> {
        if let Some(bucket) = self.buckets.get_mut(&kind) {
            while let Some(id) = bucket.pop_front() {
                if arena.contains(id) {
                    arena.mark_bound(id);
                    return Ok(id);
                }
                // Swept while pooled; drop the stale handle and keep going.
            }
        }
        let view = registry.build_view(kind)?;
        Ok(arena.insert(view, kind))
    }

    /// Unbinds the element and queues it for reuse.
    pub fn release(&mut self, id: ElementId, arena: &mut ElementArena, pass: u64) {
        let Some(kind) = arena.kind(id) else {
            return;
        };
        arena.unbind(id);
        arena.mark_idle(id, pass);
        self.buckets.entry(kind).or_default().push_back(id);
    }

    /// Drops every pooled element. Used when the template table is
    /// replaced and pooled views no longer match their kinds.
    pub fn invalidate(&mut self, arena: &mut ElementArena) {
        for (_, bucket) in self.buckets.drain() {
            for id in bucket {
                arena.remove(id);
            }
        }
    }

    #[cfg(test)]
    fn pooled_count(&self, kind: ItemKind) -> usize {
        self.buckets.get(&kind).map_or(0, VecDeque::len)
    }
}
