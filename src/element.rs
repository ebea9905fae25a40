//! Element abstraction and the generation-tagged element arena.
//!
//! Realized views live in a slab arena and are addressed by
//! [`ElementId`], an index plus a generation counter. Freeing a slot
//! bumps its generation, so handles that outlive their element (pool
//! entries, mostly) become observably stale instead of aliasing a new
//! occupant. Stale lookups return `None`; callers treat that as a pool
//! miss, never as an error.

use std::any::Any;

use crate::geometry::{Rect, Size};
use crate::item::ItemKind;

/// A host-provided view participating in panel layout.
///
/// The panel drives the full lifecycle: build (via the template), bind to
/// an item record, measure, arrange, unbind on recycle. An element that
/// has been unbound must be rebindable to any item of the same kind.
pub trait Element {
    /// Associates the element with an item record before measurement.
    fn bind(&mut self, item: &dyn Any);

    /// Clears the item association when the element is returned to the pool.
    fn unbind(&mut self);

    /// Measures the element at the given width and returns its desired size.
    fn measure(&mut self, available_width: f32) -> Size;

    /// Positions the element within the panel's coordinate space.
    fn arrange(&mut self, rect: Rect);
}

/// Generation-tagged handle into an [`ElementArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    index: u32,
    generation: u32,
}

struct Payload {
    element: Box<dyn Element>,
    kind: ItemKind,
    desired: Size,
    /// Pass number at which the element went idle; `None` while bound.
    idle_since: Option<u64>,
}

struct Entry {
    generation: u32,
    payload: Option<Payload>,
}

/// Slab of realized elements with generational handles.
#[derive(Default)]
pub struct ElementArena {
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: Box<dyn Element>, kind: ItemKind) -> ElementId {
        let payload = Payload {
            element,
            kind,
            desired: Size::ZERO,
            idle_since: None,
        };
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.payload = Some(payload);
                ElementId {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    payload: Some(payload),
                });
                ElementId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn payload(&self, id: ElementId) -> Option<&Payload> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.payload.as_ref())
    }

    fn payload_mut(&mut self, id: ElementId) -> Option<&mut Payload> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.payload.as_mut())
    }

    /// Whether `id` still addresses a live element.
    pub fn contains(&self, id: ElementId) -> bool {
        self.payload(id).is_some()
    }

    pub fn kind(&self, id: ElementId) -> Option<ItemKind> {
        self.payload(id).map(|payload| payload.kind)
    }

    /// The desired size recorded by the last [`measure`](Self::measure) call.
    pub fn desired(&self, id: ElementId) -> Option<Size> {
        self.payload(id).map(|payload| payload.desired)
    }

    pub fn bind(&mut self, id: ElementId, item: &dyn Any) {
        if let Some(payload) = self.payload_mut(id) {
            payload.element.bind(item);
            payload.idle_since = None;
        }
    }

    pub fn unbind(&mut self, id: ElementId) {
        if let Some(payload) = self.payload_mut(id) {
            payload.element.unbind();
        }
    }

    /// Measures the element and records its desired size on the entry.
    pub fn measure(&mut self, id: ElementId, available_width: f32) -> Option<Size> {
        let payload = self.payload_mut(id)?;
        let desired = payload.element.measure(available_width);
        payload.desired = desired;
        Some(desired)
    }

    pub fn arrange(&mut self, id: ElementId, rect: Rect) {
        if let Some(payload) = self.payload_mut(id) {
            payload.element.arrange(rect);
        }
    }

    /// Marks the element idle as of `pass`; idle elements are candidates
    /// for the sweep.
    pub fn mark_idle(&mut self, id: ElementId, pass: u64) {
        if let Some(payload) = self.payload_mut(id) {
            payload.idle_since = Some(pass);
        }
    }

    pub fn mark_bound(&mut self, id: ElementId) {
        if let Some(payload) = self.payload_mut(id) {
            payload.idle_since = None;
        }
    }

    /// Frees the slot and bumps its generation, invalidating all
    /// outstanding handles to it.
    pub fn remove(&mut self, id: ElementId) {
        if let Some(entry) = self
            .entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
        {
            if entry.payload.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    /// Frees every element that has been idle for at least `max_idle`
    /// passes. Bound elements are never swept.
    pub fn sweep(&mut self, current_pass: u64, max_idle: u64) {
        for index in 0..self.entries.len() {
            let entry = &mut self.entries[index];
            let expired = matches!(
                entry.payload.as_ref().and_then(|payload| payload.idle_since),
                Some(idle) if current_pass.saturating_sub(idle) >= max_idle
            );
            if expired {
                entry.payload = None;
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }

    /// Number of live elements, bound or idle.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.payload.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Element for Probe {
        fn bind(&mut self, _item: &dyn Any) {}
        fn unbind(&mut self) {}
        fn measure(&mut self, available_width: f32) -> Size {
            Size::new(available_width, 42.0)
        }
        fn arrange(&mut self, _rect: Rect) {}
    }

    fn insert_probe(arena: &mut ElementArena) -> ElementId {
        arena.insert(Box::new(Probe), ItemKind::new(1))
    }

    #[test]
    fn test_remove_invalidates_handle() {
        let mut arena = ElementArena::new();
        let id = insert_probe(&mut arena);
        assert!(arena.contains(id));

        arena.remove(id);
        assert!(!arena.contains(id));
        assert_eq!(arena.desired(id), None);
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut arena = ElementArena::new();
        let old = insert_probe(&mut arena);
        arena.remove(old);

        let new = insert_probe(&mut arena);
        assert_ne!(old, new);
        assert!(arena.contains(new));
        assert!(!arena.contains(old));
    }

    #[test]
    fn test_measure_records_desired_size() {
        let mut arena = ElementArena::new();
        let id = insert_probe(&mut arena);

        let desired = arena.measure(id, 300.0).unwrap();
        assert_eq!(desired, Size::new(300.0, 42.0));
        assert_eq!(arena.desired(id), Some(desired));
    }

    #[test]
    fn test_sweep_frees_only_expired_idle_elements() {
        let mut arena = ElementArena::new();
        let bound = insert_probe(&mut arena);
        let young = insert_probe(&mut arena);
        let old = insert_probe(&mut arena);
        arena.mark_idle(young, 90);
        arena.mark_idle(old, 10);

        arena.sweep(100, 64);

        assert!(arena.contains(bound));
        assert!(arena.contains(young));
        assert!(!arena.contains(old));
    }

    #[test]
    fn test_rebinding_clears_idle_state() {
        let mut arena = ElementArena::new();
        let id = insert_probe(&mut arena);
        arena.mark_idle(id, 0);
        arena.bind(id, &7u32);

        arena.sweep(1000, 64);
        assert!(arena.contains(id));
    }
}
