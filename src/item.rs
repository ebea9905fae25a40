//! Item source abstraction consumed by the panel.
//!
//! The panel never owns item data. It reads an ordered, randomly
//! indexable sequence of opaque records through [`ItemSource`] and hands
//! individual records to [`Element::bind`](crate::element::Element::bind)
//! when a slot is realized.

use std::any::Any;

/// Identifier for a kind of item record.
///
/// Kinds drive view recycling: elements built for one kind are only ever
/// reused for items of the same kind. Hosts assign kinds when they build
/// the template table; the panel treats them as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKind(pub u64);

impl ItemKind {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// An ordered, index-addressable sequence of opaque item records.
///
/// Items are identified only by their current index; indices are not
/// stable across reordering. Mutating the sequence while a layout pass is
/// in progress is not supported - the host serializes source mutations
/// with layout cycles. Replacing the source entirely goes through
/// [`SmoothPanel::set_item_source`](crate::panel::SmoothPanel::set_item_source),
/// which rebuilds the slot table.
pub trait ItemSource {
    /// The total number of items (visible or not).
    fn item_count(&self) -> usize;

    /// The kind of the item at `index`.
    fn kind(&self, index: usize) -> ItemKind;

    /// The opaque record at `index`, passed to the bound element and to
    /// the kind's height estimator.
    fn item(&self, index: usize) -> &dyn Any;
}
