//! Virtualizing layout for scrollable lists of variable-height items.
//!
//! The panel realizes only the items that intersect the viewport plus a
//! permanently realized leading window, and pins the scroll position to
//! an anchor item rather than a pixel offset, so refining height
//! estimates never shifts the content the user is looking at.
//!
//! The host supplies items through [`ItemSource`], views through
//! [`ViewTemplate`]s keyed by [`ItemKind`], and drives the layout cycle:
//! call [`SmoothPanel::measure`] then [`SmoothPanel::arrange`] whenever
//! [`SmoothPanel::take_layout_invalidation`] reports a pending change.

pub mod children;
pub mod element;
pub mod error;
pub mod geometry;
pub mod item;
pub mod measure;
pub mod panel;
pub mod pool;
pub mod scroll;
pub mod template;

pub use children::PanelChildren;
pub use element::{Element, ElementArena, ElementId};
pub use error::PanelError;
pub use geometry::{Rect, Size};
pub use item::{ItemKind, ItemSource};
pub use panel::{SmoothPanel, LINE_SCROLL, WHEEL_SCROLL};
pub use scroll::{Anchor, ScrollState, SCROLL_EPSILON};
pub use template::{
    HeightEstimator, TemplateRegistry, ViewBuilder, ViewTemplate, DEFAULT_ITEM_HEIGHT,
};
