//! Item-kind to view-template mapping.
//!
//! The mapping from item kinds to view constructors (and to optional
//! height estimators) is resolved once, when the table is built, rather
//! than per lookup. Rebuilding the table invalidates every pool bucket,
//! since previously pooled elements are no longer guaranteed to be
//! reusable under the new mapping.

use std::any::Any;

use indexmap::IndexMap;

use crate::element::Element;
use crate::error::PanelError;
use crate::item::ItemKind;

/// Fallback height for items whose kind has no estimator.
pub const DEFAULT_ITEM_HEIGHT: f32 = 150.0;

/// Constructor for a fresh, unbound element of one kind.
pub type ViewBuilder = Box<dyn Fn() -> Box<dyn Element>>;

/// Estimates the height an item would occupy at a given available width,
/// without building an element for it.
///
/// Must be a pure function of the item record and the width: the measurer
/// may call it repeatedly per item per pass and assumes the result is
/// stable for a fixed width. Must return a height >= 0.
pub type HeightEstimator = Box<dyn Fn(&dyn Any, f32) -> f32>;

/// Maps one item kind to a view constructor and an optional estimator.
pub struct ViewTemplate {
    kind: ItemKind,
    build: ViewBuilder,
    estimator: Option<HeightEstimator>,
}

impl ViewTemplate {
    pub fn new<F>(kind: ItemKind, build: F) -> Self
    where
        F: Fn() -> Box<dyn Element> + 'static,
    {
        Self {
            kind,
            build: Box::new(build),
            estimator: None,
        }
    }

    /// Attaches a height estimator for items of this kind.
    pub fn with_estimator<F>(mut self, estimator: F) -> Self
    where
        F: Fn(&dyn Any, f32) -> f32 + 'static,
    {
        self.estimator = Some(Box::new(estimator));
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }
}

impl std::fmt::Debug for ViewTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewTemplate")
            .field("kind", &self.kind)
            .field("has_estimator", &self.estimator.is_some())
            .finish()
    }
}

/// Ordered table of view templates, keyed by item kind.
///
/// Later entries for a duplicate kind replace earlier ones.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: IndexMap<ItemKind, ViewTemplate>,
}

impl TemplateRegistry {
    pub fn new(templates: Vec<ViewTemplate>) -> Self {
        let mut map = IndexMap::with_capacity(templates.len());
        for template in templates {
            map.insert(template.kind, template);
        }
        Self { templates: map }
    }

    /// Builds a fresh element for `kind`.
    pub fn build_view(&self, kind: ItemKind) -> Result<Box<dyn Element>, PanelError> {
        match self.templates.get(&kind) {
            Some(template) => Ok((template.build)()),
            None => Err(PanelError::MissingTemplate { kind }),
        }
    }

    /// Runs the kind's estimator against an item record, if one exists.
    pub fn estimated_height(
        &self,
        kind: ItemKind,
        item: &dyn Any,
        available_width: f32,
    ) -> Option<f32> {
        self.templates
            .get(&kind)
            .and_then(|template| template.estimator.as_ref())
            .map(|estimator| estimator(item, available_width))
    }

    pub fn contains(&self, kind: ItemKind) -> bool {
        self.templates.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("kinds", &self.templates.keys().collect::<Vec<_>>())
            .finish()
    }
}
