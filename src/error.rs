//! Error types for panel configuration faults.
//!
//! Only configuration problems surface as `Err` values; invariant
//! violations inside the measurement loop self-heal and are reported
//! through `debug_assert!` plus a `log::warn!` instead.

use crate::item::ItemKind;

/// A fault in the host-supplied panel configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// No view template is registered for an item kind encountered during
    /// realization. The affected index stays unrendered; other indices are
    /// unaffected.
    MissingTemplate { kind: ItemKind },
}

impl std::fmt::Display for PanelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelError::MissingTemplate { kind } => {
                write!(f, "no view template registered for item kind {}", kind.raw())
            }
        }
    }
}

impl std::error::Error for PanelError {}
