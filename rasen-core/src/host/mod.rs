//! Host Adapter Protocol
//!
//! A host is whatever a rendering-target binding mounts into: a document
//! element, a draw list, a widget container, a string buffer. The core never
//! looks inside it. Structural primitives only position *markers*, opaque
//! nodes the host hands out, through the operations on [`Host`].
//!
//! # Markers and Slots
//!
//! A marker is a positioned region. [`Host::slot`] returns a host whose
//! mutations land inside that region, so moving or removing the marker moves
//! or removes everything mounted through the slot. Every branch of `when`,
//! `switch_case`, `lazy` and every entry of `each` lives in its own marker.
//!
//! # Capabilities
//!
//! Targets that cannot insert at arbitrary positions declare it through
//! [`HostCapabilities`]. Keyed lists then fall back to rebuilding on reorder,
//! and cached branches (which need hide/show) are rejected at mount time.

mod memory;

pub use memory::{text, text_with, HostOp, MemoryHost, MemoryNode};

/// What a host can do beyond appending and removing markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostCapabilities {
    ordered_insert: bool,
    hide_show: bool,
}

impl HostCapabilities {
    /// Append and remove only.
    pub const APPEND_ONLY: Self = Self {
        ordered_insert: false,
        hide_show: false,
    };

    /// Positional insertion, no hide/show.
    pub const ORDERED: Self = Self {
        ordered_insert: true,
        hide_show: false,
    };

    /// Everything.
    pub const FULL: Self = Self {
        ordered_insert: true,
        hide_show: true,
    };

    pub const fn with_ordered_insert(self, ordered_insert: bool) -> Self {
        Self {
            ordered_insert,
            ..self
        }
    }

    pub const fn with_hide_show(self, hide_show: bool) -> Self {
        Self { hide_show, ..self }
    }

    /// Whether [`Host::insert_before`] may be called with a reference node.
    pub const fn supports_ordered_insert(&self) -> bool {
        self.ordered_insert
    }

    /// Whether [`Host::set_hidden`] is meaningful.
    pub const fn supports_hide_show(&self) -> bool {
        self.hide_show
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::FULL
    }
}

/// The operations a rendering-target binding supplies.
///
/// Hosts are cheap handles: primitives clone them into watcher callbacks.
pub trait Host: Clone + 'static {
    /// The binding's marker node.
    type Node: Clone + 'static;

    fn capabilities(&self) -> HostCapabilities;

    /// Create a marker that is not attached anywhere yet.
    fn create_marker(&self) -> Self::Node;

    /// Attach `marker` as the last child of this host.
    fn append_marker(&self, marker: &Self::Node);

    /// Move or attach `marker` before `reference`, or at the end when
    /// `reference` is `None`. Only called with a reference when the host
    /// supports ordered insertion.
    fn insert_before(&self, marker: &Self::Node, reference: Option<&Self::Node>);

    /// Detach `marker` and everything mounted inside it.
    fn remove_marker(&self, marker: &Self::Node);

    /// A host whose mutations land inside `marker`.
    fn slot(&self, marker: &Self::Node) -> Self;

    /// Hide or show everything inside `marker`. Only called when the host
    /// supports hide/show.
    fn set_hidden(&self, marker: &Self::Node, hidden: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_presets() {
        assert!(!HostCapabilities::APPEND_ONLY.supports_ordered_insert());
        assert!(HostCapabilities::ORDERED.supports_ordered_insert());
        assert!(!HostCapabilities::ORDERED.supports_hide_show());
        assert_eq!(HostCapabilities::default(), HostCapabilities::FULL);
    }

    #[test]
    fn setters_return_modified_copy() {
        let base = HostCapabilities::APPEND_ONLY;
        let with_hide = base.with_hide_show(true);
        assert!(with_hide.supports_hide_show());
        assert!(!base.supports_hide_show());
        assert_eq!(
            with_hide.with_ordered_insert(true),
            HostCapabilities::FULL
        );
    }
}
