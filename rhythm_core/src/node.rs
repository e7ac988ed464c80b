//! UI composite tree propagation.
//!
//! Skin and scale changes have to reach every element of the UI tree,
//! whatever its concrete nature (view, layout, engine entity). Instead of
//! dispatching on runtime type tags, every element implements [`UiNode`]
//! for the events it cares about: `apply` reacts to the event, `children`
//! exposes the subtree, and [`propagate`] walks the whole tree generically.

use std::sync::Arc;

use crate::skin::WorkingSkin;

/// A tree element reacting to propagated events of type `E`.
pub trait UiNode<E> {
    /// Applies the event to this node only.
    fn apply(&self, event: &E);

    /// Child nodes. Leaves keep the default empty list.
    fn children(&self) -> Vec<&dyn UiNode<E>> {
        Vec::new()
    }
}

/// Applies `event` to `root` and then to its subtree, parent first.
pub fn propagate<E>(root: &dyn UiNode<E>, event: &E) {
    root.apply(event);
    for child in root.children() {
        propagate(child, event);
    }
}

/// The current skin changed (or was cleared mid-switch).
#[derive(Clone)]
pub struct SkinChanged(pub Option<Arc<WorkingSkin>>);

/// The UI scale factor changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleChanged(pub f32);
