//! Catalog entries and navigation helpers.
//!
//! A catalog is an ordered list of descriptors that is always replaced
//! wholesale, never patched in place. Each manager derives its own
//! navigation order from the latest snapshot; the helpers here walk that
//! order for next/previous traversal.

/// An immutable catalog entry describing one persisted resource.
///
/// Identity is defined solely by [`key`](Descriptor::key): two descriptors
/// with the same key are the same resource regardless of display metadata.
pub trait Descriptor: Clone + Send + Sync + 'static {
    /// Stable identity key, unique within a catalog snapshot.
    fn key(&self) -> &str;

    /// Grouping attribute used when a deduplicated view of the catalog is
    /// needed (e.g. one entry per unique audio track). Defaults to the
    /// identity key, which makes every descriptor its own group.
    fn group_key(&self) -> &str {
        self.key()
    }

    /// Human-readable title, for logging only.
    fn title(&self) -> &str;
}

/// Returns the position of `key` in `order`, if present.
pub fn position_of<D: Descriptor>(order: &[D], key: &str) -> Option<usize> {
    order.iter().position(|d| d.key() == key)
}

/// Returns the descriptor following `key` in `order`.
///
/// Navigation wraps at the end: the successor of the last entry is the
/// first. Returns `None` when `key` is absent from the order (the caller
/// stays on its current resource) or when the order holds fewer than two
/// entries.
pub fn next_of<'a, D: Descriptor>(order: &'a [D], key: &str) -> Option<&'a D> {
    if order.len() < 2 {
        return None;
    }
    let pos = position_of(order, key)?;
    order.get((pos + 1) % order.len())
}

/// Returns the descriptor preceding `key` in `order`.
///
/// Wraps at the start: the predecessor of the first entry is the last.
/// Same absence and length rules as [`next_of`].
pub fn previous_of<'a, D: Descriptor>(order: &'a [D], key: &str) -> Option<&'a D> {
    if order.len() < 2 {
        return None;
    }
    let pos = position_of(order, key)?;
    order.get((pos + order.len() - 1) % order.len())
}
