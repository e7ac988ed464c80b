//! Working resources and manager flavors.
//!
//! A working resource is the loaded, usable counterpart of a catalog
//! descriptor: decoded assets, playback handles, whatever is expensive to
//! build and must be torn down explicitly. A [`ResourceKind`] bundles one
//! manager flavor: how descriptors load, what the fallback is, and how the
//! navigation order is derived from a catalog snapshot.

use async_trait::async_trait;

use crate::catalog::Descriptor;

/// Loaded, usable form of a catalog descriptor.
///
/// Lifecycle: created when selected as current, released exactly once
/// before the manager drops it, never reused after release.
pub trait WorkingResource: Send + Sync + 'static {
    /// Descriptor type this resource was built from.
    type Descriptor: Descriptor;

    /// The descriptor this resource was loaded from.
    fn source(&self) -> &Self::Descriptor;

    /// Stops and frees runtime state. Idempotent; must never panic.
    fn release(&self);

    /// Begins the resource's live behavior (e.g. playback). Called only on
    /// the resource currently held by the manager. Default: nothing.
    fn activate(&self) {}
}

/// One manager flavor: descriptor/working types plus the policies that
/// differ between the chart and skin managers.
#[async_trait]
pub trait ResourceKind: Send + Sync + 'static {
    /// Catalog entry type.
    type Descriptor: Descriptor;

    /// Loaded resource type.
    type Working: WorkingResource<Descriptor = Self::Descriptor>;

    /// Loads a descriptor into its working form.
    ///
    /// Must be side-effect-free on failure: no partially-registered runtime
    /// state may leak out of a failed load.
    async fn load(&self, descriptor: &Self::Descriptor) -> anyhow::Result<Self::Working>;

    /// Builds the always-available default resource, used when a load fails
    /// or times out. Its descriptor lives outside the catalog.
    fn fallback(&self) -> Self::Working;

    /// Derives the navigation order for a new catalog snapshot. Stable for
    /// the lifetime of that snapshot.
    fn navigation_order(&self, catalog: &[Self::Descriptor]) -> Vec<Self::Descriptor>;

    /// Picks the descriptor to auto-select when the first non-empty
    /// snapshot arrives and nothing has ever been selected. `None` skips
    /// the automatic switch.
    fn bootstrap_selection(&self, order: &[Self::Descriptor]) -> Option<Self::Descriptor>;
}
