//! Generic live-resource manager.
//!
//! One manager instance keeps:
//! - The latest catalog snapshot from a backing store.
//! - Exactly one current working resource, hot-loaded at a time.
//! - A registry of observers notified on every current-resource change.
//!
//! All mutations run on a single worker task per manager (the serialized
//! lane), so overlapping switch requests can never interleave their
//! release/construct steps. A request issued while another is executing is
//! queued and observes the already-updated state when it runs.
//!
//! Shared reads (`current`, `catalog`) go through `watch` channels: values
//! are replaced wholesale, readers always observe a complete value.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::catalog::{next_of, previous_of, Descriptor};
use crate::config::ClientConfig;
use crate::observer::{ObserverRegistry, ResourceObserver};
use crate::working::{ResourceKind, WorkingResource};

/// Result of a switch or navigation request.
///
/// Requests never fail hard: a load failure is recovered by falling back to
/// the default resource, and impossible navigation is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The requested resource is now current.
    Switched,
    /// Loading failed or timed out; the default resource is now current.
    Fallback,
    /// Nothing changed (already current, no target, or manager shut down).
    NoOp,
}

/// Source of catalog snapshots.
///
/// The receiver yields the full persisted set after every change; snapshots
/// replace rather than diff.
pub trait CatalogStore<D>: Send + Sync {
    fn observe(&self) -> mpsc::Receiver<Vec<D>>;
}

enum Command<K: ResourceKind> {
    Catalog {
        snapshot: Vec<K::Descriptor>,
        done: Option<oneshot::Sender<()>>,
    },
    Switch {
        descriptor: K::Descriptor,
        force_reload: bool,
        done: oneshot::Sender<SwitchOutcome>,
    },
    Next {
        done: oneshot::Sender<SwitchOutcome>,
    },
    Previous {
        done: oneshot::Sender<SwitchOutcome>,
    },
    Shutdown,
}

/// Generic manager over one [`ResourceKind`].
pub struct ResourceManager<K: ResourceKind> {
    cmd_tx: mpsc::Sender<Command<K>>,
    current_rx: watch::Receiver<Option<Arc<K::Working>>>,
    catalog_rx: watch::Receiver<Vec<K::Descriptor>>,
    observers: Arc<ObserverRegistry<K::Working>>,
    handle: Handle,
    worker: JoinHandle<()>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
}

impl<K: ResourceKind> ResourceManager<K> {
    /// Spawns the manager's worker lane on the given runtime handle.
    ///
    /// The handle is injected explicitly so the manager's background work is
    /// tied to a runtime the caller controls; [`shutdown`](Self::shutdown)
    /// is the matching teardown hook.
    pub fn new(kind: K, cfg: &ClientConfig, handle: &Handle) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (current_tx, current_rx) = watch::channel(None);
        let (catalog_tx, catalog_rx) = watch::channel(Vec::new());
        let observers = Arc::new(ObserverRegistry::new());

        let worker = Worker {
            kind,
            load_timeout: cfg.load_timeout(),
            current_tx,
            catalog_tx,
            observers: observers.clone(),
            nav_order: Vec::new(),
            selected_once: false,
        };
        let worker = handle.spawn(worker.run(cmd_rx));

        Self {
            cmd_tx,
            current_rx,
            catalog_rx,
            observers,
            handle: handle.clone(),
            worker,
            pumps: Mutex::new(Vec::new()),
        }
    }

    /// Begins consuming a catalog snapshot stream.
    ///
    /// Snapshots are forwarded into the serialized lane. If the stream ends
    /// the last-known catalog is retained (stale but available) and the
    /// loss is logged for operator visibility.
    pub fn subscribe_catalog(&self, mut stream: mpsc::Receiver<Vec<K::Descriptor>>) {
        let cmd_tx = self.cmd_tx.clone();
        let pump = self.handle.spawn(async move {
            while let Some(snapshot) = stream.recv().await {
                let cmd = Command::Catalog {
                    snapshot,
                    done: None,
                };
                if cmd_tx.send(cmd).await.is_err() {
                    // Manager shut down; stop pumping.
                    return;
                }
            }
            warn!("Catalog stream ended, keeping last known catalog");
        });
        self.pumps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(pump);
    }

    /// Convenience over [`subscribe_catalog`](Self::subscribe_catalog) for a
    /// [`CatalogStore`].
    pub fn subscribe_store<S: CatalogStore<K::Descriptor>>(&self, store: &S) {
        self.subscribe_catalog(store.observe());
    }

    /// Applies one catalog snapshot directly and waits until the lane has
    /// processed it (including any automatic initial selection).
    pub async fn push_catalog(&self, snapshot: Vec<K::Descriptor>) {
        let (done, ack) = oneshot::channel();
        let cmd = Command::Catalog {
            snapshot,
            done: Some(done),
        };
        if self.cmd_tx.send(cmd).await.is_err() {
            warn!("Manager worker is gone, dropping catalog snapshot");
            return;
        }
        let _ = ack.await;
    }

    /// Requests that `descriptor` become the current resource.
    ///
    /// No-op when `descriptor` is already current (by identity key) and
    /// `force_reload` is false. Load failures fall back to the default
    /// resource; this never returns an error.
    pub async fn switch_to(&self, descriptor: K::Descriptor, force_reload: bool) -> SwitchOutcome {
        let (done, ack) = oneshot::channel();
        let cmd = Command::Switch {
            descriptor,
            force_reload,
            done,
        };
        if self.cmd_tx.send(cmd).await.is_err() {
            warn!("Manager worker is gone, ignoring switch request");
            return SwitchOutcome::NoOp;
        }
        ack.await.unwrap_or(SwitchOutcome::NoOp)
    }

    /// Switches to the resource following the current one in the
    /// navigation order. No-op without a current resource.
    pub async fn next(&self) -> SwitchOutcome {
        self.navigate(true).await
    }

    /// Switches to the resource preceding the current one in the
    /// navigation order. No-op without a current resource.
    pub async fn previous(&self) -> SwitchOutcome {
        self.navigate(false).await
    }

    async fn navigate(&self, forward: bool) -> SwitchOutcome {
        let (done, ack) = oneshot::channel();
        let cmd = if forward {
            Command::Next { done }
        } else {
            Command::Previous { done }
        };
        if self.cmd_tx.send(cmd).await.is_err() {
            warn!("Manager worker is gone, ignoring navigation request");
            return SwitchOutcome::NoOp;
        }
        ack.await.unwrap_or(SwitchOutcome::NoOp)
    }

    /// The current working resource, or `None` if nothing has been
    /// selected. Safe to call concurrently with an in-flight switch.
    pub fn current(&self) -> Option<Arc<K::Working>> {
        self.current_rx.borrow().clone()
    }

    /// Watch channel mirroring [`current`](Self::current), for consumers
    /// that want to await changes instead of being called back.
    pub fn watch_current(&self) -> watch::Receiver<Option<Arc<K::Working>>> {
        self.current_rx.clone()
    }

    /// The latest catalog snapshot (empty before the first emission).
    pub fn catalog(&self) -> Vec<K::Descriptor> {
        self.catalog_rx.borrow().clone()
    }

    /// Watch channel mirroring [`catalog`](Self::catalog).
    pub fn watch_catalog(&self) -> watch::Receiver<Vec<K::Descriptor>> {
        self.catalog_rx.clone()
    }

    /// Registers an observer for current-resource changes.
    pub fn attach(&self, observer: Arc<dyn ResourceObserver<K::Working>>) {
        self.observers.attach(observer);
    }

    /// Removes a previously attached observer.
    pub fn detach(&self, observer: &Arc<dyn ResourceObserver<K::Working>>) {
        self.observers.detach(observer);
    }

    /// Stops the worker lane and releases the current resource.
    ///
    /// Queued requests submitted before this call are still applied in
    /// order before the lane stops.
    pub async fn shutdown(self) {
        for pump in self
            .pumps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            pump.abort();
        }
        if self.cmd_tx.send(Command::Shutdown).await.is_err() {
            return;
        }
        if let Err(error) = self.worker.await {
            warn!(error = %error, "Manager worker did not shut down cleanly");
        }
    }
}

/// State owned by the serialized lane.
struct Worker<K: ResourceKind> {
    kind: K,
    load_timeout: Duration,
    current_tx: watch::Sender<Option<Arc<K::Working>>>,
    catalog_tx: watch::Sender<Vec<K::Descriptor>>,
    observers: Arc<ObserverRegistry<K::Working>>,
    nav_order: Vec<K::Descriptor>,
    /// Whether any resource has ever been selected; guards the one-shot
    /// automatic selection on the first non-empty snapshot.
    selected_once: bool,
}

impl<K: ResourceKind> Worker<K> {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command<K>>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Catalog { snapshot, done } => {
                    self.apply_catalog(snapshot).await;
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                }
                Command::Switch {
                    descriptor,
                    force_reload,
                    done,
                } => {
                    let outcome = self.apply_switch(descriptor, force_reload).await;
                    let _ = done.send(outcome);
                }
                Command::Next { done } => {
                    let outcome = self.apply_navigation(true).await;
                    let _ = done.send(outcome);
                }
                Command::Previous { done } => {
                    let outcome = self.apply_navigation(false).await;
                    let _ = done.send(outcome);
                }
                Command::Shutdown => break,
            }
        }

        // Lane is stopping; tear down whatever is still loaded.
        if let Some(current) = self.current_tx.send_replace(None) {
            current.release();
        }
        debug!("Manager worker stopped");
    }

    async fn apply_catalog(&mut self, snapshot: Vec<K::Descriptor>) {
        let was_empty = self.catalog_tx.borrow().is_empty();
        let entries = snapshot.len();

        self.nav_order = self.kind.navigation_order(&snapshot);
        self.catalog_tx.send_replace(snapshot);
        debug!(entries, "Catalog snapshot replaced");

        if was_empty && entries > 0 && !self.selected_once {
            if let Some(pick) = self.kind.bootstrap_selection(&self.nav_order) {
                info!(key = %pick.key(), "Auto-selecting initial resource");
                self.apply_switch(pick, false).await;
            }
        }
    }

    async fn apply_switch(&mut self, descriptor: K::Descriptor, force_reload: bool) -> SwitchOutcome {
        self.selected_once = true;

        if !force_reload {
            let unchanged = self
                .current_tx
                .borrow()
                .as_ref()
                .is_some_and(|current| current.source().key() == descriptor.key());
            if unchanged {
                return SwitchOutcome::NoOp;
            }
        }

        // Empty the slot before releasing: readers must never observe a
        // released resource through `current`.
        if let Some(old) = self.current_tx.send_replace(None) {
            old.release();
        }

        let (next, outcome) = match timeout(self.load_timeout, self.kind.load(&descriptor)).await {
            Ok(Ok(loaded)) => (Arc::new(loaded), SwitchOutcome::Switched),
            Ok(Err(error)) => {
                warn!(
                    key = %descriptor.key(),
                    title = %descriptor.title(),
                    error = %error,
                    "Failed to load resource, falling back to default"
                );
                (Arc::new(self.kind.fallback()), SwitchOutcome::Fallback)
            }
            Err(_) => {
                warn!(
                    key = %descriptor.key(),
                    timeout_ms = self.load_timeout.as_millis() as u64,
                    "Resource load timed out, falling back to default"
                );
                (Arc::new(self.kind.fallback()), SwitchOutcome::Fallback)
            }
        };

        info!(
            key = %next.source().key(),
            title = %next.source().title(),
            "Current resource changed"
        );
        self.current_tx.send_replace(Some(next.clone()));
        self.observers.notify_all(Some(next.clone()));
        next.activate();
        outcome
    }

    async fn apply_navigation(&mut self, forward: bool) -> SwitchOutcome {
        let Some(target) = self.adjacent(forward) else {
            return SwitchOutcome::NoOp;
        };
        self.apply_switch(target, false).await
    }

    /// Locates the current source in the navigation order and returns the
    /// following/preceding descriptor. `None` when there is no current
    /// resource or its source is absent from the order (e.g. was removed):
    /// the manager stays on current.
    fn adjacent(&self, forward: bool) -> Option<K::Descriptor> {
        let current = self.current_tx.borrow().clone()?;
        let key = current.source().key();
        let found = if forward {
            next_of(&self.nav_order, key)
        } else {
            previous_of(&self.nav_order, key)
        };
        found.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Track {
        key: String,
    }

    impl Track {
        fn new(key: &str) -> Self {
            Self {
                key: key.to_string(),
            }
        }
    }

    impl Descriptor for Track {
        fn key(&self) -> &str {
            &self.key
        }

        fn title(&self) -> &str {
            &self.key
        }
    }

    struct LoadedTrack {
        source: Track,
        released: AtomicBool,
    }

    impl WorkingResource for LoadedTrack {
        type Descriptor = Track;

        fn source(&self) -> &Track {
            &self.source
        }

        fn release(&self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    /// Catalog-order navigation, first-entry bootstrap, failure injection
    /// by key prefix.
    struct TrackKind {
        loads: AtomicUsize,
    }

    impl TrackKind {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ResourceKind for TrackKind {
        type Descriptor = Track;
        type Working = LoadedTrack;

        async fn load(&self, descriptor: &Track) -> anyhow::Result<LoadedTrack> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if descriptor.key.starts_with("bad") {
                anyhow::bail!("corrupt track data");
            }
            Ok(LoadedTrack {
                source: descriptor.clone(),
                released: AtomicBool::new(false),
            })
        }

        fn fallback(&self) -> LoadedTrack {
            LoadedTrack {
                source: Track::new("default"),
                released: AtomicBool::new(false),
            }
        }

        fn navigation_order(&self, catalog: &[Track]) -> Vec<Track> {
            catalog.to_vec()
        }

        fn bootstrap_selection(&self, order: &[Track]) -> Option<Track> {
            order.first().cloned()
        }
    }

    fn manager() -> ResourceManager<TrackKind> {
        ResourceManager::new(
            TrackKind::new(),
            &ClientConfig::default(),
            &Handle::current(),
        )
    }

    #[tokio::test]
    async fn switch_sets_current() {
        let mgr = manager();
        assert!(mgr.current().is_none());

        let outcome = mgr.switch_to(Track::new("a"), false).await;
        assert_eq!(outcome, SwitchOutcome::Switched);
        assert_eq!(mgr.current().unwrap().source().key(), "a");
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn repeated_switch_is_noop() {
        let mgr = manager();
        assert_eq!(mgr.switch_to(Track::new("a"), false).await, SwitchOutcome::Switched);
        assert_eq!(mgr.switch_to(Track::new("a"), false).await, SwitchOutcome::NoOp);
        assert_eq!(mgr.switch_to(Track::new("a"), true).await, SwitchOutcome::Switched);
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn failed_load_falls_back_to_default() {
        let mgr = manager();
        let outcome = mgr.switch_to(Track::new("bad-1"), false).await;
        assert_eq!(outcome, SwitchOutcome::Fallback);
        assert_eq!(mgr.current().unwrap().source().key(), "default");
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn first_nonempty_snapshot_selects_once() {
        let mgr = manager();
        mgr.push_catalog(Vec::new()).await;
        assert!(mgr.current().is_none());

        mgr.push_catalog(vec![Track::new("a"), Track::new("b")]).await;
        assert_eq!(mgr.current().unwrap().source().key(), "a");

        // A later snapshot must not re-trigger the automatic selection.
        mgr.switch_to(Track::new("b"), false).await;
        mgr.push_catalog(vec![Track::new("a"), Track::new("b"), Track::new("c")])
            .await;
        assert_eq!(mgr.current().unwrap().source().key(), "b");
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn navigation_follows_catalog_order_and_wraps() {
        let mgr = manager();
        mgr.push_catalog(vec![Track::new("a"), Track::new("b"), Track::new("c")])
            .await;

        assert_eq!(mgr.next().await, SwitchOutcome::Switched);
        assert_eq!(mgr.current().unwrap().source().key(), "b");
        assert_eq!(mgr.next().await, SwitchOutcome::Switched);
        assert_eq!(mgr.current().unwrap().source().key(), "c");
        // Wraps around the end of the order.
        assert_eq!(mgr.next().await, SwitchOutcome::Switched);
        assert_eq!(mgr.current().unwrap().source().key(), "a");
        assert_eq!(mgr.previous().await, SwitchOutcome::Switched);
        assert_eq!(mgr.current().unwrap().source().key(), "c");
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn navigation_without_current_is_noop() {
        let mgr = manager();
        assert_eq!(mgr.next().await, SwitchOutcome::NoOp);
        assert_eq!(mgr.previous().await, SwitchOutcome::NoOp);
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn current_removed_from_catalog_stays() {
        let mgr = manager();
        mgr.push_catalog(vec![Track::new("a"), Track::new("b")]).await;
        assert_eq!(mgr.current().unwrap().source().key(), "a");

        // Current disappears from the snapshot; navigation stays put.
        mgr.push_catalog(vec![Track::new("b"), Track::new("c")]).await;
        assert_eq!(mgr.next().await, SwitchOutcome::NoOp);
        assert_eq!(mgr.current().unwrap().source().key(), "a");
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn catalog_stream_end_retains_snapshot() {
        let mgr = manager();
        let (tx, rx) = mpsc::channel(4);
        mgr.subscribe_catalog(rx);

        tx.send(vec![Track::new("a")]).await.unwrap();
        drop(tx);

        // Wait for the pump to deliver the snapshot.
        let mut watch = mgr.watch_catalog();
        while watch.borrow().is_empty() {
            watch.changed().await.unwrap();
        }
        assert_eq!(mgr.catalog().len(), 1);
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_releases_current() {
        let mgr = manager();
        mgr.switch_to(Track::new("a"), false).await;
        let current = mgr.current().unwrap();
        mgr.shutdown().await;
        assert!(current.released.load(Ordering::SeqCst));
    }
}
