//! Shared fixtures for the manager integration tests.
//!
//! [`ScriptedKind`] is a deterministic manager flavor: catalog-order
//! navigation, first-entry bootstrap, failure and delay injection, and an
//! event log recording the construct/release/activate ordering that the
//! lifecycle tests assert on.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rhythm_core::catalog::Descriptor;
use rhythm_core::working::{ResourceKind, WorkingResource};

/// Identity key of [`ScriptedKind`]'s fallback resource.
pub const FALLBACK_KEY: &str = "fallback";

/// Thread-safe ordered event log.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Position of the first occurrence of `event`, panicking with the log
    /// contents when absent.
    pub fn index_of(&self, event: &str) -> usize {
        let events = self.snapshot();
        events
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event {event:?} not in log {events:?}"))
    }

    /// Number of occurrences of `event`.
    pub fn count_of(&self, event: &str) -> usize {
        self.snapshot().iter().filter(|e| *e == event).count()
    }
}

/// Minimal descriptor: identity key plus a grouping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub group: String,
}

impl Item {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            group: key.to_string(),
        }
    }
}

impl Descriptor for Item {
    fn key(&self) -> &str {
        &self.key
    }

    fn group_key(&self) -> &str {
        &self.group
    }

    fn title(&self) -> &str {
        &self.key
    }
}

/// Loaded form of an [`Item`]; records release/activate into the log.
pub struct LoadedItem {
    source: Item,
    log: Arc<EventLog>,
    released: AtomicBool,
}

impl LoadedItem {
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl WorkingResource for LoadedItem {
    type Descriptor = Item;

    fn source(&self) -> &Item {
        &self.source
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.log.record(format!("release {}", self.source.key));
        }
    }

    fn activate(&self) {
        self.log.record(format!("activate {}", self.source.key));
    }
}

/// Deterministic test flavor.
///
/// Loads fail for keys starting with `bad` (or always, with
/// [`failing`](Self::failing)); every completed construction appends
/// `construct <key>` to the log and bumps the load counter.
pub struct ScriptedKind {
    pub log: Arc<EventLog>,
    pub loads: AtomicUsize,
    fail_all: bool,
    load_delay: Duration,
}

impl ScriptedKind {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            loads: AtomicUsize::new(0),
            fail_all: false,
            load_delay: Duration::ZERO,
        }
    }

    /// A kind whose every load fails.
    pub fn failing(log: Arc<EventLog>) -> Self {
        Self {
            fail_all: true,
            ..Self::new(log)
        }
    }

    /// A kind whose loads take `delay` before completing.
    pub fn slow(log: Arc<EventLog>, delay: Duration) -> Self {
        Self {
            load_delay: delay,
            ..Self::new(log)
        }
    }

    fn loaded(&self, source: Item) -> LoadedItem {
        LoadedItem {
            source,
            log: self.log.clone(),
            released: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ResourceKind for ScriptedKind {
    type Descriptor = Item;
    type Working = LoadedItem;

    async fn load(&self, descriptor: &Item) -> anyhow::Result<LoadedItem> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail_all || descriptor.key.starts_with("bad") {
            anyhow::bail!("scripted load failure for {}", descriptor.key);
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.log.record(format!("construct {}", descriptor.key));
        Ok(self.loaded(descriptor.clone()))
    }

    fn fallback(&self) -> LoadedItem {
        self.log.record(format!("construct {FALLBACK_KEY}"));
        self.loaded(Item::new(FALLBACK_KEY))
    }

    fn navigation_order(&self, catalog: &[Item]) -> Vec<Item> {
        catalog.to_vec()
    }

    fn bootstrap_selection(&self, order: &[Item]) -> Option<Item> {
        order.first().cloned()
    }
}

/// Installs the test tracing subscriber (idempotent).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}
