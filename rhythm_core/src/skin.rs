//! Skin manager flavor.
//!
//! Skins come in two shapes: imported skins keyed by content hash and
//! persisted in the library, and bundled skins keyed by their asset
//! subdirectory (the key ends with `/`), constructible without a catalog
//! entry. A distinguished default skin lives outside the catalog and is the
//! fallback whenever resolution or decoding fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::warn;

use crate::catalog::Descriptor;
use crate::config::ClientConfig;
use crate::manager::ResourceManager;
use crate::settings::{SettingKey, SettingsStore};
use crate::working::{ResourceKind, WorkingResource};

/// Key of the bundled default skin.
pub const DEFAULT_SKIN_KEY: &str = "skins/default/";

/// One skin catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinInfo {
    /// Content hash for imported skins; asset subdirectory ending in `/`
    /// for bundled ones.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Skin author.
    pub author: String,
}

impl SkinInfo {
    /// The default skin descriptor, outside any catalog.
    pub fn default_skin() -> Self {
        Self {
            key: DEFAULT_SKIN_KEY.to_string(),
            name: "Default".to_string(),
            author: "rhythm team".to_string(),
        }
    }

    /// Creates a descriptor for a bundled skin key.
    pub fn bundled(key: &str) -> Self {
        Self {
            key: key.to_string(),
            name: key.trim_end_matches('/').to_string(),
            author: "rhythm team".to_string(),
        }
    }

    /// Whether this skin ships with the client rather than the library.
    pub fn is_bundled(&self) -> bool {
        self.key.ends_with('/')
    }
}

impl Descriptor for SkinInfo {
    fn key(&self) -> &str {
        &self.key
    }

    fn title(&self) -> &str {
        &self.name
    }
}

/// Decoded skin configuration.
#[derive(Debug, Clone, Default)]
pub struct DecodedSkin {
    /// Parsed `skin.ini`-style properties.
    pub properties: HashMap<String, String>,
}

/// Skin decoding boundary; the real implementation reads the skin's
/// configuration and textures.
#[async_trait]
pub trait SkinDecoder: Send + Sync {
    async fn decode(&self, skin: &SkinInfo) -> anyhow::Result<DecodedSkin>;
}

/// A loaded skin.
pub struct WorkingSkin {
    source: SkinInfo,
    decoded: DecodedSkin,
    released: AtomicBool,
}

impl WorkingSkin {
    /// Looks up one decoded property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.decoded.properties.get(name).map(String::as_str)
    }

    /// Decoded configuration.
    pub fn decoded(&self) -> &DecodedSkin {
        &self.decoded
    }

    /// Whether this skin has been released by its manager. Holders that
    /// kept an `Arc` past a switch can use this to drop stale state.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl WorkingResource for WorkingSkin {
    type Descriptor = SkinInfo;

    fn source(&self) -> &SkinInfo {
        &self.source
    }

    fn release(&self) {
        // Textures and caches are owned by the decoder side; here release
        // only marks the wrapper dead so stale holders can be detected.
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Resolves a persisted selection key against a catalog.
///
/// The default key and unknown keys resolve to the default skin; bundled
/// keys resolve without needing a catalog entry.
pub fn resolve_key(catalog: &[SkinInfo], key: &str) -> SkinInfo {
    if key == DEFAULT_SKIN_KEY {
        return SkinInfo::default_skin();
    }
    if key.ends_with('/') {
        return SkinInfo::bundled(key);
    }
    catalog
        .iter()
        .find(|skin| skin.key == key)
        .cloned()
        .unwrap_or_else(SkinInfo::default_skin)
}

/// The skin flavor: catalog-order navigation with the default skin
/// appended last, bootstrap by re-resolving the persisted selection key.
pub struct SkinKind {
    decoder: Arc<dyn SkinDecoder>,
    persisted_key: String,
}

impl SkinKind {
    pub fn new(decoder: Arc<dyn SkinDecoder>, persisted_key: String) -> Self {
        Self {
            decoder,
            persisted_key,
        }
    }
}

#[async_trait]
impl ResourceKind for SkinKind {
    type Descriptor = SkinInfo;
    type Working = WorkingSkin;

    async fn load(&self, descriptor: &SkinInfo) -> anyhow::Result<WorkingSkin> {
        let decoded = self.decoder.decode(descriptor).await?;
        Ok(WorkingSkin {
            source: descriptor.clone(),
            decoded,
            released: AtomicBool::new(false),
        })
    }

    fn fallback(&self) -> WorkingSkin {
        WorkingSkin {
            source: SkinInfo::default_skin(),
            decoded: DecodedSkin::default(),
            released: AtomicBool::new(false),
        }
    }

    /// Raw catalog order with the default skin appended last, so `next`
    /// cycles through every installed skin and ends on the default.
    fn navigation_order(&self, catalog: &[SkinInfo]) -> Vec<SkinInfo> {
        let mut order = catalog.to_vec();
        if !order.iter().any(|skin| skin.key == DEFAULT_SKIN_KEY) {
            order.push(SkinInfo::default_skin());
        }
        order
    }

    /// Re-resolves the persisted selection key instead of picking randomly.
    fn bootstrap_selection(&self, order: &[SkinInfo]) -> Option<SkinInfo> {
        Some(resolve_key(order, &self.persisted_key))
    }
}

/// Skin manager: the generic manager plus the settings binding that
/// re-resolves the selection when the persisted key changes.
///
/// The manager never writes the key itself; external callers update the
/// setting and the bound observer turns that into a switch.
pub struct SkinManager {
    inner: Arc<ResourceManager<SkinKind>>,
}

impl SkinManager {
    pub fn new(
        decoder: Arc<dyn SkinDecoder>,
        settings: &SettingsStore,
        cfg: &ClientConfig,
        handle: &Handle,
    ) -> Self {
        let persisted_key = settings
            .get(SettingKey::UiSkin)
            .as_text()
            .map(str::to_string)
            .unwrap_or_else(|| cfg.skin_key.clone());

        let kind = SkinKind::new(decoder, persisted_key);
        let inner = Arc::new(ResourceManager::new(kind, cfg, handle));

        // Weak so an abandoned manager does not stay alive through the
        // settings binding.
        let weak = Arc::downgrade(&inner);
        let handle = handle.clone();
        settings.bind_observer(SettingKey::UiSkin, move |value| {
            let Some(key) = value.as_text().map(str::to_string) else {
                return;
            };
            let Some(manager) = weak.upgrade() else {
                return;
            };
            handle.spawn(async move {
                let target = resolve_key(&manager.catalog(), &key);
                manager.switch_to(target, false).await;
            });
        });

        Self { inner }
    }

    /// The underlying resource manager.
    pub fn manager(&self) -> &ResourceManager<SkinKind> {
        &self.inner
    }

    /// The current working skin.
    pub fn current(&self) -> Option<Arc<WorkingSkin>> {
        self.inner.current()
    }

    /// Stops the manager lane and releases the current skin.
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.inner) {
            Ok(manager) => manager.shutdown().await,
            Err(_) => warn!("Skin manager still shared, skipping shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubDecoder;

    #[async_trait]
    impl SkinDecoder for StubDecoder {
        async fn decode(&self, skin: &SkinInfo) -> anyhow::Result<DecodedSkin> {
            let mut properties = HashMap::new();
            properties.insert("name".to_string(), skin.name.clone());
            Ok(DecodedSkin { properties })
        }
    }

    fn skin(key: &str, name: &str) -> SkinInfo {
        SkinInfo {
            key: key.to_string(),
            name: name.to_string(),
            author: "someone".to_string(),
        }
    }

    fn kind() -> SkinKind {
        SkinKind::new(Arc::new(StubDecoder), DEFAULT_SKIN_KEY.to_string())
    }

    #[test]
    fn resolve_prefers_catalog_entry() {
        let catalog = vec![skin("abc123", "Neon")];
        assert_eq!(resolve_key(&catalog, "abc123"), catalog[0]);
    }

    #[test]
    fn resolve_unknown_falls_back_to_default() {
        let resolved = resolve_key(&[], "missing");
        assert_eq!(resolved.key, DEFAULT_SKIN_KEY);
    }

    #[test]
    fn resolve_bundled_needs_no_catalog() {
        let resolved = resolve_key(&[], "skins/classic/");
        assert_eq!(resolved.key, "skins/classic/");
        assert!(resolved.is_bundled());
    }

    #[test]
    fn navigation_order_appends_default_last() {
        let kind = kind();
        let catalog = vec![skin("abc123", "Neon"), skin("def456", "Mono")];
        let order = kind.navigation_order(&catalog);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0].key, "abc123");
        assert_eq!(order.last().map(|s| s.key.as_str()), Some(DEFAULT_SKIN_KEY));
    }

    #[test]
    fn bootstrap_resolves_persisted_key() {
        let kind = SkinKind::new(Arc::new(StubDecoder), "def456".to_string());
        let order = kind.navigation_order(&[skin("abc123", "Neon"), skin("def456", "Mono")]);
        let pick = kind.bootstrap_selection(&order);
        assert_eq!(pick.map(|s| s.key), Some("def456".to_string()));
    }

    #[tokio::test]
    async fn load_exposes_decoded_properties() {
        let kind = kind();
        let working = kind.load(&skin("abc123", "Neon")).await.unwrap();
        assert_eq!(working.property("name"), Some("Neon"));
        assert!(working.property("missing").is_none());
    }
}
