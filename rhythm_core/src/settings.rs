//! Client settings.
//!
//! Typed key/value store with per-key change observers. The managers only
//! ever read these values; writers are the settings UI and the app shell,
//! and a bound observer is how a manager reacts to a change (e.g. the skin
//! manager re-resolving the persisted skin key).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A persisted client setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// UI scale factor.
    UiScaleFactor,
    /// Selected skin key.
    UiSkin,
    /// Prefer the chart-provided skin over the user skin.
    UseChartSkin,
    /// Music volume.
    MusicVolume,
}

impl SettingKey {
    /// The built-in default for this key.
    pub fn default_value(&self) -> SettingValue {
        match self {
            SettingKey::UiScaleFactor => SettingValue::Float(1.0),
            SettingKey::UiSkin => SettingValue::Text(crate::skin::DEFAULT_SKIN_KEY.to_string()),
            SettingKey::UseChartSkin => SettingValue::Toggle(true),
            SettingKey::MusicVolume => SettingValue::Float(1.0),
        }
    }
}

/// Typed setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Float(f32),
    Text(String),
    Toggle(bool),
}

impl SettingValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            SettingValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_toggle(&self) -> bool {
        matches!(self, SettingValue::Toggle(true))
    }
}

type SettingObserver = Arc<dyn Fn(&SettingValue) + Send + Sync>;

/// In-memory settings store with change notification.
#[derive(Default)]
pub struct SettingsStore {
    values: RwLock<HashMap<SettingKey, SettingValue>>,
    observers: RwLock<HashMap<SettingKey, Vec<SettingObserver>>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value, or the key's built-in default.
    pub fn get(&self, key: SettingKey) -> SettingValue {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
            .unwrap_or_else(|| key.default_value())
    }

    /// Stores a value and notifies every observer bound to the key.
    pub fn set(&self, key: SettingKey, value: SettingValue) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, value.clone());

        let bound: Vec<SettingObserver> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
            .unwrap_or_default();
        for observer in bound {
            observer(&value);
        }
    }

    /// Binds an observer invoked on every [`set`](Self::set) of `key`.
    pub fn bind_observer(
        &self,
        key: SettingKey,
        observer: impl Fn(&SettingValue) + Send + Sync + 'static,
    ) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key)
            .or_default()
            .push(Arc::new(observer));
    }
}
