//! Client configuration.
//!
//! Loaded from JSON strings/files (file IO left to the app shell).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the client-side resource managers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Upper bound on loading one resource, in milliseconds. A load that
    /// exceeds this is treated as a construction failure so the manager's
    /// lane stays live.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Persisted skin selection key re-resolved at startup.
    #[serde(default = "default_skin_key")]
    pub skin_key: String,
    /// Whether a newly selected chart starts playing immediately.
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    /// Music volume, `0.0..=1.0`.
    #[serde(default = "default_music_volume")]
    pub music_volume: f32,
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_skin_key() -> String {
    crate::skin::DEFAULT_SKIN_KEY.to_string()
}

fn default_autoplay() -> bool {
    true
}

fn default_music_volume() -> f32 {
    1.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            skin_key: default_skin_key(),
            autoplay: default_autoplay(),
            music_volume: default_music_volume(),
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Load timeout as a [`Duration`].
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}
