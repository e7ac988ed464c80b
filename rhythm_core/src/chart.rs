//! Chart (beatmap) manager flavor.
//!
//! Charts arrive from the library store grouped in sets; the manager works
//! on the flattened chart list. The navigation order backs the music
//! player: one chart per song (an audio track within its set), shuffled
//! once per catalog snapshot so skipping around feels random but stable
//! until the library changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::catalog::Descriptor;
use crate::config::ClientConfig;
use crate::manager::ResourceManager;
use crate::working::{ResourceKind, WorkingResource};

/// Identity key of the built-in silent chart used as the fallback.
pub const SILENT_CHART_KEY: &str = "builtin/silence";

/// One playable chart inside a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartInfo {
    /// Content hash, the identity key.
    pub hash: String,
    /// Song title.
    pub title: String,
    /// Song artist.
    pub artist: String,
    /// Audio filename within the set; charts sharing it are difficulties
    /// of the same song.
    pub audio: String,
    /// Parent set id.
    pub set_id: u64,
}

impl ChartInfo {
    /// The built-in silent chart, outside any catalog.
    pub fn silent() -> Self {
        Self {
            hash: SILENT_CHART_KEY.to_string(),
            title: "No music".to_string(),
            artist: String::new(),
            audio: String::new(),
            set_id: 0,
        }
    }
}

impl Descriptor for ChartInfo {
    fn key(&self) -> &str {
        &self.hash
    }

    fn group_key(&self) -> &str {
        &self.audio
    }

    fn title(&self) -> &str {
        &self.title
    }
}

/// A persisted chart set (one import), grouping difficulties of one or
/// more songs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSet {
    pub id: u64,
    pub charts: Vec<ChartInfo>,
}

/// Flattens set snapshots into the chart list the manager consumes.
pub fn flatten_sets(sets: &[ChartSet]) -> Vec<ChartInfo> {
    sets.iter().flat_map(|set| set.charts.clone()).collect()
}

/// Decoded runtime state of a chart.
#[derive(Debug, Clone, Default)]
pub struct DecodedChart {
    /// Resolved audio file path; `None` for the silent fallback.
    pub audio_path: Option<String>,
    /// Track length in milliseconds.
    pub length_ms: u32,
}

/// Chart decoding boundary; the real implementation parses the chart file
/// and resolves its assets.
#[async_trait]
pub trait ChartDecoder: Send + Sync {
    async fn decode(&self, chart: &ChartInfo) -> anyhow::Result<DecodedChart>;
}

/// Playback seam consumed by working charts.
pub trait AudioOutput: Send + Sync {
    fn play(&self, path: &str, volume: f32);
    fn stop(&self);
}

/// A loaded chart holding its decoded assets and playback handle.
pub struct WorkingChart {
    source: ChartInfo,
    decoded: DecodedChart,
    audio: Arc<dyn AudioOutput>,
    volume: f32,
    autoplay: bool,
    playing: AtomicBool,
    released: AtomicBool,
}

impl WorkingChart {
    /// Starts playback. No effect on the silent fallback or after release.
    pub fn play(&self) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        if let Some(path) = &self.decoded.audio_path {
            if !self.playing.swap(true, Ordering::SeqCst) {
                self.audio.play(path, self.volume);
            }
        }
    }

    /// Decoded runtime state.
    pub fn decoded(&self) -> &DecodedChart {
        &self.decoded
    }

    /// Whether playback was started and not yet stopped.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl WorkingResource for WorkingChart {
    type Descriptor = ChartInfo;

    fn source(&self) -> &ChartInfo {
        &self.source
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) && self.playing.swap(false, Ordering::SeqCst)
        {
            self.audio.stop();
        }
    }

    fn activate(&self) {
        if self.autoplay {
            self.play();
        }
    }
}

/// The chart flavor: shuffled per-song navigation, random bootstrap pick,
/// silent fallback.
pub struct ChartKind {
    decoder: Arc<dyn ChartDecoder>,
    audio: Arc<dyn AudioOutput>,
    volume: f32,
    autoplay: bool,
}

impl ChartKind {
    pub fn new(
        decoder: Arc<dyn ChartDecoder>,
        audio: Arc<dyn AudioOutput>,
        cfg: &ClientConfig,
    ) -> Self {
        Self {
            decoder,
            audio,
            volume: cfg.music_volume,
            autoplay: cfg.autoplay,
        }
    }

    fn working(&self, source: ChartInfo, decoded: DecodedChart) -> WorkingChart {
        WorkingChart {
            source,
            decoded,
            audio: self.audio.clone(),
            volume: self.volume,
            autoplay: self.autoplay,
            playing: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ResourceKind for ChartKind {
    type Descriptor = ChartInfo;
    type Working = WorkingChart;

    async fn load(&self, descriptor: &ChartInfo) -> anyhow::Result<WorkingChart> {
        let decoded = self.decoder.decode(descriptor).await?;
        Ok(self.working(descriptor.clone(), decoded))
    }

    fn fallback(&self) -> WorkingChart {
        self.working(ChartInfo::silent(), DecodedChart::default())
    }

    /// One chart per song (first difficulty wins), shuffled. A song is an
    /// audio track within its set; the same filename in an unrelated set
    /// is a different song and keeps its own entry. The shuffle is redone
    /// only when a new snapshot arrives, so the order is stable while the
    /// library is unchanged.
    fn navigation_order(&self, catalog: &[ChartInfo]) -> Vec<ChartInfo> {
        let mut order: Vec<ChartInfo> = Vec::new();
        for chart in catalog {
            if !order
                .iter()
                .any(|c| c.set_id == chart.set_id && c.audio == chart.audio)
            {
                order.push(chart.clone());
            }
        }
        order.shuffle(&mut rand::thread_rng());
        order
    }

    /// Uniformly random pick, so the client boots on a different song each
    /// run.
    fn bootstrap_selection(&self, order: &[ChartInfo]) -> Option<ChartInfo> {
        order.choose(&mut rand::thread_rng()).cloned()
    }
}

/// Manager over the chart flavor.
pub type ChartManager = ResourceManager<ChartKind>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingAudio {
        events: Mutex<Vec<String>>,
    }

    impl RecordingAudio {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AudioOutput for RecordingAudio {
        fn play(&self, path: &str, _volume: f32) {
            self.events.lock().unwrap().push(format!("play {path}"));
        }

        fn stop(&self) {
            self.events.lock().unwrap().push("stop".to_string());
        }
    }

    struct StubDecoder;

    #[async_trait]
    impl ChartDecoder for StubDecoder {
        async fn decode(&self, chart: &ChartInfo) -> anyhow::Result<DecodedChart> {
            Ok(DecodedChart {
                audio_path: Some(format!("/songs/{}", chart.audio)),
                length_ms: 1000,
            })
        }
    }

    fn chart(hash: &str, audio: &str, set_id: u64) -> ChartInfo {
        ChartInfo {
            hash: hash.to_string(),
            title: hash.to_string(),
            artist: "artist".to_string(),
            audio: audio.to_string(),
            set_id,
        }
    }

    fn kind(audio: Arc<RecordingAudio>) -> ChartKind {
        ChartKind::new(Arc::new(StubDecoder), audio, &ClientConfig::default())
    }

    #[test]
    fn flatten_preserves_set_order() {
        let sets = vec![
            ChartSet {
                id: 1,
                charts: vec![chart("a", "x.mp3", 1), chart("b", "x.mp3", 1)],
            },
            ChartSet {
                id: 2,
                charts: vec![chart("c", "y.mp3", 2)],
            },
        ];
        let flat = flatten_sets(&sets);
        assert_eq!(
            flat.iter().map(|c| c.key()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn navigation_order_dedupes_audio_within_a_set() {
        let kind = kind(RecordingAudio::new());
        let catalog = vec![
            chart("a", "x.mp3", 1),
            chart("b", "x.mp3", 1),
            chart("c", "y.mp3", 2),
        ];
        let order = kind.navigation_order(&catalog);
        assert_eq!(order.len(), 2);
        let audios: Vec<&str> = order.iter().map(|c| c.group_key()).collect();
        assert!(audios.contains(&"x.mp3"));
        assert!(audios.contains(&"y.mp3"));
    }

    #[test]
    fn same_audio_name_across_sets_stays_navigable() {
        let kind = kind(RecordingAudio::new());
        // Generic filenames like "audio.mp3" recur across unrelated sets;
        // each set keeps its own song.
        let catalog = vec![chart("a", "audio.mp3", 1), chart("b", "audio.mp3", 2)];
        let order = kind.navigation_order(&catalog);
        assert_eq!(order.len(), 2);
        let hashes: Vec<&str> = order.iter().map(|c| c.key()).collect();
        assert!(hashes.contains(&"a"));
        assert!(hashes.contains(&"b"));
    }

    #[test]
    fn bootstrap_picks_from_order() {
        let kind = kind(RecordingAudio::new());
        assert!(kind.bootstrap_selection(&[]).is_none());
        let order = vec![chart("a", "x.mp3", 1)];
        assert_eq!(kind.bootstrap_selection(&order), Some(order[0].clone()));
    }

    #[tokio::test]
    async fn activate_plays_and_release_stops_once() {
        let audio = RecordingAudio::new();
        let kind = kind(audio.clone());

        let working = kind.load(&chart("a", "x.mp3", 1)).await.unwrap();
        working.activate();
        assert!(working.is_playing());

        working.release();
        working.release();
        assert_eq!(audio.events(), vec!["play /songs/x.mp3", "stop"]);
    }

    #[tokio::test]
    async fn released_chart_refuses_playback() {
        let audio = RecordingAudio::new();
        let kind = kind(audio.clone());

        let working = kind.load(&chart("a", "x.mp3", 1)).await.unwrap();
        working.release();
        working.play();
        assert!(audio.events().is_empty());
    }

    #[test]
    fn fallback_is_silent() {
        let audio = RecordingAudio::new();
        let kind = kind(audio.clone());

        let fallback = kind.fallback();
        assert_eq!(fallback.source().key(), SILENT_CHART_KEY);
        fallback.activate();
        assert!(!fallback.is_playing());
        assert!(audio.events().is_empty());
    }
}
