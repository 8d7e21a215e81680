/*!
 * Shared test utilities: mock implementations of the injected capabilities
 * (chat provider, catalog, demuxer) so no test ever talks to a real
 * external service, plus fixture helpers.
 */

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tempfile::TempDir;

use subrelay::app_settings::SettingsStore;
use subrelay::cache_store::CacheStore;
use subrelay::catalog::{Catalog, DownloadResult, SearchQuery};
use subrelay::demuxer::{Demuxer, SubtitleTrack};
use subrelay::errors::{AppError, ProviderError};
use subrelay::orchestrator::SubtitleProxy;
use subrelay::progress::ProgressRegistry;
use subrelay::providers::ChatProvider;
use subrelay::translation_engine::TranslationEngine;

static PROMPT_MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^<<~(\d+)~>> (.*)$").unwrap());

type Responder = dyn Fn(usize, &str, &str) -> Result<String, ProviderError> + Send + Sync;

/// Scripted chat provider. The responder closure receives the zero-based
/// call number plus the system and user prompts.
pub struct MockChatProvider {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockChatProvider {
    pub fn with_responder(
        responder: impl Fn(usize, &str, &str) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(MockChatProvider {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Echo every marked cue back with a prefix, as a well-behaved model
    /// would translate it.
    pub fn echo_marked(prefix: &'static str) -> Arc<Self> {
        Self::with_responder(move |_, _, user| {
            let mut response = String::new();
            for caps in PROMPT_MARKER_REGEX.captures_iter(user) {
                response.push_str(&format!("<<~{}~>> {}{}\n", &caps[1], prefix, &caps[2]));
            }
            Ok(response)
        })
    }

    /// Always return the same response text.
    pub fn fixed(response: &'static str) -> Arc<Self> {
        Self::with_responder(move |_, _, _| Ok(response.to_string()))
    }

    /// Always fail with a connection error.
    pub fn unreachable() -> Arc<Self> {
        Self::with_responder(|_, _, _| {
            Err(ProviderError::ConnectionError("mock provider is down".to_string()))
        })
    }

    /// Slow variant for gate-ordering tests.
    pub fn echo_marked_with_delay(prefix: &'static str, delay: Duration) -> Arc<Self> {
        let inner = Self::echo_marked(prefix);
        Arc::new(MockChatProvider {
            responder: Box::new(move |call: usize, system: &str, user: &str| {
                (inner.responder)(call, system, user)
            }),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(call, system, user)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// In-memory catalog with call spies.
pub struct MockCatalog {
    subtitles: HashMap<i64, DownloadResult>,
    search_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(MockCatalog {
            subtitles: HashMap::new(),
            search_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        })
    }

    pub fn with_subtitle(file_id: i64, content: &str, file_name: &str) -> Arc<Self> {
        let mut subtitles = HashMap::new();
        subtitles.insert(
            file_id,
            DownloadResult {
                content: content.to_string(),
                file_name: file_name.to_string(),
            },
        );
        Arc::new(MockCatalog {
            subtitles,
            search_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        })
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn search(&self, _query: &SearchQuery) -> Result<Value, AppError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "total_pages": 1,
            "total_count": 1,
            "per_page": 20,
            "page": 1,
            "data": [
                {
                    "id": "100",
                    "type": "subtitle",
                    "attributes": {
                        "subtitle_id": "100",
                        "language": "en",
                        "ai_translated": false,
                        "machine_translated": false,
                        "release": "Some.Movie.2023",
                        "files": [{ "file_id": 100, "file_name": "some.movie.srt" }],
                    }
                }
            ],
        }))
    }

    async fn download(&self, file_id: i64) -> Result<DownloadResult, AppError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.subtitles
            .get(&file_id)
            .cloned()
            .ok_or_else(|| AppError::BadInput(format!("unknown file_id {}", file_id)))
    }
}

/// Demuxer stub that reads a magic word from the analyzed file: files
/// containing `ENG` report one English track, everything else none.
pub struct StubDemuxer {
    extracted_srt: String,
}

impl StubDemuxer {
    pub fn new(extracted_srt: &str) -> Arc<Self> {
        Arc::new(StubDemuxer {
            extracted_srt: extracted_srt.to_string(),
        })
    }
}

#[async_trait]
impl Demuxer for StubDemuxer {
    fn is_available(&self) -> bool {
        true
    }

    async fn subtitle_tracks(&self, video_path: &Path) -> Result<Vec<SubtitleTrack>, AppError> {
        let content = std::fs::read_to_string(video_path).unwrap_or_default();
        if content.contains("ENG") {
            Ok(vec![SubtitleTrack {
                index: 0,
                language: "eng".to_string(),
                codec: "subrip".to_string(),
                title: String::new(),
                display_name: "English".to_string(),
                language_display: "English".to_string(),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn extract_track(
        &self,
        _video_path: &Path,
        _track_index: usize,
    ) -> Result<String, AppError> {
        Ok(self.extracted_srt.clone())
    }
}

/// Everything a proxy-flow test needs, rooted in one temp directory.
pub struct TestHarness {
    pub temp: TempDir,
    pub settings: Arc<SettingsStore>,
    pub cache: Arc<CacheStore>,
    pub progress: Arc<ProgressRegistry>,
    pub proxy: Arc<SubtitleProxy>,
}

/// Build a proxy over mock catalog and provider, with settings and cache
/// isolated in a fresh temp directory.
pub fn build_harness(
    catalog: Arc<dyn Catalog>,
    provider: Arc<dyn ChatProvider>,
    target_language: &str,
) -> TestHarness {
    let temp = TempDir::new().expect("temp dir");
    let settings = test_settings(&temp, target_language);
    let cache = Arc::new(CacheStore::new(temp.path().join("cache")).expect("cache root"));
    let progress = ProgressRegistry::new();
    let engine = Arc::new(TranslationEngine::new(provider, settings.clone()));
    let proxy = Arc::new(SubtitleProxy::new(
        catalog,
        engine,
        cache.clone(),
        progress.clone(),
        settings.clone(),
    ));
    TestHarness {
        temp,
        settings,
        cache,
        progress,
        proxy,
    }
}

/// Settings store isolated in a temp directory.
pub fn test_settings(temp: &TempDir, target_language: &str) -> Arc<SettingsStore> {
    let settings = Arc::new(SettingsStore::load(
        temp.path().join("app-settings.json"),
        temp.path().join("language-config.json"),
    ));
    settings
        .update(|s| s.target_language = target_language.to_string())
        .expect("settings update");
    settings
}

/// Two-cue sample document used across tests.
pub fn sample_srt() -> &'static str {
    "1\n00:00:01,000 --> 00:00:03,500\nHello\n\n2\n00:00:04,000 --> 00:00:05,000\nWorld\n"
}
