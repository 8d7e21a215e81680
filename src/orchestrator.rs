/*!
 * Subtitle orchestrator: the proxy download-translate-cache flow.
 *
 * Wires the catalog, translation engine, cache store, and progress registry
 * together. Every translation, interactive or batch, funnels through
 * [`ProgressRegistry::begin`], so the global gate decides who talks to the
 * LLM; the cache is checked before the gate is ever requested and is only
 * written with complete artifacts.
 */

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::app_settings::SettingsStore;
use crate::cache_store::{CacheMetadata, CacheStore};
use crate::catalog::{Catalog, SearchQuery};
use crate::errors::AppError;
use crate::progress::ProgressRegistry;
use crate::subtitle_codec::{self, Cue, SubtitleFormat};
use crate::translation_engine::TranslationEngine;

static FINGERPRINT_SANITIZE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]").unwrap());

/// Cache fingerprint for an embedded track of a video file.
pub fn embedded_fingerprint(video_file_name: &str, track_index: usize) -> String {
    format!(
        "embedded_{}_track{}",
        FINGERPRINT_SANITIZE_REGEX.replace_all(video_file_name, "_"),
        track_index
    )
}

/// One subtitle uploaded through the local index
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSubtitle {
    pub file_id: i64,
    pub file_name: String,
    pub title: String,
    #[serde(skip)]
    pub content: String,
}

/// Proxy-mode orchestration over the injected capabilities
pub struct SubtitleProxy {
    catalog: Arc<dyn Catalog>,
    engine: Arc<TranslationEngine>,
    cache: Arc<CacheStore>,
    progress: Arc<ProgressRegistry>,
    settings: Arc<SettingsStore>,
    local_counter: AtomicU64,
    next_local_id: AtomicI64,
    local_index: Mutex<Vec<LocalSubtitle>>,
}

impl SubtitleProxy {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        engine: Arc<TranslationEngine>,
        cache: Arc<CacheStore>,
        progress: Arc<ProgressRegistry>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        SubtitleProxy {
            catalog,
            engine,
            cache,
            progress,
            settings,
            local_counter: AtomicU64::new(1),
            next_local_id: AtomicI64::new(1),
            local_index: Mutex::new(Vec::new()),
        }
    }

    pub fn progress(&self) -> &Arc<ProgressRegistry> {
        &self.progress
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Search the catalog for English subtitles and relabel every result as
    /// the configured target language, flagged as machine translation.
    pub async fn proxy_search(&self, query: &SearchQuery) -> Result<Value, AppError> {
        let mut response = self.catalog.search(query).await?;
        let target_code = self.settings.snapshot().target_language_code();

        if let Some(data) = response.get_mut("data").and_then(|d| d.as_array_mut()) {
            for item in data {
                let Some(attributes) = item.get_mut("attributes").and_then(|a| a.as_object_mut())
                else {
                    continue;
                };
                attributes.insert("language".to_string(), json!(target_code));
                attributes.insert("ai_translated".to_string(), json!(true));
                attributes.insert("machine_translated".to_string(), json!(true));
                let relabeled = attributes
                    .get("release")
                    .and_then(|r| r.as_str())
                    .map(|r| format!("{} [Translated]", r));
                if let Some(release) = relabeled {
                    attributes.insert("release".to_string(), json!(release));
                }
            }
        }
        Ok(response)
    }

    /// Fetch a catalog subtitle, translate it, cache the pair, and return
    /// the translated document in the requested format. A cache hit skips
    /// both the catalog and the LLM.
    pub async fn proxy_download_and_translate(
        &self,
        file_id: i64,
        format: SubtitleFormat,
        requested_name: Option<&str>,
    ) -> Result<String, AppError> {
        let fingerprint = file_id.to_string();
        let settings = self.settings.snapshot();
        let target_language = settings.target_language.clone();
        let target_code = settings.target_language_code();

        if self.cache.has(&fingerprint, &target_code) {
            info!("Returning cached translation for file_id: {}", file_id);
            let translated = self.cache.load_translated(&fingerprint, &target_code)?;
            return Ok(convert_format(&translated, format));
        }

        info!("Downloading English subtitle from catalog for file_id: {}", file_id);
        let download = self.catalog.download(file_id).await?;
        let display_name = if !download.file_name.is_empty() {
            download.file_name.clone()
        } else {
            requested_name
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("subtitle_{}.srt", file_id))
        };

        let (_, cues) = subtitle_codec::parse(&download.content);
        if cues.is_empty() {
            return Err(AppError::Empty(format!(
                "subtitle {} contained no parseable cues",
                display_name
            )));
        }
        info!("Parsed {} cues from '{}'", cues.len(), display_name);

        let translated_cues = self
            .translate_under_gate(&fingerprint, &display_name, &cues, &target_language)
            .await?;
        let translated_srt = subtitle_codec::generate_srt(&translated_cues);

        self.cache.store(
            &fingerprint,
            Some(&download.content),
            &translated_srt,
            &target_code,
            &CacheMetadata {
                file_name: display_name,
                file_id: Some(file_id),
                ..Default::default()
            },
        )?;

        Ok(match format {
            SubtitleFormat::Srt => translated_srt,
            SubtitleFormat::Vtt => subtitle_codec::generate_vtt(&translated_cues),
        })
    }

    /// Whether a finished translation for this catalog file is cached in
    /// the current target language.
    pub fn is_cached(&self, file_id: i64) -> bool {
        let target_code = self.settings.snapshot().target_language_code();
        self.cache.has(&file_id.to_string(), &target_code)
    }

    /// Translate ad-hoc subtitle content under a synthetic fingerprint.
    /// Nothing is written to the cache; the result is always SRT.
    pub async fn translate_content(
        &self,
        content: &str,
        display_name: &str,
    ) -> Result<String, AppError> {
        let (_, cues) = subtitle_codec::parse(content);
        if cues.is_empty() {
            return Err(AppError::Empty(
                "no subtitle entries found in content".to_string(),
            ));
        }

        let fingerprint = format!("local_{}", self.local_counter.fetch_add(1, Ordering::SeqCst));
        let target_language = self.settings.snapshot().target_language;
        let translated = self
            .translate_under_gate(&fingerprint, display_name, &cues, &target_language)
            .await?;
        Ok(subtitle_codec::generate_srt(&translated))
    }

    /// Cached translation of an embedded track in the current target
    /// language, if one exists.
    pub fn cached_embedded(&self, video_file_name: &str, track_index: usize) -> Option<String> {
        let fingerprint = embedded_fingerprint(video_file_name, track_index);
        let target_code = self.settings.snapshot().target_language_code();
        if self.cache.has(&fingerprint, &target_code) {
            info!("Returning cached embedded translation for: {}", fingerprint);
            self.cache.load_translated(&fingerprint, &target_code).ok()
        } else {
            None
        }
    }

    /// Translate an extracted embedded track and cache it under its
    /// content-backed fingerprint.
    pub async fn translate_embedded_content(
        &self,
        video_path: &str,
        video_file_name: &str,
        track_index: usize,
        extracted_srt: &str,
    ) -> Result<String, AppError> {
        let (_, cues) = subtitle_codec::parse(extracted_srt);
        if cues.is_empty() {
            return Err(AppError::Empty(format!(
                "track {} of {} contained no parseable cues",
                track_index, video_file_name
            )));
        }

        let fingerprint = embedded_fingerprint(video_file_name, track_index);
        let settings = self.settings.snapshot();
        let translated_cues = self
            .translate_under_gate(&fingerprint, video_file_name, &cues, &settings.target_language)
            .await?;
        let translated_srt = subtitle_codec::generate_srt(&translated_cues);

        self.cache.store(
            &fingerprint,
            Some(extracted_srt),
            &translated_srt,
            &settings.target_language_code(),
            &CacheMetadata {
                file_name: video_file_name.to_string(),
                video_path: Some(video_path.to_string()),
                track_index: Some(track_index),
                ..Default::default()
            },
        )?;

        Ok(translated_srt)
    }

    /// Add a subtitle to the local upload index.
    pub fn add_local_subtitle(&self, file_name: &str, content: &str) -> i64 {
        let file_id = self.next_local_id.fetch_add(1, Ordering::SeqCst);
        let title = title_from_file_name(file_name);
        self.local_index.lock().unwrap().push(LocalSubtitle {
            file_id,
            file_name: file_name.to_string(),
            title,
            content: content.to_string(),
        });
        info!("Added new subtitle: {} with ID {}", file_name, file_id);
        file_id
    }

    /// Uploaded subtitles, newest last.
    pub fn local_subtitles(&self) -> Vec<LocalSubtitle> {
        self.local_index.lock().unwrap().clone()
    }

    /// Run a translation while holding the global gate, reporting per-batch
    /// progress to the registry. The registry permit is released on every
    /// exit path because it is held by value.
    async fn translate_under_gate(
        &self,
        fingerprint: &str,
        display_name: &str,
        cues: &[Cue],
        target_language: &str,
    ) -> Result<Vec<Cue>, AppError> {
        let permit = self
            .progress
            .begin(fingerprint, display_name, cues.len())
            .await;

        let registry = Arc::clone(&self.progress);
        let progress_fingerprint = fingerprint.to_string();
        let on_progress = move |completed: usize| {
            registry.update(&progress_fingerprint, completed);
        };
        let on_progress: &crate::translation_engine::ProgressFn = &on_progress;

        let result = self
            .engine
            .translate_cues(cues, target_language, Some(on_progress))
            .await;
        drop(permit);

        Ok(result?)
    }
}

/// Convert a cached SRT artifact into the requested output format.
fn convert_format(translated_srt: &str, format: SubtitleFormat) -> String {
    match format {
        SubtitleFormat::Srt => translated_srt.to_string(),
        SubtitleFormat::Vtt => {
            let cues = subtitle_codec::parse_srt(translated_srt);
            subtitle_codec::generate_vtt(&cues)
        }
    }
}

/// Searchable title from an uploaded file name.
fn title_from_file_name(file_name: &str) -> String {
    let base = file_name
        .strip_suffix(".srt")
        .or_else(|| file_name.strip_suffix(".vtt"))
        .unwrap_or(file_name);
    base.replace(['.', '_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
