/*!
 * # subrelay - Translating Subtitle Proxy
 *
 * A Rust server that presents the OpenSubtitles REST surface to
 * subtitle-capable clients while machine-translating every delivered
 * subtitle from English into a configured target language.
 *
 * ## Features
 *
 * - OpenSubtitles-compatible search and download endpoints
 * - Cue-aware LLM translation (Ollama or OpenAI) with marker re-alignment,
 *   line-count enforcement, and bidirectional text repair
 * - Content-addressed cache of translated artifacts
 * - A global translation gate so one job talks to the LLM at a time
 * - File browsing over a local directory or SMB share
 * - Embedded-track detection via ffmpeg and folder-level batch translation
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `subtitle_codec`: SRT/VTT parsing and generation
 * - `translation_engine`: batching LLM driver
 * - `bidi`: right-to-left text repair
 * - `cache_store`: translated-artifact cache
 * - `progress`: job registry and the translation gate
 * - `orchestrator`: the proxy download-translate-cache flow
 * - `batch`: folder batch workflow
 * - `catalog`, `providers`, `vfs`, `demuxer`: external adapters
 * - `server`: the axum HTTP surface
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Public modules
pub mod app_settings;
pub mod batch;
pub mod bidi;
pub mod cache_store;
pub mod catalog;
pub mod demuxer;
pub mod discovery;
pub mod errors;
pub mod language;
pub mod orchestrator;
pub mod progress;
pub mod providers;
pub mod server;
pub mod subtitle_codec;
pub mod translation_engine;
pub mod vfs;

// Re-export main types for easier usage
pub use app_settings::{AppSettings, SettingsStore};
pub use cache_store::CacheStore;
pub use errors::AppError;
pub use orchestrator::SubtitleProxy;
pub use progress::ProgressRegistry;
pub use subtitle_codec::{Cue, SubtitleFormat};
pub use translation_engine::TranslationEngine;
