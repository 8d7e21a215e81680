/*!
 * Virtual filesystem used by the browse and batch workflows.
 *
 * Two adapters satisfy the same contract: a local directory rooted at the
 * configured path, and an SMB share driven through the `smbclient` binary.
 * Paths crossing this interface are always relative to the adapter's root
 * and use forward slashes.
 */

pub mod local;
pub mod smb;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::app_settings::{BrowseMode, SettingsStore};
use crate::errors::AppError;
use crate::language;

/// Default header size for container analysis (20 MiB)
pub const HEADER_BYTES: u64 = 20 * 1024 * 1024;

/// UTF-8 byte order mark, prepended to subtitle files for player
/// compatibility.
pub const UTF8_BOM: &str = "\u{FEFF}";

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts",
];

const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub", "ass", "ssa", "vtt"];

// Language code embedded in a subtitle file name, e.g. "movie.he.srt"
static SUBTITLE_LANGUAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.([a-z]{2,3})\.[a-z]{3}$").unwrap());

// Release-name noise stripped when deriving a searchable title
static TITLE_NOISE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\[.*?\]",
        r"\(.*?\)",
        r"\d{3,4}p",
        r"(?i)(x264|x265|hevc|aac|bluray|webrip|hdtv|xvid)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// One directory entry as shown in the file browser
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub is_video: bool,
    /// For videos: a sibling subtitle with the same base name exists
    pub has_subtitle: bool,
    pub is_subtitle: bool,
    /// For subtitles: language detected from the file name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Filesystem the orchestrators browse, read, and write through
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whether the adapter has the settings it needs
    fn is_configured(&self) -> bool;

    /// Probe the backing storage; `Err` carries an actionable message.
    async fn test_connection(&self) -> Result<(), AppError>;

    /// List a directory, relative to the adapter root.
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>, AppError>;

    /// Read a subtitle file as UTF-8 text.
    async fn read_subtitle(&self, path: &str) -> Result<String, AppError>;

    /// Write subtitle content next to a video as
    /// `{basename}.{lang_code}.srt`; returns the written relative path.
    async fn write_subtitle(
        &self,
        video_path: &str,
        content: &str,
        lang_code: &str,
    ) -> Result<String, AppError>;

    /// Write subtitle content to an explicit relative path.
    async fn write_subtitle_direct(&self, subtitle_path: &str, content: &str)
        -> Result<(), AppError>;

    /// Copy a full file to a local temp path the demuxer can open.
    async fn download_to_temp(&self, path: &str) -> Result<PathBuf, AppError>;

    /// Copy only the first `max_bytes` of a file to a local temp path, for
    /// header-only track analysis.
    async fn download_header_to_temp(
        &self,
        path: &str,
        max_bytes: u64,
    ) -> Result<PathBuf, AppError>;
}

/// Whether a file name has a video extension.
pub fn is_video_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIDEO_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Whether a file name has a subtitle extension.
pub fn is_subtitle_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    SUBTITLE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// File name without its final extension.
pub fn base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// Language display name from a subtitle file name, e.g. `movie.he.srt`
/// gives "Hebrew".
pub fn detect_subtitle_language(name: &str) -> Option<String> {
    let caps = SUBTITLE_LANGUAGE_REGEX.captures(name)?;
    let code = caps.get(1)?.as_str();
    Some(language::display_name_for_tag(code))
}

/// Derive a human-searchable title from a video path by stripping release
/// tags, resolution markers, and codec noise.
pub fn extract_video_title(video_path: &str) -> String {
    let file_name = video_path.rsplit('/').next().unwrap_or(video_path);
    let mut title = base_name(file_name).to_string();
    for regex in TITLE_NOISE_REGEXES.iter() {
        title = regex.replace_all(&title, "").into_owned();
    }
    title = title.replace(['.', '_'], " ");
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ensure subtitle content starts with a UTF-8 BOM.
pub fn with_bom(content: &str) -> String {
    if content.starts_with(UTF8_BOM) {
        content.to_string()
    } else {
        format!("{}{}", UTF8_BOM, content)
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique temp path under the system temp directory. The prefix makes
/// leftover files attributable (`video_*`, `video_header_*`).
pub fn temp_path(prefix: &str, original_name: &str) -> PathBuf {
    let extension = original_name
        .rfind('.')
        .map(|dot| &original_name[dot..])
        .unwrap_or("");
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "{}{}_{}{}",
        prefix,
        std::process::id(),
        unique,
        extension
    ))
}

/// Delete a temp file, tolerating it already being gone.
pub fn cleanup_temp(path: &std::path::Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to delete temp file {:?}: {}", path, e);
        }
    }
}

/// Picks the active filesystem adapter from the configured browse mode.
pub struct VfsSelector {
    settings: Arc<SettingsStore>,
    local: Arc<local::LocalFs>,
    smb: Arc<smb::SmbFs>,
}

impl VfsSelector {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        VfsSelector {
            local: Arc::new(local::LocalFs::new(settings.clone())),
            smb: Arc::new(smb::SmbFs::new(settings.clone())),
            settings,
        }
    }

    /// Adapter for the currently configured browse mode.
    pub fn current(&self) -> Arc<dyn FileSystem> {
        self.for_mode(self.settings.snapshot().browse_mode)
    }

    /// Adapter for an explicit mode, used by the connection test endpoint.
    pub fn for_mode(&self, mode: BrowseMode) -> Arc<dyn FileSystem> {
        match mode {
            BrowseMode::Local => self.local.clone(),
            BrowseMode::Smb => self.smb.clone(),
        }
    }
}

/// Sort entries the way the browser shows them: directories first, then
/// case-insensitive by name.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}
