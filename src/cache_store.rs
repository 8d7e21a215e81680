/*!
 * Content-addressed subtitle cache.
 *
 * Every translation work item owns one directory under the cache root, keyed
 * by its fingerprint, holding the fetched English source, the translated
 * artifact per target language, and a small metadata document:
 *
 * ```text
 * <root>/<fingerprint>/original.srt
 * <root>/<fingerprint>/translated_<lang>.srt
 * <root>/<fingerprint>/metadata.json
 * ```
 *
 * The existence of a `translated_<lang>.srt` file is the cache-hit signal,
 * so translated artifacts are written through a temp-file-plus-rename and a
 * reader can never observe a partial one.
 */

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

const ORIGINAL_FILE: &str = "original.srt";
const METADATA_FILE: &str = "metadata.json";

/// Metadata stored alongside a cache entry
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_index: Option<usize>,
}

/// One cache entry as reported to the dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: String,
    pub file_name: Option<String>,
    /// Target language codes with a finished translation
    pub languages: Vec<String>,
    /// False while only the original has been fetched
    pub ready: bool,
}

/// Filesystem-backed cache of translated subtitles
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Cache root, `~/.subtitle-cache`
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".subtitle-cache")
    }

    pub fn new(root: PathBuf) -> Result<Self, AppError> {
        fs::create_dir_all(&root)?;
        Ok(CacheStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a finished translation exists for this fingerprint and language.
    pub fn has(&self, fingerprint: &str, lang: &str) -> bool {
        self.entry_dir(fingerprint)
            .map(|dir| dir.join(translated_name(lang)).is_file())
            .unwrap_or(false)
    }

    /// Read the translated artifact for a fingerprint and language.
    pub fn load_translated(&self, fingerprint: &str, lang: &str) -> Result<String, AppError> {
        let path = self.entry_dir(fingerprint)?.join(translated_name(lang));
        if !path.is_file() {
            return Err(AppError::BadInput(format!(
                "no cached translation for {} in {}",
                fingerprint, lang
            )));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Store a finished translation, plus the original source when available.
    ///
    /// Each file goes through a temp-file-plus-rename; the `translated_*`
    /// artifact lands last so its existence always implies a complete entry.
    pub fn store(
        &self,
        fingerprint: &str,
        original: Option<&str>,
        translated: &str,
        lang: &str,
        metadata: &CacheMetadata,
    ) -> Result<(), AppError> {
        let dir = self.entry_dir(fingerprint)?;
        fs::create_dir_all(&dir)?;

        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| AppError::Internal(format!("metadata serialization failed: {}", e)))?;
        write_atomic(&dir.join(METADATA_FILE), &metadata_json)?;

        if let Some(original) = original {
            write_atomic(&dir.join(ORIGINAL_FILE), original)?;
        }
        write_atomic(&dir.join(translated_name(lang)), translated)?;

        info!("Cached translation for {} ({})", fingerprint, lang);
        Ok(())
    }

    /// Enumerate all cache entries, including in-progress ones that only
    /// have an original so far.
    pub fn list(&self) -> Result<Vec<CacheEntry>, AppError> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            if !dir_entry.path().is_dir() {
                continue;
            }
            let fingerprint = dir_entry.file_name().to_string_lossy().to_string();

            let mut languages = Vec::new();
            let mut has_any_file = false;
            for file in fs::read_dir(dir_entry.path())? {
                let name = file?.file_name().to_string_lossy().to_string();
                if name == ORIGINAL_FILE {
                    has_any_file = true;
                } else if let Some(lang) = name
                    .strip_prefix("translated_")
                    .and_then(|rest| rest.strip_suffix(".srt"))
                {
                    has_any_file = true;
                    languages.push(lang.to_string());
                }
            }
            if !has_any_file {
                continue;
            }

            let file_name = self.read_metadata(&fingerprint).map(|m| m.file_name);
            languages.sort();
            entries.push(CacheEntry {
                fingerprint,
                file_name,
                ready: !languages.is_empty(),
                languages,
            });
        }
        entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        Ok(entries)
    }

    /// Metadata for one entry, if present and parseable.
    pub fn read_metadata(&self, fingerprint: &str) -> Option<CacheMetadata> {
        let path = self.entry_dir(fingerprint).ok()?.join(METADATA_FILE);
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Recursively delete one entry.
    pub fn delete(&self, fingerprint: &str) -> Result<(), AppError> {
        let dir = self.entry_dir(fingerprint)?;
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
            info!("Deleted cache entry {}", fingerprint);
        }
        Ok(())
    }

    /// Delete every entry under the cache root.
    pub fn clear(&self) -> Result<usize, AppError> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            if path.is_dir() {
                if let Err(e) = fs::remove_dir_all(&path) {
                    warn!("Failed to remove cache entry {:?}: {}", path, e);
                } else {
                    removed += 1;
                }
            }
        }
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    /// Directory for a fingerprint. Fingerprints are opaque identifiers, not
    /// paths; anything that would traverse out of the root is rejected
    /// before any I/O happens.
    fn entry_dir(&self, fingerprint: &str) -> Result<PathBuf, AppError> {
        if fingerprint.is_empty()
            || fingerprint.contains('/')
            || fingerprint.contains('\\')
            || fingerprint.contains("..")
        {
            return Err(AppError::BadInput(format!(
                "invalid cache fingerprint: {}",
                fingerprint
            )));
        }
        Ok(self.root.join(fingerprint))
    }
}

fn translated_name(lang: &str) -> String {
    format!("translated_{}.srt", lang)
}

/// Write UTF-8 content through a temp file in the same directory, then
/// rename over the destination.
fn write_atomic(path: &Path, content: &str) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
