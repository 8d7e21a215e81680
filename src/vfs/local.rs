/*!
 * Local-directory filesystem adapter, rooted at the configured path.
 *
 * Every incoming path is resolved against the root with a strict traversal
 * check before any I/O: a path whose normalization would escape the root is
 * rejected as bad input.
 */

use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use crate::app_settings::SettingsStore;
use crate::errors::AppError;
use crate::vfs::{self, FileEntry, FileSystem};

/// Local filesystem browser
pub struct LocalFs {
    settings: Arc<SettingsStore>,
}

impl LocalFs {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        LocalFs { settings }
    }

    fn root(&self) -> Result<PathBuf, AppError> {
        let root = self.settings.snapshot().local_root_path;
        if root.is_empty() {
            return Err(AppError::NotConfigured(
                "local root path is not set".to_string(),
            ));
        }
        Ok(PathBuf::from(root))
    }

    /// Resolve a relative path under the root. Rejects absolute paths and
    /// any `..` component outright, before touching the filesystem.
    fn resolve(&self, relative: &str) -> Result<PathBuf, AppError> {
        let root = self.root()?;
        let mut resolved = root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(AppError::BadInput(
                        "access denied: path outside root directory".to_string(),
                    ));
                }
            }
        }
        Ok(resolved)
    }

    fn relative_to_root(&self, path: &Path) -> String {
        let root = self.root().unwrap_or_default();
        path.strip_prefix(&root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[async_trait]
impl FileSystem for LocalFs {
    fn is_configured(&self) -> bool {
        match self.root() {
            Ok(root) => root.is_dir(),
            Err(_) => false,
        }
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        let root = self.root()?;
        if !root.exists() {
            return Err(AppError::BadInput(format!(
                "path does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(AppError::BadInput(format!(
                "path is not a directory: {}",
                root.display()
            )));
        }
        info!("Local file system test successful: {}", root.display());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>, AppError> {
        let dir = self.resolve(path)?;
        if !dir.is_dir() {
            return Err(AppError::BadInput(format!("directory not found: {}", path)));
        }

        // First pass: collect names so videos can be matched to sibling
        // subtitles by base name.
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            names.push((entry.file_name().to_string_lossy().to_string(), entry.path()));
        }
        let subtitle_names: Vec<String> = names
            .iter()
            .filter(|(name, path)| !path.is_dir() && vfs::is_subtitle_file(name))
            .map(|(name, _)| name.to_lowercase())
            .collect();

        let mut entries = Vec::new();
        for (name, full_path) in &names {
            let relative = self.relative_to_root(full_path);
            if full_path.is_dir() {
                entries.push(FileEntry {
                    name: name.clone(),
                    path: relative,
                    is_directory: true,
                    is_video: false,
                    has_subtitle: false,
                    is_subtitle: false,
                    language: None,
                });
            } else if vfs::is_video_file(name) {
                let base = vfs::base_name(name).to_lowercase();
                let has_subtitle = subtitle_names.iter().any(|sub| sub.starts_with(&base));
                entries.push(FileEntry {
                    name: name.clone(),
                    path: relative,
                    is_directory: false,
                    is_video: true,
                    has_subtitle,
                    is_subtitle: false,
                    language: None,
                });
            } else if vfs::is_subtitle_file(name) {
                entries.push(FileEntry {
                    name: name.clone(),
                    path: relative,
                    is_directory: false,
                    is_video: false,
                    has_subtitle: false,
                    is_subtitle: true,
                    language: vfs::detect_subtitle_language(name),
                });
            }
        }

        vfs::sort_entries(&mut entries);
        Ok(entries)
    }

    async fn read_subtitle(&self, path: &str) -> Result<String, AppError> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full)
            .map_err(|e| AppError::BadInput(format!("cannot read subtitle {}: {}", path, e)))
    }

    async fn write_subtitle(
        &self,
        video_path: &str,
        content: &str,
        lang_code: &str,
    ) -> Result<String, AppError> {
        let video = self.resolve(video_path)?;
        let video_name = video
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AppError::BadInput(format!("invalid video path: {}", video_path)))?;
        let subtitle_name = format!("{}.{}.srt", vfs::base_name(&video_name), lang_code);
        let subtitle_path = video
            .parent()
            .ok_or_else(|| AppError::BadInput(format!("video has no parent dir: {}", video_path)))?
            .join(&subtitle_name);

        fs::write(&subtitle_path, vfs::with_bom(content))?;
        info!("Saved subtitle to: {}", subtitle_path.display());
        Ok(self.relative_to_root(&subtitle_path))
    }

    async fn write_subtitle_direct(
        &self,
        subtitle_path: &str,
        content: &str,
    ) -> Result<(), AppError> {
        let full = self.resolve(subtitle_path)?;
        fs::write(&full, vfs::with_bom(content))?;
        info!("Saved subtitle directly to: {}", full.display());
        Ok(())
    }

    async fn download_to_temp(&self, path: &str) -> Result<PathBuf, AppError> {
        let source = self.resolve(path)?;
        let temp = vfs::temp_path("video_", path);
        fs::copy(&source, &temp)
            .map_err(|e| AppError::BadInput(format!("cannot copy video {}: {}", path, e)))?;
        info!("Copied video to temp file: {} -> {:?}", path, temp);
        Ok(temp)
    }

    async fn download_header_to_temp(
        &self,
        path: &str,
        max_bytes: u64,
    ) -> Result<PathBuf, AppError> {
        let source = self.resolve(path)?;
        let temp = vfs::temp_path("video_header_", path);

        let mut input = fs::File::open(&source)
            .map_err(|e| AppError::BadInput(format!("cannot open video {}: {}", path, e)))?;
        let mut output = fs::File::create(&temp)?;

        let mut remaining = max_bytes;
        let mut buffer = [0u8; 8192];
        while remaining > 0 {
            let read = input.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            let take = (read as u64).min(remaining) as usize;
            output.write_all(&buffer[..take])?;
            remaining -= take as u64;
        }
        output.flush()?;

        info!("Copied {} header bytes to {:?}", max_bytes - remaining, temp);
        Ok(temp)
    }
}
