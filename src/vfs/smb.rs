/*!
 * SMB share adapter driven through the `smbclient` binary.
 *
 * Each operation runs one short-lived smbclient command against the
 * configured share. Paths are relative to the share root with forward
 * slashes; smbclient itself wants backslashes inside `-c` commands.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::app_settings::{AppSettings, SettingsStore};
use crate::errors::AppError;
use crate::vfs::{self, FileEntry, FileSystem};

const SMB_TIMEOUT: Duration = Duration::from_secs(600);

// smbclient `ls` line: name, attribute letters, size, date
static LS_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s\s(.*?)\s+([ADHSRN]+)\s+(\d+)\s+\w{3}\s").unwrap());

/// SMB filesystem browser
pub struct SmbFs {
    settings: Arc<SettingsStore>,
}

impl SmbFs {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        SmbFs { settings }
    }

    fn share_url(settings: &AppSettings) -> String {
        format!("//{}/{}", settings.smb_host, settings.smb_share)
    }

    fn require_configured(&self) -> Result<AppSettings, AppError> {
        let settings = self.settings.snapshot();
        if settings.smb_host.is_empty() || settings.smb_share.is_empty() {
            return Err(AppError::NotConfigured(
                "SMB host and share are not set".to_string(),
            ));
        }
        Ok(settings)
    }

    fn base_command(settings: &AppSettings) -> Command {
        let mut cmd = Command::new("smbclient");
        cmd.arg(Self::share_url(settings));
        if settings.smb_username.is_empty() {
            cmd.arg("-N");
        } else {
            cmd.arg("-U").arg(format!(
                "{}%{}",
                settings.smb_username, settings.smb_password
            ));
        }
        if !settings.smb_domain.is_empty() {
            cmd.arg("-W").arg(&settings.smb_domain);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run one `-c` script against the share and return stdout.
    async fn run_script(&self, script: &str) -> Result<String, AppError> {
        let settings = self.require_configured()?;
        let mut cmd = Self::base_command(&settings);
        cmd.arg("-c").arg(script);
        debug!("smbclient script: {}", script);

        let output = tokio::time::timeout(SMB_TIMEOUT, cmd.output())
            .await
            .map_err(|_| AppError::UpstreamUnavailable("smbclient timed out".to_string()))?
            .map_err(|e| AppError::UpstreamUnavailable(format!("failed to run smbclient: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(AppError::UpstreamUnavailable(format!(
                "smbclient failed: {}",
                if stderr.trim().is_empty() { stdout } else { stderr }
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn to_remote(path: &str) -> String {
        path.replace('/', "\\")
    }
}

#[async_trait]
impl FileSystem for SmbFs {
    fn is_configured(&self) -> bool {
        self.require_configured().is_ok()
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        self.run_script("ls").await.map(|_| {
            info!("SMB connection test successful");
        })
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>, AppError> {
        let script = if path.is_empty() {
            "ls".to_string()
        } else {
            format!("cd \"{}\"; ls", Self::to_remote(path))
        };
        let output = self.run_script(&script).await?;

        let mut raw: Vec<(String, bool)> = Vec::new();
        for line in output.lines() {
            let Some(caps) = LS_LINE_REGEX.captures(line) else {
                continue;
            };
            let name = caps[1].trim_end().to_string();
            if name == "." || name == ".." || name.is_empty() {
                continue;
            }
            let is_directory = caps[2].contains('D');
            raw.push((name, is_directory));
        }

        let subtitle_names: Vec<String> = raw
            .iter()
            .filter(|(name, is_dir)| !is_dir && vfs::is_subtitle_file(name))
            .map(|(name, _)| name.to_lowercase())
            .collect();

        let mut entries = Vec::new();
        for (name, is_directory) in raw {
            let entry_path = if path.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", path.trim_end_matches('/'), name)
            };
            if is_directory {
                entries.push(FileEntry {
                    name,
                    path: entry_path,
                    is_directory: true,
                    is_video: false,
                    has_subtitle: false,
                    is_subtitle: false,
                    language: None,
                });
            } else if vfs::is_video_file(&name) {
                let base = vfs::base_name(&name).to_lowercase();
                let has_subtitle = subtitle_names.iter().any(|sub| sub.starts_with(&base));
                entries.push(FileEntry {
                    name,
                    path: entry_path,
                    is_directory: false,
                    is_video: true,
                    has_subtitle,
                    is_subtitle: false,
                    language: None,
                });
            } else if vfs::is_subtitle_file(&name) {
                let language = vfs::detect_subtitle_language(&name);
                entries.push(FileEntry {
                    name,
                    path: entry_path,
                    is_directory: false,
                    is_video: false,
                    has_subtitle: false,
                    is_subtitle: true,
                    language,
                });
            }
        }

        vfs::sort_entries(&mut entries);
        Ok(entries)
    }

    async fn read_subtitle(&self, path: &str) -> Result<String, AppError> {
        let temp = vfs::temp_path("subtitle_", path);
        let script = format!(
            "get \"{}\" \"{}\"",
            Self::to_remote(path),
            temp.display()
        );
        let result = self.run_script(&script).await;
        let content = match result {
            Ok(_) => std::fs::read_to_string(&temp)
                .map_err(|e| AppError::UpstreamUnavailable(format!("read of fetched subtitle failed: {}", e))),
            Err(e) => Err(e),
        };
        vfs::cleanup_temp(&temp);
        content
    }

    async fn write_subtitle(
        &self,
        video_path: &str,
        content: &str,
        lang_code: &str,
    ) -> Result<String, AppError> {
        let file_name = video_path.rsplit('/').next().unwrap_or(video_path);
        let subtitle_name = format!("{}.{}.srt", vfs::base_name(file_name), lang_code);
        let subtitle_path = match video_path.rfind('/') {
            Some(slash) => format!("{}/{}", &video_path[..slash], subtitle_name),
            None => subtitle_name,
        };
        self.write_subtitle_direct(&subtitle_path, content).await?;
        Ok(subtitle_path)
    }

    async fn write_subtitle_direct(
        &self,
        subtitle_path: &str,
        content: &str,
    ) -> Result<(), AppError> {
        let temp = vfs::temp_path("subtitle_put_", subtitle_path);
        std::fs::write(&temp, vfs::with_bom(content))?;
        let script = format!(
            "put \"{}\" \"{}\"",
            temp.display(),
            Self::to_remote(subtitle_path)
        );
        let result = self.run_script(&script).await.map(|_| {
            info!("Saved subtitle to SMB: {}", subtitle_path);
        });
        vfs::cleanup_temp(&temp);
        result
    }

    async fn download_to_temp(&self, path: &str) -> Result<PathBuf, AppError> {
        let temp = vfs::temp_path("video_", path);
        let script = format!(
            "get \"{}\" \"{}\"",
            Self::to_remote(path),
            temp.display()
        );
        match self.run_script(&script).await {
            Ok(_) => {
                info!("Downloaded SMB video to temp file: {:?}", temp);
                Ok(temp)
            }
            Err(e) => {
                vfs::cleanup_temp(&temp);
                Err(e)
            }
        }
    }

    async fn download_header_to_temp(
        &self,
        path: &str,
        max_bytes: u64,
    ) -> Result<PathBuf, AppError> {
        let settings = self.require_configured()?;
        let temp = vfs::temp_path("video_header_", path);

        // Stream the file to stdout and stop reading after the header; the
        // child is killed instead of transferring the whole video.
        let mut cmd = Self::base_command(&settings);
        cmd.arg("-c")
            .arg(format!("get \"{}\" -", Self::to_remote(path)))
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::UpstreamUnavailable(format!("failed to run smbclient: {}", e)))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Internal("smbclient stdout unavailable".to_string()))?;

        let copy = async {
            let mut output = tokio::fs::File::create(&temp).await?;
            let mut remaining = max_bytes;
            let mut buffer = vec![0u8; 64 * 1024];
            while remaining > 0 {
                let read = stdout.read(&mut buffer).await?;
                if read == 0 {
                    break;
                }
                let take = (read as u64).min(remaining) as usize;
                tokio::io::AsyncWriteExt::write_all(&mut output, &buffer[..take]).await?;
                remaining -= take as u64;
            }
            tokio::io::AsyncWriteExt::flush(&mut output).await?;
            Ok::<u64, std::io::Error>(max_bytes - remaining)
        };

        let copied = match tokio::time::timeout(SMB_TIMEOUT, copy).await {
            Ok(Ok(copied)) => copied,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                vfs::cleanup_temp(&temp);
                return Err(AppError::UpstreamUnavailable(format!(
                    "SMB header download failed: {}",
                    e
                )));
            }
            Err(_) => {
                let _ = child.kill().await;
                vfs::cleanup_temp(&temp);
                return Err(AppError::UpstreamUnavailable(
                    "SMB header download timed out".to_string(),
                ));
            }
        };

        if let Err(e) = child.kill().await {
            debug!("smbclient already exited: {}", e);
        }
        if copied == 0 {
            vfs::cleanup_temp(&temp);
            warn!("SMB header download produced no data for {}", path);
            return Err(AppError::UpstreamUnavailable(format!(
                "no data received for {}",
                path
            )));
        }

        info!("Copied {} header bytes from SMB to {:?}", copied, temp);
        Ok(temp)
    }
}
