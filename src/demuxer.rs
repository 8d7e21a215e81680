/*!
 * Embedded-subtitle demuxer backed by the ffmpeg/ffprobe binaries.
 *
 * Track enumeration reads only stream headers, so it works on the partial
 * header files the batch analyzer downloads. Track indexes are relative to
 * the subtitle streams (`0:s:N`), not absolute stream numbers.
 */

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;

use crate::errors::AppError;
use crate::language;
use crate::vfs;

const PROBE_TIMEOUT: Duration = Duration::from_secs(60);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);

/// One subtitle track inside a container file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    /// Index among the file's subtitle streams (maps to `0:s:N`)
    pub index: usize,
    pub language: String,
    pub codec: String,
    pub title: String,
    /// Label shown in the track picker
    pub display_name: String,
    pub language_display: String,
}

impl SubtitleTrack {
    fn new(index: usize, language: String, codec: String, title: String) -> Self {
        let language_display = language::display_name_for_tag(&language);
        let display_name = if !title.is_empty() {
            title.clone()
        } else if !language.is_empty() && language != "und" {
            language_display.clone()
        } else {
            format!("Track {}", index + 1)
        };
        SubtitleTrack {
            index,
            language,
            codec,
            title,
            display_name,
            language_display,
        }
    }
}

/// Container demuxing capability
#[async_trait]
pub trait Demuxer: Send + Sync {
    /// Whether the external tools were found at startup
    fn is_available(&self) -> bool;

    /// Enumerate subtitle tracks in a container file.
    async fn subtitle_tracks(&self, video_path: &Path) -> Result<Vec<SubtitleTrack>, AppError>;

    /// Extract one subtitle track as SRT text.
    async fn extract_track(&self, video_path: &Path, track_index: usize)
        -> Result<String, AppError>;
}

/// ffmpeg/ffprobe-backed demuxer
pub struct FfmpegDemuxer {
    available: bool,
}

impl FfmpegDemuxer {
    /// Probe for the ffmpeg and ffprobe binaries.
    pub async fn probe() -> Self {
        let available = check_command("ffmpeg").await && check_command("ffprobe").await;
        if available {
            info!("FFmpeg is available for embedded subtitle extraction");
        } else {
            warn!("FFmpeg not found - embedded subtitle extraction will be disabled");
        }
        FfmpegDemuxer { available }
    }

    fn require_available(&self) -> Result<(), AppError> {
        if self.available {
            Ok(())
        } else {
            Err(AppError::NotConfigured(
                "ffmpeg is not installed on this system".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Demuxer for FfmpegDemuxer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn subtitle_tracks(&self, video_path: &Path) -> Result<Vec<SubtitleTrack>, AppError> {
        self.require_available()?;
        if !video_path.exists() {
            return Err(AppError::BadInput(format!(
                "video file not found: {:?}",
                video_path
            )));
        }

        let probe = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "s",
            ])
            .arg(video_path)
            .output();

        let output = tokio::select! {
            result = probe => result
                .map_err(|e| AppError::UpstreamUnavailable(format!("failed to execute ffprobe: {}", e)))?,
            _ = tokio::time::sleep(PROBE_TIMEOUT) => {
                return Err(AppError::UpstreamUnavailable(
                    "ffprobe timed out after 60 seconds".to_string(),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffprobe failed: {}", stderr);
            return Err(AppError::UpstreamUnavailable(format!(
                "ffprobe failed: {}",
                stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let json: Value = serde_json::from_str(&stdout)
            .map_err(|e| AppError::Internal(format!("failed to parse ffprobe output: {}", e)))?;

        let mut tracks = Vec::new();
        if let Some(streams) = json.get("streams").and_then(|s| s.as_array()) {
            for (subtitle_index, stream) in streams.iter().enumerate() {
                let language = stream
                    .get("tags")
                    .and_then(|t| t.get("language"))
                    .and_then(|l| l.as_str())
                    .unwrap_or("und")
                    .to_string();
                let codec = stream
                    .get("codec_name")
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let title = stream
                    .get("tags")
                    .and_then(|t| t.get("title"))
                    .and_then(|l| l.as_str())
                    .unwrap_or("")
                    .to_string();
                tracks.push(SubtitleTrack::new(subtitle_index, language, codec, title));
            }
        }

        info!("Found {} subtitle tracks in {:?}", tracks.len(), video_path.file_name());
        Ok(tracks)
    }

    async fn extract_track(
        &self,
        video_path: &Path,
        track_index: usize,
    ) -> Result<String, AppError> {
        self.require_available()?;
        let output_path = vfs::temp_path("extracted_subtitle_", ".srt");

        let extract = Command::new("ffmpeg")
            .arg("-i")
            .arg(video_path)
            .args(["-map", &format!("0:s:{}", track_index), "-c:s", "srt", "-y"])
            .arg(&output_path)
            .output();

        let result = tokio::select! {
            result = extract => result
                .map_err(|e| AppError::UpstreamUnavailable(format!("failed to execute ffmpeg: {}", e))),
            _ = tokio::time::sleep(EXTRACT_TIMEOUT) => Err(AppError::UpstreamUnavailable(
                "ffmpeg extraction timed out after 2 minutes".to_string(),
            )),
        };

        let content = result.and_then(|output| {
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                error!("Subtitle extraction failed: {}", filter_ffmpeg_stderr(&stderr));
                return Err(AppError::UpstreamUnavailable(format!(
                    "ffmpeg extraction failed for track {}",
                    track_index
                )));
            }
            let content = std::fs::read_to_string(&output_path)?;
            if content.trim().is_empty() {
                return Err(AppError::Empty(format!(
                    "no subtitles found in track {}",
                    track_index
                )));
            }
            Ok(content)
        });

        vfs::cleanup_temp(&output_path);
        if let Ok(content) = &content {
            info!("Extracted subtitle track {} ({} bytes)", track_index, content.len());
        }
        content
    }
}

async fn check_command(command: &str) -> bool {
    matches!(
        Command::new(command).arg("-version").output().await,
        Ok(output) if output.status.success()
    )
}

/// Strip the ffmpeg version banner and stream-metadata noise from stderr so
/// error logs only carry the meaningful lines.
fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !noise_prefixes.iter().any(|prefix| line.starts_with(prefix))
        })
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error".to_string()
    } else {
        meaningful.join("\n")
    }
}
