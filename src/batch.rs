/*!
 * Folder-level batch translation workflow.
 *
 * `analyze` crawls a folder tree through the VFS, downloads only container
 * headers, and collects every video carrying an English subtitle track.
 * `start` then runs a sequential background loop per video: full download,
 * track extraction, translation through the global gate, and an SRT written
 * next to the source video. Temp files are deleted on every path out of the
 * loop body; per-video failures are logged and skipped. Only one batch
 * exists process-wide.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::demuxer::Demuxer;
use crate::errors::AppError;
use crate::language;
use crate::orchestrator::SubtitleProxy;
use crate::vfs::{self, FileSystem, VfsSelector};

/// One video selected for translation during analysis
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoToTranslate {
    pub path: String,
    pub file_name: String,
    pub track_index: usize,
    pub language: String,
}

/// Batch lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    Analyzing,
    Translating,
    Completed,
    Failed,
    Cancelled,
}

/// Snapshot of the process-wide batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub batch_id: String,
    pub folder_path: String,
    pub videos: Vec<VideoToTranslate>,
    pub total_videos: usize,
    /// Successfully translated videos only
    pub completed_videos: usize,
    pub current_video: Option<String>,
    pub started_at: DateTime<Utc>,
    pub status: BatchStatus,
    pub error: Option<String>,
    pub progress_percent: u32,
}

impl BatchRecord {
    fn with_percent(mut self) -> Self {
        self.progress_percent = if self.total_videos == 0 {
            0
        } else {
            ((self.completed_videos * 100) / self.total_videos) as u32
        };
        self
    }
}

/// Orchestrator for the one-at-a-time folder batch
pub struct BatchOrchestrator {
    record: Mutex<Option<BatchRecord>>,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    proxy: Arc<SubtitleProxy>,
    demuxer: Arc<dyn Demuxer>,
    vfs: Arc<VfsSelector>,
}

impl BatchOrchestrator {
    pub fn new(
        proxy: Arc<SubtitleProxy>,
        demuxer: Arc<dyn Demuxer>,
        vfs: Arc<VfsSelector>,
    ) -> Arc<Self> {
        Arc::new(BatchOrchestrator {
            record: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            proxy,
            demuxer,
            vfs,
        })
    }

    /// Crawl a folder for videos with an English embedded track.
    ///
    /// Only the container header is downloaded per file; each header temp
    /// file is deleted as soon as its analysis finishes, hit or miss.
    pub async fn analyze(&self, folder_path: &str) -> Result<BatchRecord, AppError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AppError::Busy(
                "a batch translation is already in progress".to_string(),
            ));
        }
        if !self.demuxer.is_available() {
            return Err(AppError::NotConfigured(
                "ffmpeg is required for batch analysis".to_string(),
            ));
        }

        info!("Analyzing folder for batch translation: {}", folder_path);
        let batch_id = format!("batch_{}", Utc::now().timestamp_millis());
        let filesystem = self.vfs.current();

        self.set_record(BatchRecord {
            batch_id: batch_id.clone(),
            folder_path: folder_path.to_string(),
            videos: Vec::new(),
            total_videos: 0,
            completed_videos: 0,
            current_video: Some("Scanning...".to_string()),
            started_at: Utc::now(),
            status: BatchStatus::Analyzing,
            error: None,
            progress_percent: 0,
        });

        let video_paths = find_videos_recursive(filesystem.as_ref(), folder_path).await?;
        info!("Found {} video files in folder", video_paths.len());

        let mut videos = Vec::new();
        for video_path in &video_paths {
            let file_name = video_path
                .rsplit('/')
                .next()
                .unwrap_or(video_path)
                .to_string();
            self.update_record(|record| {
                record.total_videos = video_paths.len();
                record.current_video = Some(format!("Scanning: {}", file_name));
            });

            let header = match filesystem
                .download_header_to_temp(video_path, vfs::HEADER_BYTES)
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    warn!("Failed to analyze {}: {}", video_path, e);
                    continue;
                }
            };

            match self.demuxer.subtitle_tracks(&header).await {
                Ok(tracks) => {
                    if let Some(track) = tracks.iter().find(|t| language::is_english(&t.language)) {
                        info!("Found English subtitle in: {}", file_name);
                        videos.push(VideoToTranslate {
                            path: video_path.clone(),
                            file_name,
                            track_index: track.index,
                            language: track.language.clone(),
                        });
                    } else {
                        debug!("No English subtitle in: {}", file_name);
                    }
                }
                Err(e) => warn!("Failed to analyze {}: {}", video_path, e),
            }
            vfs::cleanup_temp(&header);
        }

        let record = BatchRecord {
            batch_id,
            folder_path: folder_path.to_string(),
            total_videos: videos.len(),
            videos,
            completed_videos: 0,
            current_video: None,
            started_at: Utc::now(),
            status: BatchStatus::Analyzing,
            error: None,
            progress_percent: 0,
        };
        self.set_record(record.clone());

        info!(
            "Analysis complete: {} videos with English subtitles out of {} total",
            record.total_videos,
            video_paths.len()
        );
        Ok(record)
    }

    /// Start translating the analyzed videos on a background worker.
    pub fn start(self: &Arc<Self>, target_language: &str) -> Result<(), AppError> {
        let videos = {
            let record = self.record.lock().unwrap();
            match record.as_ref() {
                Some(record) if !record.videos.is_empty() => record.videos.clone(),
                _ => {
                    return Err(AppError::BadInput(
                        "no videos to translate; run analysis first".to_string(),
                    ));
                }
            }
        };
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AppError::Busy(
                "batch translation already in progress".to_string(),
            ));
        }
        self.cancel.store(false, Ordering::SeqCst);

        let this = Arc::clone(self);
        let target_language = target_language.to_string();
        tokio::spawn(async move {
            let outcome = this.run(videos, &target_language).await;
            if let Err(e) = outcome {
                error!("Batch translation failed: {}", e);
                this.update_record(|record| {
                    record.status = BatchStatus::Failed;
                    record.error = Some(e.to_string());
                    record.current_video = None;
                });
            }
            this.running.store(false, Ordering::SeqCst);
        });
        Ok(())
    }

    /// Current batch snapshot, if a batch has ever been created.
    pub fn progress(&self) -> Option<BatchRecord> {
        self.record
            .lock()
            .unwrap()
            .clone()
            .map(BatchRecord::with_percent)
    }

    /// Request cancellation; the worker observes the flag between videos.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The sequential per-video loop.
    async fn run(
        &self,
        videos: Vec<VideoToTranslate>,
        target_language: &str,
    ) -> Result<(), AppError> {
        info!(
            "Starting batch translation of {} videos to {}",
            videos.len(),
            target_language
        );
        let filesystem = self.vfs.current();
        let lang_code = language::language_code(target_language);

        let mut completed = 0;
        for video in &videos {
            if self.cancel.load(Ordering::SeqCst) {
                info!("Batch translation cancelled");
                self.update_record(|record| {
                    record.status = BatchStatus::Cancelled;
                    record.completed_videos = completed;
                    record.current_video = None;
                });
                return Ok(());
            }

            self.update_record(|record| {
                record.status = BatchStatus::Translating;
                record.completed_videos = completed;
                record.current_video = Some(video.file_name.clone());
            });
            info!(
                "Translating {}/{}: {}",
                completed + 1,
                videos.len(),
                video.file_name
            );

            match self
                .translate_one(filesystem.as_ref(), video, &lang_code)
                .await
            {
                Ok(()) => {
                    completed += 1;
                    info!("Completed {}/{}", completed, videos.len());
                }
                Err(e) => {
                    error!("Failed to translate {}: {}", video.file_name, e);
                }
            }
        }

        self.update_record(|record| {
            record.status = BatchStatus::Completed;
            record.completed_videos = completed;
            record.current_video = None;
        });
        info!("Batch translation completed: {}/{} videos", completed, videos.len());
        Ok(())
    }

    /// Extract, translate, and write one video's subtitle. The downloaded
    /// temp file is deleted no matter which step fails.
    async fn translate_one(
        &self,
        filesystem: &dyn FileSystem,
        video: &VideoToTranslate,
        lang_code: &str,
    ) -> Result<(), AppError> {
        let temp = filesystem.download_to_temp(&video.path).await?;

        let result = async {
            let extracted = self.demuxer.extract_track(&temp, video.track_index).await?;
            let translated = self
                .proxy
                .translate_content(&extracted, &video.file_name)
                .await?;
            filesystem
                .write_subtitle(&video.path, &translated, lang_code)
                .await?;
            Ok::<(), AppError>(())
        }
        .await;

        vfs::cleanup_temp(&temp);
        result
    }

    fn set_record(&self, record: BatchRecord) {
        *self.record.lock().unwrap() = Some(record);
    }

    fn update_record<F: FnOnce(&mut BatchRecord)>(&self, mutate: F) {
        if let Some(record) = self.record.lock().unwrap().as_mut() {
            mutate(record);
        }
    }
}

/// Depth-first enumeration of video files under a folder, via the VFS.
async fn find_videos_recursive(
    filesystem: &dyn FileSystem,
    folder_path: &str,
) -> Result<Vec<String>, AppError> {
    let mut videos = Vec::new();
    let mut stack = vec![folder_path.to_string()];
    while let Some(path) = stack.pop() {
        for entry in filesystem.list(&path).await? {
            if entry.is_directory {
                stack.push(entry.path);
            } else if entry.is_video {
                videos.push(entry.path);
            }
        }
    }
    videos.sort();
    Ok(videos)
}
