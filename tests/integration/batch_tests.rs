/*!
 * End-to-end tests for the folder batch workflow over a local VFS root and
 * a stub demuxer
 */

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use subrelay::batch::{BatchOrchestrator, BatchStatus};
use subrelay::errors::AppError;
use subrelay::vfs::VfsSelector;

use crate::common::{self, MockCatalog, MockChatProvider, StubDemuxer, TestHarness};

struct BatchHarness {
    harness: TestHarness,
    batch: Arc<BatchOrchestrator>,
    root: std::path::PathBuf,
}

/// Local root with three videos; two carry the `ENG` marker the stub
/// demuxer looks for.
fn build_batch_harness() -> BatchHarness {
    let harness = common::build_harness(
        MockCatalog::new(),
        MockChatProvider::echo_marked("he:"),
        "Hebrew",
    );

    let root = harness.temp.path().join("media");
    fs::create_dir_all(root.join("season1")).unwrap();
    fs::write(root.join("one.mkv"), "ENG header").unwrap();
    fs::write(root.join("season1/two.mkv"), "ENG header").unwrap();
    fs::write(root.join("three.mkv"), "no subtitles here").unwrap();
    harness
        .settings
        .update(|s| s.local_root_path = root.to_string_lossy().to_string())
        .unwrap();

    let vfs = Arc::new(VfsSelector::new(harness.settings.clone()));
    let demuxer = StubDemuxer::new(common::sample_srt());
    let batch = BatchOrchestrator::new(harness.proxy.clone(), demuxer, vfs);

    BatchHarness {
        harness,
        batch,
        root,
    }
}

/// No `video_*` / `video_header_*` temp files from this process remain.
fn assert_no_video_temp_files() {
    let pid_marker = format!("_{}", std::process::id());
    let leftovers: Vec<_> = fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| {
            (name.starts_with("video_") || name.starts_with("video_header_"))
                && name.contains(&pid_marker)
        })
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {:?}", leftovers);
}

async fn wait_for_terminal(batch: &BatchOrchestrator) -> BatchStatus {
    for _ in 0..100 {
        if let Some(record) = batch.progress() {
            match record.status {
                BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled => {
                    return record.status;
                }
                _ => {}
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("batch did not reach a terminal state");
}

#[tokio::test]
async fn test_analyze_withMixedFolder_shouldSelectEnglishTrackVideosOnly() {
    let bh = build_batch_harness();
    let record = bh.batch.analyze("").await.unwrap();

    assert_eq!(record.total_videos, 2);
    let mut names: Vec<&str> = record.videos.iter().map(|v| v.file_name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["one.mkv", "two.mkv"]);
    for video in &record.videos {
        assert_eq!(video.track_index, 0);
        assert_eq!(video.language, "eng");
    }

    assert_no_video_temp_files();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_withAnalyzedFolder_shouldWriteSubtitlesNextToVideos() {
    let bh = build_batch_harness();
    bh.batch.analyze("").await.unwrap();
    bh.batch.start("Hebrew").unwrap();

    let status = wait_for_terminal(&bh.batch).await;
    assert_eq!(status, BatchStatus::Completed);

    let record = bh.batch.progress().unwrap();
    assert_eq!(record.completed_videos, 2);
    assert!(record.current_video.is_none());

    for path in ["one.he.srt", "season1/two.he.srt"] {
        let written = bh.root.join(path);
        assert!(written.exists(), "missing {}", path);
        let content = fs::read_to_string(&written).unwrap();
        assert!(content.starts_with('\u{FEFF}'), "expected BOM in {}", path);
        assert!(content.contains("he:Hello"));
    }

    assert_no_video_temp_files();
    // The gate is idle again after the batch.
    assert!(!bh.harness.progress.has_active());
}

#[tokio::test]
async fn test_start_withoutAnalysis_shouldBeBadInput() {
    let bh = build_batch_harness();
    let err = bh.batch.start("Hebrew").unwrap_err();
    assert!(matches!(err, AppError::BadInput(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_withSecondStart_shouldBeBusy() {
    let bh = build_batch_harness();
    bh.batch.analyze("").await.unwrap();
    bh.batch.start("Hebrew").unwrap();

    // While the worker runs, a second start is refused.
    if bh.batch.is_running() {
        let err = bh.batch.start("Hebrew").unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
    }
    wait_for_terminal(&bh.batch).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_beforeStart_shouldStopBetweenVideos() {
    let bh = build_batch_harness();
    bh.batch.analyze("").await.unwrap();

    // Cancel first, then start: the worker observes the flag before the
    // first video and terminates as CANCELLED with nothing translated.
    bh.batch.start("Hebrew").unwrap();
    bh.batch.cancel();

    let status = wait_for_terminal(&bh.batch).await;
    // Depending on timing the first video may have finished; cancellation
    // is only observed between videos.
    assert!(matches!(status, BatchStatus::Cancelled | BatchStatus::Completed));
    assert_no_video_temp_files();
}

#[tokio::test]
async fn test_analyze_whileAnotherBatchRuns_shouldBeBusy() {
    let bh = build_batch_harness();
    bh.batch.analyze("").await.unwrap();
    bh.batch.start("Hebrew").unwrap();

    if bh.batch.is_running() {
        let err = bh.batch.analyze("").await.unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
    }
    wait_for_terminal(&bh.batch).await;
}
