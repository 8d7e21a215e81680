/*!
 * Tests for the local filesystem adapter, in particular the path-traversal
 * guard and the browse listing semantics
 */

use std::fs;

use subrelay::errors::AppError;
use subrelay::vfs::{self, FileSystem};
use tempfile::TempDir;

use crate::common;

fn local_fs(temp: &TempDir) -> (std::sync::Arc<subrelay::app_settings::SettingsStore>, vfs::local::LocalFs) {
    let settings = common::test_settings(temp, "Hebrew");
    let root = temp.path().join("media");
    fs::create_dir_all(&root).unwrap();
    settings
        .update(|s| s.local_root_path = root.to_string_lossy().to_string())
        .unwrap();
    (settings.clone(), vfs::local::LocalFs::new(settings))
}

#[tokio::test]
async fn test_list_withTraversalPath_shouldRejectBeforeIo() {
    let temp = TempDir::new().unwrap();
    let (_settings, fs_adapter) = local_fs(&temp);

    for path in ["../outside", "a/../../etc", "/etc"] {
        let err = fs_adapter.list(path).await.unwrap_err();
        assert!(
            matches!(err, AppError::BadInput(_)),
            "path {:?} should be rejected as bad input, got {:?}",
            path,
            err
        );
    }
}

#[tokio::test]
async fn test_read_subtitle_withTraversalPath_shouldReject() {
    let temp = TempDir::new().unwrap();
    let (_settings, fs_adapter) = local_fs(&temp);
    let err = fs_adapter.read_subtitle("../secrets.txt").await.unwrap_err();
    assert!(matches!(err, AppError::BadInput(_)));
}

#[tokio::test]
async fn test_list_withMixedContent_shouldClassifyAndSort() {
    let temp = TempDir::new().unwrap();
    let (_settings, fs_adapter) = local_fs(&temp);
    let root = temp.path().join("media");

    fs::create_dir(root.join("season1")).unwrap();
    fs::write(root.join("movie.mkv"), b"fake video").unwrap();
    fs::write(root.join("movie.he.srt"), "1\n00:00:01,000 --> 00:00:02,000\nx\n").unwrap();
    fs::write(root.join("other.mp4"), b"fake video").unwrap();
    fs::write(root.join("notes.txt"), b"ignored").unwrap();

    let entries = fs_adapter.list("").await.unwrap();
    // txt files are not listed; directory sorts first.
    assert_eq!(entries.len(), 4);
    assert!(entries[0].is_directory);
    assert_eq!(entries[0].name, "season1");

    let movie = entries.iter().find(|e| e.name == "movie.mkv").unwrap();
    assert!(movie.is_video);
    assert!(movie.has_subtitle);

    let other = entries.iter().find(|e| e.name == "other.mp4").unwrap();
    assert!(other.is_video);
    assert!(!other.has_subtitle);

    let subtitle = entries.iter().find(|e| e.name == "movie.he.srt").unwrap();
    assert!(subtitle.is_subtitle);
    assert_eq!(subtitle.language.as_deref(), Some("Hebrew"));
}

#[tokio::test]
async fn test_write_subtitle_withVideoPath_shouldCreateSiblingWithBom() {
    let temp = TempDir::new().unwrap();
    let (_settings, fs_adapter) = local_fs(&temp);
    let root = temp.path().join("media");
    fs::write(root.join("movie.mkv"), b"fake video").unwrap();

    let written = fs_adapter
        .write_subtitle("movie.mkv", "1\n00:00:01,000 --> 00:00:02,000\nשלום\n", "he")
        .await
        .unwrap();
    assert_eq!(written, "movie.he.srt");

    let content = fs::read(root.join("movie.he.srt")).unwrap();
    assert_eq!(&content[..3], &[0xEF, 0xBB, 0xBF], "expected UTF-8 BOM");
    assert!(String::from_utf8_lossy(&content).contains("שלום"));
}

#[tokio::test]
async fn test_download_header_to_temp_withLargeFile_shouldTruncate() {
    let temp = TempDir::new().unwrap();
    let (_settings, fs_adapter) = local_fs(&temp);
    let root = temp.path().join("media");
    fs::write(root.join("big.mkv"), vec![0u8; 1024]).unwrap();

    let header = fs_adapter
        .download_header_to_temp("big.mkv", 100)
        .await
        .unwrap();
    let metadata = fs::metadata(&header).unwrap();
    assert_eq!(metadata.len(), 100);
    vfs::cleanup_temp(&header);
    assert!(!header.exists());
}

#[tokio::test]
async fn test_is_configured_withMissingRoot_shouldBeFalse() {
    let temp = TempDir::new().unwrap();
    let settings = common::test_settings(&temp, "Hebrew");
    let fs_adapter = vfs::local::LocalFs::new(settings.clone());
    assert!(!fs_adapter.is_configured());
    assert!(matches!(
        fs_adapter.test_connection().await.unwrap_err(),
        AppError::NotConfigured(_)
    ));
}
