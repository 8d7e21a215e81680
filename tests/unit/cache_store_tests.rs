/*!
 * Tests for the content-addressed cache store
 */

use subrelay::cache_store::{CacheMetadata, CacheStore};
use subrelay::errors::AppError;
use tempfile::TempDir;

fn store() -> (TempDir, CacheStore) {
    let temp = TempDir::new().expect("temp dir");
    let cache = CacheStore::new(temp.path().join("cache")).expect("cache root");
    (temp, cache)
}

fn metadata(name: &str) -> CacheMetadata {
    CacheMetadata {
        file_name: name.to_string(),
        file_id: Some(42),
        ..Default::default()
    }
}

#[test]
fn test_store_withOriginalAndTranslated_shouldHitAfterwards() {
    let (_temp, cache) = store();
    assert!(!cache.has("42", "he"));

    cache
        .store("42", Some("original"), "translated", "he", &metadata("movie.srt"))
        .unwrap();

    assert!(cache.has("42", "he"));
    assert_eq!(cache.load_translated("42", "he").unwrap(), "translated");
}

#[test]
fn test_has_withDifferentLanguage_shouldMiss() {
    let (_temp, cache) = store();
    cache
        .store("42", None, "translated", "he", &metadata("movie.srt"))
        .unwrap();

    // The artifact is keyed by language; a target switch is a cache miss.
    assert!(cache.has("42", "he"));
    assert!(!cache.has("42", "es"));
}

#[test]
fn test_load_withUnknownFingerprint_shouldBeBadInput() {
    let (_temp, cache) = store();
    let err = cache.load_translated("missing", "he").unwrap_err();
    assert!(matches!(err, AppError::BadInput(_)));
}

#[test]
fn test_store_withTraversalFingerprint_shouldRejectBeforeIo() {
    let (_temp, cache) = store();
    let err = cache
        .store("../escape", None, "x", "he", &metadata("x"))
        .unwrap_err();
    assert!(matches!(err, AppError::BadInput(_)));
}

#[test]
fn test_store_shouldLeaveNoTempFilesBehind() {
    let (_temp, cache) = store();
    cache
        .store("7", Some("orig"), "trans", "he", &metadata("m.srt"))
        .unwrap();

    let entry_dir = cache.root().join("7");
    let leftovers: Vec<_> = std::fs::read_dir(&entry_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_list_withReadyAndInProgressEntries_shouldReportBoth() {
    let (_temp, cache) = store();
    cache
        .store("42", Some("orig"), "trans", "he", &metadata("done.srt"))
        .unwrap();

    // An entry with only an original is what a crash mid-translation (or a
    // writer that has not finished) looks like.
    let in_progress = cache.root().join("99");
    std::fs::create_dir_all(&in_progress).unwrap();
    std::fs::write(in_progress.join("original.srt"), "english only").unwrap();

    let entries = cache.list().unwrap();
    assert_eq!(entries.len(), 2);

    let ready = entries.iter().find(|e| e.fingerprint == "42").unwrap();
    assert!(ready.ready);
    assert_eq!(ready.languages, vec!["he".to_string()]);
    assert_eq!(ready.file_name.as_deref(), Some("done.srt"));

    let pending = entries.iter().find(|e| e.fingerprint == "99").unwrap();
    assert!(!pending.ready);
    assert!(pending.languages.is_empty());
}

#[test]
fn test_delete_withExistingEntry_shouldRemoveRecursively() {
    let (_temp, cache) = store();
    cache
        .store("42", Some("orig"), "trans", "he", &metadata("m.srt"))
        .unwrap();
    cache.delete("42").unwrap();

    assert!(!cache.has("42", "he"));
    assert!(!cache.root().join("42").exists());
}

#[test]
fn test_clear_withSeveralEntries_shouldRemoveAll() {
    let (_temp, cache) = store();
    for id in ["1", "2", "3"] {
        cache
            .store(id, None, "trans", "he", &metadata("m.srt"))
            .unwrap();
    }
    let removed = cache.clear().unwrap();
    assert_eq!(removed, 3);
    assert!(cache.list().unwrap().is_empty());
}

#[test]
fn test_read_metadata_withStoredEntry_shouldRoundTrip() {
    let (_temp, cache) = store();
    cache
        .store("42", None, "trans", "he", &metadata("movie.srt"))
        .unwrap();
    let meta = cache.read_metadata("42").unwrap();
    assert_eq!(meta.file_name, "movie.srt");
    assert_eq!(meta.file_id, Some(42));
}
