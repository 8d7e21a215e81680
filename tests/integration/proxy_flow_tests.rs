/*!
 * End-to-end tests for the proxy download-translate-cache flow, using spy
 * doubles for the catalog and the LLM provider
 */

use std::time::Duration;

use subrelay::errors::AppError;
use subrelay::progress::JobStatus;
use subrelay::subtitle_codec::SubtitleFormat;

use crate::common::{self, MockCatalog, MockChatProvider};

#[tokio::test]
async fn test_download_withColdCache_thenSecondCall_shouldSkipCatalogAndLlm() {
    let catalog = MockCatalog::with_subtitle(42, common::sample_srt(), "movie.en.srt");
    let provider = MockChatProvider::echo_marked("fr:");
    let harness = common::build_harness(catalog.clone(), provider.clone(), "French");

    let first = harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Srt, None)
        .await
        .unwrap();
    assert!(first.contains("fr:Hello"));
    assert_eq!(catalog.download_calls(), 1);
    let calls_after_first = provider.call_count();
    assert!(calls_after_first > 0);

    // Second call: byte-identical result, no catalog download, no LLM.
    let second = harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Srt, None)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(catalog.download_calls(), 1);
    assert_eq!(provider.call_count(), calls_after_first);
}

#[tokio::test]
async fn test_download_withVttFormat_shouldConvertOnTheWayOut() {
    let catalog = MockCatalog::with_subtitle(42, common::sample_srt(), "movie.en.srt");
    let provider = MockChatProvider::echo_marked("fr:");
    let harness = common::build_harness(catalog, provider, "French");

    let vtt = harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Vtt, None)
        .await
        .unwrap();
    assert!(vtt.starts_with("WEBVTT\n\n"));
    assert!(vtt.contains("00:00:01.000 --> 00:00:03.500"));
    assert!(vtt.contains("fr:Hello"));

    // The cached artifact stays SRT; a later SRT request hits it.
    assert!(harness.proxy.is_cached(42));
    let srt = harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Srt, None)
        .await
        .unwrap();
    assert!(srt.contains("00:00:01,000 --> 00:00:03,500"));
}

#[tokio::test]
async fn test_download_withLanguageSwitch_shouldMissCacheAndRetranslate() {
    let catalog = MockCatalog::with_subtitle(42, common::sample_srt(), "movie.en.srt");
    let provider = MockChatProvider::echo_marked("t:");
    let harness = common::build_harness(catalog.clone(), provider, "French");

    harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Srt, None)
        .await
        .unwrap();
    assert!(harness.proxy.is_cached(42));

    // Switching the target language invalidates nothing, but the cache key
    // changes, so the old artifact is not served.
    harness.settings.set_target_language("Spanish").unwrap();
    assert!(!harness.proxy.is_cached(42));

    harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Srt, None)
        .await
        .unwrap();
    assert_eq!(catalog.download_calls(), 2);
    assert!(harness.cache.has("42", "fr"));
    assert!(harness.cache.has("42", "es"));
}

#[tokio::test]
async fn test_download_withUnknownFileId_shouldNotWriteCache() {
    let catalog = MockCatalog::new();
    let provider = MockChatProvider::echo_marked("x:");
    let harness = common::build_harness(catalog, provider, "French");

    let err = harness
        .proxy
        .proxy_download_and_translate(7, SubtitleFormat::Srt, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadInput(_)));
    assert!(harness.cache.list().unwrap().is_empty());
    // The failed job is gone from the registry.
    assert!(harness.progress.snapshot().is_empty());
}

#[tokio::test]
async fn test_download_withEmptySubtitle_shouldSurfaceEmptyError() {
    let catalog = MockCatalog::with_subtitle(42, "not a subtitle at all", "junk.srt");
    let provider = MockChatProvider::echo_marked("x:");
    let harness = common::build_harness(catalog, provider, "French");

    let err = harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Srt, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Empty(_)));
    assert!(harness.cache.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_download_withFailedTranslation_shouldReleaseGateAndKeepCacheClean() {
    let catalog = MockCatalog::with_subtitle(42, common::sample_srt(), "movie.en.srt");
    let provider = MockChatProvider::unreachable();
    let harness = common::build_harness(catalog, provider, "French");

    let err = harness
        .proxy
        .proxy_download_and_translate(42, SubtitleFormat::Srt, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    assert!(harness.cache.list().unwrap().is_empty());
    assert!(!harness.progress.has_active());

    // The gate is usable again after the failure.
    let permit = harness.progress.begin("next", "next.srt", 1).await;
    drop(permit);
}

#[tokio::test]
async fn test_search_withCatalogResults_shouldRelabelToTargetLanguage() {
    let catalog = MockCatalog::new();
    let provider = MockChatProvider::echo_marked("x:");
    let harness = common::build_harness(catalog, provider, "Hebrew");

    let response = harness
        .proxy
        .proxy_search(&subrelay::catalog::SearchQuery::default())
        .await
        .unwrap();

    let attributes = &response["data"][0]["attributes"];
    assert_eq!(attributes["language"], "he");
    assert_eq!(attributes["ai_translated"], true);
    assert_eq!(attributes["machine_translated"], true);
    assert_eq!(attributes["release"], "Some.Movie.2023 [Translated]");
}

#[tokio::test]
async fn test_translate_content_withAdHocInput_shouldNotTouchCache() {
    let catalog = MockCatalog::new();
    let provider = MockChatProvider::echo_marked("he:");
    let harness = common::build_harness(catalog, provider, "Hebrew");

    let translated = harness
        .proxy
        .translate_content(common::sample_srt(), "adhoc.srt")
        .await
        .unwrap();
    assert!(translated.contains("he:Hello"));
    assert!(harness.cache.list().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrentDownloads_shouldShowOneActiveOnePending() {
    let catalog = MockCatalog::with_subtitle(1, common::sample_srt(), "a.srt");
    let provider =
        MockChatProvider::echo_marked_with_delay("x:", Duration::from_millis(300));
    let harness = common::build_harness(catalog, provider, "French");

    let proxy_a = harness.proxy.clone();
    let job_a = tokio::spawn(async move {
        proxy_a.translate_content(common::sample_srt(), "a.srt").await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let proxy_b = harness.proxy.clone();
    let job_b = tokio::spawn(async move {
        proxy_b.translate_content(common::sample_srt(), "b.srt").await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Both submitted: exactly one ACTIVE, one PENDING.
    let jobs = harness.progress.snapshot();
    assert_eq!(jobs.len(), 2);
    assert_eq!(
        jobs.iter().filter(|j| j.status == JobStatus::Active).count(),
        1
    );
    assert_eq!(
        jobs.iter().filter(|j| j.status == JobStatus::Pending).count(),
        1
    );

    job_a.await.unwrap().unwrap();
    job_b.await.unwrap().unwrap();
    assert!(harness.progress.snapshot().is_empty());
}

#[tokio::test]
async fn test_embedded_flow_shouldCacheUnderEmbeddedFingerprint() {
    let catalog = MockCatalog::new();
    let provider = MockChatProvider::echo_marked("he:");
    let harness = common::build_harness(catalog, provider.clone(), "Hebrew");

    assert!(harness
        .proxy
        .cached_embedded("My Movie (2023).mkv", 0)
        .is_none());

    let translated = harness
        .proxy
        .translate_embedded_content(
            "films/My Movie (2023).mkv",
            "My Movie (2023).mkv",
            0,
            common::sample_srt(),
        )
        .await
        .unwrap();
    assert!(translated.contains("he:Hello"));

    // Fingerprint is sanitized and language-keyed.
    assert!(harness.cache.has("embedded_My_Movie__2023_.mkv_track0", "he"));
    let cached = harness
        .proxy
        .cached_embedded("My Movie (2023).mkv", 0)
        .unwrap();
    assert_eq!(cached, translated);

    let meta = harness
        .cache
        .read_metadata("embedded_My_Movie__2023_.mkv_track0")
        .unwrap();
    assert_eq!(meta.video_path.as_deref(), Some("films/My Movie (2023).mkv"));
    assert_eq!(meta.track_index, Some(0));
}

#[tokio::test]
async fn test_upload_withLocalSubtitle_shouldIndexIt() {
    let catalog = MockCatalog::new();
    let provider = MockChatProvider::echo_marked("x:");
    let harness = common::build_harness(catalog, provider, "French");

    let id = harness
        .proxy
        .add_local_subtitle("Some.Show.S01E01.srt", common::sample_srt());
    assert_eq!(id, 1);

    let listed = harness.proxy.local_subtitles();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].file_name, "Some.Show.S01E01.srt");
    assert_eq!(listed[0].title, "Some Show S01E01");
}
