use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{error, info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use subrelay::app_settings::SettingsStore;
use subrelay::batch::BatchOrchestrator;
use subrelay::cache_store::CacheStore;
use subrelay::catalog::OpenSubtitlesClient;
use subrelay::demuxer::FfmpegDemuxer;
use subrelay::orchestrator::SubtitleProxy;
use subrelay::progress::ProgressRegistry;
use subrelay::providers::ConfiguredProvider;
use subrelay::server::{self, AppState, PullStatus};
use subrelay::translation_engine::TranslationEngine;
use subrelay::vfs::VfsSelector;

/// A simple custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger { level });
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => "ℹ️ ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                Self::emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn log_level_from_env() -> LevelFilter {
    match std::env::var("SUBRELAY_LOG")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = CustomLogger::init(log_level_from_env()) {
        eprintln!("Failed to initialize logger: {}", e);
        std::process::exit(1);
    }

    info!("subrelay started");

    // Settings and cache share the same root directory.
    let settings = Arc::new(SettingsStore::load(
        SettingsStore::default_path(),
        std::path::PathBuf::from("./language-config.json"),
    ));
    let cache = Arc::new(
        CacheStore::new(CacheStore::default_root())
            .context("Failed to create cache directory")?,
    );

    // Core components, wired by constructor injection.
    let progress = ProgressRegistry::new();
    let provider = Arc::new(ConfiguredProvider::new(settings.clone()));
    let engine = Arc::new(TranslationEngine::new(provider, settings.clone()));
    let catalog = Arc::new(OpenSubtitlesClient::new(settings.clone()));
    let proxy = Arc::new(SubtitleProxy::new(
        catalog,
        engine,
        cache.clone(),
        progress.clone(),
        settings.clone(),
    ));
    let vfs = Arc::new(VfsSelector::new(settings.clone()));
    let demuxer = Arc::new(FfmpegDemuxer::probe().await);
    let batch = BatchOrchestrator::new(proxy.clone(), demuxer.clone(), vfs.clone());

    let port: u16 = std::env::var("SUBRELAY_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    let state = AppState {
        settings,
        proxy,
        batch,
        vfs,
        demuxer,
        progress,
        cache,
        tokens: Arc::new(Mutex::new(HashMap::new())),
        pull_status: Arc::new(Mutex::new(PullStatus::default())),
        base_url: format!("http://localhost:{}", port),
    };

    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on http://0.0.0.0:{}", port);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
