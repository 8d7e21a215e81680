/*!
 * Application settings module.
 *
 * All configurable options live in a single JSON document that is loaded on
 * startup and rewritten on every mutation. A small secondary file carries
 * the last-used target language for installs that predate the unified
 * settings document.
 */

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::language;

/// Which LLM backend performs the translation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Ollama,
    OpenAI,
}

impl ModelProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
        }
    }
}

/// Where the file browser points
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrowseMode {
    #[default]
    Local,
    Smb,
}

/// Persisted application settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    // OpenSubtitles credentials
    pub open_subtitles_api_key: String,
    pub open_subtitles_username: String,
    pub open_subtitles_password: String,

    // Model configuration
    pub open_ai_api_key: String,
    pub model_provider: ModelProvider,
    pub ollama_model: String,
    pub open_ai_model: String,
    pub ollama_base_url: String,

    // Translation behavior
    pub target_language: String,
    pub skip_hearing_impaired: bool,
    /// Cues per LLM request; 0 means auto-tune from the provider
    pub translation_batch_size: usize,

    // SMB share
    pub smb_host: String,
    pub smb_share: String,
    pub smb_username: String,
    pub smb_password: String,
    pub smb_domain: String,

    // File browser
    pub browse_mode: BrowseMode,
    pub local_root_path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            open_subtitles_api_key: String::new(),
            open_subtitles_username: String::new(),
            open_subtitles_password: String::new(),
            open_ai_api_key: String::new(),
            model_provider: ModelProvider::Ollama,
            ollama_model: "translategema2:4b".to_string(),
            open_ai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            target_language: "Hebrew".to_string(),
            skip_hearing_impaired: false,
            translation_batch_size: 0,
            smb_host: String::new(),
            smb_share: String::new(),
            smb_username: String::new(),
            smb_password: String::new(),
            smb_domain: String::new(),
            browse_mode: BrowseMode::Local,
            local_root_path: String::new(),
        }
    }
}

impl AppSettings {
    /// Model name for the active provider
    pub fn active_model(&self) -> &str {
        match self.model_provider {
            ModelProvider::OpenAI => &self.open_ai_model,
            ModelProvider::Ollama => &self.ollama_model,
        }
    }

    /// Whether the minimum required settings for translating are present
    pub fn is_configured(&self) -> bool {
        match self.model_provider {
            ModelProvider::OpenAI => !self.open_ai_api_key.is_empty(),
            ModelProvider::Ollama => !self.ollama_model.is_empty(),
        }
    }

    /// ISO 639-1 code of the configured target language
    pub fn target_language_code(&self) -> String {
        language::language_code(&self.target_language)
    }
}

/// Settings storage with load-on-start / save-on-mutation lifecycle.
/// All writes go through the inner mutex so concurrent updates never
/// interleave a half-written file.
pub struct SettingsStore {
    path: PathBuf,
    language_path: PathBuf,
    inner: Mutex<AppSettings>,
}

impl SettingsStore {
    /// Settings file under the cache root, `~/.subtitle-cache/app-settings.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".subtitle-cache")
            .join("app-settings.json")
    }

    /// Load settings from disk, falling back to defaults when absent.
    pub fn load(path: PathBuf, language_path: PathBuf) -> Self {
        let mut settings = AppSettings::default();

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<AppSettings>(&content) {
                Ok(loaded) => {
                    settings = loaded;
                    info!(
                        "Loaded settings: provider={}, model={}",
                        settings.model_provider.display_name(),
                        settings.active_model()
                    );
                }
                Err(e) => warn!("Failed to parse settings file, using defaults: {}", e),
            },
            Err(_) => info!("No settings file found, using defaults"),
        }

        // Legacy installs kept the target language in its own file.
        if settings.target_language.is_empty() {
            if let Some(lang) = read_language_file(&language_path) {
                info!("Loaded target language from language config: {}", lang);
                settings.target_language = lang;
            } else {
                settings.target_language = "Hebrew".to_string();
            }
        }

        SettingsStore {
            path,
            language_path,
            inner: Mutex::new(settings),
        }
    }

    /// Current settings snapshot
    pub fn snapshot(&self) -> AppSettings {
        self.inner.lock().unwrap().clone()
    }

    /// Mutate settings and persist the result.
    pub fn update<F: FnOnce(&mut AppSettings)>(&self, mutate: F) -> Result<()> {
        let snapshot = {
            let mut guard = self.inner.lock().unwrap();
            mutate(&mut guard);
            guard.clone()
        };
        self.persist(&snapshot)
    }

    /// Change the target language, rejecting names outside the supported set.
    pub fn set_target_language(&self, name: &str) -> Result<bool> {
        if !language::is_supported(name) {
            warn!("Unsupported language: {}", name);
            return Ok(false);
        }
        self.update(|s| s.target_language = name.to_string())?;
        info!("Target language changed to: {}", name);
        Ok(true)
    }

    fn persist(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to save settings to {:?}", self.path))?;

        // Keep the legacy language file in sync for older dashboards.
        let lang_json = json!({ "targetLanguage": settings.target_language });
        if let Err(e) = std::fs::write(&self.language_path, lang_json.to_string()) {
            warn!("Failed to save language config: {}", e);
        }
        Ok(())
    }

    /// Settings as exposed over the API: keys masked, passwords reduced to
    /// configured/not-configured flags.
    pub fn masked_view(&self) -> Value {
        let s = self.snapshot();
        json!({
            "openSubtitlesApiKey": mask_key(&s.open_subtitles_api_key),
            "openSubtitlesUsername": s.open_subtitles_username,
            "openSubtitlesPasswordSet": !s.open_subtitles_password.is_empty(),
            "openAiApiKey": mask_key(&s.open_ai_api_key),
            "modelProvider": s.model_provider,
            "ollamaModel": s.ollama_model,
            "openAiModel": s.open_ai_model,
            "ollamaBaseUrl": s.ollama_base_url,
            "targetLanguage": s.target_language,
            "skipHearingImpaired": s.skip_hearing_impaired,
            "translationBatchSize": s.translation_batch_size,
            "smbHost": s.smb_host,
            "smbShare": s.smb_share,
            "smbUsername": s.smb_username,
            "smbDomain": s.smb_domain,
            "smbConfigured": !s.smb_host.is_empty(),
            "browseMode": s.browse_mode,
            "localRootPath": s.local_root_path,
        })
    }

    /// Merge a partial update coming from the settings API. Masked keys and
    /// empty password fields leave the stored value untouched.
    pub fn apply_update(&self, updates: &Map<String, Value>) -> Result<()> {
        self.update(|s| {
            let get_str = |key: &str| -> Option<String> {
                updates.get(key).map(value_to_string)
            };

            if let Some(key) = get_str("openSubtitlesApiKey") {
                if !key.contains("***") {
                    s.open_subtitles_api_key = key;
                }
            }
            if let Some(v) = get_str("openSubtitlesUsername") {
                s.open_subtitles_username = v;
            }
            if let Some(pwd) = get_str("openSubtitlesPassword") {
                if !pwd.is_empty() {
                    s.open_subtitles_password = pwd;
                }
            }
            if let Some(key) = get_str("openAiApiKey") {
                if !key.contains("***") {
                    s.open_ai_api_key = key;
                }
            }
            if let Some(v) = get_str("modelProvider") {
                s.model_provider = if v.eq_ignore_ascii_case("openai") {
                    ModelProvider::OpenAI
                } else {
                    ModelProvider::Ollama
                };
            }
            if let Some(v) = get_str("ollamaModel") {
                s.ollama_model = v;
            }
            if let Some(v) = get_str("openAiModel") {
                s.open_ai_model = v;
            }
            if let Some(v) = get_str("ollamaBaseUrl") {
                s.ollama_base_url = v;
            }
            if let Some(v) = get_str("targetLanguage") {
                s.target_language = v;
            }
            if let Some(v) = updates.get("skipHearingImpaired") {
                s.skip_hearing_impaired = value_to_bool(v);
            }
            if let Some(v) = updates.get("translationBatchSize") {
                s.translation_batch_size = value_to_usize(v);
            }
            if let Some(v) = get_str("smbHost") {
                s.smb_host = v;
            }
            if let Some(v) = get_str("smbShare") {
                s.smb_share = v;
            }
            if let Some(v) = get_str("smbUsername") {
                s.smb_username = v;
            }
            if let Some(pwd) = get_str("smbPassword") {
                if !pwd.is_empty() {
                    s.smb_password = pwd;
                }
            }
            if let Some(v) = get_str("smbDomain") {
                s.smb_domain = v;
            }
            if let Some(v) = get_str("browseMode") {
                s.browse_mode = if v.eq_ignore_ascii_case("smb") {
                    BrowseMode::Smb
                } else {
                    BrowseMode::Local
                };
            }
            if let Some(v) = get_str("localRootPath") {
                s.local_root_path = v;
            }
        })
    }
}

fn read_language_file(path: &PathBuf) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&content).ok()?;
    let lang = value.get("targetLanguage")?.as_str()?;
    language::is_supported(lang).then(|| lang.to_string())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn value_to_usize(value: &Value) -> usize {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Mask an API key for display, keeping a recognizable tail.
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    match key.get(key.len().saturating_sub(4)..) {
        Some(tail) if key.len() > 4 => format!("***{}", tail),
        _ => "***".to_string(),
    }
}
