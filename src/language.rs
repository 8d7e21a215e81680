/*!
 * Target-language utilities: the supported-language table, ISO 639-1 codes,
 * and right-to-left script detection.
 */

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Languages written right-to-left. Target languages in this set get the
/// bidi post-processing pass.
const RTL_LANGUAGES: &[&str] = &["Hebrew", "Arabic", "Persian", "Urdu", "Pashto"];

/// Supported target languages with their ISO 639-1 codes, ordered for
/// dropdown display.
static SUPPORTED_LANGUAGES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("Arabic", "ar"),
        ("Chinese (Simplified)", "zh-CN"),
        ("Chinese (Traditional)", "zh-TW"),
        ("Czech", "cs"),
        ("Danish", "da"),
        ("Dutch", "nl"),
        ("Finnish", "fi"),
        ("French", "fr"),
        ("German", "de"),
        ("Greek", "el"),
        ("Hebrew", "he"),
        ("Hindi", "hi"),
        ("Hungarian", "hu"),
        ("Indonesian", "id"),
        ("Italian", "it"),
        ("Japanese", "ja"),
        ("Korean", "ko"),
        ("Malay", "ms"),
        ("Norwegian", "no"),
        ("Pashto", "ps"),
        ("Persian", "fa"),
        ("Polish", "pl"),
        ("Portuguese", "pt"),
        ("Romanian", "ro"),
        ("Russian", "ru"),
        ("Spanish", "es"),
        ("Swedish", "sv"),
        ("Thai", "th"),
        ("Turkish", "tr"),
        ("Ukrainian", "uk"),
        ("Urdu", "ur"),
        ("Vietnamese", "vi"),
    ]
});

static CODE_BY_NAME: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| SUPPORTED_LANGUAGES.iter().copied().collect());

/// All supported languages as (name, code) pairs in display order.
pub fn supported_languages() -> &'static [(&'static str, &'static str)] {
    &SUPPORTED_LANGUAGES
}

/// Whether a target language name is written right-to-left.
pub fn is_rtl_language(language: &str) -> bool {
    // Settings historically stored values like "Hebrew (RTL)"; match on the
    // leading name so those keep working.
    RTL_LANGUAGES
        .iter()
        .any(|rtl| language == *rtl || language.starts_with(&format!("{} ", rtl)))
}

/// Whether a language name is in the supported set.
pub fn is_supported(language: &str) -> bool {
    CODE_BY_NAME.contains_key(language)
}

/// ISO 639-1 code for a target language name. Unknown names fall back to the
/// first two letters, lowercased, so a hand-typed language still produces a
/// usable cache key and subtitle suffix.
pub fn language_code(language: &str) -> String {
    let name = language.trim();
    if let Some(code) = CODE_BY_NAME.get(name) {
        return (*code).to_string();
    }
    // Strip a trailing annotation such as "(RTL)" before falling back.
    let bare = name.split('(').next().unwrap_or(name).trim();
    if let Some(code) = CODE_BY_NAME.get(bare) {
        return (*code).to_string();
    }
    bare.chars().take(2).collect::<String>().to_lowercase()
}

/// Whether a track language tag refers to English.
pub fn is_english(language_tag: &str) -> bool {
    matches!(
        language_tag.to_lowercase().as_str(),
        "en" | "eng" | "english"
    )
}

/// Human-readable name for a two- or three-letter track language tag.
pub fn display_name_for_tag(tag: &str) -> String {
    match tag.to_lowercase().as_str() {
        "en" | "eng" => "English".to_string(),
        "he" | "heb" => "Hebrew".to_string(),
        "ar" | "ara" => "Arabic".to_string(),
        "es" | "spa" => "Spanish".to_string(),
        "fr" | "fra" | "fre" => "French".to_string(),
        "de" | "deu" | "ger" => "German".to_string(),
        "it" | "ita" => "Italian".to_string(),
        "pt" | "por" => "Portuguese".to_string(),
        "ru" | "rus" => "Russian".to_string(),
        "ja" | "jpn" => "Japanese".to_string(),
        "ko" | "kor" => "Korean".to_string(),
        "zh" | "zho" | "chi" => "Chinese".to_string(),
        "fa" | "fas" | "per" => "Persian".to_string(),
        "ur" | "urd" => "Urdu".to_string(),
        "" | "und" => "Unknown".to_string(),
        other => other.to_uppercase(),
    }
}
