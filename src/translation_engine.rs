/*!
 * Cue-batching LLM translation engine.
 *
 * Cues go to the model in contiguous batches, each cue flattened to one
 * line behind a `<<~N~>>` marker. The response is re-aligned by marker,
 * scrubbed of model chatter, forced back to the original line structure,
 * and bidi-repaired for right-to-left targets. A failed batch falls back to
 * per-cue translation over a bounded fan-out; a cue that cannot be
 * translated at all keeps its original text, so the output always has
 * exactly one cue per input cue with unchanged timings.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Semaphore;

use crate::app_settings::{AppSettings, ModelProvider, SettingsStore};
use crate::bidi;
use crate::errors::EngineError;
use crate::language;
use crate::providers::ChatProvider;
use crate::subtitle_codec::Cue;

/// Progress callback: cumulative count of completed cues.
pub type ProgressFn = dyn Fn(usize) + Send + Sync;

// Cue marker in batch prompts and responses
static MARKER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<~(\d+)~>>").unwrap());

// Hearing-impaired annotation: a line that is nothing but [bracketed] or
// (parenthesized) content
static HEARING_IMPAIRED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\[\(][^\]\)]+[\]\)]\s*$").unwrap());

// Chatty prefixes models like to add despite instructions
static CHATTY_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(?:Here(?:'s| is) (?:the )?translation:?)\s*",
        r"(?i)^(?:The translation is:?)\s*",
        r"(?i)^(?:Translation:?)\s*",
        r"(?i)^(?:Translated text:?)\s*",
        r"(?i)^(?:Output:?)\s*",
        r"(?i)^```[a-z]*\s*",
        r"(?i)\s*```$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Batch size and fallback fan-out for one translation call
#[derive(Debug, Clone, Copy)]
struct Tuning {
    batch_size: usize,
    parallel_requests: usize,
}

/// LLM-backed translator for subtitle cues
pub struct TranslationEngine {
    provider: Arc<dyn ChatProvider>,
    settings: Arc<SettingsStore>,
}

impl TranslationEngine {
    pub fn new(provider: Arc<dyn ChatProvider>, settings: Arc<SettingsStore>) -> Self {
        TranslationEngine { provider, settings }
    }

    /// Translate cues into the target language.
    ///
    /// The result always has the same length as the input; cue `i` keeps the
    /// index, timings, and line count of input cue `i`. Cues that could not
    /// be translated keep their original text. The call only fails when not
    /// a single cue could be translated: `UpstreamUnavailable` when the
    /// provider was unreachable, `BadResponse` when it answered but nothing
    /// was usable.
    pub async fn translate_cues(
        &self,
        cues: &[Cue],
        target_language: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<Cue>, EngineError> {
        if cues.is_empty() {
            return Ok(Vec::new());
        }

        let settings = self.settings.snapshot();
        let tuning = auto_tune(&settings);
        let system_prompt = build_system_prompt(target_language);
        info!(
            "Translating {} cues to {} with {} (batch size {}, fan-out {})",
            cues.len(),
            target_language,
            settings.model_provider.display_name(),
            tuning.batch_size,
            tuning.parallel_requests
        );

        let translated = Arc::new(AtomicUsize::new(0));
        let attempted = Arc::new(AtomicUsize::new(0));
        let transport_errors = Arc::new(AtomicUsize::new(0));

        let mut result = Vec::with_capacity(cues.len());
        let total_batches = cues.len().div_ceil(tuning.batch_size);
        for (batch_idx, batch) in cues.chunks(tuning.batch_size).enumerate() {
            let batch_result = self
                .translate_batch(
                    batch,
                    target_language,
                    &system_prompt,
                    &settings,
                    tuning,
                    &translated,
                    &attempted,
                    &transport_errors,
                )
                .await;
            result.extend(batch_result);

            info!("Translated batch {}/{}", batch_idx + 1, total_batches);
            if let Some(progress) = progress {
                progress(result.len());
            }
        }

        let attempted = attempted.load(Ordering::SeqCst);
        let translated = translated.load(Ordering::SeqCst);
        let transport_errors = transport_errors.load(Ordering::SeqCst);
        if attempted > 0 && translated == 0 {
            if transport_errors > 0 {
                return Err(EngineError::UpstreamUnavailable(format!(
                    "{} requests failed without a single translated cue",
                    transport_errors
                )));
            }
            return Err(EngineError::BadResponse(
                "no cue could be recovered from any provider response".to_string(),
            ));
        }
        if translated < attempted {
            warn!(
                "Translation finished best-effort: {}/{} cues translated, originals kept for the rest",
                translated, attempted
            );
        }

        Ok(result)
    }

    /// Translate one contiguous batch. Always returns one cue per input cue.
    #[allow(clippy::too_many_arguments)]
    async fn translate_batch(
        &self,
        batch: &[Cue],
        target_language: &str,
        system_prompt: &str,
        settings: &AppSettings,
        tuning: Tuning,
        translated: &Arc<AtomicUsize>,
        attempted: &Arc<AtomicUsize>,
        transport_errors: &Arc<AtomicUsize>,
    ) -> Vec<Cue> {
        // Hearing-impaired cues are withheld from the prompt entirely when
        // the skip setting is on; they pass through untranslated.
        let skipped: Vec<bool> = batch
            .iter()
            .map(|cue| settings.skip_hearing_impaired && is_hearing_impaired_only(&cue.text))
            .collect();

        let mut prompt = format!(
            "Translate these subtitles to {}. Preserve the <<~N~>> markers exactly. \
             Output ONLY the translations with markers.\n\n",
            target_language
        );
        let mut any_to_translate = false;
        for (i, cue) in batch.iter().enumerate() {
            if skipped[i] {
                debug!("Skipping hearing impaired cue: {}", cue.text);
                continue;
            }
            any_to_translate = true;
            prompt.push_str(&format!("<<~{}~>> {}\n", i, cue.text.replace('\n', " ")));
        }
        if !any_to_translate {
            return batch.to_vec();
        }
        attempted.fetch_add(skipped.iter().filter(|s| !**s).count(), Ordering::SeqCst);

        match self.provider.complete(system_prompt, &prompt).await {
            Ok(response) => {
                let translations = parse_batch_response(&response);
                if translations.is_empty() {
                    warn!("Batch response carried no markers, falling back to individual translation");
                    return self
                        .translate_individually(
                            batch,
                            &skipped,
                            target_language,
                            system_prompt,
                            tuning,
                            translated,
                            transport_errors,
                        )
                        .await;
                }

                batch
                    .iter()
                    .enumerate()
                    .map(|(i, cue)| {
                        if skipped[i] {
                            return cue.clone();
                        }
                        match translations.get(&i) {
                            Some(text) if !text.trim().is_empty() => {
                                translated.fetch_add(1, Ordering::SeqCst);
                                finish_cue(cue, text, target_language)
                            }
                            _ => {
                                warn!("No translation found for cue {}, using original", i);
                                cue.clone()
                            }
                        }
                    })
                    .collect()
            }
            Err(e) => {
                if e.is_transport() {
                    transport_errors.fetch_add(1, Ordering::SeqCst);
                }
                warn!("Batch translation failed ({}), falling back to individual translation", e);
                self.translate_individually(
                    batch,
                    &skipped,
                    target_language,
                    system_prompt,
                    tuning,
                    translated,
                    transport_errors,
                )
                .await
            }
        }
    }

    /// Fallback path: translate each cue of a failed batch on its own, with
    /// at most `parallel_requests` calls in flight. Output order stays
    /// positional regardless of completion order.
    async fn translate_individually(
        &self,
        batch: &[Cue],
        skipped: &[bool],
        target_language: &str,
        system_prompt: &str,
        tuning: Tuning,
        translated: &Arc<AtomicUsize>,
        transport_errors: &Arc<AtomicUsize>,
    ) -> Vec<Cue> {
        let semaphore = Arc::new(Semaphore::new(tuning.parallel_requests));

        let tasks = batch.iter().enumerate().map(|(i, cue)| {
            let semaphore = Arc::clone(&semaphore);
            let translated = Arc::clone(translated);
            let transport_errors = Arc::clone(transport_errors);
            let skip = skipped[i];
            async move {
                if skip {
                    return cue.clone();
                }
                let _permit = semaphore.acquire().await.expect("semaphore closed");

                let marked = cue.text.replace('\n', " || ");
                let prompt = format!(
                    "Translate English to {}. Text: [[[{}]]]",
                    target_language, marked
                );
                match self.provider.complete(system_prompt, &prompt).await {
                    Ok(response) if !response.trim().is_empty() => {
                        translated.fetch_add(1, Ordering::SeqCst);
                        finish_cue(cue, &response, target_language)
                    }
                    Ok(_) => {
                        warn!("Empty individual translation for cue {}, using original", cue.index);
                        cue.clone()
                    }
                    Err(e) => {
                        if e.is_transport() {
                            transport_errors.fetch_add(1, Ordering::SeqCst);
                        }
                        warn!(
                            "Individual translation for cue {} failed: {}. Using original.",
                            cue.index, e
                        );
                        cue.clone()
                    }
                }
            }
        });

        join_all(tasks).await
    }
}

/// Pick batch size and fan-out from the active provider; a non-zero batch
/// size in settings wins over the auto-tuned value.
fn auto_tune(settings: &AppSettings) -> Tuning {
    let (auto_batch, parallel_requests) = match settings.model_provider {
        ModelProvider::OpenAI => (50, 8),
        ModelProvider::Ollama => (20, 6),
    };
    let batch_size = if settings.translation_batch_size > 0 {
        settings.translation_batch_size
    } else {
        auto_batch
    };
    Tuning {
        batch_size,
        parallel_requests,
    }
}

/// Build the per-call system prompt for a target language.
fn build_system_prompt(target_language: &str) -> String {
    let mut prompt = format!(
        "You are a professional subtitle translator translating to {target}.\n\n\
         CRITICAL RULES - FOLLOW EXACTLY:\n\
         1. COMPLETE TRANSLATION - Translate EVERYTHING between [[[ and ]]] delimiters\n\
         2. The symbol || represents a line break - keep it as || in your output\n\
         3. Do NOT skip, summarize, or shorten ANY content\n\
         4. Output ONLY the translated {target} text, nothing else\n\
         5. No greetings, explanations, \"Translation:\", quotes, or markdown\n\
         6. Keep any HTML tags like <i> or <b> exactly as-is\n",
        target = target_language
    );

    if language::is_rtl_language(target_language) {
        prompt.push_str(&format!(
            "\n{upper} RTL RULES:\n\
             - {target} is written RIGHT-TO-LEFT\n\
             - Punctuation (. , ! ? : ;) appears at END of sentence\n\
             - Numbers stay LTR but integrate naturally\n",
            upper = target_language.to_uppercase(),
            target = target_language
        ));
    }

    prompt
}

/// Extract `(index, translation)` pairs from a marker-tagged batch response.
/// Each translation runs from its marker to the next marker or the end of
/// the response, so multi-sentence translations survive intact.
fn parse_batch_response(response: &str) -> HashMap<usize, String> {
    let markers: Vec<(usize, usize)> = MARKER_REGEX
        .captures_iter(response)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let index: usize = caps.get(1)?.as_str().parse().ok()?;
            Some((index, whole.end()))
        })
        .collect();

    let starts: Vec<usize> = MARKER_REGEX
        .find_iter(response)
        .map(|m| m.start())
        .collect();

    let mut translations = HashMap::new();
    for (slot, (index, text_start)) in markers.iter().enumerate() {
        let text_end = starts.get(slot + 1).copied().unwrap_or(response.len());
        let text = response[*text_start..text_end].trim();
        if !text.is_empty() {
            translations.insert(*index, text.to_string());
        }
    }
    translations
}

/// Run the post-LLM pipeline for one cue: clean, restore line structure,
/// bidi-repair. Index and timings always come from the original.
fn finish_cue(original: &Cue, raw_translation: &str, target_language: &str) -> Cue {
    let cleaned = clean_response(raw_translation, target_language);
    let shaped = enforce_line_count(&cleaned, original.line_count());
    let text = bidi::process(&shaped, target_language);
    Cue::new(original.index, original.start_ms, original.end_ms, text)
}

/// Strip model chatter, stray delimiters, and markdown from a translation,
/// and convert `||` line-break markers back to newlines.
fn clean_response(response: &str, target_language: &str) -> String {
    let mut cleaned = response.trim().to_string();

    for regex in CHATTY_REGEXES.iter() {
        cleaned = regex.replace(&cleaned, "").into_owned();
    }

    // "In Hebrew:" / "Hebrew:" style prefixes, for whatever the target is
    let lang_prefix = Regex::new(&format!(
        r"(?i)^(?:In )?{}:?\s+",
        regex::escape(target_language)
    ));
    if let Ok(regex) = lang_prefix {
        cleaned = regex.replace(&cleaned, "").into_owned();
    }

    // Delimiter brackets the model may have echoed back, widest first
    cleaned = cleaned.replace("[[[", "").replace("]]]", "");
    cleaned = cleaned.replace("[[", "").replace("]]", "");
    if cleaned.starts_with('[') && !cleaned.contains(']') {
        cleaned.remove(0);
    }
    if cleaned.ends_with(']') && cleaned.rfind('[').map_or(true, |i| i + 10 < cleaned.len()) {
        cleaned.pop();
    }

    // Outer quotes around the whole response
    let chars: Vec<char> = cleaned.chars().collect();
    if chars.len() >= 2 {
        let (first, last) = (chars[0], chars[chars.len() - 1]);
        if (first == '"' && last == '"') || (first == '\'' && last == '\'') {
            cleaned = chars[1..chars.len() - 1].iter().collect();
        }
    }

    cleaned = cleaned.replace('`', "");
    cleaned = cleaned.replace(" || ", "\n").replace("||", "\n");

    cleaned.trim().to_string()
}

/// Reshape translated text to exactly `target_lines` newline-separated
/// lines. Extra lines are merged by even distribution; missing lines are
/// re-split at the space closest to each equal-width target position.
fn enforce_line_count(text: &str, target_lines: usize) -> String {
    if target_lines <= 1 {
        return text.replace('\n', " ").trim().to_string();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() == target_lines {
        return text.to_string();
    }

    if lines.len() > target_lines {
        // Join surplus lines with spaces, spread evenly across the targets.
        let per_target = lines.len() / target_lines;
        let remainder = lines.len() % target_lines;
        let mut merged = Vec::with_capacity(target_lines);
        let mut cursor = 0;
        for slot in 0..target_lines {
            let take = per_target + usize::from(slot < remainder);
            let joined = lines[cursor..cursor + take]
                .iter()
                .map(|line| line.trim())
                .collect::<Vec<_>>()
                .join(" ");
            merged.push(joined);
            cursor += take;
        }
        return merged.join("\n");
    }

    // Too few lines: flatten, then cut at the space nearest each
    // equal-width target, searching ±15 characters around it.
    let joined = lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let chars: Vec<char> = joined.trim().chars().collect();
    if chars.is_empty() {
        return vec![""; target_lines].join("\n");
    }
    let approx_per_line = chars.len() / target_lines;

    let mut result: Vec<String> = Vec::with_capacity(target_lines);
    let mut pos = 0;
    for _ in 0..target_lines - 1 {
        let target = (pos + approx_per_line).min(chars.len().saturating_sub(1));
        let break_point = find_break_point(&chars, target, pos);
        let line: String = chars[pos..break_point].iter().collect();
        result.push(line.trim().to_string());
        pos = break_point;
    }
    let tail: String = chars[pos.min(chars.len())..].iter().collect();
    result.push(tail.trim().to_string());

    result.join("\n")
}

/// Find a space near the target position to break at; forward first, then
/// backward, then give up and cut mid-word.
fn find_break_point(chars: &[char], target: usize, min_pos: usize) -> usize {
    for i in target..(target + 15).min(chars.len()) {
        if chars[i] == ' ' {
            return i + 1;
        }
    }
    let lower = target.saturating_sub(15).max(min_pos);
    let mut i = target.min(chars.len().saturating_sub(1));
    while i > lower {
        if chars[i] == ' ' {
            return i + 1;
        }
        i -= 1;
    }
    (target + 1).min(chars.len())
}

/// Whether every non-empty line of the text is a hearing-impaired
/// annotation such as `[music playing]` or `(door slams)`.
fn is_hearing_impaired_only(text: &str) -> bool {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .all(|line| HEARING_IMPAIRED_REGEX.is_match(line))
}
