/*!
 * Bidirectional text repair for right-to-left target languages.
 *
 * Machine-translated Hebrew/Arabic lines frequently render with numbers
 * reversed, punctuation at the wrong end, and mirrored brackets. This module
 * injects Unicode directional control characters so players display the
 * text correctly without altering its content.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::language;

/// Left-to-Right Mark
const LRM: char = '\u{200E}';
/// Right-to-Left Mark
const RLM: char = '\u{200F}';
/// Right-to-Left Embedding
const RLE: char = '\u{202B}';
/// Pop Directional Formatting
const PDF: char = '\u{202C}';

// Numeric runs, including currency prefixes, decimals, times, percentages
static NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£¥₪]?[+-]?\d+(?:[,.]\d+)*(?::\d+)?%?").unwrap());

// Terminal punctuation followed by whitespace or end of line
static PUNCTUATION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?,:;])(\s|$)").unwrap());

// Bracketed or quoted spans
static SPAN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([(\["'])([^)\]"']+)([)\]"'])"#).unwrap());

// RTL scripts: Hebrew, Arabic, Arabic Supplement, Arabic Extended-A
static RTL_CHAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{0590}-\u{05FF}\u{0600}-\u{06FF}\u{0750}-\u{077F}\u{08A0}-\u{08FF}]").unwrap()
});

/// Whether the text contains any RTL-script characters.
pub fn contains_rtl(text: &str) -> bool {
    RTL_CHAR_REGEX.is_match(text)
}

/// Process translated text for a given target language.
///
/// A no-op unless the target language is RTL and the text actually contains
/// RTL characters; LTR passthrough lines come back untouched.
pub fn process(text: &str, target_language: &str) -> String {
    if text.is_empty() || !language::is_rtl_language(target_language) || !contains_rtl(text) {
        return text.to_string();
    }

    text.split('\n')
        .map(process_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn process_line(line: &str) -> String {
    if line.trim().is_empty() || !contains_rtl(line) {
        return line.to_string();
    }

    let processed = wrap_numbers(line);
    let processed = fix_punctuation(&processed);
    let processed = handle_spans(&processed);

    // Embed the whole line so the base direction is right-to-left.
    format!("{}{}{}{}", RLE, RLM, processed, PDF)
}

/// Wrap numeric runs in LRM so digits keep left-to-right order.
fn wrap_numbers(line: &str) -> String {
    NUMBER_REGEX
        .replace_all(line, |caps: &regex::Captures| {
            format!("{}{}{}", LRM, &caps[0], LRM)
        })
        .into_owned()
}

/// Put an RLM before trailing terminal punctuation so it renders at the
/// sentence end instead of jumping to the line start.
fn fix_punctuation(line: &str) -> String {
    PUNCTUATION_REGEX
        .replace_all(line, |caps: &regex::Captures| {
            format!("{}{}{}", RLM, &caps[1], &caps[2])
        })
        .into_owned()
}

/// Stabilize bracketed and quoted spans: LTR content is isolated with LRM,
/// RTL content gets RLM around the bracket pair so the brackets face the
/// right way.
fn handle_spans(line: &str) -> String {
    SPAN_REGEX
        .replace_all(line, |caps: &regex::Captures| {
            let (open, content, close) = (&caps[1], &caps[2], &caps[3]);
            if contains_rtl(content) {
                format!("{}{}{}{}{}", RLM, open, content, close, RLM)
            } else {
                format!("{}{}{}{}{}", open, LRM, content, LRM, close)
            }
        })
        .into_owned()
}
