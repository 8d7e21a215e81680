/*!
 * Subtitle parsing and generation for the SRT and VTT formats.
 *
 * Documents are parsed into an ordered list of cues. The parser is
 * deliberately forgiving: malformed cue blocks are skipped with a warning
 * and the survivors are returned, so one broken entry never sinks a file.
 */

use std::fmt;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

// Timing line of a cue. VTT uses '.' before the milliseconds and may append
// cue settings after the end time, so both are accepted here.
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2})[,.](\d{3})",
    )
    .unwrap()
});

/// Subtitle document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    /// Content type served for this format
    pub fn content_type(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "application/x-subrip; charset=utf-8",
            SubtitleFormat::Vtt => "text/vtt; charset=utf-8",
        }
    }

    /// Parse a format name ("srt"/"vtt"), defaulting to SRT
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("vtt") {
            SubtitleFormat::Vtt
        } else {
            SubtitleFormat::Srt
        }
    }
}

/// One timed subtitle cue. `text` is newline-significant: a cue renders on
/// one visible line per embedded newline. Cue identity is positional; the
/// index is carried through but never used as a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Sequence number from the source document
    pub index: usize,

    /// Start time in milliseconds
    pub start_ms: u64,

    /// End time in milliseconds
    pub end_ms: u64,

    /// Cue text, possibly multi-line
    pub text: String,
}

impl Cue {
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Cue {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Number of visible lines this cue renders on
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Format a millisecond timestamp as SRT `HH:MM:SS,mmm`
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;
        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    /// Format a millisecond timestamp as VTT `HH:MM:SS.mmm`
    pub fn format_timestamp_vtt(ms: u64) -> String {
        Self::format_timestamp(ms).replace(',', ".")
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_ms),
            Self::format_timestamp(self.end_ms)
        )?;
        writeln!(f, "{}", self.text)
    }
}

/// Strip a UTF-8 BOM and canonicalize line endings to LF.
fn normalize(content: &str) -> String {
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Auto-detect the format of subtitle content: VTT when the first non-BOM
/// token is the literal `WEBVTT`, SRT otherwise.
pub fn detect_format(content: &str) -> SubtitleFormat {
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    if content.trim_start().starts_with("WEBVTT") {
        SubtitleFormat::Vtt
    } else {
        SubtitleFormat::Srt
    }
}

/// Parse subtitle content, auto-detecting the format.
///
/// Returns the detected format and the recovered cues. Zero cues is not an
/// error here; callers decide whether an empty document is fatal.
pub fn parse(content: &str) -> (SubtitleFormat, Vec<Cue>) {
    let format = detect_format(content);
    let cues = match format {
        SubtitleFormat::Srt => parse_srt(content),
        SubtitleFormat::Vtt => parse_vtt(content),
    };
    (format, cues)
}

/// Parse SRT content into cues.
pub fn parse_srt(content: &str) -> Vec<Cue> {
    let normalized = normalize(content);
    let cues = parse_blocks(&normalized, false);
    debug!("Parsed {} cues from SRT content", cues.len());
    cues
}

/// Parse VTT content into cues. Timestamps are converted to the internal
/// millisecond form, so downstream code never sees the `.` separator.
pub fn parse_vtt(content: &str) -> Vec<Cue> {
    let mut normalized = normalize(content);

    // Drop the WEBVTT header block (and any metadata under it).
    if normalized.starts_with("WEBVTT") {
        normalized = match normalized.find("\n\n") {
            Some(end) => normalized[end + 2..].to_string(),
            None => String::new(),
        };
    }

    let cues = parse_blocks(&normalized, true);
    debug!("Parsed {} cues from VTT content", cues.len());
    cues
}

/// Parse blank-line-separated cue blocks. Each block is an optional index
/// line, a timing line, and the remaining lines as multi-line text. The
/// blank-line terminator is what keeps multi-line text intact: text only
/// ends at the next empty line or end of input, never at the first newline.
fn parse_blocks(content: &str, index_optional: bool) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut auto_index: usize = 1;

    for block in content.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let mut lines = block.lines();
        let first = match lines.next() {
            Some(line) => line.trim(),
            None => continue,
        };

        // The first line is either the cue index or (VTT) already the timing.
        let (index, timing_line) = if let Ok(num) = first.parse::<usize>() {
            match lines.next() {
                Some(line) => (num, line.trim()),
                None => {
                    warn!("Skipping cue block with index but no timing line");
                    continue;
                }
            }
        } else if index_optional && TIMING_REGEX.is_match(first) {
            let index = auto_index;
            (index, first)
        } else {
            warn!("Skipping malformed cue block starting with: {}", first);
            continue;
        };

        let caps = match TIMING_REGEX.captures(timing_line) {
            Some(caps) => caps,
            None => {
                warn!("Skipping cue {} with invalid timing line: {}", index, timing_line);
                continue;
            }
        };

        let start_ms = timestamp_ms(&caps, 1);
        let end_ms = timestamp_ms(&caps, 5);
        if end_ms < start_ms {
            warn!(
                "Skipping cue {} with end before start ({} < {})",
                index, end_ms, start_ms
            );
            continue;
        }

        let text = lines
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        if text.is_empty() {
            warn!("Skipping cue {} with empty text", index);
            continue;
        }

        auto_index = index + 1;
        cues.push(Cue::new(index, start_ms, end_ms, text));
    }

    cues
}

fn timestamp_ms(caps: &regex::Captures, start_group: usize) -> u64 {
    let field = |i: usize| -> u64 {
        caps.get(start_group + i)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + field(3)
}

/// Generate SRT content: one blank line between cues, none after the last.
pub fn generate_srt(cues: &[Cue]) -> String {
    cues.iter()
        .map(|cue| {
            format!(
                "{}\n{} --> {}\n{}\n",
                cue.index,
                Cue::format_timestamp(cue.start_ms),
                Cue::format_timestamp(cue.end_ms),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate VTT content, starting with the `WEBVTT` header block.
pub fn generate_vtt(cues: &[Cue]) -> String {
    let body = cues
        .iter()
        .map(|cue| {
            format!(
                "{}\n{} --> {}\n{}\n",
                cue.index,
                Cue::format_timestamp_vtt(cue.start_ms),
                Cue::format_timestamp_vtt(cue.end_ms),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("WEBVTT\n\n{}", body)
}
