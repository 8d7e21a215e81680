/*!
 * Tests for SRT/VTT parsing and generation
 */

use subrelay::subtitle_codec::{
    detect_format, generate_srt, generate_vtt, parse, parse_srt, parse_vtt, Cue, SubtitleFormat,
};

use crate::common;

#[test]
fn test_parse_withTwoCueSrt_shouldYieldBothCues() {
    let (format, cues) = parse(common::sample_srt());
    assert_eq!(format, SubtitleFormat::Srt);
    assert_eq!(cues.len(), 2);

    assert_eq!(cues[0].index, 1);
    assert_eq!(cues[0].start_ms, 1000);
    assert_eq!(cues[0].end_ms, 3500);
    assert_eq!(cues[0].text, "Hello");

    assert_eq!(cues[1].index, 2);
    assert_eq!(cues[1].start_ms, 4000);
    assert_eq!(cues[1].end_ms, 5000);
    assert_eq!(cues[1].text, "World");
}

#[test]
fn test_parse_withMultiLineCue_shouldKeepInternalNewline() {
    let content = "3\n00:00:10,000 --> 00:00:12,000\nline1\nline2\n\n";
    let (_, cues) = parse(content);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "line1\nline2");
    assert_eq!(cues[0].line_count(), 2);
}

#[test]
fn test_parse_withCrlfAndBom_shouldNormalize() {
    let content = "\u{FEFF}1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n\r\n";
    let (format, cues) = parse(content);
    assert_eq!(format, SubtitleFormat::Srt);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "Hi");
}

#[test]
fn test_parse_withMalformedBlock_shouldSkipAndRecoverOthers() {
    let content = "not a cue at all\n\n2\n00:00:04,000 --> 00:00:05,000\nWorld\n";
    let (_, cues) = parse(content);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "World");
}

#[test]
fn test_parse_withEndBeforeStart_shouldSkipCue() {
    let content = "1\n00:00:05,000 --> 00:00:01,000\nBackwards\n";
    let (_, cues) = parse(content);
    assert!(cues.is_empty());
}

#[test]
fn test_roundTrip_withGeneratedSrt_shouldBeIdentity() {
    let cues = vec![
        Cue::new(1, 0, 1500, "First"),
        Cue::new(2, 2000, 4000, "Second line one\nSecond line two"),
        Cue::new(3, 5000, 6000, "Third"),
    ];
    let srt = generate_srt(&cues);
    let reparsed = parse_srt(&srt);
    assert_eq!(reparsed, cues);
}

#[test]
fn test_generateSrt_withParsedInput_shouldReproduceNormalizedText() {
    let original = common::sample_srt();
    let regenerated = generate_srt(&parse_srt(original));
    assert_eq!(regenerated.trim_end(), original.trim_end());
}

#[test]
fn test_formatConversion_withVttRoundTrip_shouldPreserveCues() {
    let cues = vec![
        Cue::new(1, 1000, 3500, "Hello"),
        Cue::new(2, 4000, 5000, "Multi\nline"),
    ];
    let vtt = generate_vtt(&cues);
    assert!(vtt.starts_with("WEBVTT\n\n"));
    assert!(vtt.contains("00:00:01.000 --> 00:00:03.500"));

    let (format, reparsed) = parse(&vtt);
    assert_eq!(format, SubtitleFormat::Vtt);
    assert_eq!(reparsed, cues);
}

#[test]
fn test_parseVtt_withHeaderMetadataAndNoIndexes_shouldAutoNumber() {
    let content = "WEBVTT\nKind: captions\n\n00:00:01.000 --> 00:00:02.000\nFirst\n\n00:00:03.000 --> 00:00:04.000\nSecond\n";
    let cues = parse_vtt(content);
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].index, 1);
    assert_eq!(cues[1].index, 2);
    assert_eq!(cues[0].start_ms, 1000);
}

#[test]
fn test_detectFormat_withWebvttToken_shouldDetectVtt() {
    assert_eq!(detect_format("WEBVTT\n\n"), SubtitleFormat::Vtt);
    assert_eq!(detect_format("\u{FEFF}WEBVTT\n\n"), SubtitleFormat::Vtt);
    assert_eq!(detect_format(common::sample_srt()), SubtitleFormat::Srt);
}

#[test]
fn test_formatTimestamp_withMillisecondValue_shouldRenderSrtForm() {
    assert_eq!(Cue::format_timestamp(5025678), "01:23:45,678");
    assert_eq!(Cue::format_timestamp_vtt(5025678), "01:23:45.678");
}

#[test]
fn test_parse_withEmptyDocument_shouldReturnNoCues() {
    let (_, cues) = parse("");
    assert!(cues.is_empty());
}
