/*!
 * Tests for the bidirectional text post-processor
 */

use subrelay::bidi;

const LRM: char = '\u{200E}';
const RLM: char = '\u{200F}';
const RLE: char = '\u{202B}';
const PDF: char = '\u{202C}';

#[test]
fn test_process_withLtrTarget_shouldBeNoOp() {
    let text = "Hello there, friend.";
    assert_eq!(bidi::process(text, "French"), text);
}

#[test]
fn test_process_withRtlTargetButLatinOnlyText_shouldBeNoOp() {
    let text = "Untranslated passthrough line";
    assert_eq!(bidi::process(text, "Hebrew"), text);
}

#[test]
fn test_process_withHebrewLine_shouldEmbedBetweenRleAndPdf() {
    let out = bidi::process("שלום עולם", "Hebrew");
    let chars: Vec<char> = out.chars().collect();
    assert_eq!(chars[0], RLE);
    assert_eq!(chars[1], RLM);
    assert_eq!(*chars.last().unwrap(), PDF);
    assert!(out.contains("שלום עולם"));
}

#[test]
fn test_process_withArabicText_shouldProcess() {
    let out = bidi::process("مرحبا", "Arabic");
    assert!(out.starts_with(RLE));
    assert!(out.ends_with(PDF));
}

#[test]
fn test_process_withNumbers_shouldWrapThemInLrm() {
    let out = bidi::process("שילמתי $42.50 על זה", "Hebrew");
    assert!(out.contains(&format!("{}$42.50{}", LRM, LRM)));
}

#[test]
fn test_process_withTrailingPunctuation_shouldInsertRlm() {
    let out = bidi::process("שלום.", "Hebrew");
    assert!(out.contains(&format!("{}.", RLM)));
}

#[test]
fn test_process_withLtrSpanInBrackets_shouldIsolateWithLrm() {
    let out = bidi::process("הוא אמר (hello) ועזב", "Hebrew");
    assert!(out.contains(&format!("({}hello{})", LRM, LRM)));
}

#[test]
fn test_process_withRtlSpanInBrackets_shouldWrapPairWithRlm() {
    let out = bidi::process("הוא אמר (שלום) ועזב", "Hebrew");
    assert!(out.contains(&format!("{}(שלום){}", RLM, RLM)));
}

#[test]
fn test_process_withMultiLineText_shouldProcessEachLineSeparately() {
    let out = bidi::process("שלום\nעולם", "Hebrew");
    let lines: Vec<&str> = out.split('\n').collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        assert!(line.starts_with(RLE));
        assert!(line.ends_with(PDF));
    }
}

#[test]
fn test_process_withEmptyLineInText_shouldLeaveItEmpty() {
    let out = bidi::process("שלום\n\nעולם", "Hebrew");
    let lines: Vec<&str> = out.split('\n').collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].is_empty());
}

#[test]
fn test_containsRtl_withMixedText_shouldDetectHebrewAndArabic() {
    assert!(bidi::contains_rtl("abc שלום"));
    assert!(bidi::contains_rtl("مرحبا"));
    assert!(!bidi::contains_rtl("plain ascii"));
}
