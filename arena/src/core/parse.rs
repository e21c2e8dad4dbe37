//! Tag extraction and structured parsing of model output.
//!
//! Models are asked to answer in `<TAG>...</TAG>` blocks. Output in the wild
//! is messy: duplicated tags, unclosed tags, prose around the block. The
//! extraction primitive here takes the first well-formed pair and ignores the
//! rest, and is shared by the structured parsers and the repair protocol's
//! presence check so both sites agree on what "present" means.

use crate::core::side::Side;
use crate::core::transcript::{FinalOutput, TurnOutput};

/// Maximum non-blank lines kept per clipped field.
const MAX_LINES_REASONING: usize = 5;
const MAX_LINES_ASSUMPTIONS: usize = 3;
const MAX_LINES_REFLECTION: usize = 4;
const MAX_LINES_CHANGE: usize = 2;
const MAX_LINES_FINAL: usize = 7;

/// Extract the first well-formed `<tag>...</tag>` pair, trimmed.
///
/// Case-insensitive and non-greedy: the match stops at the first closing tag,
/// so duplicate or malformed tags later in the text are ignored. Returns an
/// empty string when no complete pair exists.
pub fn extract_tag(raw: &str, tag: &str) -> String {
    let pattern = format!("(?is)<{0}>(.*?)</{0}>", regex::escape(tag));
    let re = regex::Regex::new(&pattern).expect("escaped tag pattern is valid");
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Clip text to at most `max_lines` non-blank lines.
///
/// Lines are trimmed and blank lines dropped before counting, so a field
/// padded with empty lines still keeps its real content.
pub fn clip_lines(text: &str, max_lines: usize) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a baseline/exchange turn.
///
/// Every field is extracted independently; a missing tag yields an empty
/// field rather than a failure. The raw text is always kept verbatim.
pub fn parse_turn_output(raw: &str, assigned: Side) -> TurnOutput {
    let side_confirm = extract_tag(raw, "SIDE_CONFIRM");
    let side_mismatch = reconcile_side(&side_confirm, assigned);
    TurnOutput {
        side_confirm,
        assumptions: clip_lines(&extract_tag(raw, "ASSUMPTIONS"), MAX_LINES_ASSUMPTIONS),
        reflection: clip_lines(&extract_tag(raw, "REFLECTION"), MAX_LINES_REFLECTION),
        stance: extract_tag(raw, "STANCE"),
        change: clip_lines(&extract_tag(raw, "CHANGE"), MAX_LINES_CHANGE),
        reasoning: clip_lines(&extract_tag(raw, "REASONING"), MAX_LINES_REASONING),
        side_mismatch,
        raw_output: raw.to_string(),
        error: None,
    }
}

/// Parse a finalize turn (`<SIDE>` + `<FINAL>`).
pub fn parse_final_output(raw: &str, assigned: Side) -> FinalOutput {
    let side = extract_tag(raw, "SIDE");
    let side_mismatch = reconcile_side(&side, assigned);
    FinalOutput {
        side,
        final_statement: clip_lines(&extract_tag(raw, "FINAL"), MAX_LINES_FINAL),
        side_mismatch,
        raw_output: raw.to_string(),
        error: None,
    }
}

/// Side reconciliation: mismatch unless the stated side equals the assigned
/// side case-insensitively. Empty and placeholder values are mismatches.
pub fn reconcile_side(stated: &str, assigned: Side) -> bool {
    stated.trim().to_uppercase() != assigned.label()
}

/// Whether a mismatched confirm value is a protest: the model explicitly
/// claimed a different identity, as opposed to a missing or garbled tag.
/// Presentation-only; the mismatch flag itself does not distinguish the two.
pub fn is_protest(stated: &str, assigned: Side) -> bool {
    let norm = stated.trim().to_uppercase();
    !norm.is_empty() && norm != assigned.label() && norm != "MISSING"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_takes_first_well_formed_pair() {
        let raw = "<REASONING>first</REASONING> noise <REASONING>second</REASONING>";
        assert_eq!(extract_tag(raw, "REASONING"), "first");
    }

    #[test]
    fn extract_is_case_insensitive_and_trims() {
        let raw = "<reasoning>\n  spaced out  \n</ReAsOnInG>";
        assert_eq!(extract_tag(raw, "REASONING"), "spaced out");
    }

    #[test]
    fn extract_ignores_unclosed_tags() {
        assert_eq!(extract_tag("<REASONING>never closed", "REASONING"), "");
        assert_eq!(extract_tag("no tags at all", "REASONING"), "");
    }

    #[test]
    fn extract_is_idempotent_on_bare_text() {
        let raw = "<REASONING>Arg one\nArg two</REASONING>";
        let extracted = extract_tag(raw, "REASONING");
        assert_eq!(extracted, "Arg one\nArg two");
        // Re-parsing the extracted text as a bare string yields itself.
        assert_eq!(clip_lines(&extracted, MAX_LINES_REASONING), extracted);
    }

    #[test]
    fn clip_keeps_first_n_nonblank_lines_in_order() {
        let text = "one\n\n  two  \n\nthree\nfour";
        assert_eq!(clip_lines(text, 3), "one\ntwo\nthree");
    }

    #[test]
    fn clip_drops_blank_lines_before_counting() {
        let text = "\n\na\n\nb\n";
        assert_eq!(clip_lines(text, 2), "a\nb");
    }

    #[test]
    fn parse_turn_happy_path_without_optional_tags() {
        let raw = "<SIDE_CONFIRM>PRO</SIDE_CONFIRM><REASONING>Arg one\nArg two</REASONING>";
        let out = parse_turn_output(raw, Side::Pro);
        assert!(!out.side_mismatch);
        assert_eq!(out.reasoning, "Arg one\nArg two");
        assert_eq!(out.assumptions, "");
        assert_eq!(out.reflection, "");
        assert_eq!(out.raw_output, raw);
        assert!(out.error.is_none());
    }

    #[test]
    fn parse_turn_clips_reasoning_to_five_lines() {
        let raw = "<SIDE_CONFIRM>CON</SIDE_CONFIRM><REASONING>1\n2\n3\n4\n5\n6\n7</REASONING>";
        let out = parse_turn_output(raw, Side::Con);
        assert_eq!(out.reasoning, "1\n2\n3\n4\n5");
    }

    #[test]
    fn mismatch_false_when_confirm_matches_case_insensitively() {
        assert!(!reconcile_side("PRO", Side::Pro));
        assert!(!reconcile_side("pro", Side::Pro));
        assert!(!reconcile_side("  Con  ", Side::Con));
    }

    #[test]
    fn mismatch_true_for_empty_other_and_placeholder() {
        assert!(reconcile_side("", Side::Pro));
        assert!(reconcile_side("CON", Side::Pro));
        assert!(reconcile_side("MISSING", Side::Pro));
        assert!(reconcile_side("I refuse to take a side", Side::Pro));
    }

    #[test]
    fn protest_excludes_empty_and_placeholder() {
        assert!(is_protest("CON", Side::Pro));
        assert!(is_protest("I am actually neutral", Side::Pro));
        assert!(!is_protest("", Side::Pro));
        assert!(!is_protest("missing", Side::Pro));
        assert!(!is_protest("PRO", Side::Pro));
    }

    #[test]
    fn parse_final_flags_mismatch_even_when_final_is_well_formed() {
        let raw = "<SIDE>CON</SIDE><FINAL>Closing statement.</FINAL>";
        let out = parse_final_output(raw, Side::Pro);
        assert!(out.side_mismatch);
        assert_eq!(out.final_statement, "Closing statement.");
    }

    #[test]
    fn parse_final_clips_to_seven_lines() {
        let raw = "<SIDE>PRO</SIDE><FINAL>1\n2\n3\n4\n5\n6\n7\n8\n9</FINAL>";
        let out = parse_final_output(raw, Side::Pro);
        assert_eq!(out.final_statement, "1\n2\n3\n4\n5\n6\n7");
    }

    #[test]
    fn total_parse_failure_still_keeps_raw_text() {
        let raw = "the model rambled with no tags";
        let out = parse_turn_output(raw, Side::Pro);
        assert!(out.side_mismatch);
        assert_eq!(out.reasoning, "");
        assert_eq!(out.raw_output, raw);
    }
}
