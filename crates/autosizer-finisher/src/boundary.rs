// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Safe truncation boundaries for generated text.
//!
//! Pure functions. A boundary is the end of a sentence, or the point just
//! before a fenced code block or paragraph break, so trimmed replies never
//! stop mid-sentence when a cleaner cut exists.

use std::sync::LazyLock;

use autosizer_core::types::TrimPlan;
use regex::Regex;

/// Sentence-ending punctuation followed by whitespace (the whitespace is the split point).
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?。！？](\s+)").unwrap());

/// A run of sentence-ending punctuation, optionally closed by a bracket or quote, at the end.
static TRAILING_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([.!?。！？]+[)\]'"]?)\s*$"#).unwrap());

/// Block markers that end a reply's first usable section, in priority order.
const BLOCK_MARKERS: &[&str] = &["```", "\n\n"];

/// Sentence punctuation searched right-to-left, in priority order.
const SENTENCE_PUNCT: &[char] = &['.', '?', '!', '。', '！', '？'];

/// Endings that already read as a finished reply.
pub const TERMINAL_ENDINGS: &[&str] = &[".", "?", "!", "。", "！", "？", "..."];

/// Marker appended to replies that were cut short.
pub const ELLIPSIS: &str = " ...";

/// Whether `text` already ends like a finished sentence.
pub fn ends_with_terminal(text: &str) -> bool {
    TERMINAL_ENDINGS.iter().any(|p| text.ends_with(p))
}

/// Keep the first `n` sentences of `text`, joined by single spaces.
///
/// Text without any sentence break is returned trimmed but otherwise intact.
pub fn first_n_sentences(text: &str, n: usize) -> String {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;

    for caps in SENTENCE_BREAK.captures_iter(text) {
        if sentences.len() == n {
            break;
        }
        let Some(gap) = caps.get(1) else {
            continue;
        };
        sentences.push(&text[start..gap.start()]);
        start = gap.end();
    }
    if sentences.len() < n {
        sentences.push(&text[start..]);
    }

    sentences.join(" ")
}

/// Cut `text` back to its last safe boundary.
///
/// Everything from the first code fence, then the first blank line, is
/// dropped (unless that would leave nothing). The remainder is cut after its
/// last sentence punctuation. Text with no boundary comes back right-trimmed.
/// Applying this twice gives the same result as applying it once.
pub fn trim_to_boundary(text: &str) -> String {
    let text = text.trim_end();
    if text.is_empty() {
        return String::new();
    }

    let mut head = text;
    for marker in BLOCK_MARKERS {
        if let Some(idx) = head.find(marker) {
            let before = head[..idx].trim_end();
            if !before.is_empty() {
                head = before;
            }
        }
    }

    cut_after_punct(head).to_string()
}

fn cut_after_punct(text: &str) -> &str {
    if let Some(group) = TRAILING_PUNCT.captures(text).and_then(|c| c.get(1)) {
        return text[..group.end()].trim_end();
    }

    for punct in SENTENCE_PUNCT {
        if let Some(idx) = text.rfind(*punct) {
            return text[..idx + punct.len_utf8()].trim_end();
        }
    }

    text
}

/// Shorten a short-mode reply according to `plan`.
///
/// Applies the character ceiling, then the sentence limit, then (when a tail
/// allowance was granted) a boundary cut. Falls back to `text` whenever a
/// stage would leave nothing.
pub fn finish_short_text(text: &str, plan: &TrimPlan) -> String {
    let mut raw = text.trim();
    if raw.is_empty() {
        return text.to_string();
    }

    if let Some(base) = plan.base_token_budget.filter(|b| *b > 0)
        && plan.chars_per_token > 0.0
    {
        let window = (base + plan.tail_token_allowance) as f64;
        let max_chars = (window * plan.chars_per_token) as usize;
        if max_chars > 0
            && let Some((cut, _)) = raw.char_indices().nth(max_chars)
        {
            raw = raw[..cut].trim_end();
        }
    }

    let mut trimmed = first_n_sentences(raw, plan.sentence_limit.max(1))
        .trim()
        .to_string();

    if plan.tail_token_allowance > 0 {
        let bounded = trim_to_boundary(&trimmed);
        if !bounded.is_empty() {
            trimmed = bounded;
        }
    }

    if trimmed.is_empty() {
        text.to_string()
    } else {
        trimmed
    }
}

/// Repair text that stopped because the output limit was hit.
///
/// Returns the boundary-trimmed text, with [`ELLIPSIS`] appended when
/// anything was cut or the text does not end like a sentence.
pub fn finish_cutoff_text(text: &str) -> String {
    let trimmed = trim_to_boundary(text);
    if trimmed != text || (!trimmed.is_empty() && !ends_with_terminal(&trimmed)) {
        format!("{trimmed}{ELLIPSIS}")
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(sentences: usize, base: Option<u64>, tail: u64) -> TrimPlan {
        TrimPlan {
            sentence_limit: sentences,
            base_token_budget: base,
            tail_token_allowance: tail,
            chars_per_token: 4.0,
        }
    }

    #[test]
    fn trims_partial_sentence() {
        assert_eq!(trim_to_boundary("The cat sat. The dog ra"), "The cat sat.");
    }

    #[test]
    fn keeps_trailing_punctuation_run_and_closer() {
        assert_eq!(trim_to_boundary("Really?!  "), "Really?!");
        assert_eq!(trim_to_boundary("He said \"stop.\""), "He said \"stop.\"");
        assert_eq!(trim_to_boundary("(see above.)"), "(see above.)");
    }

    #[test]
    fn cuts_before_code_fence() {
        assert_eq!(
            trim_to_boundary("Use this:\n```rust\nfn main() {"),
            "Use this:"
        );
        assert_eq!(
            trim_to_boundary("Done. Here is code:\n```rust\nfn main() {"),
            "Done."
        );
    }

    #[test]
    fn cuts_before_blank_line() {
        assert_eq!(trim_to_boundary("First part\n\nSecond part"), "First part");
    }

    #[test]
    fn marker_at_start_keeps_text() {
        assert_eq!(trim_to_boundary("```\ncode"), "```\ncode");
    }

    #[test]
    fn right_most_punct_search_follows_priority_order() {
        // '.' is searched before '?', so the earlier '.' wins
        assert_eq!(trim_to_boundary("a. b? c"), "a.");
        assert_eq!(trim_to_boundary("日本語です。続き"), "日本語です。");
    }

    #[test]
    fn no_boundary_returns_right_trimmed_text() {
        assert_eq!(trim_to_boundary("no punctuation here  "), "no punctuation here");
        assert_eq!(trim_to_boundary("   "), "");
    }

    #[test]
    fn trim_to_boundary_is_idempotent_on_mixed_input() {
        for text in [
            "x. y\n\n```z",
            "Intro. More text\n\nNext",
            "```only code",
            "a\n\n\n\nb. c",
            "Why?\" he asked. Then",
        ] {
            let once = trim_to_boundary(text);
            assert_eq!(trim_to_boundary(&once), once, "input: {text:?}");
        }
    }

    #[test]
    fn first_n_sentences_keeps_n() {
        assert_eq!(first_n_sentences("One. Two! Three? Four.", 2), "One. Two!");
        assert_eq!(first_n_sentences("  One.\n\nTwo.  ", 5), "One. Two.");
        assert_eq!(first_n_sentences("no breaks at all", 1), "no breaks at all");
        assert_eq!(first_n_sentences("", 2), "");
    }

    #[test]
    fn finish_short_text_limits_sentences() {
        let text = "Paris is the capital. It is in France. It has the Eiffel Tower.";
        assert_eq!(
            finish_short_text(text, &plan(2, Some(160), 0)),
            "Paris is the capital. It is in France."
        );
    }

    #[test]
    fn finish_short_text_applies_char_ceiling() {
        // 2 tokens * 4 chars = 8 chars
        let out = finish_short_text("abcdefghijkl", &plan(2, Some(2), 0));
        assert_eq!(out, "abcdefgh");
    }

    #[test]
    fn finish_short_text_with_tail_cuts_to_boundary() {
        let text = "Short answer. Extra words that ran on";
        let out = finish_short_text(text, &plan(2, Some(160), 16));
        assert_eq!(out, "Short answer.");
    }

    #[test]
    fn finish_short_text_falls_back_on_blank() {
        assert_eq!(finish_short_text("   ", &plan(2, Some(10), 0)), "   ");
    }

    #[test]
    fn cutoff_text_gets_ellipsis() {
        assert_eq!(finish_cutoff_text("One. Two. Thr"), "One. Two. ...");
        assert_eq!(finish_cutoff_text("no end"), "no end ...");
        assert_eq!(finish_cutoff_text("All done."), "All done.");
        assert_eq!(finish_cutoff_text(""), "");
    }

    #[test]
    fn cutoff_text_converges() {
        let once = finish_cutoff_text("One. Two. Thr");
        assert_eq!(finish_cutoff_text(&once), once);
    }
}
