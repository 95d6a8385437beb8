// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use autosizer_finisher::{
    ends_with_terminal, finish_cutoff_text, first_n_sentences, trim_to_boundary,
    StreamTransformer,
};
use proptest::prelude::*;
use serde_json::{json, Value};

const TEXT: &str = "[a-c .!?。\n`\"')]{0,48}";

fn sentence_count(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let mut count = 1;
    let chars: Vec<char> = trimmed.chars().collect();
    for pair in chars.windows(2) {
        if matches!(pair[0], '.' | '!' | '?' | '。' | '！' | '？') && pair[1].is_whitespace() {
            count += 1;
        }
    }
    count
}

fn fragment_of(value: &Value) -> &str {
    value
        .get("response")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

proptest! {
    #[test]
    fn trim_to_boundary_is_idempotent(text in TEXT) {
        let once = trim_to_boundary(&text);
        prop_assert_eq!(trim_to_boundary(&once), once);
    }

    #[test]
    fn trim_to_boundary_returns_a_prefix(text in TEXT) {
        let out = trim_to_boundary(&text);
        prop_assert!(text.starts_with(&out));
    }

    #[test]
    fn first_n_sentences_never_adds_sentences(text in TEXT, n in 1usize..5) {
        let out = first_n_sentences(&text, n);
        prop_assert!(sentence_count(&out) <= sentence_count(&text));
        prop_assert!(sentence_count(&out) <= n.max(1));
    }

    #[test]
    fn cutoff_finisher_converges(text in TEXT) {
        let once = finish_cutoff_text(&text);
        let twice = finish_cutoff_text(&once);
        prop_assert_eq!(finish_cutoff_text(&twice), twice);
    }

    #[test]
    fn cutoff_stream_emits_at_most_one_extra_event(
        pieces in prop::collection::vec("[a-z .!?]{0,6}", 1..8),
    ) {
        let n = pieces.len();
        let lines: Vec<String> = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| {
                let event = if i + 1 == n {
                    json!({"model": "m", "response": piece, "done": true, "done_reason": "length"})
                } else {
                    json!({"model": "m", "response": piece, "done": false})
                };
                event.to_string()
            })
            .collect();

        let out: Vec<Value> = StreamTransformer::run(&lines)
            .iter()
            .map(|b| serde_json::from_slice(b).unwrap())
            .collect();

        prop_assert!(out.len() == n || out.len() == n + 1);
        let terminal = out.last().unwrap();
        prop_assert_eq!(&terminal["done"], &json!(true));
        prop_assert_eq!(fragment_of(terminal), "");
        if out.len() == n + 1 {
            prop_assert_eq!(&out[n - 1]["done"], &json!(false));
            prop_assert!(!fragment_of(&out[n - 1]).is_empty());
        }

        let full: String = pieces.concat();
        let mut cleaned = trim_to_boundary(&full);
        if cleaned.is_empty() {
            cleaned = full.trim_end().to_string();
        }
        if !cleaned.is_empty() && !ends_with_terminal(&cleaned) {
            cleaned.push_str(" ...");
        }
        let forwarded: String = pieces[..n - 1].concat();
        if cleaned.starts_with(&forwarded) {
            let delivered: String = out.iter().map(fragment_of).collect();
            prop_assert_eq!(delivered, cleaned);
        }
    }
}
