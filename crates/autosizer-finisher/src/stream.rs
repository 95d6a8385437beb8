// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-event-lookahead NDJSON stream repair.
//!
//! The backend streams one JSON object per line and ends with a `done`
//! event. When it stopped because the output limit was hit, the text it
//! already sent ends mid-sentence. The transformer holds back exactly one
//! line so it can inspect the terminal event before forwarding it, and
//! when that event reports a length cut-off it emits a synthetic tail event
//! that closes the reply cleanly.
//!
//! ```text
//!   upstream line ──► [Forwarding] ──► [Held(line)] ──► next line: emit held, hold new
//!                                           │
//!                                     end of stream
//!                                           ▼
//!                       emit held (or tail + repaired terminal) ──► [Closed]
//! ```

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::Display;

use autosizer_core::types::{FragmentField, StreamEvent};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::boundary::{ends_with_terminal, trim_to_boundary, ELLIPSIS};

/// Keys copied from the terminal event onto the synthetic tail event.
const META_KEYS: &[&str] = &["model", "created_at", "conversation_id", "id"];

/// Splits a byte stream into lines, keeping each line's terminator bytes.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line it completed, terminator included.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset + 1;
            lines.push(self.buf[start..end].to_vec());
            start = end;
        }
        self.buf.drain(..start);
        lines
    }

    /// The trailing unterminated line at end of stream, if any bytes remain.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buf))
    }
}

/// Split `line` into its content and its `\n` or `\r\n` terminator.
fn split_terminator(line: &[u8]) -> (&[u8], &[u8]) {
    let content_len = match line {
        [rest @ .., b'\r', b'\n'] => rest.len(),
        [rest @ .., b'\n'] => rest.len(),
        _ => line.len(),
    };
    line.split_at(content_len)
}

fn with_newline(mut line: Vec<u8>) -> Bytes {
    line.push(b'\n');
    Bytes::from(line)
}

fn encode(value: &Value, terminator: &[u8]) -> Bytes {
    match serde_json::to_vec(value) {
        Ok(mut bytes) => {
            bytes.extend_from_slice(terminator);
            Bytes::from(bytes)
        }
        // Serializing a serde_json::Value cannot fail.
        Err(_) => Bytes::from(terminator.to_vec()),
    }
}

/// The line currently held back, with its decoded form when it parsed.
#[derive(Debug)]
struct HeldLine {
    /// Upstream bytes, terminator included.
    raw: Bytes,
    parsed: Option<(Map<String, Value>, StreamEvent)>,
    /// Blank lines that arrived after `raw`, released right behind it.
    trailing: Vec<Bytes>,
}

impl HeldLine {
    fn release(self) -> Vec<Bytes> {
        let mut out = Vec::with_capacity(1 + self.trailing.len());
        out.push(self.raw);
        out.extend(self.trailing);
        out
    }
}

#[derive(Debug)]
enum State {
    Forwarding,
    Held(HeldLine),
    Closed,
}

/// Lookahead state machine over upstream NDJSON lines.
///
/// Lines are forwarded byte-for-byte in upstream order; only a length
/// cut-off terminal event is rewritten.
#[derive(Debug)]
pub struct StreamTransformer {
    state: State,
    /// Every parsed fragment, in order, including the held line's.
    full_text: String,
    /// The field the stream carries its text in, once known.
    fragment_field: Option<FragmentField>,
}

impl Default for StreamTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTransformer {
    pub fn new() -> Self {
        Self {
            state: State::Forwarding,
            full_text: String::new(),
            fragment_field: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Accept one upstream line, terminator included.
    ///
    /// Returns the bytes to forward now: the previously held line followed by
    /// any blank lines queued behind it. Blank lines arriving while nothing is
    /// held go straight out. Lines arriving after close are dropped.
    pub fn next_upstream_line(&mut self, line: &[u8]) -> Vec<Bytes> {
        if self.is_closed() {
            return Vec::new();
        }

        let (content, _) = split_terminator(line);
        if content.iter().all(u8::is_ascii_whitespace) {
            let blank = Bytes::copy_from_slice(line);
            return match &mut self.state {
                State::Held(held) => {
                    held.trailing.push(blank);
                    Vec::new()
                }
                _ => vec![blank],
            };
        }

        let parsed = serde_json::from_slice::<Value>(content).ok().and_then(|value| {
            let event = StreamEvent::from_value(&value)?;
            match value {
                Value::Object(map) => Some((map, event)),
                _ => None,
            }
        });

        if let Some((_, event)) = &parsed
            && let Some(fragment) = &event.fragment
        {
            self.full_text.push_str(fragment);
            if self.fragment_field.is_none() {
                self.fragment_field = event.fragment_field;
            }
        }

        let next = HeldLine {
            raw: Bytes::copy_from_slice(line),
            parsed,
            trailing: Vec::new(),
        };
        match std::mem::replace(&mut self.state, State::Held(next)) {
            State::Held(previous) => previous.release(),
            _ => Vec::new(),
        }
    }

    /// Upstream ended normally: release the held line, repairing it when it
    /// is a length cut-off.
    pub fn close(&mut self) -> Vec<Bytes> {
        let State::Held(held) = std::mem::replace(&mut self.state, State::Closed) else {
            return Vec::new();
        };

        let HeldLine {
            raw,
            parsed,
            trailing,
        } = held;
        match parsed {
            Some((terminal, event)) if event.is_length_cutoff() => {
                let (_, terminator) = split_terminator(&raw);
                let terminator = if terminator.is_empty() {
                    b"\n".as_slice()
                } else {
                    terminator
                };
                let mut out = self.repair_cutoff(terminal, &event, terminator);
                out.extend(trailing);
                out
            }
            parsed => HeldLine {
                raw,
                parsed,
                trailing,
            }
            .release(),
        }
    }

    /// Upstream failed: forward whatever is held verbatim and stop.
    pub fn close_on_error(&mut self) -> Vec<Bytes> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Held(held) => held.release(),
            _ => Vec::new(),
        }
    }

    fn repair_cutoff(
        &self,
        mut terminal: Map<String, Value>,
        event: &StreamEvent,
        terminator: &[u8],
    ) -> Vec<Bytes> {
        let full = self.full_text.as_str();
        let field = self.fragment_field.unwrap_or(FragmentField::Response);

        let mut cleaned = trim_to_boundary(full);
        if cleaned.is_empty() {
            cleaned = full.trim_end().to_string();
        }
        if !cleaned.is_empty() && !ends_with_terminal(&cleaned) {
            cleaned.push_str(ELLIPSIS);
        }

        let held_fragment = event.fragment.as_deref().unwrap_or_default();
        let forwarded = &full[..full.len() - held_fragment.len()];

        let tail = match cleaned.strip_prefix(forwarded) {
            Some(suffix) => suffix.to_string(),
            None if ends_with_terminal(forwarded.trim_end()) => String::new(),
            None => ELLIPSIS.to_string(),
        };

        let mut out = Vec::with_capacity(2);
        if !tail.is_empty() {
            out.push(encode(&tail_event(&terminal, field, &tail), terminator));
        }

        match field {
            FragmentField::Response => {
                terminal.insert("response".to_string(), Value::String(String::new()));
                if let Some(Value::Object(message)) = terminal.get_mut("message") {
                    message.insert("content".to_string(), Value::String(cleaned.clone()));
                }
            }
            FragmentField::MessageContent => match terminal.get_mut("message") {
                Some(Value::Object(message)) => {
                    message.insert("content".to_string(), Value::String(String::new()));
                }
                _ => {
                    terminal.insert("message".to_string(), json!({"role": "assistant", "content": ""}));
                }
            },
        }
        out.push(encode(&Value::Object(terminal), terminator));

        info!(tail = tail.trim(), "finished stream cut-off");
        out
    }

    /// Run the transformer over a complete sequence of lines.
    ///
    /// Items without a terminator are treated as `\n`-terminated lines.
    pub fn run<I>(lines: I) -> Vec<Bytes>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut transformer = Self::new();
        let mut out: Vec<Bytes> = lines
            .into_iter()
            .flat_map(|line| {
                let line = line.as_ref();
                if line.ends_with(b"\n") {
                    transformer.next_upstream_line(line)
                } else {
                    transformer.next_upstream_line(&with_newline(line.to_vec()))
                }
            })
            .collect();
        out.extend(transformer.close());
        out
    }
}

fn tail_event(terminal: &Map<String, Value>, field: FragmentField, tail: &str) -> Value {
    let mut event = Map::new();
    for key in META_KEYS {
        if let Some(value) = terminal.get(*key) {
            event.insert((*key).to_string(), value.clone());
        }
    }

    match field {
        FragmentField::Response => {
            event.insert("response".to_string(), Value::String(tail.to_string()));
        }
        FragmentField::MessageContent => {
            let role = terminal
                .get("message")
                .and_then(|m| m.get("role"))
                .cloned()
                .unwrap_or_else(|| Value::String("assistant".to_string()));
            event.insert("message".to_string(), json!({"role": role, "content": tail}));
        }
    }
    event.insert("done".to_string(), Value::Bool(false));
    Value::Object(event)
}

struct RepairState<S> {
    upstream: S,
    splitter: LineSplitter,
    transformer: StreamTransformer,
    pending: VecDeque<Bytes>,
}

/// Wrap an upstream byte stream with NDJSON cut-off repair.
///
/// Upstream errors are logged, the held line is flushed, and the stream
/// ends; they are never surfaced to the consumer. Dropping the returned
/// stream drops `upstream`.
pub fn repair_ndjson_stream<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let state = RepairState {
        upstream,
        splitter: LineSplitter::new(),
        transformer: StreamTransformer::new(),
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.pending.pop_front() {
                return Some((Ok(line), state));
            }
            if state.transformer.is_closed() {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    for line in state.splitter.push(&chunk) {
                        state.pending.extend(state.transformer.next_upstream_line(&line));
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "upstream stream failed");
                    state.pending.extend(state.transformer.close_on_error());
                }
                None => {
                    if let Some(line) = state.splitter.finish() {
                        state.pending.extend(state.transformer.next_upstream_line(&line));
                    }
                    let rest = state.transformer.close();
                    state.pending.extend(rest);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(out: &[Bytes]) -> Vec<Value> {
        out.iter()
            .map(|b| serde_json::from_slice(b).expect("emitted line should be JSON"))
            .collect()
    }

    fn fragments(values: &[Value]) -> String {
        values
            .iter()
            .filter_map(|v| {
                v.get("response")
                    .or_else(|| v.get("message").and_then(|m| m.get("content")))
                    .and_then(Value::as_str)
            })
            .collect()
    }

    #[test]
    fn splitter_handles_split_chunks_and_partial_tail() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"{\"a\":").is_empty());
        assert_eq!(
            splitter.push(b"1}\r\n{\"b\"").as_slice(),
            &[b"{\"a\":1}\r\n".to_vec()]
        );
        assert_eq!(splitter.finish(), Some(b"{\"b\"".to_vec()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn one_line_latency() {
        let mut t = StreamTransformer::new();
        assert!(t.next_upstream_line(b"{\"response\":\"a\"}\n").is_empty());
        let out = t.next_upstream_line(b"{\"response\":\"b\"}\n");
        assert_eq!(out, vec![Bytes::from_static(b"{\"response\":\"a\"}\n")]);
    }

    #[test]
    fn normal_stream_passes_through_verbatim() {
        let input = [
            r#"{"response":"Hi","done":false}"#,
            r#"{"response":" there.","done":false}"#,
            r#"{"response":"","done":true,"done_reason":"stop"}"#,
        ];
        let out = StreamTransformer::run(input);
        let expected: Vec<Bytes> = input.iter().map(|l| Bytes::from(format!("{l}\n"))).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn cutoff_in_held_fragment_gets_tail_event() {
        let input = [
            r#"{"model":"m","response":"One. Two","done":false}"#,
            r#"{"model":"m","created_at":"t","response":" thr","done":true,"done_reason":"length"}"#,
        ];
        let out = lines(&StreamTransformer::run(input));

        // first event, tail, terminal
        assert_eq!(out.len(), 3);
        assert_eq!(out[1]["response"], json!(" ..."));
        assert_eq!(out[1]["done"], json!(false));
        assert_eq!(out[1]["model"], json!("m"));
        assert_eq!(out[1]["created_at"], json!("t"));
        assert_eq!(out[2]["response"], json!(""));
        assert_eq!(out[2]["done_reason"], json!("length"));
        // boundary fell inside delivered text, so only the marker is appended
        assert_eq!(fragments(&out), "One. Two ...");
    }

    #[test]
    fn clean_suffix_tail_completes_reply() {
        let input = [
            r#"{"response":"The cat sat","done":false}"#,
            r#"{"response":". The dog ra","done":true,"done_reason":"length"}"#,
        ];
        let out = lines(&StreamTransformer::run(input));
        assert_eq!(out.len(), 3);
        assert_eq!(out[1]["response"], json!("."));
        assert_eq!(fragments(&out), "The cat sat.");
    }

    #[test]
    fn terminal_message_gets_cleaned_content() {
        let input = [
            r#"{"response":"Yes. And","done":false}"#,
            r#"{"response":"","message":{"role":"assistant","content":"x"},"done":true,"done_reason":"length"}"#,
        ];
        let out = lines(&StreamTransformer::run(input));
        let terminal = out.last().unwrap();
        assert_eq!(terminal["message"]["content"], json!("Yes."));
        assert_eq!(terminal["response"], json!(""));
    }

    #[test]
    fn chat_stream_repairs_message_content() {
        let input = [
            r#"{"message":{"role":"assistant","content":"Sure"},"done":false}"#,
            r#"{"message":{"role":"assistant","content":" thing"},"done":true,"done_reason":"length"}"#,
        ];
        let out = lines(&StreamTransformer::run(input));
        assert_eq!(out.len(), 3);
        assert_eq!(out[1]["message"]["content"], json!(" thing ..."));
        assert_eq!(out[1]["message"]["role"], json!("assistant"));
        assert_eq!(out[2]["message"]["content"], json!(""));
        assert_eq!(fragments(&out), "Sure thing ...");
    }

    #[test]
    fn already_terminal_text_needs_no_tail() {
        let input = [
            r#"{"response":"Done.","done":false}"#,
            r#"{"response":"","done":true,"done_reason":"length"}"#,
        ];
        let out = lines(&StreamTransformer::run(input));
        assert_eq!(out.len(), 2);
        assert_eq!(fragments(&out), "Done.");
    }

    #[test]
    fn blank_lines_do_not_hide_terminal_event() {
        let input = [
            r#"{"response":"Half a","done":false}"#,
            r#"{"response":"","done":true,"done_reason":"length"}"#,
            "",
            "  ",
        ];
        let out = StreamTransformer::run(input);
        // tail + repaired terminal, then the blank lines that followed it
        assert_eq!(out.len(), 5);
        let tail: Value = serde_json::from_slice(&out[1]).unwrap();
        assert_eq!(tail["response"], json!(" ..."));
        let terminal: Value = serde_json::from_slice(&out[2]).unwrap();
        assert_eq!(terminal["done"], json!(true));
        assert_eq!(&out[3][..], b"\n");
        assert_eq!(&out[4][..], b"  \n");
    }

    #[test]
    fn unparseable_lines_are_forwarded_and_ignored() {
        let input = [
            r#"{"response":"Ok. Mor","done":false}"#,
            "garbage",
            r#"{"response":"e","done":true,"done_reason":"length"}"#,
        ];
        let out = StreamTransformer::run(input);
        assert_eq!(&out[1][..], b"garbage\n");
        let values: Vec<Value> = out
            .iter()
            .filter_map(|b| serde_json::from_slice(b).ok())
            .collect();
        // the held fragment is dropped once the boundary lies in delivered text
        assert_eq!(fragments(&values), "Ok. Mor ...");
    }

    #[test]
    fn unparseable_terminal_is_forwarded_verbatim() {
        let out = StreamTransformer::run([r#"{"response":"a"}"#, "{broken"]);
        assert_eq!(&out[1][..], b"{broken\n");
    }

    #[test]
    fn close_on_error_flushes_held_line() {
        let mut t = StreamTransformer::new();
        t.next_upstream_line(br#"{"response":"a","done":true,"done_reason":"length"}"#);
        let out = t.close_on_error();
        assert_eq!(out.len(), 1);
        assert!(t.is_closed());
        assert!(t.close().is_empty());
        assert!(t.next_upstream_line(b"{}\n").is_empty());
    }

    #[tokio::test]
    async fn async_adapter_reassembles_chunks() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"response\":\"Hi. The\",\"done\"")),
            Ok(Bytes::from_static(b":false}\n{\"response\":\" en\",\"done\":true,")),
            Ok(Bytes::from_static(b"\"done_reason\":\"length\"}")),
        ];
        let out: Vec<Bytes> = repair_ndjson_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        let values = lines(&out);
        assert_eq!(values.len(), 3);
        assert_eq!(fragments(&values), "Hi. The ...");
    }

    #[tokio::test]
    async fn async_adapter_stops_on_upstream_error() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"response\":\"a\"}\n{\"response\":\"b\"}\n")),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from_static(b"{\"response\":\"never\"}\n")),
        ];
        let out: Vec<Bytes> = repair_ndjson_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(&out[1][..], b"{\"response\":\"b\"}\n");
    }

    #[test]
    fn blank_lines_keep_their_position() {
        let out = StreamTransformer::run(["a", "", "b"]);
        assert_eq!(out.concat(), b"a\n\nb\n");
    }

    #[test]
    fn close_on_error_releases_queued_blank_lines() {
        let mut t = StreamTransformer::new();
        assert!(t.next_upstream_line(b"{\"response\":\"a\"}\n").is_empty());
        assert!(t.next_upstream_line(b"\n").is_empty());
        let out = t.close_on_error();
        assert_eq!(out.concat(), b"{\"response\":\"a\"}\n\n");
    }

    #[test]
    fn crlf_cutoff_keeps_its_terminator() {
        let mut t = StreamTransformer::new();
        t.next_upstream_line(b"{\"response\":\"Done. And\",\"done\":false}\r\n");
        t.next_upstream_line(b"{\"response\":\" so\",\"done\":true,\"done_reason\":\"length\"}\r\n");
        let out = t.close();
        assert!(!out.is_empty());
        assert!(out.iter().all(|line| line.ends_with(b"\r\n")));
    }

    #[tokio::test]
    async fn async_adapter_preserves_passthrough_bytes() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"a\r")),
            Ok(Bytes::from_static(b"\nb\r\n{\"response\":\"c\",\"done\":true}")),
        ];
        let out: Vec<Bytes> = repair_ndjson_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(
            out.concat(),
            b"a\r\nb\r\n{\"response\":\"c\",\"done\":true}"
        );
    }
}
