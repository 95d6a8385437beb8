// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response finishing for the Autosizer proxy.
//!
//! Bounding the backend's output means replies can stop mid-sentence. This
//! crate repairs them:
//! - [`boundary`]: pure text functions locating safe truncation points
//! - [`payload`]: finishers for buffered JSON replies
//! - [`stream`]: one-line-lookahead repair of NDJSON streams

pub mod boundary;
pub mod payload;
pub mod stream;

pub use boundary::{
    ends_with_terminal, finish_cutoff_text, finish_short_text, first_n_sentences,
    trim_to_boundary,
};
pub use payload::{apply_length_cutoff_finisher, apply_short_response_finisher, finish_json_body};
pub use stream::{repair_ndjson_stream, LineSplitter, StreamTransformer};
