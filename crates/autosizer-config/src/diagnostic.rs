// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Turns extraction failures into diagnostics that point at the offending
//! line of `autosizer.toml` and suggest the closest valid key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(autosizer::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path of the unrecognized key.
        key: String,
        /// Closest valid key, if any is similar enough.
        suggestion: Option<String>,
        /// Comma-separated valid keys for the section.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(autosizer::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(autosizer::config::missing_key),
        help("add `{key} = <value>` to autosizer.toml")
    )]
    MissingKey { key: String },

    /// A semantic validation failure.
    #[error("validation error: {message}")]
    #[diagnostic(code(autosizer::config::validation))]
    Validation { message: String },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(autosizer::config::other))]
    Other(String),
}

impl ConfigError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a `figment::Error` (possibly holding several errors) into diagnostics.
///
/// `toml_sources` holds `(path, content)` pairs used to attach source spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, &section, field, toml_sources);
                    let dotted = section
                        .iter()
                        .map(String::as_str)
                        .chain(std::iter::once(field.as_str()))
                        .collect::<Vec<_>>()
                        .join(".");
                    ConfigError::UnknownKey {
                        key: dotted,
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: section.join("."),
                    detail: format!("found {actual}"),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Attach a source span when the error's originating file is among `toml_sources`.
fn locate(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(path) = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        })
    else {
        return (None, None);
    };

    toml_sources
        .iter()
        .find(|(p, _)| *p == path)
        .and_then(|(p, content)| {
            find_key_offset(content, section, field).map(|offset| {
                (
                    Some(SourceSpan::new(offset.into(), field.len())),
                    Some(NamedSource::new(p, content.clone())),
                )
            })
        })
        .unwrap_or((None, None))
}

/// Find the byte offset of `field` inside the table named by `section`.
///
/// `section = ["budget", "short"]` searches after the `[budget.short]` header;
/// an empty section searches from the start of the file.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let start = if section.is_empty() {
        0
    } else {
        let header = format!("[{}]", section.join("."));
        content.find(&header)? + header.len()
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            break;
        }
        if let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }

    None
}

/// Suggest the valid key closest to `unknown`, if any clears the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_tail_tokens_for_typo() {
        let valid = &["short_sentences", "tail_tokens", "chars_per_token"];
        assert_eq!(suggest_key("tail_tokns", valid), Some("tail_tokens".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["host", "port", "log_level"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn finds_key_in_nested_table() {
        let content = "[budget.short]\nnum_predcit = 10\n\n[trim]\nnum_predcit = 1\n";
        let section = vec!["budget".to_string(), "short".to_string()];
        let offset = find_key_offset(content, &section, "num_predcit").unwrap();
        assert_eq!(offset, "[budget.short]\n".len());
    }

    #[test]
    fn key_search_stops_at_next_table() {
        let content = "[server]\nport = 1\n[trim]\nhots = 2\n";
        let section = vec!["server".to_string()];
        assert_eq!(find_key_offset(content, &section, "hots"), None);
    }

    #[test]
    fn unknown_key_help_lists_valid_keys() {
        let help = unknown_key_help(Some("port"), "host, port");
        assert!(help.contains("did you mean `port`"));
        assert!(help.contains("host, port"));
    }
}
