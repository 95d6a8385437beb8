// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic prompt classification into budget modes.
//!
//! Picks a generation preset from the size of the user's prompt, with a
//! keyword bump for short prompts that ask for elaborate answers. No model
//! call, no network, no latency.

use std::sync::Arc;

use autosizer_config::model::ClassifierConfig;
use autosizer_core::types::{BudgetMode, BudgetPreset, GenerationRequest};

use crate::catalog::BudgetCatalog;

/// Result of classifying one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// The preset selected for the request.
    pub preset: BudgetPreset,
    /// Whitespace-delimited words in the prompt excerpt.
    pub word_count: usize,
    /// Whether a detail keyword bumped the mode up one tier.
    pub promoted: bool,
    /// Human-readable reason for the classification.
    pub reason: &'static str,
}

impl ClassificationResult {
    pub fn mode(&self) -> BudgetMode {
        self.preset.mode
    }
}

/// Word-count classifier with keyword promotion.
#[derive(Debug, Clone)]
pub struct PromptClassifier {
    catalog: Arc<BudgetCatalog>,
    short_max_words: usize,
    normal_max_words: usize,
    /// Lowercased single-word keywords, matched against whole tokens.
    word_keywords: Vec<String>,
    /// Lowercased keywords containing whitespace, matched as substrings.
    phrase_keywords: Vec<String>,
}

impl PromptClassifier {
    /// Create a classifier over `catalog` with the `[classifier]` settings.
    pub fn new(catalog: Arc<BudgetCatalog>, config: &ClassifierConfig) -> Self {
        let (phrase_keywords, word_keywords): (Vec<String>, Vec<String>) = config
            .detail_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .partition(|k| k.contains(char::is_whitespace));

        Self {
            catalog,
            short_max_words: config.short_max_words,
            normal_max_words: config.normal_max_words,
            word_keywords,
            phrase_keywords,
        }
    }

    /// Select the preset for `request`.
    pub fn classify(&self, request: &GenerationRequest) -> ClassificationResult {
        if request.has_retrieval_markers() {
            return self.result(BudgetMode::Deep, 0, false, "retrieval context attached");
        }

        let excerpt = prompt_excerpt(request);
        let word_count = excerpt.split_whitespace().count();

        let base = if word_count <= self.short_max_words {
            BudgetMode::Short
        } else if word_count <= self.normal_max_words {
            BudgetMode::Normal
        } else {
            return self.result(BudgetMode::Deep, word_count, false, "long prompt");
        };

        if self.wants_detail(&excerpt) {
            return self.result(base.promoted(), word_count, true, "detail keyword");
        }

        let reason = match base {
            BudgetMode::Short => "short prompt",
            _ => "medium prompt",
        };
        self.result(base, word_count, false, reason)
    }

    fn result(
        &self,
        mode: BudgetMode,
        word_count: usize,
        promoted: bool,
        reason: &'static str,
    ) -> ClassificationResult {
        ClassificationResult {
            preset: self.catalog.get(mode).clone(),
            word_count,
            promoted,
            reason,
        }
    }

    fn wants_detail(&self, excerpt: &str) -> bool {
        let lower = excerpt.to_lowercase();

        if self.phrase_keywords.iter().any(|p| lower.contains(p.as_str())) {
            return true;
        }

        lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\''))
            .filter(|token| !token.is_empty())
            .any(|token| self.word_keywords.iter().any(|k| k == token))
    }
}

/// The text that stands for the user's request.
///
/// The literal `prompt` when non-blank; else the last user message with
/// non-blank content; else every user message joined by a space.
pub fn prompt_excerpt(request: &GenerationRequest) -> String {
    if let Some(prompt) = request.prompt().map(str::trim)
        && !prompt.is_empty()
    {
        return prompt.to_string();
    }

    let user_texts: Vec<String> = request
        .messages()
        .iter()
        .filter(|m| m.is_user())
        .map(|m| m.content.flatten())
        .collect();

    if let Some(last) = user_texts.iter().rev().find(|t| !t.trim().is_empty()) {
        return last.trim().to_string();
    }

    user_texts.join(" ").trim().to_string()
}
