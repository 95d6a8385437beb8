// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request planning: preset selection, option clamping, downgrade, and trim plan.
//!
//! Orchestrates the per-request pipeline:
//! classify > downgrade > clamp > trim plan > scrub > tail allowance > inject.

use std::sync::Arc;

use autosizer_config::model::{AutosizerConfig, TrimConfig};
use autosizer_core::types::{
    as_limit, BudgetMode, BudgetPreset, EffectiveOptions, GenerationRequest, TrimPlan,
    OUTPUT_LIMIT_KEY, STOP_KEY, STREAM_KEY, TEMPERATURE_KEY,
};
use serde_json::{Map, Value};
use tracing::info;

use crate::catalog::BudgetCatalog;
use crate::classifier::{ClassificationResult, PromptClassifier};
use crate::downgrade::{DowngradeDecision, ModelDowngradePolicy};
use crate::options::{clamp_options, extract_client_options, MAX_TOKENS_KEY};
use crate::prompt::{ConcisePrompt, Injection};

/// Smallest chars-per-token estimate a plan will use.
const MIN_CHARS_PER_TOKEN: f64 = 0.1;

/// Top-level convenience fields removed once folded into `options`.
const SCRUBBED_KEYS: &[&str] = &[MAX_TOKENS_KEY, TEMPERATURE_KEY, STOP_KEY, STREAM_KEY];

/// Decides whether a short non-streaming reply gets trimmed, and how hard.
#[derive(Debug, Clone)]
pub struct TrimPlanner {
    short_sentences: usize,
    tail_tokens: u64,
    chars_per_token: f64,
}

impl TrimPlanner {
    pub fn new(config: &TrimConfig) -> Self {
        Self {
            short_sentences: config.short_sentences,
            tail_tokens: config.tail_tokens,
            chars_per_token: config.chars_per_token,
        }
    }

    /// Build a plan for short-mode, non-streaming, non-retrieval requests.
    ///
    /// `client_options` are the options as the client sent them (before
    /// clamping); `base_output_limit` is the clamped output limit.
    pub fn plan(
        &self,
        request: &GenerationRequest,
        preset: &BudgetPreset,
        wants_stream: bool,
        client_options: &Map<String, Value>,
        base_output_limit: Option<u64>,
    ) -> Option<TrimPlan> {
        if wants_stream
            || self.short_sentences == 0
            || preset.mode != BudgetMode::Short
            || request.has_retrieval_markers()
        {
            return None;
        }

        let mut tail_token_allowance = 0;
        if self.tail_tokens > 0
            && let Some(base) = base_output_limit
        {
            match client_options.get(OUTPUT_LIMIT_KEY).and_then(as_limit) {
                None => tail_token_allowance = self.tail_tokens,
                Some(requested) if requested > base => {
                    tail_token_allowance = self.tail_tokens.min(requested - base);
                }
                Some(_) => {}
            }
        }

        Some(TrimPlan {
            sentence_limit: self.short_sentences.max(1),
            base_token_budget: base_output_limit,
            tail_token_allowance,
            chars_per_token: self.chars_per_token.max(MIN_CHARS_PER_TOKEN),
        })
    }
}

/// An outbound request together with everything decided about it.
#[derive(Debug, Clone)]
pub struct PlannedRequest {
    /// Body to send upstream.
    pub body: GenerationRequest,
    /// Classification outcome, including the chosen preset.
    pub classification: ClassificationResult,
    /// Options written into `body.options`.
    pub options: EffectiveOptions,
    /// Short-reply trimming, for non-streaming short requests only.
    pub trim_plan: Option<TrimPlan>,
    /// Whether the backend will stream its reply.
    pub stream: bool,
    /// Model substitution, if one was made.
    pub downgrade: Option<DowngradeDecision>,
    /// How the brevity instruction was attached, if it was.
    pub injection: Option<Injection>,
}

impl PlannedRequest {
    pub fn preset(&self) -> &BudgetPreset {
        &self.classification.preset
    }
}

/// Turns inbound generate/chat bodies into planned outbound requests.
///
/// Holds only read-only state; one instance is shared by all requests.
#[derive(Debug, Clone)]
pub struct RequestPlanner {
    classifier: PromptClassifier,
    downgrade: ModelDowngradePolicy,
    trim: TrimPlanner,
    concise: ConcisePrompt,
}

impl RequestPlanner {
    pub fn new(
        classifier: PromptClassifier,
        downgrade: ModelDowngradePolicy,
        trim: TrimPlanner,
        concise: ConcisePrompt,
    ) -> Self {
        Self {
            classifier,
            downgrade,
            trim,
            concise,
        }
    }

    /// Build every planning component from the loaded configuration.
    pub fn from_config(config: &AutosizerConfig) -> Self {
        let catalog = Arc::new(BudgetCatalog::from_config(&config.budget));
        Self::new(
            PromptClassifier::new(catalog, &config.classifier),
            ModelDowngradePolicy::new(&config.downgrade),
            TrimPlanner::new(&config.trim),
            ConcisePrompt::new(&config.prompt),
        )
    }

    /// Plan one request.
    pub fn prepare(&self, mut body: GenerationRequest) -> PlannedRequest {
        let classification = self.classifier.classify(&body);
        let preset = &classification.preset;

        let downgrade = self.downgrade.maybe_downgrade(&mut body, preset);

        let client_options = extract_client_options(&body);
        let mut options = clamp_options(preset, &client_options);

        let base_output_limit = options.output_limit();
        let trim_plan = self.trim.plan(
            &body,
            preset,
            options.stream(),
            &client_options,
            base_output_limit,
        );

        for key in SCRUBBED_KEYS {
            body.remove(key);
        }

        if let Some(plan) = &trim_plan
            && plan.tail_token_allowance > 0
            && let Some(base) = plan.base_token_budget
        {
            options.insert(
                OUTPUT_LIMIT_KEY,
                Value::from(base + plan.tail_token_allowance),
            );
        }

        let stream = options.stream();
        body.insert("options", Value::Object(options.as_map().clone()));
        body.insert(STREAM_KEY, Value::Bool(stream));

        let injection = self.concise.inject_concise_system(&mut body, preset);

        info!(
            model = body.model().unwrap_or_default(),
            stream,
            mode = %preset.mode,
            reason = classification.reason,
            words = classification.word_count,
            preset_num_predict = ?preset.max_output_tokens,
            preset_num_ctx = ?preset.max_context_tokens,
            num_predict = ?options.output_limit(),
            num_ctx = ?options.context_limit(),
            trim = trim_plan.is_some(),
            "APPLY"
        );

        PlannedRequest {
            body,
            classification,
            options,
            trim_plan,
            stream,
            downgrade,
            injection,
        }
    }
}
