// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small-budget model downgrade.
//!
//! A request that will only produce a short reply does not need a large
//! model. When the preset's output limit is small and the requested model
//! carries the configured "large" tag, the model id is swapped for a cheaper
//! fallback.

use autosizer_config::model::DowngradeConfig;
use autosizer_core::types::{BudgetPreset, GenerationRequest};
use tracing::info;

/// A model substitution that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DowngradeDecision {
    /// Model the client asked for.
    pub requested_model: String,
    /// Model the request now targets.
    pub actual_model: String,
}

/// Swaps large models for a fallback on small budgets.
#[derive(Debug, Clone)]
pub struct ModelDowngradePolicy {
    enabled: bool,
    max_output_tokens: u64,
    /// Lowercased.
    large_model_tag: String,
    fallback_model: String,
}

impl ModelDowngradePolicy {
    pub fn new(config: &DowngradeConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_output_tokens: config.max_output_tokens,
            large_model_tag: config.large_model_tag.to_lowercase(),
            fallback_model: config.fallback_model.clone(),
        }
    }

    /// Rewrite the request's model id when the downgrade rule applies.
    ///
    /// Unbounded presets never qualify. Returns the substitution made, if any.
    pub fn maybe_downgrade(
        &self,
        request: &mut GenerationRequest,
        preset: &BudgetPreset,
    ) -> Option<DowngradeDecision> {
        if !self.enabled || self.large_model_tag.is_empty() {
            return None;
        }

        let small_budget = preset
            .max_output_tokens
            .is_some_and(|limit| limit <= self.max_output_tokens);
        if !small_budget || request.has_retrieval_markers() {
            return None;
        }

        let requested = request.model().unwrap_or_default();
        if !requested.to_lowercase().contains(&self.large_model_tag) {
            return None;
        }

        let decision = DowngradeDecision {
            requested_model: requested.to_string(),
            actual_model: self.fallback_model.clone(),
        };
        request.set_model(self.fallback_model.clone());

        info!(
            requested = decision.requested_model.as_str(),
            actual = decision.actual_model.as_str(),
            mode = %preset.mode,
            "small-budget model downgrade"
        );

        Some(decision)
    }
}
