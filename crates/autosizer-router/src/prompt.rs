// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brevity instruction for short-mode requests.

use autosizer_config::model::PromptConfig;
use autosizer_core::types::{BudgetMode, BudgetPreset, GenerationRequest};
use serde_json::{json, Value};
use tracing::info;

/// How the instruction was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    /// Prepended as a leading system message.
    SystemMessage,
    /// Prefixed onto the `prompt` string.
    PromptPrefix,
}

/// Prepends a "be brief" instruction to short, non-retrieval requests.
#[derive(Debug, Clone)]
pub struct ConcisePrompt {
    enabled: bool,
    instruction: String,
}

impl ConcisePrompt {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            enabled: config.concise_system_enabled,
            instruction: config.concise_system.clone(),
        }
    }

    /// Attach the instruction to `request` when `preset` is short mode.
    ///
    /// Chat bodies whose first message is already a system message are left alone.
    pub fn inject_concise_system(
        &self,
        request: &mut GenerationRequest,
        preset: &BudgetPreset,
    ) -> Option<Injection> {
        if !self.enabled || preset.mode != BudgetMode::Short || request.has_retrieval_markers() {
            return None;
        }

        if request.has_messages() {
            let Some(Value::Array(messages)) = request.remove("messages") else {
                return None;
            };
            let already_system = messages
                .first()
                .and_then(|m| m.get("role"))
                .and_then(Value::as_str)
                == Some("system");

            if already_system {
                request.insert("messages", Value::Array(messages));
                return None;
            }

            let mut with_system = Vec::with_capacity(messages.len() + 1);
            with_system.push(json!({"role": "system", "content": self.instruction}));
            with_system.extend(messages);
            request.insert("messages", Value::Array(with_system));

            info!(via = "messages", "injected concise system instruction");
            return Some(Injection::SystemMessage);
        }

        let prompt = request.prompt().unwrap_or_default();
        let prefixed = format!("{}\n\n{}", self.instruction, prompt);
        request.insert("prompt", Value::String(prefixed));

        info!(via = "prompt", "injected concise system instruction");
        Some(Injection::PromptPrefix)
    }
}
