// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Autosizer proxy.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use autosizer_core::types::{BudgetMode, BudgetPreset};
use serde::{Deserialize, Serialize};

/// Top-level Autosizer configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutosizerConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Inference backend settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Per-mode generation presets.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Prompt classification thresholds and keywords.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Short-reply trimming settings.
    #[serde(default)]
    pub trim: TrimConfig,

    /// Model downgrade settings.
    #[serde(default)]
    pub downgrade: DowngradeConfig,

    /// Concise system prompt settings.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the proxy to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the proxy to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8089
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Inference backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the Ollama-compatible backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Seconds allowed to establish the upstream connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Seconds allowed between upstream reads before the call is abandoned.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://ollama:11434".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    300
}

/// Generation limits and sampling parameters for one budget mode.
///
/// Keys mirror the backend's native option names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    /// Maximum output tokens.
    #[serde(default)]
    pub num_predict: Option<u64>,

    /// Context window size in tokens.
    #[serde(default)]
    pub num_ctx: Option<u64>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Repetition penalty.
    #[serde(default)]
    pub repeat_penalty: Option<f64>,

    /// Stop sequences applied when the client supplies none.
    #[serde(default)]
    pub stop: Option<Vec<String>>,
}

impl PresetConfig {
    /// Converts this section into the immutable preset for `mode`.
    pub fn to_preset(&self, mode: BudgetMode) -> BudgetPreset {
        BudgetPreset {
            mode,
            max_output_tokens: self.num_predict,
            max_context_tokens: self.num_ctx,
            temperature: self.temperature,
            repeat_penalty: self.repeat_penalty,
            stop: self.stop.clone(),
        }
    }
}

/// The three budget presets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    #[serde(default = "default_short_preset")]
    pub short: PresetConfig,

    #[serde(default = "default_normal_preset")]
    pub normal: PresetConfig,

    #[serde(default = "default_deep_preset")]
    pub deep: PresetConfig,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            short: default_short_preset(),
            normal: default_normal_preset(),
            deep: default_deep_preset(),
        }
    }
}

impl BudgetConfig {
    /// The preset section for a given mode.
    pub fn section(&self, mode: BudgetMode) -> &PresetConfig {
        match mode {
            BudgetMode::Short => &self.short,
            BudgetMode::Normal => &self.normal,
            BudgetMode::Deep => &self.deep,
        }
    }
}

fn default_short_preset() -> PresetConfig {
    PresetConfig {
        num_predict: Some(160),
        num_ctx: Some(1024),
        temperature: Some(0.6),
        repeat_penalty: Some(1.2),
        stop: Some(vec!["<|im_end|>".to_string()]),
    }
}

fn default_normal_preset() -> PresetConfig {
    PresetConfig {
        num_predict: Some(384),
        num_ctx: Some(2048),
        temperature: Some(0.7),
        repeat_penalty: Some(1.2),
        stop: Some(vec!["<|im_end|>".to_string()]),
    }
}

fn default_deep_preset() -> PresetConfig {
    PresetConfig {
        num_predict: Some(768),
        num_ctx: Some(2048),
        temperature: Some(0.7),
        repeat_penalty: Some(1.1),
        stop: None,
    }
}

/// Prompt classification configuration.
///
/// Word counts of the prompt excerpt select the budget mode; detail keywords
/// promote the mode by one tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Excerpts with at most this many words are classified short.
    #[serde(default = "default_short_max_words")]
    pub short_max_words: usize,

    /// Excerpts with at most this many words are classified normal.
    #[serde(default = "default_normal_max_words")]
    pub normal_max_words: usize,

    /// Case-insensitive keywords that ask for an elaborate answer.
    #[serde(default = "default_detail_keywords")]
    pub detail_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            short_max_words: default_short_max_words(),
            normal_max_words: default_normal_max_words(),
            detail_keywords: default_detail_keywords(),
        }
    }
}

fn default_short_max_words() -> usize {
    12
}

fn default_normal_max_words() -> usize {
    60
}

fn default_detail_keywords() -> Vec<String> {
    [
        "example",
        "examples",
        "compare",
        "comparison",
        "contrast",
        "advantages",
        "disadvantages",
        "benefits",
        "best",
        "pros",
        "cons",
        "explain",
        "explanation",
        "why",
        "how",
        "detailed",
        "detail",
        "step-by-step",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Short-reply trimming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrimConfig {
    /// Sentences kept in short-mode replies. 0 disables trimming.
    #[serde(default = "default_short_sentences")]
    pub short_sentences: usize,

    /// Extra output tokens granted so the model can finish its last sentence.
    #[serde(default)]
    pub tail_tokens: u64,

    /// Character-per-token estimate used for the hard character ceiling.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            short_sentences: default_short_sentences(),
            tail_tokens: 0,
            chars_per_token: default_chars_per_token(),
        }
    }
}

fn default_short_sentences() -> usize {
    2
}

fn default_chars_per_token() -> f64 {
    4.0
}

/// Model downgrade configuration.
///
/// Small-budget requests aimed at a large model are redirected to a cheaper one.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DowngradeConfig {
    /// Enable model downgrades.
    #[serde(default = "default_downgrade_enabled")]
    pub enabled: bool,

    /// Presets with an output limit at or below this value qualify.
    #[serde(default = "default_downgrade_max_output_tokens")]
    pub max_output_tokens: u64,

    /// Case-insensitive substring identifying large models.
    #[serde(default = "default_large_model_tag")]
    pub large_model_tag: String,

    /// Model id substituted for qualifying requests.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
}

impl Default for DowngradeConfig {
    fn default() -> Self {
        Self {
            enabled: default_downgrade_enabled(),
            max_output_tokens: default_downgrade_max_output_tokens(),
            large_model_tag: default_large_model_tag(),
            fallback_model: default_fallback_model(),
        }
    }
}

fn default_downgrade_enabled() -> bool {
    true
}

fn default_downgrade_max_output_tokens() -> u64 {
    200
}

fn default_large_model_tag() -> String {
    "14b".to_string()
}

fn default_fallback_model() -> String {
    "qwen2.5-7b-instruct-q5_K_M".to_string()
}

/// Concise system prompt configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// Prepend a brevity instruction to short, non-retrieval requests.
    #[serde(default = "default_concise_system_enabled")]
    pub concise_system_enabled: bool,

    /// The brevity instruction text.
    #[serde(default = "default_concise_system")]
    pub concise_system: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            concise_system_enabled: default_concise_system_enabled(),
            concise_system: default_concise_system(),
        }
    }
}

fn default_concise_system_enabled() -> bool {
    true
}

fn default_concise_system() -> String {
    "Be brief. Answer in 1-2 sentences in plain English. Do not write code unless explicitly asked. \
     Do not start a new question or new turn. Finish your final sentence."
        .to_string()
}
