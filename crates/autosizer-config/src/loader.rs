// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./autosizer.toml` > `~/.config/autosizer/autosizer.toml` >
//! `/etc/autosizer/autosizer.toml`, with environment variable overrides via the
//! `AUTOSIZER_` prefix and the unprefixed variables older deployments set.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::AutosizerConfig;

/// Sections whose keys map one level deep (`AUTOSIZER_TRIM_TAIL_TOKENS` -> `trim.tail_tokens`).
const SECTIONS: &[&str] = &[
    "server",
    "upstream",
    "classifier",
    "trim",
    "downgrade",
    "prompt",
];

/// Budget modes nested under `budget` (`AUTOSIZER_BUDGET_SHORT_NUM_CTX` -> `budget.short.num_ctx`).
const BUDGET_MODES: &[&str] = &["short", "normal", "deep"];

/// Unprefixed variables accepted for compatibility, with their config paths.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("TARGET_OLLAMA", "upstream.base_url"),
    ("UPSTREAM_TIMEOUT", "upstream.read_timeout_secs"),
    ("SHORT_MAX_WORDS", "classifier.short_max_words"),
    ("NORMAL_MAX_WORDS", "classifier.normal_max_words"),
    ("TAIL_TOKENS", "trim.tail_tokens"),
    ("CHARS_PER_TOKEN", "trim.chars_per_token"),
    ("SHORT_SENTENCES", "trim.short_sentences"),
    ("FALLBACK_7B", "downgrade.fallback_model"),
    ("DEFAULT_SYSTEM_SHORT", "prompt.concise_system"),
];

/// Legacy `0`/`1` switch for model downgrades. Anything but `1` disables them.
const LEGACY_DOWNGRADE_FLAG: &str = "MODEL_DOWNGRADE";

/// Legacy per-mode presets, each a JSON object of backend option names.
const LEGACY_PRESETS: &[(&str, &str)] = &[
    ("CAP_SHORT", "budget.short"),
    ("CAP_NORMAL", "budget.normal"),
    ("CAP_DEEP", "budget.deep"),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/autosizer/autosizer.toml` (system-wide)
/// 3. `~/.config/autosizer/autosizer.toml` (user XDG config)
/// 4. `./autosizer.toml` (local directory)
/// 5. Legacy unprefixed variables (`TARGET_OLLAMA`, `CAP_SHORT`, `MODEL_DOWNGRADE`, ...)
/// 6. `AUTOSIZER_*` environment variables
pub fn load_config() -> Result<AutosizerConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<AutosizerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AutosizerConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AutosizerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AutosizerConfig::default()))
        .merge(Toml::file(path))
        .merge(legacy_env(|name| std::env::var(name).ok()))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AutosizerConfig::default()))
        .merge(Toml::file("/etc/autosizer/autosizer.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("autosizer/autosizer.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("autosizer.toml"))
        .merge(legacy_env(|name| std::env::var(name).ok()))
        .merge(env_provider())
}

/// Create the `AUTOSIZER_` environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because field names
/// contain underscores: `AUTOSIZER_UPSTREAM_BASE_URL` must map to
/// `upstream.base_url`, not `upstream.base.url`.
fn env_provider() -> Env {
    Env::prefixed("AUTOSIZER_").map(|key| map_env_key(key.as_str()).into())
}

/// Provider for the unprefixed variables listed in [`LEGACY_ENV`].
fn legacy_env_provider() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        let lowered = key.as_str().to_ascii_lowercase();
        LEGACY_ENV
            .iter()
            .find(|(name, _)| name.to_ascii_lowercase() == lowered)
            .map(|(_, path)| path.to_string())
            .unwrap_or(lowered)
            .into()
    })
}

/// All legacy variables as one provider, reading values through `lookup`.
///
/// Preset variables that are not JSON objects are kept as strings so
/// extraction reports them against their `budget.<mode>` path.
fn legacy_env<F>(lookup: F) -> Figment
where
    F: Fn(&str) -> Option<String>,
{
    let mut figment = Figment::new().merge(legacy_env_provider());

    if let Some(flag) = lookup(LEGACY_DOWNGRADE_FLAG) {
        figment = figment.merge(Serialized::default("downgrade.enabled", flag.trim() == "1"));
    }

    for (name, path) in LEGACY_PRESETS {
        let Some(raw) = lookup(name) else { continue };
        figment = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value @ serde_json::Value::Object(_)) => figment.merge(Serialized::default(path, value)),
            _ => figment.merge(Serialized::default(path, raw)),
        };
    }

    figment
}

/// Map a prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();

    if let Some(rest) = key.strip_prefix("budget_") {
        for mode in BUDGET_MODES {
            if let Some(field) = rest.strip_prefix(mode).and_then(|r| r.strip_prefix('_')) {
                return format!("budget.{mode}.{field}");
            }
        }
    }

    for section in SECTIONS {
        if let Some(field) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{field}");
        }
    }

    key
}
