// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client option extraction and clamping against a preset.
//!
//! The client may tighten a preset's output and context limits but never
//! loosen them. Malformed numbers are treated as "not set".

use autosizer_core::types::{
    as_limit, BudgetPreset, EffectiveOptions, GenerationRequest, CONTEXT_LIMIT_KEY,
    OUTPUT_LIMIT_KEY, REPEAT_PENALTY_KEY, STOP_KEY, STREAM_KEY, TEMPERATURE_KEY,
};
use serde_json::{json, Map, Value};

/// OpenAI-style top-level output limit.
pub const MAX_TOKENS_KEY: &str = "max_tokens";

/// Temperature used when neither client nor preset sets one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Repetition penalty used when neither client nor preset sets one.
pub const DEFAULT_REPEAT_PENALTY: f64 = 1.2;

/// Collect the client's generation intent.
///
/// Starts from the nested `options` map and backfills from the convenience
/// top-level fields. Explicit nulls for the two limits are dropped.
pub fn extract_client_options(request: &GenerationRequest) -> Map<String, Value> {
    let mut opts = request.options();

    if let Some(stream) = request.get(STREAM_KEY)
        && !opts.contains_key(STREAM_KEY)
    {
        opts.insert(STREAM_KEY.to_string(), stream.clone());
    }

    for key in [TEMPERATURE_KEY, STOP_KEY] {
        if let Some(value) = request.get(key)
            && opts.get(key).is_none_or(Value::is_null)
        {
            opts.insert(key.to_string(), value.clone());
        }
    }

    if let Some(max_tokens) = request.get(MAX_TOKENS_KEY)
        && opts.get(OUTPUT_LIMIT_KEY).and_then(as_limit).is_none()
    {
        opts.insert(OUTPUT_LIMIT_KEY.to_string(), max_tokens.clone());
    }

    for key in [OUTPUT_LIMIT_KEY, CONTEXT_LIMIT_KEY] {
        if opts.get(key).is_some_and(Value::is_null) {
            opts.remove(key);
        }
    }

    opts
}

/// Merge client options with `preset`, clamping limits to the preset's ceiling.
pub fn clamp_options(preset: &BudgetPreset, client: &Map<String, Value>) -> EffectiveOptions {
    let mut out = client.clone();

    clamp_limit(&mut out, OUTPUT_LIMIT_KEY, preset.max_output_tokens);
    clamp_limit(&mut out, CONTEXT_LIMIT_KEY, preset.max_context_tokens);

    set_if_unset(
        &mut out,
        TEMPERATURE_KEY,
        json!(preset.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
    );
    set_if_unset(
        &mut out,
        REPEAT_PENALTY_KEY,
        json!(preset.repeat_penalty.unwrap_or(DEFAULT_REPEAT_PENALTY)),
    );
    if let Some(stop) = &preset.stop {
        set_if_unset(&mut out, STOP_KEY, json!(stop));
    }

    EffectiveOptions::new(out)
}

/// Extract and clamp in one step.
pub fn normalize(request: &GenerationRequest, preset: &BudgetPreset) -> EffectiveOptions {
    clamp_options(preset, &extract_client_options(request))
}

/// Replace `key` with `min(client, ceiling)`. No ceiling leaves the client value alone.
fn clamp_limit(out: &mut Map<String, Value>, key: &str, ceiling: Option<u64>) {
    let Some(ceiling) = ceiling else {
        return;
    };
    let limit = out
        .get(key)
        .and_then(as_limit)
        .map_or(ceiling, |requested| requested.min(ceiling));
    out.insert(key.to_string(), Value::from(limit));
}

fn set_if_unset(out: &mut Map<String, Value>, key: &str, value: Value) {
    if out.get(key).is_none_or(Value::is_null) {
        out.insert(key.to_string(), value);
    }
}
