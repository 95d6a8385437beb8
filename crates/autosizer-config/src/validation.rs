// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: URL schemes, positive
//! timeouts and limits, and classifier thresholds that are ordered.

use autosizer_core::types::BudgetMode;

use crate::diagnostic::ConfigError;
use crate::model::AutosizerConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &AutosizerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_server(config, &mut errors);
    validate_upstream(config, &mut errors);
    validate_budget(config, &mut errors);

    let classifier = &config.classifier;
    if classifier.short_max_words > classifier.normal_max_words {
        errors.push(ConfigError::validation(format!(
            "classifier.short_max_words ({}) must not exceed classifier.normal_max_words ({})",
            classifier.short_max_words, classifier.normal_max_words
        )));
    }

    let cpt = config.trim.chars_per_token;
    if !cpt.is_finite() || cpt <= 0.0 {
        errors.push(ConfigError::validation(format!(
            "trim.chars_per_token must be positive, got {cpt}"
        )));
    }

    let downgrade = &config.downgrade;
    if downgrade.enabled {
        if downgrade.fallback_model.trim().is_empty() {
            errors.push(ConfigError::validation(
                "downgrade.fallback_model must not be empty when downgrades are enabled",
            ));
        }
        if downgrade.large_model_tag.trim().is_empty() {
            errors.push(ConfigError::validation(
                "downgrade.large_model_tag must not be empty when downgrades are enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(config: &AutosizerConfig, errors: &mut Vec<ConfigError>) {
    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
        return;
    }

    // Accept valid IPv4, IPv6, or hostname patterns
    let is_ip = host.parse::<std::net::IpAddr>().is_ok();
    let is_hostname = host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
    if !is_ip && !is_hostname {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }
}

fn validate_upstream(config: &AutosizerConfig, errors: &mut Vec<ConfigError>) {
    let upstream = &config.upstream;
    let url = upstream.base_url.trim();
    if url.is_empty() {
        errors.push(ConfigError::validation("upstream.base_url must not be empty"));
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "upstream.base_url `{url}` must start with http:// or https://"
        )));
    }

    if upstream.connect_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "upstream.connect_timeout_secs must be greater than 0",
        ));
    }
    if upstream.read_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "upstream.read_timeout_secs must be greater than 0",
        ));
    }
}

fn validate_budget(config: &AutosizerConfig, errors: &mut Vec<ConfigError>) {
    for mode in [BudgetMode::Short, BudgetMode::Normal, BudgetMode::Deep] {
        let preset = config.budget.section(mode);
        if preset.num_predict == Some(0) {
            errors.push(ConfigError::validation(format!(
                "budget.{mode}.num_predict must be greater than 0 when set"
            )));
        }
        if preset.num_ctx == Some(0) {
            errors.push(ConfigError::validation(format!(
                "budget.{mode}.num_ctx must be greater than 0 when set"
            )));
        }
        if let Some(t) = preset.temperature
            && !(t >= 0.0)
        {
            errors.push(ConfigError::validation(format!(
                "budget.{mode}.temperature must be non-negative, got {t}"
            )));
        }
    }
}
