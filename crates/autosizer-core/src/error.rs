// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Autosizer proxy.

use thiserror::Error;

/// The primary error type shared by the planner, finishers, and gateway.
///
/// Malformed client input never reaches this type: the request pipeline
/// degrades bad fields to defaults instead of failing.
#[derive(Debug, Error)]
pub enum AutosizerError {
    /// Configuration errors detected after startup (bad header values, client build).
    #[error("configuration error: {0}")]
    Config(String),

    /// The inference backend could not be reached or broke the connection.
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The upstream call exceeded its connect or read timeout.
    #[error("upstream timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AutosizerError {
    /// Whether this error should be reported to the client as a gateway failure.
    pub fn is_gateway_failure(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }
}
